//! Minimal SNMPv2c GET client
//!
//! Only what discovery needs: encode a GetRequest, decode the GetResponse,
//! and send it over UDP with a per-attempt timeout and a retry budget.

use super::classifier::SystemDescriptionProbe;
use crate::{InventoryError, Result};
use log::debug;
use rand::Rng;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Duration, Instant};

/// sysDescr.0
pub const SYS_DESCR_OID: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 1, 0];

pub const SNMP_PORT: u16 = 161;
pub const VERSION_2C: i64 = 1;

pub const PDU_GET_REQUEST: u8 = 0xA0;
pub const PDU_GET_RESPONSE: u8 = 0xA2;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_NO_SUCH_OBJECT: u8 = 0x80;
const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
const TAG_END_OF_MIB_VIEW: u8 = 0x82;

/// Value half of a varbind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarBindValue {
    Null,
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectId(Vec<u32>),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    Other(u8, Vec<u8>),
}

impl VarBindValue {
    pub fn as_text(&self) -> Option<String> {
        match self {
            VarBindValue::OctetString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }
}

/// A v1/v2c message carrying one of the get-style PDUs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpMessage {
    pub version: i64,
    pub community: Vec<u8>,
    pub pdu_type: u8,
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<(Vec<u32>, VarBindValue)>,
}

impl SnmpMessage {
    pub fn get_request(community: &str, request_id: i32, oid: &[u32]) -> Self {
        Self {
            version: VERSION_2C,
            community: community.as_bytes().to_vec(),
            pdu_type: PDU_GET_REQUEST,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: vec![(oid.to_vec(), VarBindValue::Null)],
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut list = Vec::new();
        for (oid, value) in &self.varbinds {
            let mut varbind = Vec::new();
            encode_tlv(TAG_OID, &encode_oid(oid)?, &mut varbind);
            encode_value(value, &mut varbind)?;
            encode_tlv(TAG_SEQUENCE, &varbind, &mut list);
        }

        let mut pdu = Vec::new();
        encode_tlv(TAG_INTEGER, &encode_integer(i64::from(self.request_id)), &mut pdu);
        encode_tlv(TAG_INTEGER, &encode_integer(self.error_status), &mut pdu);
        encode_tlv(TAG_INTEGER, &encode_integer(self.error_index), &mut pdu);
        encode_tlv(TAG_SEQUENCE, &list, &mut pdu);

        let mut body = Vec::new();
        encode_tlv(TAG_INTEGER, &encode_integer(self.version), &mut body);
        encode_tlv(TAG_OCTET_STRING, &self.community, &mut body);
        encode_tlv(self.pdu_type, &pdu, &mut body);

        let mut message = Vec::new();
        encode_tlv(TAG_SEQUENCE, &body, &mut message);
        Ok(message)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut outer = BerReader::new(buf);
        let mut message = BerReader::new(outer.expect(TAG_SEQUENCE, "message")?);

        let version = decode_integer(message.expect(TAG_INTEGER, "version")?)?;
        let community = message.expect(TAG_OCTET_STRING, "community")?.to_vec();
        let (pdu_type, pdu) = message.read_tlv()?;

        let mut pdu = BerReader::new(pdu);
        let request_id = decode_integer(pdu.expect(TAG_INTEGER, "request-id")?)?;
        let request_id = i32::try_from(request_id)
            .map_err(|_| InventoryError::ParseError(format!("request-id {} out of range", request_id)))?;
        let error_status = decode_integer(pdu.expect(TAG_INTEGER, "error-status")?)?;
        let error_index = decode_integer(pdu.expect(TAG_INTEGER, "error-index")?)?;

        let mut list = BerReader::new(pdu.expect(TAG_SEQUENCE, "varbind list")?);
        let mut varbinds = Vec::new();
        while !list.is_empty() {
            let mut varbind = BerReader::new(list.expect(TAG_SEQUENCE, "varbind")?);
            let oid = decode_oid(varbind.expect(TAG_OID, "varbind name")?)?;
            let (tag, content) = varbind.read_tlv()?;
            varbinds.push((oid, decode_value(tag, content)?));
        }

        Ok(Self {
            version,
            community,
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

fn encode_tlv(tag: u8, content: &[u8], out: &mut Vec<u8>) {
    out.push(tag);
    encode_length(content.len(), out);
    out.extend_from_slice(content);
}

/// Minimal two's complement big-endian encoding
fn encode_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant_zero = bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0;
        let redundant_ones = bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0;
        if !(redundant_zero || redundant_ones) {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn decode_integer(content: &[u8]) -> Result<i64> {
    if content.is_empty() || content.len() > 8 {
        return Err(InventoryError::ParseError(format!(
            "invalid INTEGER length {}",
            content.len()
        )));
    }
    let mut value: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    for &byte in content {
        value = (value << 8) | i64::from(byte);
    }
    Ok(value)
}

fn encode_oid(oid: &[u32]) -> Result<Vec<u8>> {
    if oid.len() < 2 || oid[0] > 2 || (oid[0] < 2 && oid[1] >= 40) {
        return Err(InventoryError::ParseError(format!("invalid OID {:?}", oid)));
    }
    let mut out = Vec::new();
    encode_base128(u64::from(oid[0]) * 40 + u64::from(oid[1]), &mut out);
    for &arc in &oid[2..] {
        encode_base128(u64::from(arc), &mut out);
    }
    Ok(out)
}

fn encode_base128(mut value: u64, out: &mut Vec<u8>) {
    let mut groups = [0u8; 10];
    let mut count = 0;
    loop {
        groups[count] = (value & 0x7F) as u8;
        count += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let continuation = if i != 0 { 0x80 } else { 0x00 };
        out.push(groups[i] | continuation);
    }
}

fn decode_oid(content: &[u8]) -> Result<Vec<u32>> {
    let invalid = || InventoryError::ParseError(format!("invalid OID encoding {:02x?}", content));
    let mut arcs = Vec::new();
    let mut value: u64 = 0;
    let mut pending = false;

    for &byte in content {
        value = (value << 7) | u64::from(byte & 0x7F);
        if value > u64::from(u32::MAX) + 80 {
            return Err(invalid());
        }
        pending = byte & 0x80 != 0;
        if pending {
            continue;
        }
        if arcs.is_empty() {
            let (first, second) = match value {
                0..=39 => (0, value),
                40..=79 => (1, value - 40),
                _ => (2, value - 80),
            };
            arcs.push(first);
            arcs.push(u32::try_from(second).map_err(|_| invalid())?);
        } else {
            arcs.push(u32::try_from(value).map_err(|_| invalid())?);
        }
        value = 0;
    }

    if pending || arcs.is_empty() {
        return Err(invalid());
    }
    Ok(arcs)
}

fn encode_value(value: &VarBindValue, out: &mut Vec<u8>) -> Result<()> {
    match value {
        VarBindValue::Null => encode_tlv(TAG_NULL, &[], out),
        VarBindValue::Integer(n) => encode_tlv(TAG_INTEGER, &encode_integer(*n), out),
        VarBindValue::OctetString(bytes) => encode_tlv(TAG_OCTET_STRING, bytes, out),
        VarBindValue::ObjectId(oid) => encode_tlv(TAG_OID, &encode_oid(oid)?, out),
        VarBindValue::NoSuchObject => encode_tlv(TAG_NO_SUCH_OBJECT, &[], out),
        VarBindValue::NoSuchInstance => encode_tlv(TAG_NO_SUCH_INSTANCE, &[], out),
        VarBindValue::EndOfMibView => encode_tlv(TAG_END_OF_MIB_VIEW, &[], out),
        VarBindValue::Other(tag, bytes) => encode_tlv(*tag, bytes, out),
    }
    Ok(())
}

fn decode_value(tag: u8, content: &[u8]) -> Result<VarBindValue> {
    Ok(match tag {
        TAG_NULL => VarBindValue::Null,
        TAG_INTEGER => VarBindValue::Integer(decode_integer(content)?),
        TAG_OCTET_STRING => VarBindValue::OctetString(content.to_vec()),
        TAG_OID => VarBindValue::ObjectId(decode_oid(content)?),
        TAG_NO_SUCH_OBJECT => VarBindValue::NoSuchObject,
        TAG_NO_SUCH_INSTANCE => VarBindValue::NoSuchInstance,
        TAG_END_OF_MIB_VIEW => VarBindValue::EndOfMibView,
        other => VarBindValue::Other(other, content.to_vec()),
    })
}

/// Cursor over definite-length BER TLVs
struct BerReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BerReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8])> {
        let buf = self.buf;
        let truncated = || InventoryError::ParseError("truncated SNMP message".to_string());

        let tag = *buf.get(self.pos).ok_or_else(truncated)?;
        let first = *buf.get(self.pos + 1).ok_or_else(truncated)?;
        let mut pos = self.pos + 2;

        let len = if first & 0x80 == 0 {
            usize::from(first)
        } else {
            let count = usize::from(first & 0x7F);
            if count == 0 || count > 4 {
                return Err(InventoryError::ParseError(format!(
                    "unsupported BER length form 0x{:02x}",
                    first
                )));
            }
            let bytes = buf.get(pos..pos + count).ok_or_else(truncated)?;
            pos += count;
            bytes.iter().fold(0usize, |acc, b| (acc << 8) | usize::from(*b))
        };

        let end = pos.checked_add(len).ok_or_else(truncated)?;
        let content = buf.get(pos..end).ok_or_else(truncated)?;
        self.pos = end;
        Ok((tag, content))
    }

    fn expect(&mut self, tag: u8, what: &str) -> Result<&'a [u8]> {
        let (found, content) = self.read_tlv()?;
        if found != tag {
            return Err(InventoryError::ParseError(format!(
                "expected {} (tag 0x{:02x}), found tag 0x{:02x}",
                what, tag, found
            )));
        }
        Ok(content)
    }
}

/// SNMPv2c client for single-OID GETs
#[derive(Debug, Clone)]
pub struct SnmpClient {
    community: String,
    port: u16,
    timeout: Duration,
    retries: u32,
}

impl SnmpClient {
    pub fn new(community: impl Into<String>) -> Self {
        Self {
            community: community.into(),
            port: SNMP_PORT,
            timeout: Duration::from_millis(1000),
            retries: 1,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// GET one OID. Gives up after `retries + 1` unanswered attempts.
    pub async fn get(&self, target: IpAddr, oid: &[u32]) -> Result<VarBindValue> {
        let bind_addr = match target {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        let destination = SocketAddr::new(target, self.port);

        let request_id: i32 = rand::thread_rng().gen_range(1..i32::MAX);
        let request = SnmpMessage::get_request(&self.community, request_id, oid).encode()?;
        let mut buf = vec![0u8; 65535];

        for attempt in 1..=self.retries + 1 {
            socket.send_to(&request, destination).await?;
            let deadline = Instant::now() + self.timeout;

            loop {
                let (len, from) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                    Ok(received) => received?,
                    Err(_) => {
                        debug!("SNMP attempt {} to {} timed out", attempt, target);
                        break;
                    }
                };

                if from.ip() != target {
                    continue;
                }

                let response = match SnmpMessage::decode(&buf[..len]) {
                    Ok(response) => response,
                    Err(e) => {
                        debug!("Discarding undecodable SNMP reply from {}: {}", target, e);
                        continue;
                    }
                };

                if response.pdu_type != PDU_GET_RESPONSE || response.request_id != request_id {
                    continue;
                }

                if response.error_status != 0 {
                    return Err(InventoryError::SnmpError(format!(
                        "{} answered with error-status {} (index {})",
                        target, response.error_status, response.error_index
                    )));
                }

                return response
                    .varbinds
                    .into_iter()
                    .find(|(name, _)| name.as_slice() == oid)
                    .map(|(_, value)| value)
                    .ok_or_else(|| {
                        InventoryError::SnmpError(format!("{} omitted the requested OID", target))
                    });
            }
        }

        Err(InventoryError::TimeoutError(format!(
            "no SNMP response from {} after {} attempt(s)",
            target,
            self.retries + 1
        )))
    }
}

#[async_trait::async_trait]
impl SystemDescriptionProbe for SnmpClient {
    async fn system_description(&self, target: IpAddr) -> Result<String> {
        let value = self.get(target, SYS_DESCR_OID).await?;
        value.as_text().ok_or_else(|| {
            InventoryError::SnmpError(format!("sysDescr unavailable on {}: {:?}", target, value))
        })
    }
}
