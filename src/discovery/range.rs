//! Address enumeration over a CIDR block, with resume support
//!
//! Addresses are handled as `u128` so IPv4 and IPv6 blocks share one
//! code path; the family is remembered only to rebuild `IpAddr`s.

use crate::{InventoryError, Result};
use ipnetwork::IpNetwork;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Parse `<address>` or `<address>/<prefix>` into a block normalised to
/// its network address. A bare address is a single-host block.
pub fn parse_block(target: &str) -> Result<IpNetwork> {
    let target = target.trim();

    let block = match IpAddr::from_str(target) {
        Ok(ip) => IpNetwork::new(ip, host_prefix(&ip)),
        Err(_) => IpNetwork::from_str(target),
    }
    .map_err(|e| InventoryError::InvalidTarget(format!("{}: {}", target, e)))?;

    let (first, _) = bounds(&block);
    IpNetwork::new(to_addr(first, block.is_ipv6()), block.prefix())
        .map_err(|e| InventoryError::InvalidTarget(format!("{}: {}", target, e)))
}

/// The address right after `addr`, or `None` at the top of the address space
pub fn successor(addr: IpAddr) -> Option<IpAddr> {
    match addr {
        IpAddr::V4(v4) => u32::from(v4).checked_add(1).map(|n| IpAddr::V4(Ipv4Addr::from(n))),
        IpAddr::V6(v6) => u128::from(v6).checked_add(1).map(|n| IpAddr::V6(Ipv6Addr::from(n))),
    }
}

/// First and last address of the block as integers
pub fn bounds(block: &IpNetwork) -> (u128, u128) {
    let width: u32 = if block.is_ipv4() { 32 } else { 128 };
    let host_bits = width - u32::from(block.prefix());
    let host_mask = if host_bits >= 128 {
        u128::MAX
    } else {
        (1u128 << host_bits) - 1
    };

    let first = to_int(block.ip()) & !host_mask;
    (first, first | host_mask)
}

fn host_prefix(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn to_int(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

fn to_addr(value: u128, ipv6: bool) -> IpAddr {
    if ipv6 {
        IpAddr::V6(Ipv6Addr::from(value))
    } else {
        IpAddr::V4(Ipv4Addr::from(value as u32))
    }
}

/// First address to probe after `recorded`, `None` when `recorded` is the
/// final address of the block.
///
/// Any other successor outside the block means the host list belongs to a
/// different scan, which is an error.
pub fn resume_point(block: &IpNetwork, recorded: IpAddr) -> Result<Option<IpAddr>> {
    let (first, last) = bounds(block);
    let out_of_range = |next: IpAddr| InventoryError::ResumeOutOfRange {
        next,
        network: block.to_string(),
    };

    if recorded.is_ipv6() != block.is_ipv6() {
        return Err(out_of_range(successor(recorded).unwrap_or(recorded)));
    }

    if to_int(recorded) == last {
        return Ok(None);
    }

    let next = successor(recorded).ok_or_else(|| out_of_range(recorded))?;
    let next_int = to_int(next);
    if next_int < first || next_int > last {
        return Err(out_of_range(next));
    }

    Ok(Some(next))
}

/// Lazy, forward-only walk over the addresses left to probe
#[derive(Debug, Clone)]
pub struct AddressRange {
    next: Option<u128>,
    last: u128,
    ipv6: bool,
}

impl AddressRange {
    /// Every address of the block, network and broadcast included
    pub fn new(block: &IpNetwork) -> Self {
        let (first, last) = bounds(block);
        Self {
            next: Some(first),
            last,
            ipv6: block.is_ipv6(),
        }
    }

    /// Nothing left to scan in `block`
    pub fn empty(block: &IpNetwork) -> Self {
        let (_, last) = bounds(block);
        Self {
            next: None,
            last,
            ipv6: block.is_ipv6(),
        }
    }

    /// Continue the walk after the last address already recorded
    pub fn resume_after(block: &IpNetwork, recorded: IpAddr) -> Result<Self> {
        let (_, last) = bounds(block);
        Ok(match resume_point(block, recorded)? {
            Some(next) => Self {
                next: Some(to_int(next)),
                last,
                ipv6: block.is_ipv6(),
            },
            None => Self::empty(block),
        })
    }

    /// Count of addresses still to come
    pub fn remaining(&self) -> u128 {
        match self.next {
            Some(next) => (self.last - next).saturating_add(1),
            None => 0,
        }
    }
}

impl Iterator for AddressRange {
    type Item = IpAddr;

    fn next(&mut self) -> Option<IpAddr> {
        let current = self.next?;
        self.next = if current < self.last {
            Some(current + 1)
        } else {
            None
        };
        Some(to_addr(current, self.ipv6))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        match usize::try_from(remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}
