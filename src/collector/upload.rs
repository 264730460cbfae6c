//! Client for the inventory API
//!
//! Authentication happens once per run. The token and domain are then sent
//! as headers with every request.

use crate::config::UploadCredentials;
use crate::{InventoryError, Result};
use log::{debug, info};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::IpAddr;

const USER_AGENT: &str = concat!("junos-inventory/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// Status and decoded body of one API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Authenticated handle, read-only once built
#[derive(Debug, Clone)]
pub struct InventoryClient {
    http: Client,
    base_url: String,
    token: String,
    domain: String,
    upload_path: String,
}

impl InventoryClient {
    /// Obtain a token from `{url}/v1/token`. Any failure, including a reply
    /// without a token, is an `AuthError`.
    pub async fn authenticate(credentials: &UploadCredentials) -> Result<Self> {
        let http = Client::builder()
            .timeout(credentials.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| InventoryError::AuthError(e.to_string()))?;

        let url = format!("{}/v1/token", credentials.url);
        let response = http
            .post(&url)
            .json(&json!({
                "username": credentials.username,
                "password": credentials.password,
                "domain": credentials.domain,
            }))
            .send()
            .await
            .map_err(|e| InventoryError::AuthError(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InventoryError::AuthError(format!("{} returned {}", url, status)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| InventoryError::AuthError(format!("No token in reply from {}: {}", url, e)))?;

        info!("Authenticated against {} for domain {}", credentials.url, credentials.domain);
        Ok(Self {
            http,
            base_url: credentials.url.clone(),
            token: token.token,
            domain: credentials.domain.clone(),
            upload_path: credentials.upload_path.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `payload` to `path` under the API root
    pub async fn execute(&self, method: Method, path: &str, payload: &Value) -> Result<ApiResponse> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("{} {}", method, url);

        let response = self
            .http
            .request(method, &url)
            .header("X-Auth-Token", &self.token)
            .header("X-Domain", &self.domain)
            .json(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(ApiResponse { status, body })
    }

    /// Post one device's inventory XML. Anything but a 2xx is an `UploadError`.
    pub async fn upload_device(
        &self,
        group: &str,
        hostname: &str,
        address: IpAddr,
        output: &str,
    ) -> Result<ApiResponse> {
        let payload = json!({
            "xml": output,
            "hostname": hostname,
            "address": address.to_string(),
            "group": group,
        });

        let response = self.execute(Method::POST, &self.upload_path, &payload).await?;
        if !response.is_success() {
            return Err(InventoryError::UploadError(format!(
                "{} rejected {} with status {}",
                self.upload_path, hostname, response.status
            )));
        }
        Ok(response)
    }
}
