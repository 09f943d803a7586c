//! Request signing for private endpoints.
//!
//! signature = base64(HMAC-SHA256(secret, timestamp + METHOD + requestPath + body))
//!
//! `requestPath` includes the query string (`/path?a=1`). The timestamp is
//! Unix milliseconds as a decimal string and is sent verbatim in
//! `ACCESS-TIMESTAMP`.

use super::ExchangeError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const ENV_API_KEY: &str = "BITGET_API_KEY";
pub const ENV_API_SECRET: &str = "BITGET_API_SECRET";
pub const ENV_API_PASSPHRASE: &str = "BITGET_API_PASSPHRASE";

/// API credentials. Debug output never shows the secret or passphrase.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read all three values from the environment; `None` if any is unset or empty.
    pub fn from_env() -> Option<Self> {
        let get = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Some(Self {
            api_key: get(ENV_API_KEY)?,
            api_secret: get(ENV_API_SECRET)?,
            passphrase: get(ENV_API_PASSPHRASE)?,
        })
    }

    /// Headers for one signed request.
    pub fn headers(
        &self,
        timestamp_ms: &str,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> Result<Vec<(&'static str, String)>, ExchangeError> {
        let signature = sign(&self.api_secret, timestamp_ms, method, request_path, body)?;
        Ok(vec![
            ("ACCESS-KEY", self.api_key.clone()),
            ("ACCESS-SIGN", signature),
            ("ACCESS-TIMESTAMP", timestamp_ms.to_string()),
            ("ACCESS-PASSPHRASE", self.passphrase.clone()),
            ("Content-Type", "application/json".to_string()),
            ("locale", "en-US".to_string()),
        ])
    }
}

/// Compute the base64 HMAC-SHA256 signature of the prehash string.
pub fn sign(
    secret: &str,
    timestamp_ms: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Authentication(format!("invalid secret: {e}")))?;
    mac.update(timestamp_ms.as_bytes());
    mac.update(method.to_uppercase().as_bytes());
    mac.update(request_path.as_bytes());
    mac.update(body.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
