//! Signed payment-provider callbacks.
//!
//! The provider sends `Payment-Signature: t=<unix seconds>,v1=<hex>` where the digest is
//! HMAC-SHA256 over `"<t>.<raw body>"` keyed with the shared webhook secret. Several `v1`
//! entries may be present while a secret is being rotated.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "payment-signature";

const SUCCESS_EVENTS: [&str; 2] = ["payment_intent.succeeded", "mobile_money.payment.succeeded"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing Payment-Signature header")]
    MissingHeader,
    #[error("malformed signature header")]
    Malformed,
    #[error("signature timestamp is {age_secs}s away from server time")]
    OutsideTolerance { age_secs: u64 },
    #[error("signature does not match payload")]
    Mismatch,
    #[error("webhook secret cannot key the signature")]
    InvalidSecret,
}

fn keyed(secret: &str, timestamp: i64, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

/// Builds the header value a provider would send for `body` at `timestamp`.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
    let digest = keyed(secret, timestamp, body)?.finalize().into_bytes();
    Ok(format!("t={timestamp},v1={}", hex::encode(digest)))
}

/// Checks `header` against `body`. A `tolerance_secs` of zero disables the timestamp window.
pub fn verify_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    now: i64,
    tolerance_secs: u64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if tolerance_secs > 0 {
        let age_secs = now.abs_diff(timestamp);
        if age_secs > tolerance_secs {
            return Err(SignatureError::OutsideTolerance { age_secs });
        }
    }

    let mac = keyed(secret, timestamp, body)?;
    let matched = candidates.into_iter().any(|candidate| {
        hex::decode(candidate)
            .map(|expected| mac.clone().verify_slice(&expected).is_ok())
            .unwrap_or(false)
    });
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: RawData,
}

#[derive(Debug, Default, Deserialize)]
struct RawData {
    #[serde(default)]
    object: RawObject,
}

#[derive(Debug, Default, Deserialize)]
struct RawObject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

/// Verified callback event, reduced to what the coordinator acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    pub event_id: Option<String>,
    pub event_type: String,
    pub object_id: Option<String>,
    pub application_id: Option<String>,
    pub user_id: Option<String>,
}

impl ProviderEvent {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: RawEvent = serde_json::from_slice(body)?;
        let metadata = |key: &str| {
            raw.data
                .object
                .metadata
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Ok(Self {
            application_id: metadata("applicationId"),
            user_id: metadata("userId"),
            event_id: raw.id.clone(),
            event_type: raw.event_type.clone(),
            object_id: raw.data.object.id.clone(),
        })
    }

    pub fn is_payment_success(&self) -> bool {
        SUCCESS_EVENTS.contains(&self.event_type.as_str())
    }

    /// Processor-side reference recorded on the application.
    pub fn reference(&self) -> String {
        self.object_id
            .clone()
            .or_else(|| self.event_id.clone())
            .unwrap_or_else(|| self.event_type.clone())
    }
}
