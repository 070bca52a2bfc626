//! HMAC-SHA256 verification of processor webhook signatures.
//!
//! The processor sends a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The signed message is
//! `"<t>.<raw body>"`. Comparison is constant-time and the timestamp must fall
//! within a tolerance window to limit replay of captured requests.

use crate::error::{LendingError, Result};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
    tolerance_secs: i64,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self::with_tolerance(secret, DEFAULT_TOLERANCE_SECS)
    }

    pub fn with_tolerance(secret: SecretString, tolerance_secs: i64) -> Self {
        Self {
            secret,
            tolerance_secs,
        }
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> Result<()> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// Never logs the header, the payload or the computed MAC.
    pub fn verify_at(&self, payload: &[u8], header: &str, now_secs: i64) -> Result<()> {
        let (timestamp, candidates) = parse_header(header).ok_or_else(|| {
            tracing::warn!("malformed payment signature header");
            LendingError::InvalidSignal
        })?;

        let skew = now_secs.checked_sub(timestamp).and_then(i64::checked_abs);
        if skew.is_none_or(|skew| skew > self.tolerance_secs) {
            tracing::warn!(timestamp, "payment signature outside tolerance window");
            return Err(LendingError::InvalidSignal);
        }

        let computed = self.compute(timestamp, payload)?;
        let matched = candidates
            .iter()
            .filter_map(|hex_sig| hex::decode(hex_sig).ok())
            .any(|sig| bool::from(computed.ct_eq(&sig)));

        if matched {
            Ok(())
        } else {
            tracing::warn!("payment signature mismatch");
            Err(LendingError::InvalidSignal)
        }
    }

    /// Produces a header value for `payload` signed at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        let mac = self.compute(timestamp, payload)?;
        Ok(format!("t={timestamp},v1={}", hex::encode(mac)))
    }

    fn compute(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| LendingError::InvalidSignal)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn parse_header(header: &str) -> Option<(i64, Vec<&str>)> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    match (timestamp, signatures.is_empty()) {
        (Some(t), false) => Some((t, signatures)),
        _ => None,
    }
}
