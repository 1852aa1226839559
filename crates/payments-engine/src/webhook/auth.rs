//! Webhook Authentication
//!
//! Verifies `Stripe-Signature` headers of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The MAC covers
//! `"<t>." + raw body`, keyed by the endpoint's signing secret.
//!
//! # Security
//!
//! - HMAC-SHA256, compared in constant time (`Mac::verify_slice`)
//! - Deliveries older than the tolerance window are rejected as replays
//! - Permissive mode skips all of the above and must be opted into

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};
use crate::webhook::event::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_SKEW_SECS: i64 = 60;

#[derive(Clone)]
enum Mode {
    Verified { secret: String, tolerance_secs: i64 },
    Permissive,
}

/// Authenticates inbound webhook deliveries
#[derive(Clone)]
pub struct WebhookAuthenticator {
    mode: Mode,
}

impl fmt::Debug for WebhookAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mode {
            Mode::Verified { tolerance_secs, .. } => f
                .debug_struct("WebhookAuthenticator")
                .field("mode", &"verified")
                .field("tolerance_secs", tolerance_secs)
                .finish_non_exhaustive(),
            Mode::Permissive => f
                .debug_struct("WebhookAuthenticator")
                .field("mode", &"permissive")
                .finish(),
        }
    }
}

impl WebhookAuthenticator {
    /// Verify every delivery against `secret`
    pub fn verified(secret: impl Into<String>) -> Self {
        Self {
            mode: Mode::Verified {
                secret: secret.into(),
                tolerance_secs: DEFAULT_TOLERANCE_SECS,
            },
        }
    }

    /// Accept unsigned deliveries. Anyone who can reach the endpoint can
    /// forge events; never use this for production traffic.
    pub fn permissive_unsafe() -> Self {
        tracing::warn!(
            "Webhook signature verification is DISABLED; any caller can forge payment events"
        );
        Self { mode: Mode::Permissive }
    }

    /// Replace the replay window (verified mode only)
    #[must_use]
    pub fn with_tolerance(mut self, secs: i64) -> Self {
        if let Mode::Verified { tolerance_secs, .. } = &mut self.mode {
            *tolerance_secs = secs;
        }
        self
    }

    pub const fn is_verified(&self) -> bool {
        matches!(self.mode, Mode::Verified { .. })
    }

    /// Authenticate and parse a delivery
    pub fn authenticate(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookEvent> {
        self.authenticate_at(payload, signature, chrono::Utc::now().timestamp())
    }

    /// [`authenticate`](Self::authenticate) against an explicit clock
    pub fn authenticate_at(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: i64,
    ) -> Result<WebhookEvent> {
        match &self.mode {
            Mode::Verified {
                secret,
                tolerance_secs,
            } => {
                let header = signature.ok_or_else(|| {
                    PaymentError::SignatureInvalid("missing Stripe-Signature header".into())
                })?;
                verify_signature(secret, payload, header, now, *tolerance_secs)?;
                WebhookEvent::parse(payload)
            }
            Mode::Permissive => {
                let event = WebhookEvent::parse(payload)?;
                tracing::warn!(
                    event_type = %event.event_type.as_str(),
                    "Accepted UNAUTHENTICATED webhook delivery"
                );
                Ok(event)
            }
        }
    }
}

/// Parsed `Stripe-Signature` header
#[derive(Debug)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Result<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        PaymentError::SignatureInvalid("timestamp is not an integer".into())
                    })?);
                }
                // Undecodable entries can never match; skip them.
                "v1" => {
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| PaymentError::SignatureInvalid("no timestamp in header".into()))?;
        if signatures.is_empty() {
            return Err(PaymentError::SignatureInvalid("no v1 signature in header".into()));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(format!("unusable webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<()> {
    let header = SignatureHeader::parse(header)?;

    let age = now
        .checked_sub(header.timestamp)
        .ok_or_else(|| PaymentError::SignatureInvalid("timestamp out of range".into()))?;
    if age > tolerance_secs {
        tracing::warn!(
            event_timestamp = header.timestamp,
            age_secs = age,
            "Webhook event too old - possible replay"
        );
        return Err(PaymentError::SignatureInvalid(format!(
            "timestamp outside tolerance ({age} seconds old)"
        )));
    }
    if age < -MAX_FUTURE_SKEW_SECS {
        tracing::warn!(
            event_timestamp = header.timestamp,
            "Webhook event from the future - clock skew or manipulation"
        );
        return Err(PaymentError::SignatureInvalid("timestamp in the future".into()));
    }

    let mac = mac_for(secret, header.timestamp, payload)?;
    let matched = header
        .signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok());

    if matched {
        Ok(())
    } else {
        Err(PaymentError::SignatureInvalid(
            "no signature matches the expected value".into(),
        ))
    }
}

/// Build a `Stripe-Signature` header value for `payload`.
///
/// Used by tests and local tooling that replays events at the endpoint.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let mac = mac_for(secret, timestamp, payload)?;
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}
