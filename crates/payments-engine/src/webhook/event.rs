//! Webhook event model

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PaymentError, Result};
use crate::intent::PaymentIntentSnapshot;

/// Event types the reconciler acts on
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventType {
    PaymentIntentSucceeded,
    PaymentIntentPaymentFailed,
    SourceChargeable,
    SourceFailed,
    SourceCanceled,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::PaymentIntentSucceeded => "payment_intent.succeeded",
            Self::PaymentIntentPaymentFailed => "payment_intent.payment_failed",
            Self::SourceChargeable => "source.chargeable",
            Self::SourceFailed => "source.failed",
            Self::SourceCanceled => "source.canceled",
            Self::Other(other) => other,
        }
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentIntentPaymentFailed,
            "source.chargeable" => Self::SourceChargeable,
            "source.failed" => Self::SourceFailed,
            "source.canceled" => Self::SourceCanceled,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Kind of object the event is about (`data.object.object`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubjectType {
    PaymentIntent,
    Source,
    Other(String),
}

impl SubjectType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::PaymentIntent => "payment_intent",
            Self::Source => "source",
            Self::Other(other) => other,
        }
    }
}

impl From<&str> for SubjectType {
    fn from(s: &str) -> Self {
        match s {
            "payment_intent" => Self::PaymentIntent,
            "source" => Self::Source,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Legacy source lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Chargeable,
    Failed,
    Canceled,
    Pending,
    Consumed,
    #[serde(other)]
    Other,
}

/// Source as carried inside a `source.*` webhook
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub id: String,
    pub status: SourceStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SourceSnapshot {
    /// Metadata key linking a source back to its intent
    pub const INTENT_KEY: &'static str = "paymentIntent";

    pub fn payment_intent(&self) -> Option<&str> {
        self.metadata
            .get(Self::INTENT_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

/// Typed event subject
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Subject {
    PaymentIntent(PaymentIntentSnapshot),
    Source(SourceSnapshot),
    /// Object types this integration does not know about
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    livemode: bool,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: serde_json::Map<String, Value>,
}

/// A structurally valid webhook delivery
#[derive(Clone, Debug, PartialEq)]
pub struct WebhookEvent {
    pub id: Option<String>,
    pub event_type: EventType,
    pub subject_type: SubjectType,
    pub livemode: bool,
    object: Value,
}

impl WebhookEvent {
    /// Parse the event envelope. Authenticity is the caller's concern.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::MalformedPayload(e.to_string()))?;

        let subject_type = envelope
            .data
            .object
            .get("object")
            .and_then(Value::as_str)
            .map(SubjectType::from)
            .ok_or_else(|| PaymentError::MalformedPayload("data.object.object is missing".into()))?;

        Ok(Self {
            id: envelope.id,
            event_type: EventType::from(envelope.event_type.as_str()),
            subject_type,
            livemode: envelope.livemode,
            object: Value::Object(envelope.data.object),
        })
    }

    /// Raw `data.object`
    pub const fn object(&self) -> &Value {
        &self.object
    }

    /// Deserialize `data.object` into its typed snapshot
    pub fn subject(&self) -> Result<Subject> {
        match &self.subject_type {
            SubjectType::PaymentIntent => self.decode().map(Subject::PaymentIntent),
            SubjectType::Source => self.decode().map(Subject::Source),
            SubjectType::Other(kind) => Ok(Subject::Unknown(kind.clone())),
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.object).map_err(|e| {
            PaymentError::MalformedPayload(format!("invalid {} object: {e}", self.subject_type.as_str()))
        })
    }
}
