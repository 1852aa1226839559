//! Payment Intents
//!
//! The processor owns every intent. These types are the working copy of a
//! single request; nothing here is cached between requests.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::money::Amount;

/// Processor-managed intent lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Pre-confirmation. Older API versions call this `requires_source`.
    #[serde(alias = "requires_source")]
    RequiresPaymentMethod,
    #[serde(alias = "requires_source_action")]
    RequiresAction,
    RequiresConfirmation,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresAction => "requires_action",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Succeeded => "succeeded",
            Self::Unknown => "unknown",
        }
    }

    /// Whether a payment source may still be attached and confirmed
    pub const fn awaits_payment_method(self) -> bool {
        matches!(self, Self::RequiresPaymentMethod)
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a nested provider object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: String,
    #[serde(default)]
    pub object: Option<String>,
}

/// Error from the most recent payment attempt
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPaymentError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub payment_method: Option<ObjectRef>,
    /// Legacy sources report here instead of `payment_method`
    #[serde(default)]
    pub source: Option<ObjectRef>,
}

/// Which instrument a failed attempt was made with
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailedInstrument {
    PaymentMethod(String),
    Source(String),
}

impl FailedInstrument {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PaymentMethod(_) => "payment_method",
            Self::Source(_) => "source",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::PaymentMethod(id) | Self::Source(id) => id,
        }
    }
}

impl LastPaymentError {
    /// Payment method if present, else the legacy source
    pub fn instrument(&self) -> Option<FailedInstrument> {
        self.payment_method
            .as_ref()
            .map(|pm| FailedInstrument::PaymentMethod(pm.id.clone()))
            .or_else(|| {
                self.source
                    .as_ref()
                    .map(|s| FailedInstrument::Source(s.id.clone()))
            })
    }
}

/// A payment intent as last returned by the processor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    pub amount: Amount,
    pub currency: String,
    #[serde(default)]
    pub last_payment_error: Option<LastPaymentError>,
    #[serde(default)]
    pub payment_method_types: Vec<String>,
    /// Handed to the browser to finish the payment client-side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// Processor object ids are non-empty ASCII alphanumerics and underscores.
pub fn is_well_formed_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Intent as carried inside a `payment_intent.*` webhook
pub type PaymentIntentSnapshot = PaymentIntent;

/// Status as reported to the storefront
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentStatusReport {
    pub status: IntentStatus,
    #[serde(rename = "last_payment_error", skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
}

/// Parameters for a new intent
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateIntent {
    pub amount: Amount,
    pub currency: String,
    pub payment_method_types: Vec<String>,
}

/// Partial update; `None` fields are left untouched
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IntentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_types: Option<Vec<String>>,
}

impl IntentUpdate {
    pub fn amount(amount: Amount) -> Self {
        Self {
            amount: Some(amount),
            ..Self::default()
        }
    }

    pub fn currency_and_methods(currency: impl Into<String>, methods: Vec<String>) -> Self {
        Self {
            currency: Some(currency.into()),
            payment_method_types: Some(methods),
            ..Self::default()
        }
    }
}

/// Remote intent API of the payment processor
///
/// Every call is a round trip; implementations must not cache.
#[async_trait]
pub trait IntentStore: Send + Sync {
    async fn create(&self, params: CreateIntent) -> Result<PaymentIntent, ProviderError>;

    async fn update(&self, id: &str, fields: IntentUpdate) -> Result<PaymentIntent, ProviderError>;

    async fn retrieve(&self, id: &str) -> Result<PaymentIntent, ProviderError>;

    /// Confirm with a chargeable legacy source
    async fn confirm(&self, id: &str, source_id: &str) -> Result<PaymentIntent, ProviderError>;

    async fn cancel(&self, id: &str) -> Result<PaymentIntent, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_ids() {
        assert!(is_well_formed_id("pi_3MtwBwLkdIwHu7ix28a3tqPa"));
        assert!(!is_well_formed_id(""));
        assert!(!is_well_formed_id("pi-1"));
        assert!(!is_well_formed_id("../customers"));
        assert!(!is_well_formed_id("pi_1?expand[]=customer"));
    }

    #[test]
    fn test_status_parsing() {
        let status: IntentStatus = serde_json::from_str(r#""requires_payment_method""#).unwrap();
        assert_eq!(status, IntentStatus::RequiresPaymentMethod);

        let legacy: IntentStatus = serde_json::from_str(r#""requires_source""#).unwrap();
        assert!(legacy.awaits_payment_method());

        let future: IntentStatus = serde_json::from_str(r#""requires_reauthorization""#).unwrap();
        assert_eq!(future, IntentStatus::Unknown);
        assert!(!IntentStatus::Succeeded.awaits_payment_method());
    }

    #[test]
    fn test_failed_instrument_prefers_payment_method() {
        let err = LastPaymentError {
            message: Some("Your card was declined.".into()),
            payment_method: Some(ObjectRef { id: "pm_1".into(), object: None }),
            source: Some(ObjectRef { id: "src_1".into(), object: None }),
            ..Default::default()
        };
        assert_eq!(err.instrument(), Some(FailedInstrument::PaymentMethod("pm_1".into())));

        let legacy = LastPaymentError {
            source: Some(ObjectRef { id: "src_1".into(), object: Some("source".into()) }),
            ..Default::default()
        };
        let instrument = legacy.instrument().unwrap();
        assert_eq!(instrument.kind(), "source");
        assert_eq!(instrument.id(), "src_1");
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let json = serde_json::to_value(IntentUpdate::amount(Amount::new(2498))).unwrap();
        assert_eq!(json, serde_json::json!({ "amount": 2498 }));
    }

    #[test]
    fn test_intent_from_provider_json() {
        let intent: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_123",
            "object": "payment_intent",
            "status": "requires_payment_method",
            "amount": 1998,
            "currency": "eur",
            "payment_method_types": ["card", "ideal"],
            "last_payment_error": null,
            "metadata": {}
        }))
        .unwrap();
        assert_eq!(intent.amount, Amount::new(1998));
        assert_eq!(intent.payment_method_types, vec!["card", "ideal"]);
        assert!(intent.last_payment_error.is_none());
    }
}
