//! Payment Error Types

use std::fmt;

use thiserror::Error;

use crate::intent::IntentStatus;
use crate::pricing::PricingError;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Remote intent operation that failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentOperation {
    Create,
    Update,
    Retrieve,
    Confirm,
    Cancel,
}

impl IntentOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Retrieve => "retrieve",
            Self::Confirm => "confirm",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for IntentOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by the payment processor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    /// Machine-readable error code, when the provider sent one
    pub code: Option<String>,

    /// Human-readable message
    pub message: String,

    /// HTTP status of the failed call (absent for transport failures)
    pub http_status: Option<u16>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            http_status: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

impl From<stripe::StripeError> for ProviderError {
    fn from(err: stripe::StripeError) -> Self {
        match err {
            stripe::StripeError::Stripe(request) => Self {
                code: request.code.map(|code| code.to_string()),
                message: request
                    .message
                    .unwrap_or_else(|| "Stripe rejected the request".into()),
                http_status: Some(request.http_status),
            },
            other => Self::new(other.to_string()),
        }
    }
}

/// Error class, used by callers to pick a response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad cart input; never retried
    Validation,
    /// Webhook delivery could not be authenticated or parsed
    Authentication,
    /// Intent is not in the state the operation requires
    Precondition,
    /// Remote call to the payment processor failed
    Provider,
    /// Missing or contradictory configuration
    Config,
}

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Amount could not be computed from the cart
    #[error("Pricing failed: {0}")]
    Pricing(#[from] PricingError),

    /// Payment processor call failed
    #[error("Provider {operation} failed: {source}")]
    Provider {
        operation: IntentOperation,
        #[source]
        source: ProviderError,
    },

    /// Intent id cannot name a provider object
    #[error("Invalid payment intent id: {0:?}")]
    InvalidIntentId(String),

    /// Intent is past the pre-confirmation state
    #[error("PaymentIntent {intent_id} has unexpected status {status}")]
    UnexpectedStatus {
        intent_id: String,
        status: IntentStatus,
    },

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    SignatureInvalid(String),

    /// Webhook payload parsing failed
    #[error("Webhook payload malformed: {0}")]
    MalformedPayload(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    pub const fn provider(operation: IntentOperation, source: ProviderError) -> Self {
        Self::Provider { operation, source }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Pricing(_) | Self::InvalidIntentId(_) => ErrorKind::Validation,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::UnexpectedStatus { .. } => ErrorKind::Precondition,
            Self::SignatureInvalid(_) | Self::MalformedPayload(_) => ErrorKind::Authentication,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Check if a caller may retry the same request later.
    ///
    /// The engine itself never retries.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::Pricing(PricingError::ReferenceNotFound(_)) => "An item in your cart is no longer available.",
            Self::Pricing(PricingError::UnknownShippingOption(_)) => "The selected shipping option is not available.",
            Self::Pricing(_) => "Your cart could not be priced.",
            Self::InvalidIntentId(_) => "Unknown payment.",
            Self::Provider { .. } => "Payment processing failed. Please try again.",
            Self::UnexpectedStatus { .. } => "This payment has already been processed.",
            Self::SignatureInvalid(_) | Self::MalformedPayload(_) => "Webhook rejected.",
            Self::Config(_) => "Service configuration error.",
        }
    }

    /// Stable code for API responses
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Pricing(PricingError::ReferenceNotFound(_)) => "REFERENCE_NOT_FOUND",
            Self::Pricing(PricingError::InvalidQuantity { .. }) => "INVALID_QUANTITY",
            Self::Pricing(PricingError::UnknownShippingOption(_)) => "UNKNOWN_SHIPPING_OPTION",
            Self::Pricing(PricingError::AmountOverflow) => "AMOUNT_OVERFLOW",
            Self::Provider { operation, .. } => match operation {
                IntentOperation::Create => "PROVIDER_CREATE_FAILED",
                IntentOperation::Update => "PROVIDER_UPDATE_FAILED",
                IntentOperation::Retrieve => "PROVIDER_RETRIEVE_FAILED",
                IntentOperation::Confirm => "PROVIDER_CONFIRM_FAILED",
                IntentOperation::Cancel => "PROVIDER_CANCEL_FAILED",
            },
            Self::InvalidIntentId(_) => "INVALID_INTENT_ID",
            Self::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
            Self::SignatureInvalid(_) => "INVALID_SIGNATURE",
            Self::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

#[cfg(feature = "axum-handlers")]
mod http {
    use axum::Json;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use serde::Serialize;

    use super::{ErrorKind, PaymentError};

    #[derive(Serialize)]
    struct ErrorBody {
        error: String,
        code: &'static str,
    }

    impl PaymentError {
        pub const fn status_code(&self) -> StatusCode {
            match self.kind() {
                ErrorKind::Validation | ErrorKind::Authentication => StatusCode::BAD_REQUEST,
                ErrorKind::Precondition => StatusCode::CONFLICT,
                ErrorKind::Provider => StatusCode::BAD_GATEWAY,
                ErrorKind::Config => StatusCode::SERVICE_UNAVAILABLE,
            }
        }
    }

    impl IntoResponse for PaymentError {
        fn into_response(self) -> Response {
            let body = ErrorBody {
                error: match self.kind() {
                    // Cart problems are safe to echo back verbatim.
                    ErrorKind::Validation => self.to_string(),
                    _ => self.user_message().to_string(),
                },
                code: self.code(),
            };
            (self.status_code(), Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = PaymentError::from(PricingError::UnknownShippingOption("teleport".into()));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());

        let err = PaymentError::provider(IntentOperation::Confirm, ProviderError::new("boom"));
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.code(), "PROVIDER_CONFIRM_FAILED");
        assert_eq!(err.to_string(), "Provider confirm failed: boom");
        assert!(err.is_retryable());

        let err = PaymentError::UnexpectedStatus {
            intent_id: "pi_123".into(),
            status: IntentStatus::Succeeded,
        };
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(err.to_string(), "PaymentIntent pi_123 has unexpected status succeeded");
    }

    #[test]
    fn test_provider_error_builder() {
        let err = ProviderError::new("No such payment_intent")
            .with_code("resource_missing")
            .with_status(404);
        assert_eq!(err.code.as_deref(), Some("resource_missing"));
        assert_eq!(err.http_status, Some(404));
    }

    #[test]
    fn test_stripe_error_keeps_machine_code() {
        let mut request: stripe::RequestError = serde_json::from_value(serde_json::json!({
            "type": "invalid_request_error",
            "code": "resource_missing",
            "message": "No such payment_intent: 'pi_missing'"
        }))
        .unwrap();
        request.http_status = 404;

        let err = ProviderError::from(stripe::StripeError::Stripe(request));
        assert_eq!(err.code.as_deref(), Some("resource_missing"));
        assert_eq!(err.message, "No such payment_intent: 'pi_missing'");
        assert_eq!(err.http_status, Some(404));
    }

    #[test]
    fn test_invalid_intent_id_is_validation() {
        let err = PaymentError::InvalidIntentId("pi-1".into());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "INVALID_INTENT_ID");
    }
}
