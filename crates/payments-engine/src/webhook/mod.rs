//! Webhook ingestion
//!
//! ```text
//! raw body + Stripe-Signature
//!        │
//!        ▼
//! WebhookAuthenticator ──► WebhookRouter ──► IntentReconciler ──► PaymentIntentService
//! ```

pub mod auth;
pub mod event;
pub mod reconciler;
pub mod router;

pub use auth::{DEFAULT_TOLERANCE_SECS, WebhookAuthenticator, sign_payload};
pub use event::{EventType, SourceSnapshot, SourceStatus, Subject, SubjectType, WebhookEvent};
pub use reconciler::{IntentReconciler, ReconcileAction};
pub use router::WebhookRouter;

use crate::error::Result;

/// Authenticate-then-route pipeline for one delivery
#[derive(Clone)]
pub struct WebhookProcessor {
    authenticator: WebhookAuthenticator,
    router: WebhookRouter,
}

impl WebhookProcessor {
    pub const fn new(authenticator: WebhookAuthenticator, router: WebhookRouter) -> Self {
        Self {
            authenticator,
            router,
        }
    }

    pub const fn authenticator(&self) -> &WebhookAuthenticator {
        &self.authenticator
    }

    pub async fn process(&self, payload: &[u8], signature: Option<&str>) -> Result<ReconcileAction> {
        let event = self.authenticator.authenticate(payload, signature)?;
        self.router.route(&event).await
    }
}
