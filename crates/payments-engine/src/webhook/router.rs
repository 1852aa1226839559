//! Dispatch of authenticated events by subject type

use crate::error::Result;
use crate::webhook::event::{Subject, WebhookEvent};
use crate::webhook::reconciler::{IntentReconciler, ReconcileAction};

#[derive(Clone)]
pub struct WebhookRouter {
    reconciler: IntentReconciler,
}

impl WebhookRouter {
    pub const fn new(reconciler: IntentReconciler) -> Self {
        Self { reconciler }
    }

    /// Route one event.
    ///
    /// Unknown subject types come back as [`ReconcileAction::Ignored`]; a
    /// known subject that fails to deserialize is an error.
    pub async fn route(&self, event: &WebhookEvent) -> Result<ReconcileAction> {
        let action = match event.subject()? {
            Subject::PaymentIntent(intent) => {
                self.reconciler
                    .on_payment_intent(&event.event_type, &intent)
                    .await?
            }
            Subject::Source(source) => self.reconciler.on_source(&source).await?,
            Subject::Unknown(kind) => {
                tracing::debug!(
                    event_id = event.id.as_deref().unwrap_or("-"),
                    event_type = %event.event_type.as_str(),
                    subject_type = %kind,
                    "Unhandled webhook subject"
                );
                ReconcileAction::Ignored
            }
        };

        tracing::info!(
            event_id = event.id.as_deref().unwrap_or("-"),
            event_type = %event.event_type.as_str(),
            handled = action.handled(),
            "Webhook event routed"
        );

        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::error::PaymentError;
    use crate::methods::PaymentMethodPolicy;
    use crate::pricing::PricingEngine;
    use crate::service::PaymentIntentService;
    use crate::store::MemoryIntentStore;

    fn router(store: Arc<MemoryIntentStore>) -> WebhookRouter {
        WebhookRouter::new(IntentReconciler::new(PaymentIntentService::new(
            store,
            PricingEngine::new(Arc::new(StaticCatalog::storefront())),
            PaymentMethodPolicy::default(),
        )))
    }

    fn event(value: &serde_json::Value) -> WebhookEvent {
        WebhookEvent::parse(&serde_json::to_vec(value).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_subject_not_handled() {
        let store = Arc::new(MemoryIntentStore::new());
        let action = router(store.clone())
            .route(&event(&json!({
                "type": "customer.created",
                "data": { "object": { "id": "cus_1", "object": "customer" } }
            })))
            .await
            .unwrap();

        assert!(!action.handled());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_source_without_intent_reference_not_handled() {
        let store = Arc::new(MemoryIntentStore::new());
        let action = router(store.clone())
            .route(&event(&json!({
                "type": "source.chargeable",
                "data": { "object": {
                    "id": "src_1",
                    "object": "source",
                    "status": "chargeable",
                    "metadata": {}
                }}
            })))
            .await
            .unwrap();

        assert!(!action.handled());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_succeeded_intent_handled_without_calls() {
        let store = Arc::new(MemoryIntentStore::new());
        let action = router(store.clone())
            .route(&event(&json!({
                "type": "payment_intent.succeeded",
                "data": { "object": {
                    "id": "pi_123",
                    "object": "payment_intent",
                    "status": "succeeded",
                    "amount": 1998,
                    "currency": "eur"
                }}
            })))
            .await
            .unwrap();

        assert_eq!(action, ReconcileAction::PaymentSucceeded { intent_id: "pi_123".into() });
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_known_subject_is_an_error() {
        let store = Arc::new(MemoryIntentStore::new());
        let err = router(store)
            .route(&event(&json!({
                "type": "payment_intent.succeeded",
                "data": { "object": { "object": "payment_intent", "status": "succeeded" } }
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::MalformedPayload(_)));
    }
}
