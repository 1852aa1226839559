//! Intent reconciliation
//!
//! Maps authenticated events onto [`PaymentIntentService`] calls. There is
//! no local event log: duplicate deliveries are caught by the service's
//! fresh-read precondition on confirm, and cancel is left to the processor.

use crate::error::Result;
use crate::intent::{FailedInstrument, PaymentIntentSnapshot};
use crate::service::PaymentIntentService;
use crate::webhook::event::{EventType, SourceSnapshot, SourceStatus};

/// Outcome of reconciling one event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Not relevant to this integration
    Ignored,
    PaymentSucceeded {
        intent_id: String,
    },
    /// Observed only; the intent is left untouched
    PaymentFailed {
        intent_id: String,
        instrument: Option<FailedInstrument>,
        message: Option<String>,
    },
    Confirmed {
        intent_id: String,
        source_id: String,
    },
    Canceled {
        intent_id: String,
    },
}

impl ReconcileAction {
    pub const fn handled(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

#[derive(Clone)]
pub struct IntentReconciler {
    service: PaymentIntentService,
}

impl IntentReconciler {
    pub const fn new(service: PaymentIntentService) -> Self {
        Self { service }
    }

    /// `payment_intent.*` events never mutate the intent
    #[allow(clippy::unused_async)]
    pub async fn on_payment_intent(
        &self,
        event_type: &EventType,
        intent: &PaymentIntentSnapshot,
    ) -> Result<ReconcileAction> {
        match event_type {
            EventType::PaymentIntentSucceeded => {
                tracing::info!(
                    intent_id = %intent.id,
                    amount = %intent.amount,
                    currency = %intent.currency,
                    "Payment succeeded"
                );
                Ok(ReconcileAction::PaymentSucceeded {
                    intent_id: intent.id.clone(),
                })
            }
            EventType::PaymentIntentPaymentFailed => {
                let error = intent.last_payment_error.as_ref();
                let instrument = error.and_then(|e| e.instrument());
                let message = error.and_then(|e| e.message.clone());

                tracing::warn!(
                    intent_id = %intent.id,
                    instrument = ?instrument,
                    message = message.as_deref().unwrap_or("unknown"),
                    "Payment failed"
                );
                Ok(ReconcileAction::PaymentFailed {
                    intent_id: intent.id.clone(),
                    instrument,
                    message,
                })
            }
            other => {
                tracing::debug!(
                    intent_id = %intent.id,
                    event_type = %other.as_str(),
                    "Ignoring payment intent event"
                );
                Ok(ReconcileAction::Ignored)
            }
        }
    }

    /// Legacy source lifecycle: chargeable confirms, failed/canceled cancels
    pub async fn on_source(&self, source: &SourceSnapshot) -> Result<ReconcileAction> {
        let Some(intent_id) = source.payment_intent() else {
            tracing::debug!(source_id = %source.id, "Source has no payment intent reference");
            return Ok(ReconcileAction::Ignored);
        };

        match source.status {
            SourceStatus::Chargeable => {
                self.service.confirm(intent_id, &source.id).await?;
                Ok(ReconcileAction::Confirmed {
                    intent_id: intent_id.to_string(),
                    source_id: source.id.clone(),
                })
            }
            SourceStatus::Failed | SourceStatus::Canceled => {
                tracing::info!(
                    intent_id = %intent_id,
                    source_id = %source.id,
                    source_status = ?source.status,
                    "Source unusable, canceling payment intent"
                );
                self.service.cancel(intent_id).await?;
                Ok(ReconcileAction::Canceled {
                    intent_id: intent_id.to_string(),
                })
            }
            SourceStatus::Pending | SourceStatus::Consumed | SourceStatus::Other => {
                tracing::debug!(
                    intent_id = %intent_id,
                    source_id = %source.id,
                    source_status = ?source.status,
                    "Ignoring source status"
                );
                Ok(ReconcileAction::Ignored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::error::{ErrorKind, PaymentError};
    use crate::intent::{IntentStatus, LastPaymentError, ObjectRef, PaymentIntent};
    use crate::methods::PaymentMethodPolicy;
    use crate::money::Amount;
    use crate::pricing::PricingEngine;
    use crate::store::MemoryIntentStore;

    fn reconciler(store: Arc<MemoryIntentStore>) -> IntentReconciler {
        IntentReconciler::new(PaymentIntentService::new(
            store,
            PricingEngine::new(Arc::new(StaticCatalog::storefront())),
            PaymentMethodPolicy::default(),
        ))
    }

    fn intent(id: &str, status: IntentStatus) -> PaymentIntent {
        PaymentIntent {
            id: id.into(),
            status,
            amount: Amount::new(1998),
            currency: "eur".into(),
            last_payment_error: None,
            payment_method_types: vec!["card".into()],
            client_secret: None,
        }
    }

    fn source(status: SourceStatus, intent_id: Option<&str>) -> SourceSnapshot {
        SourceSnapshot {
            id: "src_1".into(),
            status,
            metadata: intent_id
                .map(|id| HashMap::from([(SourceSnapshot::INTENT_KEY.to_string(), id.to_string())]))
                .unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn test_chargeable_source_confirms() {
        let store = Arc::new(MemoryIntentStore::new());
        store.insert(intent("pi_123", IntentStatus::RequiresPaymentMethod));

        let action = reconciler(store.clone())
            .on_source(&source(SourceStatus::Chargeable, Some("pi_123")))
            .await
            .unwrap();

        assert!(action.handled());
        assert_eq!(store.confirm_calls(), 1);
        assert_eq!(store.peek("pi_123").unwrap().status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_duplicate_chargeable_fails_safely() {
        let store = Arc::new(MemoryIntentStore::new());
        store.insert(intent("pi_123", IntentStatus::RequiresPaymentMethod));
        let reconciler = reconciler(store.clone());
        let event = source(SourceStatus::Chargeable, Some("pi_123"));

        reconciler.on_source(&event).await.unwrap();
        let err = reconciler.on_source(&event).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(store.confirm_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_and_canceled_sources_cancel() {
        for status in [SourceStatus::Failed, SourceStatus::Canceled] {
            let store = Arc::new(MemoryIntentStore::new());
            store.insert(intent("pi_123", IntentStatus::RequiresPaymentMethod));

            let action = reconciler(store.clone())
                .on_source(&source(status, Some("pi_123")))
                .await
                .unwrap();

            assert_eq!(action, ReconcileAction::Canceled { intent_id: "pi_123".into() });
            assert_eq!(store.cancel_calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_unlinked_or_pending_source_is_ignored() {
        let store = Arc::new(MemoryIntentStore::new());
        let reconciler = reconciler(store.clone());

        let unlinked = reconciler
            .on_source(&source(SourceStatus::Chargeable, None))
            .await
            .unwrap();
        let pending = reconciler
            .on_source(&source(SourceStatus::Pending, Some("pi_123")))
            .await
            .unwrap();

        assert!(!unlinked.handled());
        assert!(!pending.handled());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_payment_failed_reads_error_without_mutating() {
        let store = Arc::new(MemoryIntentStore::new());
        let mut failed = intent("pi_123", IntentStatus::RequiresPaymentMethod);
        failed.last_payment_error = Some(LastPaymentError {
            message: Some("Your card was declined.".into()),
            source: Some(ObjectRef {
                id: "src_9".into(),
                object: Some("source".into()),
            }),
            ..LastPaymentError::default()
        });

        let action = reconciler(store.clone())
            .on_payment_intent(&EventType::PaymentIntentPaymentFailed, &failed)
            .await
            .unwrap();

        assert_eq!(
            action,
            ReconcileAction::PaymentFailed {
                intent_id: "pi_123".into(),
                instrument: Some(FailedInstrument::Source("src_9".into())),
                message: Some("Your card was declined.".into()),
            }
        );
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_other_intent_events_are_ignored() {
        let store = Arc::new(MemoryIntentStore::new());
        let action = reconciler(store)
            .on_payment_intent(
                &EventType::Other("payment_intent.created".into()),
                &intent("pi_123", IntentStatus::RequiresPaymentMethod),
            )
            .await
            .unwrap();

        assert_eq!(action, ReconcileAction::Ignored);
    }

    #[tokio::test]
    async fn test_cancel_failure_is_wrapped() {
        let store = Arc::new(MemoryIntentStore::new());
        let err = reconciler(store)
            .on_source(&source(SourceStatus::Failed, Some("pi_missing")))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Provider { .. }));
        assert_eq!(err.code(), "PROVIDER_CANCEL_FAILED");
    }
}
