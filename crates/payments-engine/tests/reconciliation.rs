//! End-to-end cart and webhook scenarios against the in-memory store

use std::sync::Arc;

use payments_engine::webhook::sign_payload;
use payments_engine::{
    Amount, ErrorKind, IntentReconciler, IntentStatus, LineItem, MemoryIntentStore, PaymentError,
    PaymentIntent, PaymentIntentService, PaymentMethodPolicy, PricingEngine, ReconcileAction,
    ShippingSelection, StaticCatalog, WebhookAuthenticator, WebhookProcessor, WebhookRouter,
};
use serde_json::json;

const SECRET: &str = "whsec_integration";

struct Harness {
    store: Arc<MemoryIntentStore>,
    service: PaymentIntentService,
    processor: WebhookProcessor,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryIntentStore::new());
        let service = PaymentIntentService::new(
            store.clone(),
            PricingEngine::new(Arc::new(StaticCatalog::storefront())),
            PaymentMethodPolicy::default(),
        );
        let processor = WebhookProcessor::new(
            WebhookAuthenticator::verified(SECRET),
            WebhookRouter::new(IntentReconciler::new(service.clone())),
        );

        Self {
            store,
            service,
            processor,
        }
    }

    fn seed(&self, id: &str, status: IntentStatus) {
        self.store.insert(PaymentIntent {
            id: id.into(),
            status,
            amount: Amount::new(1998),
            currency: "eur".into(),
            last_payment_error: None,
            payment_method_types: vec!["card".into()],
            client_secret: None,
        });
    }

    async fn deliver(&self, event: &serde_json::Value) -> payments_engine::Result<ReconcileAction> {
        let payload = serde_json::to_vec(event).unwrap();
        let header = sign_payload(SECRET, chrono::Utc::now().timestamp(), &payload).unwrap();
        self.processor.process(&payload, Some(&header)).await
    }
}

fn chargeable_source(intent_id: &str) -> serde_json::Value {
    json!({
        "id": "evt_src",
        "type": "source.chargeable",
        "livemode": false,
        "data": { "object": {
            "id": "src_1",
            "object": "source",
            "status": "chargeable",
            "type": "ideal",
            "metadata": { "paymentIntent": intent_id }
        }}
    })
}

#[tokio::test]
async fn cart_without_shipping() {
    let h = Harness::new();
    let intent = h
        .service
        .create("eur", &[LineItem::new("shirt-small-woman", 2)])
        .await
        .unwrap();

    assert_eq!(intent.amount, Amount::new(1998));
}

#[tokio::test]
async fn cart_with_express_shipping() {
    let h = Harness::new();
    let items = [LineItem::new("shirt-small-woman", 2)];
    let intent = h.service.create("eur", &items).await.unwrap();

    let updated = h
        .service
        .update_shipping(&intent.id, &items, &ShippingSelection::new("express"))
        .await
        .unwrap();

    assert_eq!(updated.amount, Amount::new(2498));
}

#[tokio::test]
async fn chargeable_source_confirms_intent() {
    let h = Harness::new();
    h.seed("pi_123", IntentStatus::RequiresPaymentMethod);

    let action = h.deliver(&chargeable_source("pi_123")).await.unwrap();

    assert!(action.handled());
    assert_eq!(
        action,
        ReconcileAction::Confirmed {
            intent_id: "pi_123".into(),
            source_id: "src_1".into(),
        }
    );
    assert_eq!(h.store.confirm_calls(), 1);
}

#[tokio::test]
async fn chargeable_source_for_succeeded_intent_is_refused() {
    let h = Harness::new();
    h.seed("pi_123", IntentStatus::Succeeded);

    let err = h.deliver(&chargeable_source("pi_123")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(h.store.confirm_calls(), 0);
}

#[tokio::test]
async fn redelivered_chargeable_source_confirms_once() {
    let h = Harness::new();
    h.seed("pi_123", IntentStatus::RequiresPaymentMethod);

    h.deliver(&chargeable_source("pi_123")).await.unwrap();
    let err = h.deliver(&chargeable_source("pi_123")).await.unwrap_err();

    assert!(matches!(err, PaymentError::UnexpectedStatus { .. }));
    assert_eq!(h.store.confirm_calls(), 1);
}

#[tokio::test]
async fn payment_failed_is_observed_without_service_calls() {
    let h = Harness::new();

    for (field, object, expected_id) in [
        ("payment_method", "payment_method", "pm_1"),
        ("source", "source", "src_1"),
    ] {
        let action = h
            .deliver(&json!({
                "type": "payment_intent.payment_failed",
                "data": { "object": {
                    "id": "pi_123",
                    "object": "payment_intent",
                    "status": "requires_payment_method",
                    "amount": 1998,
                    "currency": "eur",
                    "last_payment_error": {
                        "message": "Your card was declined.",
                        field: { "id": expected_id, "object": object }
                    }
                }}
            }))
            .await
            .unwrap();

        let ReconcileAction::PaymentFailed {
            instrument, message, ..
        } = action
        else {
            panic!("expected a payment failure");
        };
        assert_eq!(message.as_deref(), Some("Your card was declined."));
        assert_eq!(instrument.map(|i| i.id().to_string()).as_deref(), Some(expected_id));
    }

    assert!(h.store.calls().is_empty());
}

#[tokio::test]
async fn failed_source_cancels_intent() {
    let h = Harness::new();
    h.seed("pi_123", IntentStatus::RequiresPaymentMethod);

    let action = h
        .deliver(&json!({
            "type": "source.failed",
            "data": { "object": {
                "id": "src_1",
                "object": "source",
                "status": "failed",
                "metadata": { "paymentIntent": "pi_123" }
            }}
        }))
        .await
        .unwrap();

    assert_eq!(action, ReconcileAction::Canceled { intent_id: "pi_123".into() });
    assert_eq!(h.store.peek("pi_123").unwrap().status, IntentStatus::Canceled);
}

#[tokio::test]
async fn unknown_subject_and_unlinked_source_are_not_handled() {
    let h = Harness::new();

    let unknown = h
        .deliver(&json!({
            "type": "charge.succeeded",
            "data": { "object": { "id": "ch_1", "object": "charge" } }
        }))
        .await
        .unwrap();
    let unlinked = h
        .deliver(&json!({
            "type": "source.chargeable",
            "data": { "object": { "id": "src_1", "object": "source", "status": "chargeable" } }
        }))
        .await
        .unwrap();

    assert!(!unknown.handled());
    assert!(!unlinked.handled());
    assert!(h.store.calls().is_empty());
}

#[tokio::test]
async fn forged_delivery_is_rejected_before_routing() {
    let h = Harness::new();
    h.seed("pi_123", IntentStatus::RequiresPaymentMethod);

    let payload = serde_json::to_vec(&chargeable_source("pi_123")).unwrap();
    let header = sign_payload("whsec_attacker", chrono::Utc::now().timestamp(), &payload).unwrap();

    let unsigned = h.processor.process(&payload, None).await.unwrap_err();
    let forged = h.processor.process(&payload, Some(&header)).await.unwrap_err();

    assert_eq!(unsigned.kind(), ErrorKind::Authentication);
    assert_eq!(forged.kind(), ErrorKind::Authentication);
    assert!(h.store.calls().is_empty());
}
