//! Intent Store Implementations
//!
//! `StripeIntentStore` talks to the PaymentIntents API; `MemoryIntentStore`
//! stands in for it during development and tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use stripe::{Client, RequestStrategy};

use crate::error::{IntentOperation, ProviderError};
use crate::intent::{
    CreateIntent, IntentStatus, IntentStore, IntentUpdate, PaymentIntent, is_well_formed_id,
};

/// Stripe-backed intent store
#[derive(Clone)]
pub struct StripeIntentStore {
    client: Client,
}

#[derive(Serialize)]
struct ConfirmForm<'a> {
    source: &'a str,
}

#[derive(Serialize)]
struct CancelForm {}

impl StripeIntentStore {
    /// Create a new store with a secret API key
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }

    /// Get the underlying Stripe client
    pub const fn inner(&self) -> &Client {
        &self.client
    }
}

/// Ids are interpolated into request paths, so only provider-shaped ids pass.
fn intent_path(id: &str, action: Option<&str>) -> Result<String, ProviderError> {
    if !is_well_formed_id(id) {
        return Err(ProviderError::new(format!("Invalid payment intent id: {id:?}"))
            .with_code("invalid_intent_id")
            .with_status(400));
    }

    Ok(match action {
        Some(action) => format!("/payment_intents/{id}/{action}"),
        None => format!("/payment_intents/{id}"),
    })
}

/// Provider-side idempotency key for confirming `id` with `source_id`.
///
/// Two deliveries of the same chargeable source map to the same key, so a
/// confirm that slips past the status check is still applied once.
pub fn confirm_idempotency_key(id: &str, source_id: &str) -> String {
    format!("confirm-{id}-{source_id}")
}

#[async_trait]
impl IntentStore for StripeIntentStore {
    async fn create(&self, params: CreateIntent) -> Result<PaymentIntent, ProviderError> {
        self.client
            .post_form("/payment_intents", &params)
            .await
            .map_err(ProviderError::from)
    }

    async fn update(&self, id: &str, fields: IntentUpdate) -> Result<PaymentIntent, ProviderError> {
        let path = intent_path(id, None)?;
        self.client
            .post_form(&path, &fields)
            .await
            .map_err(ProviderError::from)
    }

    async fn retrieve(&self, id: &str) -> Result<PaymentIntent, ProviderError> {
        let path = intent_path(id, None)?;
        self.client.get(&path).await.map_err(ProviderError::from)
    }

    async fn confirm(&self, id: &str, source_id: &str) -> Result<PaymentIntent, ProviderError> {
        let path = intent_path(id, Some("confirm"))?;
        let client = self
            .client
            .clone()
            .with_strategy(RequestStrategy::Idempotent(confirm_idempotency_key(id, source_id)));

        client
            .post_form(&path, &ConfirmForm { source: source_id })
            .await
            .map_err(ProviderError::from)
    }

    async fn cancel(&self, id: &str) -> Result<PaymentIntent, ProviderError> {
        let path = intent_path(id, Some("cancel"))?;
        self.client
            .post_form(&path, &CancelForm {})
            .await
            .map_err(ProviderError::from)
    }
}

/// A call recorded by [`MemoryIntentStore`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Create { amount: u64, currency: String },
    Update { id: String, fields: IntentUpdate },
    Retrieve { id: String },
    Confirm { id: String, source_id: String },
    Cancel { id: String },
}

impl StoreCall {
    pub const fn operation(&self) -> IntentOperation {
        match self {
            Self::Create { .. } => IntentOperation::Create,
            Self::Update { .. } => IntentOperation::Update,
            Self::Retrieve { .. } => IntentOperation::Retrieve,
            Self::Confirm { .. } => IntentOperation::Confirm,
            Self::Cancel { .. } => IntentOperation::Cancel,
        }
    }
}

/// In-memory intent store (for development and tests)
///
/// Mirrors the processor's transitions closely enough to exercise the
/// engine: confirm only from `requires_payment_method`, cancel is a no-op on
/// an already canceled intent.
#[derive(Default)]
pub struct MemoryIntentStore {
    intents: RwLock<HashMap<String, PaymentIntent>>,
    calls: Mutex<Vec<StoreCall>>,
    failure: Mutex<Option<(Option<IntentOperation>, ProviderError)>>,
}

impl MemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite an intent
    pub fn insert(&self, intent: PaymentIntent) {
        self.intents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(intent.id.clone(), intent);
    }

    /// Force a status, as the processor would after an out-of-band change
    pub fn set_status(&self, id: &str, status: IntentStatus) {
        if let Some(intent) = self
            .intents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
        {
            intent.status = status;
        }
    }

    /// Current state without recording a call
    pub fn peek(&self, id: &str) -> Option<PaymentIntent> {
        self.intents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Make the next call fail with `err`
    pub fn fail_next(&self, err: ProviderError) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some((None, err));
    }

    /// Make the next `operation` call fail with `err`
    pub fn fail_next_on(&self, operation: IntentOperation, err: ProviderError) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some((Some(operation), err));
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn confirm_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::Confirm { .. }))
            .count()
    }

    pub fn cancel_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::Cancel { .. }))
            .count()
    }

    fn record(&self, call: StoreCall) -> Result<(), ProviderError> {
        let operation = call.operation();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);

        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        let armed = failure
            .as_ref()
            .is_some_and(|(target, _)| target.is_none_or(|t| t == operation));
        if armed {
            failure.take().map_or(Ok(()), |(_, err)| Err(err))
        } else {
            Ok(())
        }
    }

    fn with_intent<F>(&self, id: &str, f: F) -> Result<PaymentIntent, ProviderError>
    where
        F: FnOnce(&mut PaymentIntent) -> Result<(), ProviderError>,
    {
        let mut intents = self.intents.write().unwrap_or_else(PoisonError::into_inner);
        let intent = intents.get_mut(id).ok_or_else(|| {
            ProviderError::new(format!("No such payment_intent: '{id}'"))
                .with_code("resource_missing")
                .with_status(404)
        })?;
        f(intent)?;
        Ok(intent.clone())
    }
}

fn unexpected_state(intent: &PaymentIntent, action: &str) -> ProviderError {
    ProviderError::new(format!(
        "You cannot {action} this PaymentIntent because it has a status of {}.",
        intent.status
    ))
    .with_code("payment_intent_unexpected_state")
    .with_status(400)
}

#[async_trait]
impl IntentStore for MemoryIntentStore {
    async fn create(&self, params: CreateIntent) -> Result<PaymentIntent, ProviderError> {
        self.record(StoreCall::Create {
            amount: params.amount.minor_units(),
            currency: params.currency.clone(),
        })?;

        let mut intents = self.intents.write().unwrap_or_else(PoisonError::into_inner);
        let id = format!("pi_mem_{}", intents.len() + 1);
        let intent = PaymentIntent {
            id: id.clone(),
            status: IntentStatus::RequiresPaymentMethod,
            amount: params.amount,
            currency: params.currency,
            last_payment_error: None,
            payment_method_types: params.payment_method_types,
            client_secret: Some(format!("{id}_secret_memory")),
        };
        intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn update(&self, id: &str, fields: IntentUpdate) -> Result<PaymentIntent, ProviderError> {
        self.record(StoreCall::Update {
            id: id.to_string(),
            fields: fields.clone(),
        })?;

        self.with_intent(id, |intent| {
            if matches!(intent.status, IntentStatus::Succeeded | IntentStatus::Canceled) {
                return Err(unexpected_state(intent, "update"));
            }
            if let Some(amount) = fields.amount {
                intent.amount = amount;
            }
            if let Some(currency) = fields.currency {
                intent.currency = currency;
            }
            if let Some(methods) = fields.payment_method_types {
                intent.payment_method_types = methods;
            }
            Ok(())
        })
    }

    async fn retrieve(&self, id: &str) -> Result<PaymentIntent, ProviderError> {
        self.record(StoreCall::Retrieve { id: id.to_string() })?;
        self.with_intent(id, |_| Ok(()))
    }

    async fn confirm(&self, id: &str, source_id: &str) -> Result<PaymentIntent, ProviderError> {
        self.record(StoreCall::Confirm {
            id: id.to_string(),
            source_id: source_id.to_string(),
        })?;

        self.with_intent(id, |intent| {
            if !intent.status.awaits_payment_method() {
                return Err(unexpected_state(intent, "confirm"));
            }
            intent.status = IntentStatus::Succeeded;
            intent.last_payment_error = None;
            Ok(())
        })
    }

    async fn cancel(&self, id: &str) -> Result<PaymentIntent, ProviderError> {
        self.record(StoreCall::Cancel { id: id.to_string() })?;

        self.with_intent(id, |intent| {
            if intent.status == IntentStatus::Succeeded {
                return Err(unexpected_state(intent, "cancel"));
            }
            intent.status = IntentStatus::Canceled;
            Ok(())
        })
    }
}
