//! Payment Intent Service
//!
//! Cart → intent creation and every later mutation of that intent. Each
//! operation makes at most one state-changing call to the processor and
//! never retries it.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{IntentOperation, PaymentError, Result};
use crate::intent::{
    CreateIntent, IntentStatusReport, IntentStore, IntentUpdate, PaymentIntent, is_well_formed_id,
};
use crate::methods::{PaymentMethodPolicy, allowed_methods};
use crate::pricing::{LineItem, PricingEngine, ShippingSelection};

#[derive(Clone)]
pub struct PaymentIntentService {
    store: Arc<dyn IntentStore>,
    pricing: PricingEngine,
    methods: PaymentMethodPolicy,
}

impl PaymentIntentService {
    pub fn new(store: Arc<dyn IntentStore>, pricing: PricingEngine, methods: PaymentMethodPolicy) -> Self {
        Self {
            store,
            pricing,
            methods,
        }
    }

    pub const fn methods(&self) -> &PaymentMethodPolicy {
        &self.methods
    }

    /// Create an intent for the cart, offering every configured method
    /// except the currency-restricted ones.
    pub async fn create(&self, currency: &str, items: &[LineItem]) -> Result<PaymentIntent> {
        self.create_excluding(currency, items, self.methods.currency_restricted())
            .await
    }

    /// Create an intent for the cart with an explicit exclusion set
    pub async fn create_excluding(
        &self,
        currency: &str,
        items: &[LineItem],
        excluded: &BTreeSet<String>,
    ) -> Result<PaymentIntent> {
        let amount = self.pricing.compute_amount(items, None).await?;
        let payment_method_types = allowed_methods(self.methods.methods(), excluded);

        let intent = self
            .store
            .create(CreateIntent {
                amount,
                currency: currency.to_string(),
                payment_method_types,
            })
            .await
            .map_err(|e| PaymentError::provider(IntentOperation::Create, e))?;

        tracing::info!(
            intent_id = %intent.id,
            amount = %amount,
            currency = %currency,
            "Created payment intent"
        );

        Ok(intent)
    }

    /// Re-price the cart with the chosen shipping tier and update the amount
    pub async fn update_shipping(
        &self,
        intent_id: &str,
        items: &[LineItem],
        shipping: &ShippingSelection,
    ) -> Result<PaymentIntent> {
        check_intent_id(intent_id)?;
        let amount = self.pricing.compute_amount(items, Some(shipping)).await?;

        let intent = self
            .store
            .update(intent_id, IntentUpdate::amount(amount))
            .await
            .map_err(|e| PaymentError::provider(IntentOperation::Update, e))?;

        tracing::info!(
            intent_id = %intent_id,
            amount = %amount,
            shipping = %shipping.option_id,
            "Updated payment intent amount for shipping"
        );

        Ok(intent)
    }

    /// Commit a currency and the client's method list.
    ///
    /// The processor validates method/currency applicability. The amount is
    /// deliberately not touched here.
    pub async fn update_currency_and_methods(
        &self,
        intent_id: &str,
        currency: &str,
        payment_methods: Vec<String>,
    ) -> Result<PaymentIntent> {
        check_intent_id(intent_id)?;
        tracing::debug!(
            intent_id = %intent_id,
            currency = %currency,
            methods = ?payment_methods,
            "Updating payment intent currency"
        );

        self.store
            .update(intent_id, IntentUpdate::currency_and_methods(currency, payment_methods))
            .await
            .map_err(|e| PaymentError::provider(IntentOperation::Update, e))
    }

    pub async fn retrieve_status(&self, intent_id: &str) -> Result<IntentStatusReport> {
        let intent = self.retrieve(intent_id).await?;

        Ok(IntentStatusReport {
            status: intent.status,
            last_error_message: intent.last_payment_error.and_then(|e| e.message),
        })
    }

    /// Confirm the intent with a chargeable source.
    ///
    /// Reads the intent fresh and refuses unless it still awaits a payment
    /// method, so a redelivered webhook cannot confirm twice.
    pub async fn confirm(&self, intent_id: &str, source_id: &str) -> Result<PaymentIntent> {
        check_intent_id(intent_id)?;
        let current = self.retrieve(intent_id).await?;

        if !current.status.awaits_payment_method() {
            tracing::warn!(
                intent_id = %intent_id,
                source_id = %source_id,
                status = %current.status,
                "Refusing to confirm payment intent"
            );
            return Err(PaymentError::UnexpectedStatus {
                intent_id: intent_id.to_string(),
                status: current.status,
            });
        }

        let intent = self
            .store
            .confirm(intent_id, source_id)
            .await
            .map_err(|e| PaymentError::provider(IntentOperation::Confirm, e))?;

        tracing::info!(
            intent_id = %intent_id,
            source_id = %source_id,
            status = %intent.status,
            "Confirmed payment intent"
        );

        Ok(intent)
    }

    /// Cancel unconditionally; terminal intents are the processor's call.
    pub async fn cancel(&self, intent_id: &str) -> Result<PaymentIntent> {
        check_intent_id(intent_id)?;
        let intent = self
            .store
            .cancel(intent_id)
            .await
            .map_err(|e| PaymentError::provider(IntentOperation::Cancel, e))?;

        tracing::info!(intent_id = %intent_id, "Canceled payment intent");

        Ok(intent)
    }

    async fn retrieve(&self, intent_id: &str) -> Result<PaymentIntent> {
        check_intent_id(intent_id)?;
        self.store
            .retrieve(intent_id)
            .await
            .map_err(|e| PaymentError::provider(IntentOperation::Retrieve, e))
    }
}

/// Reject ids that came from a client and could never name an intent.
fn check_intent_id(intent_id: &str) -> Result<()> {
    if is_well_formed_id(intent_id) {
        Ok(())
    } else {
        Err(PaymentError::InvalidIntentId(intent_id.to_string()))
    }
}
