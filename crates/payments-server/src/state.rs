//! Application State

use std::sync::Arc;

use payments_engine::{
    IntentReconciler, IntentStore, PaymentIntentService, PaymentsConfig, PricingEngine,
    StaticCatalog, WebhookProcessor, WebhookRouter,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PaymentsConfig>,

    /// Product catalog served to the storefront and used for pricing
    pub catalog: Arc<StaticCatalog>,

    /// Intent operations (optional - None if Stripe is not configured)
    pub payments: Option<PaymentIntentService>,

    /// Webhook pipeline (optional - None without a secret or explicit opt-in)
    pub webhooks: Option<WebhookProcessor>,
}

impl AppState {
    pub fn new(
        config: PaymentsConfig,
        catalog: StaticCatalog,
        store: Option<Arc<dyn IntentStore>>,
    ) -> Self {
        let catalog = Arc::new(catalog);

        let payments = store.map(|store| {
            PaymentIntentService::new(
                store,
                PricingEngine::new(catalog.clone()),
                config.method_policy(),
            )
        });

        let webhooks = payments.as_ref().and_then(|service| {
            match config.webhook_authenticator() {
                Ok(authenticator) => Some(WebhookProcessor::new(
                    authenticator,
                    WebhookRouter::new(IntentReconciler::new(service.clone())),
                )),
                Err(e) => {
                    tracing::warn!("⚠ Webhooks disabled: {}", e);
                    None
                }
            }
        });

        Self {
            config: Arc::new(config),
            catalog,
            payments,
            webhooks,
        }
    }
}
