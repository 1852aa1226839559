//! # payments-engine
//!
//! Payment intent lifecycle and webhook reconciliation for the storefront.
//!
//! ## Cart flow
//!
//! ```text
//! ┌────────────┐     ┌──────────────────────┐     ┌─────────────┐
//! │   Cart     │────▶│ PaymentIntentService │────▶│ IntentStore │
//! │ (items +   │     │   └ PricingEngine    │     │  (Stripe)   │
//! │  shipping) │     │      └ CatalogLookup │     └─────────────┘
//! └────────────┘     └──────────────────────┘
//! ```
//!
//! Amounts are always computed server-side from the catalog. Client totals
//! are never accepted.
//!
//! ## Webhook flow
//!
//! ```text
//! ┌────────────┐   ┌───────────────┐   ┌────────┐   ┌────────────┐
//! │ POST body  │──▶│ Authenticator │──▶│ Router │──▶│ Reconciler │──▶ confirm / cancel
//! │ + signature│   │ (HMAC-SHA256) │   └────────┘   └────────────┘
//! └────────────┘   └───────────────┘
//! ```
//!
//! No local state is kept: the processor is the system of record. A
//! redelivered `source.chargeable` is caught by re-reading the intent
//! before confirming.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use payments_engine::{
//!     LineItem, PaymentIntentService, PaymentsConfig, PricingEngine, StaticCatalog,
//!     StripeIntentStore,
//! };
//!
//! let config = PaymentsConfig::from_env()?;
//! let service = PaymentIntentService::new(
//!     Arc::new(StripeIntentStore::new("sk_test_xxx")),
//!     PricingEngine::new(Arc::new(StaticCatalog::storefront())),
//!     config.method_policy(),
//! );
//!
//! let intent = service
//!     .create("eur", &[LineItem::new("shirt-small-woman", 2)])
//!     .await?;
//! ```

pub mod catalog;
pub mod config;
mod error;
pub mod intent;
pub mod methods;
mod money;
pub mod pricing;
pub mod service;
pub mod store;
pub mod webhook;

pub use catalog::{CatalogLookup, Listing, Product, ShippingOption, Sku, StaticCatalog};
pub use config::PaymentsConfig;
pub use error::{ErrorKind, IntentOperation, PaymentError, ProviderError, Result};
pub use intent::{
    IntentStatus, IntentStatusReport, IntentStore, IntentUpdate, LastPaymentError, PaymentIntent,
};
pub use methods::PaymentMethodPolicy;
pub use money::Amount;
pub use pricing::{LineItem, PricingEngine, PricingError, ShippingSelection};
pub use service::PaymentIntentService;
pub use store::{MemoryIntentStore, StripeIntentStore};
pub use webhook::{
    IntentReconciler, ReconcileAction, WebhookAuthenticator, WebhookEvent, WebhookProcessor,
    WebhookRouter,
};
