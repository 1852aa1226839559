//! Storefront payments HTTP server
//!
//! Axum-based server exposing the cart → payment intent flow and the Stripe
//! webhook endpoint.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payments_engine::{IntentStore, PaymentsConfig, StaticCatalog, StripeIntentStore};

use crate::handlers::{
    create_payment_intent, get_config, get_product, health_check, intent_status, list_products,
    list_skus, shipping_change, stripe_webhook, update_currency,
};
use crate::state::AppState;

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & storefront data
        .route("/health", get(health_check))
        .route("/config", get(get_config))
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/products/{id}/skus", get(list_skus))

        // Payment intents
        .route("/payment_intents", post(create_payment_intent))
        .route("/payment_intents/{id}/shipping_change", post(shipping_change))
        .route("/payment_intents/{id}/update_currency", post(update_currency))
        .route("/payment_intents/{id}/status", get(intent_status))

        // Stripe
        .route("/webhook", post(stripe_webhook))

        // Static storefront
        .fallback_service(ServeDir::new("public"))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment first so RUST_LOG may come from .env
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PaymentsConfig::from_env()?;

    let store: Option<Arc<dyn IntentStore>> = match config.stripe_secret_key.as_deref() {
        Some(key) => {
            tracing::info!("✓ Stripe configured");
            Some(Arc::new(StripeIntentStore::new(key)))
        }
        None => {
            tracing::warn!("⚠ Stripe not configured - payments disabled");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
            None
        }
    };

    tracing::info!(
        "Payment methods: {} (held back until currency is set: {})",
        config.payment_methods.join(", "),
        config.currency_restricted_methods.join(", ")
    );

    let addr = config.bind_addr.clone();
    let catalog = StaticCatalog::storefront_in(&config.currency);
    let state = AppState::new(config, catalog, store);
    if state.webhooks.as_ref().is_some_and(|w| w.authenticator().is_verified()) {
        tracing::info!("✓ Webhook signatures verified");
    }

    let app = app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 payments server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                                - Health check");
    tracing::info!("  GET  /config                                - Storefront configuration");
    tracing::info!("  GET  /products                              - Product catalog");
    tracing::info!("  GET  /products/:id/skus                     - Product SKUs");
    tracing::info!("  POST /payment_intents                       - Create payment intent");
    tracing::info!("  POST /payment_intents/:id/shipping_change   - Apply shipping option");
    tracing::info!("  POST /payment_intents/:id/update_currency   - Commit currency");
    tracing::info!("  GET  /payment_intents/:id/status            - Payment status");
    tracing::info!("  POST /webhook                               - Stripe webhook");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
