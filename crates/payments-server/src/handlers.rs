//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use payments_engine::{
    ErrorKind, IntentStatusReport, LineItem, Listing, PaymentError, PaymentIntent,
    PaymentIntentService, Product, ShippingOption, ShippingSelection, Sku, WebhookProcessor,
};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub webhooks_configured: bool,
    pub webhook_signatures_verified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub stripe_publishable_key: String,
    pub stripe_country: String,
    pub country: String,
    pub currency: String,
    pub payment_methods: Vec<String>,
    pub shipping_options: Vec<ShippingOption>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    #[serde(default)]
    pub currency: Option<String>,
    pub items: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
pub struct ShippingChangeRequest {
    pub items: Vec<LineItem>,
    #[serde(rename = "shippingOption")]
    pub shipping_option: ShippingSelection,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCurrencyRequest {
    pub currency: String,
    pub payment_methods: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct IntentResponse {
    #[serde(rename = "paymentIntent")]
    pub payment_intent: PaymentIntent,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(rename = "paymentIntent")]
    pub payment_intent: IntentStatusReport,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub handled: bool,
}

// ============================================================================
// Errors
// ============================================================================

pub enum ApiError {
    /// Engine error, mapped by its kind
    Payment(PaymentError),
    /// Webhook delivery refused because the intent already moved on
    Rejected(PaymentError),
    PaymentsDisabled,
    WebhooksDisabled,
    NotFound(String),
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self::Payment(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Payment(err) => {
                match err.kind() {
                    ErrorKind::Provider | ErrorKind::Config => tracing::error!("Payment error: {}", err),
                    _ => tracing::warn!("Payment request rejected: {}", err),
                }
                err.into_response()
            }
            Self::Rejected(err) => {
                tracing::warn!("Webhook refused: {}", err);
                error_response(StatusCode::FORBIDDEN, err.user_message(), err.code())
            }
            Self::PaymentsDisabled => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Payments not configured",
                "PAYMENTS_DISABLED",
            ),
            Self::WebhooksDisabled => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Webhooks not configured",
                "WEBHOOKS_DISABLED",
            ),
            Self::NotFound(what) => {
                error_response(StatusCode::NOT_FOUND, &format!("{what} not found"), "NOT_FOUND")
            }
        }
    }
}

fn error_response(status: StatusCode, message: &str, code: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.into(),
        }),
    )
        .into_response()
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn payments(state: &AppState) -> Result<&PaymentIntentService, ApiError> {
    state.payments.as_ref().ok_or(ApiError::PaymentsDisabled)
}

fn webhooks(state: &AppState) -> Result<&WebhookProcessor, ApiError> {
    state.webhooks.as_ref().ok_or(ApiError::WebhooksDisabled)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.payments.is_some(),
        webhooks_configured: state.webhooks.is_some(),
        webhook_signatures_verified: state
            .webhooks
            .as_ref()
            .is_some_and(|w| w.authenticator().is_verified()),
    })
}

/// Storefront configuration for the client
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = &state.config;
    Json(ConfigResponse {
        stripe_publishable_key: config.publishable_key.clone(),
        stripe_country: config.account_country.clone(),
        country: config.country.clone(),
        currency: config.currency.clone(),
        payment_methods: config.payment_methods.clone(),
        shipping_options: state.catalog.shipping_options().to_vec(),
    })
}

pub async fn list_products(State(state): State<AppState>) -> Json<Listing<Product>> {
    Json(Listing::new(state.catalog.products().to_vec()))
}

pub async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Product> {
    state
        .catalog
        .product(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Product {id}")))
}

pub async fn list_skus(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Listing<Sku>> {
    state
        .catalog
        .product(&id)
        .map(|product| Json(product.skus.clone()))
        .ok_or_else(|| ApiError::NotFound(format!("Product {id}")))
}

/// Create a payment intent for the cart
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(payload): Json<CreateIntentRequest>,
) -> ApiResult<IntentResponse> {
    let currency = payload
        .currency
        .map_or_else(|| state.config.currency.clone(), |c| c.to_lowercase());

    let payment_intent = payments(&state)?.create(&currency, &payload.items).await?;

    Ok(Json(IntentResponse { payment_intent }))
}

/// Re-price the cart with the selected shipping tier
pub async fn shipping_change(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ShippingChangeRequest>,
) -> ApiResult<IntentResponse> {
    let payment_intent = payments(&state)?
        .update_shipping(&id, &payload.items, &payload.shipping_option)
        .await?;

    Ok(Json(IntentResponse { payment_intent }))
}

/// Commit currency and payment methods chosen client-side
pub async fn update_currency(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCurrencyRequest>,
) -> ApiResult<IntentResponse> {
    let payment_intent = payments(&state)?
        .update_currency_and_methods(&id, &payload.currency.to_lowercase(), payload.payment_methods)
        .await?;

    Ok(Json(IntentResponse { payment_intent }))
}

pub async fn intent_status(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusResponse> {
    let payment_intent = payments(&state)?.retrieve_status(&id).await?;
    Ok(Json(StatusResponse { payment_intent }))
}

/// Stripe webhook handler
///
/// Ignored events are still acknowledged with 200 so Stripe stops
/// redelivering them.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<WebhookResponse> {
    let processor = webhooks(&state)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    match processor.process(&body, signature).await {
        Ok(action) => Ok(Json(WebhookResponse {
            handled: action.handled(),
        })),
        Err(e) if e.kind() == ErrorKind::Precondition => Err(ApiError::Rejected(e)),
        Err(e) => Err(e.into()),
    }
}
