//! Environment configuration

use std::fmt;

use crate::error::{PaymentError, Result};
use crate::methods::PaymentMethodPolicy;
use crate::webhook::{DEFAULT_TOLERANCE_SECS, WebhookAuthenticator};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4567";

#[derive(Clone)]
pub struct PaymentsConfig {
    /// `None` leaves the processor unconfigured
    pub stripe_secret_key: Option<String>,
    pub publishable_key: String,
    pub account_country: String,
    pub webhook_secret: Option<String>,
    /// Explicit opt-in to unsigned webhook deliveries
    pub allow_unsigned_webhooks: bool,
    pub webhook_tolerance_secs: i64,
    pub payment_methods: Vec<String>,
    pub currency_restricted_methods: Vec<String>,
    pub currency: String,
    pub country: String,
    pub bind_addr: String,
}

impl fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("stripe_secret_key", &self.stripe_secret_key.as_ref().map(|_| "<redacted>"))
            .field("publishable_key", &self.publishable_key)
            .field("account_country", &self.account_country)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("allow_unsigned_webhooks", &self.allow_unsigned_webhooks)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("payment_methods", &self.payment_methods)
            .field("currency_restricted_methods", &self.currency_restricted_methods)
            .field("currency", &self.currency)
            .field("country", &self.country)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl PaymentsConfig {
    /// Load from process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let webhook_tolerance_secs = match var("WEBHOOK_TOLERANCE_SECS") {
            Some(raw) => raw.parse::<i64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                PaymentError::Config(format!("WEBHOOK_TOLERANCE_SECS must be a positive integer, got {raw:?}"))
            })?,
            None => DEFAULT_TOLERANCE_SECS,
        };

        let allow_unsigned_webhooks = match var("WEBHOOK_ALLOW_UNSIGNED").as_deref() {
            None => false,
            Some(raw) => parse_flag(raw).ok_or_else(|| {
                PaymentError::Config(format!("WEBHOOK_ALLOW_UNSIGNED must be true or false, got {raw:?}"))
            })?,
        };

        let payment_methods = var("PAYMENT_METHODS")
            .map(|raw| PaymentMethodPolicy::parse_list(&raw))
            .filter(|methods| !methods.is_empty())
            .unwrap_or_else(|| vec!["card".into()]);

        // Set-but-blank means "restrict nothing"; unset keeps the default.
        let currency_restricted_methods = match lookup("CURRENCY_RESTRICTED_METHODS") {
            Some(raw) => PaymentMethodPolicy::parse_list(&raw),
            None => vec!["au_becs_debit".into()],
        };

        Ok(Self {
            stripe_secret_key: var("STRIPE_SECRET_KEY"),
            publishable_key: var("STRIPE_PUBLISHABLE_KEY").unwrap_or_default(),
            account_country: var("STRIPE_ACCOUNT_COUNTRY").unwrap_or_else(|| "US".into()),
            webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
            allow_unsigned_webhooks,
            webhook_tolerance_secs,
            payment_methods,
            currency_restricted_methods,
            currency: var("STORE_CURRENCY")
                .unwrap_or_else(|| "eur".into())
                .to_lowercase(),
            country: var("STORE_COUNTRY").unwrap_or_else(|| "US".into()),
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
        })
    }

    pub const fn payments_configured(&self) -> bool {
        self.stripe_secret_key.is_some()
    }

    pub fn method_policy(&self) -> PaymentMethodPolicy {
        PaymentMethodPolicy::new(
            self.payment_methods.clone(),
            self.currency_restricted_methods.iter().cloned(),
        )
    }

    /// Build the webhook authenticator.
    ///
    /// A configured secret always wins. Without one, unsigned deliveries are
    /// accepted only when `WEBHOOK_ALLOW_UNSIGNED` is set.
    pub fn webhook_authenticator(&self) -> Result<WebhookAuthenticator> {
        match (&self.webhook_secret, self.allow_unsigned_webhooks) {
            (Some(secret), allow_unsigned) => {
                if allow_unsigned {
                    tracing::warn!("WEBHOOK_ALLOW_UNSIGNED ignored: STRIPE_WEBHOOK_SECRET is set");
                }
                Ok(WebhookAuthenticator::verified(secret.clone())
                    .with_tolerance(self.webhook_tolerance_secs))
            }
            (None, true) => Ok(WebhookAuthenticator::permissive_unsafe()),
            (None, false) => Err(PaymentError::Config(
                "STRIPE_WEBHOOK_SECRET not set (set WEBHOOK_ALLOW_UNSIGNED=true to accept unsigned events)".into(),
            )),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
