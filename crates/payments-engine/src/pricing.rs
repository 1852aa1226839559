//! Cart Pricing
//!
//! Turns a cart into a chargeable amount. Prices always come from the
//! catalog; nothing monetary is read from the client.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogLookup;
use crate::money::Amount;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("Catalog reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("Invalid quantity {quantity} for {reference}")]
    InvalidQuantity { reference: String, quantity: i64 },

    #[error("Unknown shipping option: {0}")]
    UnknownShippingOption(String),

    #[error("Amount overflows the supported range")]
    AmountOverflow,
}

/// One cart entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// SKU id
    #[serde(alias = "parent")]
    pub reference: String,

    /// Signed so that bad client input surfaces as `InvalidQuantity`
    /// instead of a deserialization failure.
    pub quantity: i64,
}

impl LineItem {
    pub fn new(reference: impl Into<String>, quantity: i64) -> Self {
        Self {
            reference: reference.into(),
            quantity,
        }
    }
}

/// Chosen shipping tier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSelection {
    #[serde(rename = "id", alias = "option_id")]
    pub option_id: String,
}

impl ShippingSelection {
    pub fn new(option_id: impl Into<String>) -> Self {
        Self {
            option_id: option_id.into(),
        }
    }
}

/// Computes totals against a catalog
#[derive(Clone)]
pub struct PricingEngine {
    catalog: Arc<dyn CatalogLookup>,
}

impl PricingEngine {
    pub fn new(catalog: Arc<dyn CatalogLookup>) -> Self {
        Self { catalog }
    }

    /// Sum of unit price × quantity over all items, plus the shipping cost
    /// when a selection is present.
    pub async fn compute_amount(
        &self,
        items: &[LineItem],
        shipping: Option<&ShippingSelection>,
    ) -> Result<Amount, PricingError> {
        let mut total = Amount::ZERO;

        for item in items {
            let quantity = u64::try_from(item.quantity)
                .ok()
                .filter(|q| *q >= 1)
                .ok_or_else(|| PricingError::InvalidQuantity {
                    reference: item.reference.clone(),
                    quantity: item.quantity,
                })?;

            let unit = self.catalog.price_of(&item.reference).await?;
            let line = unit.checked_mul(quantity).ok_or(PricingError::AmountOverflow)?;
            total = total.checked_add(line).ok_or(PricingError::AmountOverflow)?;
        }

        if let Some(selection) = shipping {
            let cost = self.catalog.shipping_cost_of(&selection.option_id).await?;
            total = total.checked_add(cost).ok_or(PricingError::AmountOverflow)?;
        }

        Ok(total)
    }
}
