//! Catalog Lookup
//!
//! Read-only reference data: SKU unit prices and shipping costs. The engine
//! only ever reads from it, so any product store can sit behind the trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::money::Amount;
use crate::pricing::PricingError;

/// Catalog client trait
///
/// Implement this for whatever holds the product catalog.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Unit price of a SKU
    async fn price_of(&self, reference: &str) -> Result<Amount, PricingError>;

    /// Cost of a shipping option
    async fn shipping_cost_of(&self, option_id: &str) -> Result<Amount, PricingError>;
}

/// List envelope in the processor's `{ "data": [...] }` shape
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing<T> {
    pub data: Vec<T>,
}

impl<T> Listing<T> {
    pub const fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

impl<T> From<Vec<T>> for Listing<T> {
    fn from(data: Vec<T>) -> Self {
        Self::new(data)
    }
}

/// A purchasable SKU
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    pub id: String,
    pub attributes: BTreeMap<String, String>,
    pub price: Amount,
    pub currency: String,
}

/// A product grouping one or more SKUs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub skus: Listing<Sku>,
}

/// A shipping tier offered at checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    pub id: String,
    pub label: String,
    pub detail: String,
    pub amount: Amount,
}

/// In-memory catalog with the storefront's demo products
#[derive(Clone, Debug)]
pub struct StaticCatalog {
    products: Vec<Product>,
    shipping: Vec<ShippingOption>,
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::storefront()
    }
}

impl StaticCatalog {
    pub const fn new(products: Vec<Product>, shipping: Vec<ShippingOption>) -> Self {
        Self { products, shipping }
    }

    /// The three demo products and two shipping tiers, priced in EUR
    pub fn storefront() -> Self {
        Self::storefront_in("eur")
    }

    /// The demo storefront with SKUs priced in `currency`
    pub fn storefront_in(currency: &str) -> Self {
        let currency = currency.to_lowercase();
        let sku = |id: &str, attrs: &[(&str, &str)], price: u64| Sku {
            id: id.into(),
            attributes: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            price: Amount::new(price),
            currency: currency.clone(),
        };

        Self::new(
            vec![
                Product {
                    id: "increment".into(),
                    name: "Increment Magazine".into(),
                    skus: Listing::new(vec![sku(
                        "increment-03",
                        &[("issue", "Issue #3 \"Development\"")],
                        399,
                    )]),
                },
                Product {
                    id: "shirt".into(),
                    name: "Stripe Shirt".into(),
                    skus: Listing::new(vec![sku(
                        "shirt-small-woman",
                        &[("size", "Small Standard"), ("gender", "Woman")],
                        999,
                    )]),
                },
                Product {
                    id: "pins".into(),
                    name: "Stripe Pins".into(),
                    skus: Listing::new(vec![sku("pins-collector", &[("set", "Collector Set")], 799)]),
                },
            ],
            vec![
                ShippingOption {
                    id: "free".into(),
                    label: "Free Shipping".into(),
                    detail: "Delivery within 5 days".into(),
                    amount: Amount::ZERO,
                },
                ShippingOption {
                    id: "express".into(),
                    label: "Express Shipping".into(),
                    detail: "Next day delivery".into(),
                    amount: Amount::new(500),
                },
            ],
        )
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn shipping_options(&self) -> &[ShippingOption] {
        &self.shipping
    }

    fn sku(&self, reference: &str) -> Option<&Sku> {
        self.products
            .iter()
            .flat_map(|p| p.skus.data.iter())
            .find(|s| s.id == reference)
    }
}

#[async_trait]
impl CatalogLookup for StaticCatalog {
    async fn price_of(&self, reference: &str) -> Result<Amount, PricingError> {
        self.sku(reference)
            .map(|s| s.price)
            .ok_or_else(|| PricingError::ReferenceNotFound(reference.to_string()))
    }

    async fn shipping_cost_of(&self, option_id: &str) -> Result<Amount, PricingError> {
        self.shipping
            .iter()
            .find(|o| o.id == option_id)
            .map(|o| o.amount)
            .ok_or_else(|| PricingError::UnknownShippingOption(option_id.to_string()))
    }
}
