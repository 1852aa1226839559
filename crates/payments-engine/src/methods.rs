//! Payment method policy

use std::collections::BTreeSet;

/// Globally configured payment methods plus the subset that is only valid
/// once a specific currency has been committed (e.g. `au_becs_debit` for aud).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentMethodPolicy {
    methods: Vec<String>,
    currency_restricted: BTreeSet<String>,
}

impl Default for PaymentMethodPolicy {
    fn default() -> Self {
        Self::new(vec!["card".into()], ["au_becs_debit".to_string()])
    }
}

impl PaymentMethodPolicy {
    pub fn new(methods: Vec<String>, currency_restricted: impl IntoIterator<Item = String>) -> Self {
        Self {
            methods,
            currency_restricted: currency_restricted.into_iter().collect(),
        }
    }

    /// Parse a comma-separated list, tolerating surrounding whitespace
    pub fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub const fn currency_restricted(&self) -> &BTreeSet<String> {
        &self.currency_restricted
    }

    /// Methods offered when an intent is first created
    pub fn creation_methods(&self) -> Vec<String> {
        allowed_methods(&self.methods, &self.currency_restricted)
    }
}

/// `methods` minus `excluded`, order preserved. Never touches the input.
pub fn allowed_methods(methods: &[String], excluded: &BTreeSet<String>) -> Vec<String> {
    methods
        .iter()
        .filter(|m| !excluded.contains(m.as_str()))
        .cloned()
        .collect()
}
