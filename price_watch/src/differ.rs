//! Snapshot diff
//!
//! Compares normalized prices, never display strings. Products that appear
//! or disappear between runs are not price changes.

use crate::model::{CatalogSnapshot, PriceChange, ProductRecord, NO_PRICE};

fn display(price: Option<&str>) -> String {
    price.unwrap_or(NO_PRICE).to_string()
}

fn change(previous: Option<&ProductRecord>, current: &ProductRecord) -> PriceChange {
    PriceChange {
        identity: current.identity.clone(),
        name: current.name.clone(),
        old_public: display(previous.and_then(|p| p.public_price.as_deref())),
        new_public: display(current.public_price.as_deref()),
        old_reseller: display(previous.and_then(|p| p.reseller_price.as_deref())),
        new_reseller: display(current.reseller_price.as_deref()),
    }
}

/// Price changes between two snapshots, in `current` discovery order.
///
/// An empty `previous` (first run) reports every current record with `-` as
/// the old prices.
pub fn diff(previous: &CatalogSnapshot, current: &CatalogSnapshot) -> Vec<PriceChange> {
    if previous.is_empty() {
        return current.iter().map(|record| change(None, record)).collect();
    }

    current
        .iter()
        .filter_map(|record| {
            let old = previous.get(&record.identity)?;
            let changed = old.public_value() != record.public_value()
                || old.reseller_value() != record.reseller_value();
            changed.then(|| change(Some(old), record))
        })
        .collect()
}

#[cfg(test)]
#[path = "differ_tests.rs"]
mod tests;
