//! Product records, catalog snapshots and price changes

use crate::price::{normalize_opt, Price};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Display placeholder for "no value" in a price change
pub const NO_PRICE: &str = "-";

/// Stock state read from the detail page's action button
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    #[default]
    Unknown,
}

impl StockStatus {
    pub fn label(self) -> &'static str {
        match self {
            StockStatus::InStock => "In stock",
            StockStatus::OutOfStock => "Out of stock",
            StockStatus::Unknown => NO_PRICE,
        }
    }
}

impl From<Option<bool>> for StockStatus {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => StockStatus::InStock,
            Some(false) => StockStatus::OutOfStock,
            None => StockStatus::Unknown,
        }
    }
}

impl From<StockStatus> for Option<bool> {
    fn from(value: StockStatus) -> Self {
        match value {
            StockStatus::InStock => Some(true),
            StockStatus::OutOfStock => Some(false),
            StockStatus::Unknown => None,
        }
    }
}

/// One observed product, keyed by its canonical URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    #[serde(rename = "href")]
    pub identity: String,
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub public_price: Option<String>,
    #[serde(default)]
    pub reseller_price: Option<String>,
    #[serde(default)]
    pub presentation: Option<String>,
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub in_stock: StockStatus,
    /// Set when detail enrichment failed; the record is still reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProductRecord {
    /// Record as seen on a public listing card
    pub fn from_listing(identity: &str, name: &str, brand: &str, public_price: &str) -> Self {
        Self {
            identity: identity.to_string(),
            name: name.to_string(),
            brand: brand.to_string(),
            public_price: Some(public_price.to_string()),
            reseller_price: None,
            presentation: None,
            flavor: None,
            in_stock: StockStatus::Unknown,
            error: None,
        }
    }

    pub fn public_value(&self) -> Price {
        normalize_opt(self.public_price.as_deref())
    }

    pub fn reseller_value(&self) -> Price {
        normalize_opt(self.reseller_price.as_deref())
    }
}

/// Identity-keyed set of records from one run, in discovery order.
///
/// Inserting an identity that is already present replaces the record in place,
/// so the first sighting decides the position and the last one the content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ProductRecord>", into = "Vec<ProductRecord>")]
pub struct CatalogSnapshot {
    records: Vec<ProductRecord>,
    index: HashMap<String, usize>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a record, returning the replaced one
    pub fn insert(&mut self, record: ProductRecord) -> Option<ProductRecord> {
        match self.index.get(&record.identity) {
            Some(&pos) => Some(std::mem::replace(&mut self.records[pos], record)),
            None => {
                self.index.insert(record.identity.clone(), self.records.len());
                self.records.push(record);
                None
            }
        }
    }

    pub fn get(&self, identity: &str) -> Option<&ProductRecord> {
        self.index.get(identity).map(|&pos| &self.records[pos])
    }

    pub fn get_mut(&mut self, identity: &str) -> Option<&mut ProductRecord> {
        match self.index.get(identity) {
            Some(&pos) => Some(&mut self.records[pos]),
            None => None,
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.index.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &ProductRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ProductRecord> {
        self.records.iter_mut()
    }

    /// Keep only records matching the predicate, preserving order
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&ProductRecord) -> bool,
    {
        self.records.retain(keep);
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(pos, r)| (r.identity.clone(), pos))
            .collect();
    }

    pub fn into_records(self) -> Vec<ProductRecord> {
        self.records
    }
}

impl FromIterator<ProductRecord> for CatalogSnapshot {
    fn from_iter<I: IntoIterator<Item = ProductRecord>>(iter: I) -> Self {
        let mut snapshot = CatalogSnapshot::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}

impl From<Vec<ProductRecord>> for CatalogSnapshot {
    fn from(records: Vec<ProductRecord>) -> Self {
        records.into_iter().collect()
    }
}

impl From<CatalogSnapshot> for Vec<ProductRecord> {
    fn from(snapshot: CatalogSnapshot) -> Self {
        snapshot.into_records()
    }
}

/// A detected price change, consumed by notifiers and never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub identity: String,
    pub name: String,
    pub old_public: String,
    pub new_public: String,
    pub old_reseller: String,
    pub new_reseller: String,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
