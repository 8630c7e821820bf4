//! Per-product detail enrichment
//!
//! Visits each product page for presentation, flavor, stock and the reseller
//! price. A failing product gets its `error` set and the batch moves on.

use crate::error::{Result, WatchError};
use crate::extract::{product_detail, ProductDetail};
use crate::model::{CatalogSnapshot, ProductRecord};
use crate::session::AuthenticatedSession;
use reqwest::Url;

/// Copies detail attributes onto a record; a detail-page price replaces the listing one
pub fn apply_detail(record: &mut ProductRecord, detail: ProductDetail) {
    record.presentation = detail.presentation;
    record.flavor = detail.flavor;
    record.in_stock = detail.in_stock;
    if let Some(price) = detail.reseller_price {
        record.reseller_price = Some(price);
    }
    record.error = None;
}

async fn fetch_detail(session: &AuthenticatedSession, identity: &str) -> Result<ProductDetail> {
    let url = Url::parse(identity)
        .map_err(|e| WatchError::ItemDetail(format!("invalid product URL: {}", e)))?;
    let html = session
        .fetch_page(&url)
        .await
        .map_err(|e| WatchError::ItemDetail(e.to_string()))?;
    product_detail(&html)
        .ok_or_else(|| WatchError::ItemDetail("product detail not found on page".to_string()))
}

/// Enriches every record in discovery order
pub async fn enrich(session: &AuthenticatedSession, mut snapshot: CatalogSnapshot) -> CatalogSnapshot {
    log::info!("Fetching details for {} products...", snapshot.len());
    let mut failed = 0usize;

    for record in snapshot.iter_mut() {
        match fetch_detail(session, &record.identity).await {
            Ok(detail) => apply_detail(record, detail),
            Err(e) => {
                log::warn!("Could not read details of {}: {}", record.name, e);
                record.error = Some(e.to_string());
                failed += 1;
            }
        }
    }

    log::info!(
        "Detail enrichment finished: {} ok, {} failed",
        snapshot.len() - failed,
        failed
    );
    snapshot
}

#[cfg(test)]
#[path = "enricher_tests.rs"]
mod tests;
