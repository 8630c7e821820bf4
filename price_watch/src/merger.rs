//! Reseller price merge
//!
//! The authenticated listing only enriches products already found publicly;
//! it never introduces new ones.

use crate::crawler::{traverse_listing, ListingPages, ListingPhase};
use crate::extract::ListingCard;
use crate::model::CatalogSnapshot;
use crate::session::AuthenticatedSession;
use reqwest::Url;

/// Identity and price read from an authenticated listing card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResellerPrice {
    pub identity: String,
    pub price: String,
}

impl ResellerPrice {
    fn from_card(card: ListingCard) -> Option<Self> {
        Some(Self {
            identity: card.href?,
            price: card.price?,
        })
    }
}

/// Reseller prices from a traversal, in page order
pub fn reseller_prices(pages: ListingPages) -> Vec<ResellerPrice> {
    pages.into_cards().filter_map(ResellerPrice::from_card).collect()
}

/// Overwrites `reseller_price` of known identities; unknown identities are ignored
pub fn merge_reseller_prices<I>(mut snapshot: CatalogSnapshot, prices: I) -> CatalogSnapshot
where
    I: IntoIterator<Item = ResellerPrice>,
{
    let mut merged = 0usize;
    let mut ignored = 0usize;

    for entry in prices {
        match snapshot.get_mut(&entry.identity) {
            Some(record) => {
                record.reseller_price = Some(entry.price);
                merged += 1;
            }
            None => ignored += 1,
        }
    }

    log::info!(
        "Merged {} reseller prices ({} not in public listing)",
        merged,
        ignored
    );
    snapshot
}

/// Drops records whose public price normalizes to zero
pub fn drop_unpriced(mut snapshot: CatalogSnapshot) -> CatalogSnapshot {
    let before = snapshot.len();
    snapshot.retain(|record| !record.public_value().is_zero());
    let dropped = before - snapshot.len();
    if dropped > 0 {
        log::info!("Dropped {} products without a public price", dropped);
    }
    snapshot
}

/// Authenticated re-crawl of the listing, merged into `snapshot`
pub async fn merge_reseller_phase(
    session: &AuthenticatedSession,
    base_url: &Url,
    total_pages: usize,
    snapshot: CatalogSnapshot,
) -> CatalogSnapshot {
    let pages = traverse_listing(session, base_url, total_pages, ListingPhase::Reseller).await;
    if !pages.skipped.is_empty() {
        log::warn!("Reseller pages skipped: {:?}", pages.skipped);
    }
    let merged = merge_reseller_prices(snapshot, reseller_prices(pages));
    drop_unpriced(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProductRecord;

    fn snapshot() -> CatalogSnapshot {
        let mut whey = ProductRecord::from_listing("/p1", "Whey 2lb", "Gold", "10.000");
        whey.flavor = Some("Chocolate".to_string());
        vec![
            whey,
            ProductRecord::from_listing("/p2", "Creatina", "Star", "5.000"),
        ]
        .into()
    }

    fn price(identity: &str, price: &str) -> ResellerPrice {
        ResellerPrice {
            identity: identity.to_string(),
            price: price.to_string(),
        }
    }

    #[test]
    fn unknown_identity_does_not_create_record() {
        let merged = merge_reseller_prices(snapshot(), vec![price("/p9", "1.000")]);
        assert_eq!(merged.len(), 2);
        assert!(!merged.contains("/p9"));
    }

    #[test]
    fn known_identity_only_changes_reseller_price() {
        let before = snapshot().get("/p1").unwrap().clone();
        let merged = merge_reseller_prices(snapshot(), vec![price("/p1", "8.000")]);

        let after = merged.get("/p1").unwrap();
        assert_eq!(after.reseller_price.as_deref(), Some("8.000"));
        assert_eq!(
            ProductRecord {
                reseller_price: None,
                ..after.clone()
            },
            before
        );
    }

    #[test]
    fn last_reseller_sighting_wins() {
        let merged = merge_reseller_prices(
            snapshot(),
            vec![price("/p2", "4.000"), price("/p2", "4.200")],
        );
        assert_eq!(merged.get("/p2").unwrap().reseller_price.as_deref(), Some("4.200"));
    }

    #[test]
    fn zero_public_price_is_dropped() {
        let mut snap = snapshot();
        snap.insert(ProductRecord::from_listing("/p3", "Gel", "Ena", "$ 0"));
        snap.insert(ProductRecord::from_listing("/p4", "Barra", "Ena", "Consultar"));

        let kept = drop_unpriced(snap);
        let ids: Vec<&str> = kept.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(ids, vec!["/p1", "/p2"]);
    }

    #[test]
    fn cards_without_link_or_price_are_ignored() {
        let pages = ListingPages {
            pages: vec![(
                1,
                vec![
                    ListingCard {
                        href: Some("/p1".to_string()),
                        price: Some("7.000".to_string()),
                        ..ListingCard::default()
                    },
                    ListingCard {
                        href: Some("/p2".to_string()),
                        ..ListingCard::default()
                    },
                ],
            )],
            skipped: vec![],
        };
        assert_eq!(reseller_prices(pages), vec![price("/p1", "7.000")]);
    }
}
