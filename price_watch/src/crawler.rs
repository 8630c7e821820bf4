//! Paginated catalog crawl
//!
//! Both the public and the reseller phase walk the same listing pages in
//! increasing page order. A page whose items never show up (failed fetch,
//! timeout, empty listing) is logged and skipped.

use crate::config::CrawlConfig;
use crate::error::{Result, WatchError};
use crate::extract::{listing_cards, page_count, ListingCard};
use crate::model::{CatalogSnapshot, ProductRecord};
use crate::session::CatalogSession;
use reqwest::Url;
use std::fmt;

/// Which view of the listing is being walked (for logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingPhase {
    Public,
    Reseller,
}

impl fmt::Display for ListingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingPhase::Public => write!(f, "public"),
            ListingPhase::Reseller => write!(f, "reseller"),
        }
    }
}

/// Cards collected from a listing traversal, page by page
#[derive(Debug, Default)]
pub struct ListingPages {
    pub pages: Vec<(usize, Vec<ListingCard>)>,
    pub skipped: Vec<usize>,
}

impl ListingPages {
    /// All cards in page order
    pub fn into_cards(self) -> impl Iterator<Item = ListingCard> {
        self.pages.into_iter().flat_map(|(_, cards)| cards)
    }
}

/// Result of the public crawl
#[derive(Debug)]
pub struct PublicCrawl {
    pub snapshot: CatalogSnapshot,
    pub total_pages: usize,
    pub skipped_pages: Vec<usize>,
}

/// URL of a listing page (`?page=N` appended to the base URL)
pub fn page_url(base: &Url, page: usize) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("page", &page.to_string());
    url
}

/// Case-insensitive substring match against the brand allow-list
pub fn matches_allow_list(brand: &str, allow_list: &[String]) -> bool {
    let brand = brand.to_lowercase();
    allow_list
        .iter()
        .any(|allowed| brand.contains(&allowed.to_lowercase()))
}

/// Turns a public card into a record; incomplete or off-list cards are dropped
pub fn card_to_record(card: ListingCard, allow_list: &[String]) -> Option<ProductRecord> {
    let (href, name, brand, price) = match card {
        ListingCard {
            href: Some(href),
            name: Some(name),
            brand: Some(brand),
            price: Some(price),
        } => (href, name, brand, price),
        _ => return None,
    };

    if !matches_allow_list(&brand, allow_list) {
        log::debug!("Skipping {} (brand '{}' not tracked)", name, brand);
        return None;
    }

    Some(ProductRecord::from_listing(&href, &name, &brand, &price))
}

/// Builds the public snapshot; later sightings of an identity overwrite earlier ones
pub fn build_public_snapshot<I>(cards: I, allow_list: &[String]) -> CatalogSnapshot
where
    I: IntoIterator<Item = ListingCard>,
{
    cards
        .into_iter()
        .filter_map(|card| card_to_record(card, allow_list))
        .collect()
}

async fn load_listing_page(
    session: &CatalogSession,
    url: &Url,
    page: usize,
) -> Result<Vec<ListingCard>> {
    let html = session
        .fetch_page(url)
        .await
        .map_err(|e| WatchError::PageExtractionTimeout {
            page,
            detail: e.to_string(),
        })?;

    listing_cards(&html, url).ok_or_else(|| WatchError::PageExtractionTimeout {
        page,
        detail: "no listing items".to_string(),
    })
}

/// Walks listing pages `1..=total_pages` in order, skipping pages without items
pub async fn traverse_listing(
    session: &CatalogSession,
    base_url: &Url,
    total_pages: usize,
    phase: ListingPhase,
) -> ListingPages {
    let mut result = ListingPages::default();

    for page in 1..=total_pages {
        log::info!("Page {}/{} [{}]", page, total_pages, phase);
        let url = page_url(base_url, page);

        match load_listing_page(session, &url, page).await {
            Ok(cards) => {
                log::info!("Found {} cards on page {} [{}]", cards.len(), page, phase);
                result.pages.push((page, cards));
            }
            Err(e) => {
                log::warn!("{} [{}], skipping", e, phase);
                result.skipped.push(page);
            }
        }
    }

    result
}

/// Public crawl: discover the page count, then collect allow-listed products.
///
/// Failing to load the first listing page is an error; individual pages after
/// that are skipped on failure.
pub async fn crawl_public(session: &CatalogSession, config: &CrawlConfig) -> Result<PublicCrawl> {
    log::info!("Starting public crawl of {}", config.base_url);

    let first = session.fetch_page(&config.base_url).await?;
    let total_pages = page_count(&first);
    log::info!("Detected {} listing page(s)", total_pages);

    let pages = traverse_listing(session, &config.base_url, total_pages, ListingPhase::Public).await;
    let skipped_pages = pages.skipped.clone();
    let snapshot = build_public_snapshot(pages.into_cards(), &config.brands);

    log::info!(
        "Public crawl finished: {} products ({} page(s) skipped)",
        snapshot.len(),
        skipped_pages.len()
    );

    Ok(PublicCrawl {
        snapshot,
        total_pages,
        skipped_pages,
    })
}

#[cfg(test)]
#[path = "crawler_tests.rs"]
mod tests;
