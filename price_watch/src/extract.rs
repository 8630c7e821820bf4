//! HTML extraction for catalog pages
//!
//! Every function takes raw HTML and returns owned data, so parsed documents
//! never live across an `.await` in the crawl phases.

use crate::model::StockStatus;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector is valid CSS")
}

static PAGINATION: LazyLock<Selector> =
    LazyLock::new(|| selector("ul.pagination select.form-control"));
static OPTION: LazyLock<Selector> = LazyLock::new(|| selector("option"));
static LISTING_ITEM: LazyLock<Selector> = LazyLock::new(|| selector(".product-list__item"));
static CARD_LINK: LazyLock<Selector> = LazyLock::new(|| selector("h3 a"));
static CARD_BRAND: LazyLock<Selector> = LazyLock::new(|| selector("small.brand"));
static CARD_PRICE: LazyLock<Selector> = LazyLock::new(|| selector(".price"));
static TECHNICAL_ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr[data-technical-info]"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static DETAIL_PRICE: LazyLock<Selector> = LazyLock::new(|| selector(".product-detail .price"));
static STOCK_BUTTON: LazyLock<Selector> =
    LazyLock::new(|| selector("button.add-to-cart, [data-stock-button]"));
static FORM: LazyLock<Selector> = LazyLock::new(|| selector("form"));
static PASSWORD_INPUT: LazyLock<Selector> = LazyLock::new(|| selector("input[name=_password]"));
static NAMED_INPUT: LazyLock<Selector> = LazyLock::new(|| selector("input[name]"));

const FLAVOR_LABEL: &str = "SABOR";
const PRESENTATION_LABEL: &str = "PRESENTACION";
const OUT_OF_STOCK_PHRASES: &[&str] = &["sin stock", "agotado", "out of stock"];

/// Fields read from one listing card; nothing is validated yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingCard {
    /// Absolute product URL
    pub href: Option<String>,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub price: Option<String>,
}

/// Attributes read from a product detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductDetail {
    pub presentation: Option<String>,
    pub flavor: Option<String>,
    pub reseller_price: Option<String>,
    pub in_stock: StockStatus,
}

/// Login form ready to be submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub action: Url,
    /// Every named input with its current value (hidden tokens included)
    pub fields: Vec<(String, String)>,
}

impl LoginForm {
    /// Set a field, appending it if the form did not declare it
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }
}

/// Trimmed text content with inner whitespace collapsed; `None` when empty
fn element_text(el: ElementRef<'_>) -> Option<String> {
    let text = el.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope.select(sel).next().and_then(element_text)
}

/// Number of listing pages, read from the pagination dropdown (1 if absent)
pub fn page_count(html: &str) -> usize {
    let doc = Html::parse_document(html);
    doc.select(&PAGINATION)
        .next()
        .map(|sel| sel.select(&OPTION).count())
        .unwrap_or(1)
        .max(1)
}

/// Extracts all listing cards on a page.
///
/// Returns `None` when the page has no listing items at all, which the crawl
/// treats like items that never rendered.
pub fn listing_cards(html: &str, page_url: &Url) -> Option<Vec<ListingCard>> {
    let doc = Html::parse_document(html);
    let cards: Vec<ListingCard> = doc
        .select(&LISTING_ITEM)
        .map(|item| {
            let link = item.select(&CARD_LINK).next();
            ListingCard {
                href: link
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| page_url.join(href.trim()).ok())
                    .map(|url| url.to_string()),
                name: link.and_then(element_text),
                brand: first_text(item, &CARD_BRAND),
                price: first_text(item, &CARD_PRICE),
            }
        })
        .collect();

    if cards.is_empty() {
        None
    } else {
        Some(cards)
    }
}

/// Extracts detail attributes; `None` if the page shows no product detail markup
pub fn product_detail(html: &str) -> Option<ProductDetail> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let technical_info = |label: &str| {
        doc.select(&TECHNICAL_ROW)
            .find(|row| {
                row.value()
                    .attr("data-technical-info")
                    .is_some_and(|v| v.trim().eq_ignore_ascii_case(label))
            })
            .and_then(|row| first_text(row, &CELL))
    };

    let has_rows = doc.select(&TECHNICAL_ROW).next().is_some();
    let button = doc.select(&STOCK_BUTTON).next();
    let reseller_price = first_text(root, &DETAIL_PRICE);

    if !has_rows && button.is_none() && reseller_price.is_none() {
        return None;
    }

    let in_stock = match button {
        None => StockStatus::Unknown,
        Some(button) => {
            let label = element_text(button).unwrap_or_default().to_lowercase();
            if OUT_OF_STOCK_PHRASES.iter().any(|p| label.contains(p)) {
                StockStatus::OutOfStock
            } else {
                StockStatus::InStock
            }
        }
    };

    Some(ProductDetail {
        presentation: technical_info(PRESENTATION_LABEL),
        flavor: technical_info(FLAVOR_LABEL),
        reseller_price,
        in_stock,
    })
}

/// Finds the form holding the `_password` field
pub fn login_form(html: &str, page_url: &Url) -> Option<LoginForm> {
    let doc = Html::parse_document(html);
    let form = doc
        .select(&FORM)
        .find(|form| form.select(&PASSWORD_INPUT).next().is_some())?;

    let action = form
        .value()
        .attr("action")
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .and_then(|a| page_url.join(a).ok())
        .unwrap_or_else(|| page_url.clone());

    let fields = form
        .select(&NAMED_INPUT)
        .filter(|input| {
            !matches!(
                input.value().attr("type"),
                Some("submit") | Some("button") | Some("image")
            )
        })
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    Some(LoginForm { action, fields })
}

/// True while the page still asks for a password
pub fn has_login_form(html: &str) -> bool {
    let doc = Html::parse_document(html);
    doc.select(&PASSWORD_INPUT).next().is_some()
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
