//! Price Watch - catalog price tracking
//!
//! Crawls a paginated product catalog (public and reseller views), detects
//! price changes against the last reported run, and hands the result to
//! report renderers and notification channels.

pub mod config;
pub mod crawler;
pub mod differ;
pub mod enricher;
pub mod error;
pub mod extract;
pub mod merger;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod price;
pub mod report;
pub mod session;
pub mod store;
pub mod web;

pub use config::{CrawlConfig, Credentials, EmailConfig, TelegramConfig, WatchConfig};
pub use differ::diff;
pub use error::{Result, WatchError};
pub use model::{CatalogSnapshot, PriceChange, ProductRecord, StockStatus};
pub use pipeline::{JobReport, Pipeline, RunState};
pub use price::{normalize, Price};
pub use store::SnapshotStore;
