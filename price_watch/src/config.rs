//! Runtime configuration
//!
//! `main` builds these from CLI flags / environment variables; tests build
//! them directly.

use crate::error::{Result, WatchError};
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Brands tracked when no allow-list is configured
pub const DEFAULT_BRANDS: &[&str] = &[
    "Star",
    "Ena",
    "Gentech",
    "Gold",
    "Mervick",
    "Max force",
    "Granger",
];

const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = "price_watch/0.1";

/// Where and how to crawl the catalog
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub base_url: Url,
    pub login_url: Url,
    /// Brand substrings, matched case-insensitively against card brand text
    pub brands: Vec<String>,
    pub page_timeout: Duration,
    pub login_timeout: Duration,
    pub user_agent: String,
}

impl CrawlConfig {
    pub fn new(base_url: &str, login_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_url("base URL", base_url)?,
            login_url: parse_url("login URL", login_url)?,
            brands: DEFAULT_BRANDS.iter().map(|b| b.to_string()).collect(),
            page_timeout: DEFAULT_PAGE_TIMEOUT,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
        })
    }

    pub fn with_brands(mut self, brands: Vec<String>) -> Self {
        if !brands.is_empty() {
            self.brands = brands;
        }
        self
    }
}

/// Reseller login
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Result<Self> {
        if username.is_empty() || password.is_empty() {
            return Err(WatchError::Config(
                "reseller username and password are required".to_string(),
            ));
        }
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Telegram bot channel settings
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_ids: Vec<String>,
    pub api_base: String,
}

impl TelegramConfig {
    /// Returns `None` unless both a token and at least one chat id are set
    pub fn from_parts(token: Option<String>, chat_ids: &[String]) -> Option<Self> {
        let token = token.filter(|t| !t.is_empty())?;
        if chat_ids.is_empty() {
            return None;
        }
        Some(Self {
            token,
            chat_ids: chat_ids.to_vec(),
            api_base: "https://api.telegram.org".to_string(),
        })
    }
}

/// SMTP channel settings
#[derive(Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
}

impl EmailConfig {
    /// Returns `None` unless a host, a sender and at least one recipient are set
    pub fn from_parts(
        host: Option<String>,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        from: Option<String>,
        to: &[String],
    ) -> Option<Self> {
        let host = host.filter(|h| !h.is_empty())?;
        let from = from.filter(|f| !f.is_empty())?;
        if to.is_empty() {
            return None;
        }
        Some(Self {
            host,
            port,
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
            from,
            to: to.to_vec(),
        })
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Everything a scheduled or on-demand run needs
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub crawl: CrawlConfig,
    pub credentials: Credentials,
    pub snapshot_path: PathBuf,
    pub report_dir: PathBuf,
    pub telegram: Option<TelegramConfig>,
    pub email: Option<EmailConfig>,
}

/// Splits a comma separated list, dropping blanks
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_url(what: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| WatchError::Config(format!("invalid {} '{}': {}", what, raw, e)))
}
