//! Price Watch - catalog price tracking
//!
//! Crawls the public and reseller catalog, reports price changes against the
//! last run and notifies the configured channels. Runs continuously on an
//! interval unless `--once` or `--export` is given.

use clap::Parser;
use price_watch::config::parse_list;
use price_watch::report::CsvReport;
use price_watch::{CrawlConfig, Credentials, EmailConfig, Pipeline, TelegramConfig, WatchConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Catalog price watcher - diffs public and reseller prices between runs
#[derive(Parser, Debug)]
#[command(name = "price_watch")]
#[command(version, about, long_about = None)]
struct Args {
    /// Public catalog listing URL
    #[arg(long, env = "BASE_URL")]
    base_url: String,

    /// Reseller login page URL
    #[arg(long, env = "AUTH_URL")]
    auth_url: String,

    /// Reseller account username
    #[arg(long, env = "VYJ_USER")]
    username: String,

    /// Reseller account password
    #[arg(long, env = "VYJ_PASS", hide_env_values = true)]
    password: String,

    /// Comma separated brand allow-list
    #[arg(long, env = "BRANDS", default_value = "Star,Ena,Gentech,Gold,Mervick,Max force,Granger")]
    brands: String,

    /// Path of the last reported snapshot
    #[arg(long, env = "SNAPSHOT_PATH", default_value_t = default_snapshot_path())]
    snapshot: String,

    /// Directory for generated reports
    #[arg(long, env = "REPORT_DIR", default_value_t = default_report_dir())]
    report_dir: String,

    /// Telegram bot token (enables the Telegram channel)
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    telegram_token: Option<String>,

    /// Comma separated Telegram chat ids
    #[arg(long, env = "TELEGRAM_CHAT_ID", default_value = "")]
    telegram_chat_ids: String,

    /// SMTP relay host (enables the email channel)
    #[arg(long, env = "SMTP_HOST")]
    smtp_host: Option<String>,

    /// SMTP port (465 = implicit TLS, otherwise STARTTLS)
    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    smtp_port: u16,

    /// SMTP username
    #[arg(long, env = "SMTP_USER")]
    smtp_user: Option<String>,

    /// SMTP password
    #[arg(long, env = "SMTP_PASS", hide_env_values = true)]
    smtp_pass: Option<String>,

    /// Sender address of change mails
    #[arg(long, env = "FROM_EMAIL")]
    from_email: Option<String>,

    /// Comma separated recipients of change mails
    #[arg(long, env = "TO_EMAIL", default_value = "")]
    to_email: String,

    /// Timeout for each catalog page, in seconds
    #[arg(long, default_value_t = 30)]
    page_timeout_secs: u64,

    /// Timeout for the login round trip, in seconds
    #[arg(long, default_value_t = 15)]
    login_timeout_secs: u64,

    /// Run once and exit (default: run continuously)
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Scrape and write the price sheet to this CSV file, then exit
    #[arg(long)]
    export: Option<PathBuf>,

    /// Interval in hours between runs when running continuously
    #[arg(long, default_value_t = 24)]
    interval_hours: u64,

    /// Enable the HTTP trigger server on specified port (default: disabled)
    #[arg(long)]
    web_port: Option<u16>,
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("price_watch")
}

/// Returns the default snapshot path: ~/.local/share/price_watch/last_prices.json
fn default_snapshot_path() -> String {
    data_dir().join("last_prices.json").to_string_lossy().to_string()
}

/// Returns the default report directory: ~/.local/share/price_watch/reports
fn default_report_dir() -> String {
    data_dir().join("reports").to_string_lossy().to_string()
}

fn build_config(args: &Args) -> price_watch::Result<WatchConfig> {
    let mut crawl = CrawlConfig::new(&args.base_url, &args.auth_url)?
        .with_brands(parse_list(&args.brands));
    crawl.page_timeout = Duration::from_secs(args.page_timeout_secs.max(1));
    crawl.login_timeout = Duration::from_secs(args.login_timeout_secs.max(1));

    Ok(WatchConfig {
        crawl,
        credentials: Credentials::new(&args.username, &args.password)?,
        snapshot_path: PathBuf::from(&args.snapshot),
        report_dir: PathBuf::from(&args.report_dir),
        telegram: TelegramConfig::from_parts(
            args.telegram_token.clone(),
            &parse_list(&args.telegram_chat_ids),
        ),
        email: EmailConfig::from_parts(
            args.smtp_host.clone(),
            args.smtp_port,
            args.smtp_user.clone(),
            args.smtp_pass.clone(),
            args.from_email.clone(),
            &parse_list(&args.to_email),
        ),
    })
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
    };

    log::info!("Starting price_watch...");
    log::info!("Catalog: {}", config.crawl.base_url);
    log::info!("Snapshot path: {}", config.snapshot_path.display());
    log::info!("Report directory: {}", config.report_dir.display());
    if config.email.is_none() && config.telegram.is_none() {
        log::warn!("Neither email nor Telegram is configured, changes are only logged");
    }

    let pipeline = match Pipeline::from_config(config) {
        Ok(pipeline) => Arc::new(pipeline),
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
    };

    if let Some(path) = &args.export {
        run_export(&pipeline, path).await;
        return;
    }

    // Spawn web server if --web-port specified
    if let Some(port) = args.web_port {
        let web_pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            if let Err(e) = price_watch::web::serve(web_pipeline, port).await {
                log::error!("Web server error: {}", e);
            }
        });
    }

    if args.once {
        if pipeline.run_job().await.is_err() {
            std::process::exit(1);
        }
    } else {
        log::info!(
            "Running in daemon mode, checking every {} hour(s)",
            args.interval_hours
        );
        run_daemon(&pipeline, args.interval_hours).await;
    }
}

/// Scrape once and write the price sheet to `path`
async fn run_export(pipeline: &Pipeline, path: &std::path::Path) {
    let snapshot = match pipeline.scrape().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::error!("Export failed: {}", e);
            std::process::exit(1);
        }
    };

    match CsvReport::write_to(path, &snapshot) {
        Ok(()) => log::info!("Exported {} products to {}", snapshot.len(), path.display()),
        Err(e) => {
            log::error!("Failed to write {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

/// Run the job on an interval until Ctrl-C
async fn run_daemon(pipeline: &Pipeline, interval_hours: u64) {
    let check_interval = Duration::from_secs(interval_hours.max(1) * 3600);
    let mut ticker = interval(check_interval);

    loop {
        tokio::select! {
            // First tick completes immediately, so the job runs on startup
            _ = ticker.tick() => {
                log::info!("Scheduled run triggered");
                if let Err(e) = pipeline.run_job().await {
                    log::warn!("Run failed, retrying at next interval: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
        }
    }
}
