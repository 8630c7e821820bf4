//! Tests for run state transitions and full runs against a mock catalog.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::config::{EmailConfig, TelegramConfig};
use crate::model::{ProductRecord, StockStatus};
use crate::notify::Notifier;
use crate::report::GroupedCatalog;

// ── transition ───────────────────────────────────────────────────────

mod transition_tests {
    use super::*;

    #[test]
    fn happy_path_reaches_reporting() {
        let mut state = RunState::Crawling;
        for outcome in [
            PhaseOutcome::Completed,
            PhaseOutcome::Completed,
            PhaseOutcome::Completed,
            PhaseOutcome::Completed,
            PhaseOutcome::Diffed { report: true },
        ] {
            state = transition(state, outcome);
        }
        assert_eq!(state, RunState::Reporting);
        assert_eq!(transition(state, PhaseOutcome::Completed), RunState::Reporting);
    }

    #[test]
    fn no_changes_goes_idle() {
        assert_eq!(
            transition(RunState::Diffing, PhaseOutcome::Diffed { report: false }),
            RunState::Idle
        );
    }

    #[test]
    fn login_failure_is_terminal() {
        let state = transition(RunState::Authenticating, PhaseOutcome::Failed);
        assert_eq!(state, RunState::Failed);
        assert_eq!(transition(state, PhaseOutcome::Completed), RunState::Failed);
    }

    #[test]
    fn discovery_failure_is_terminal() {
        assert_eq!(transition(RunState::Crawling, PhaseOutcome::Failed), RunState::Failed);
    }

    #[test]
    fn partial_merge_and_enrich_still_advance() {
        assert_eq!(transition(RunState::Merging, PhaseOutcome::Failed), RunState::Enriching);
        assert_eq!(transition(RunState::Enriching, PhaseOutcome::Failed), RunState::Diffing);
    }

    #[test]
    fn failed_reporting_fails_the_run() {
        assert_eq!(transition(RunState::Reporting, PhaseOutcome::Failed), RunState::Failed);
    }
}

// ── full runs ────────────────────────────────────────────────────────

const SESSION_COOKIE: &str = "session=reseller-1";

const PUBLIC_LISTING: &str = r#"<html><body><ul class="product-list">
    <li class="product-list__item">
      <h3><a href="/p/whey">Whey Protein 2lb</a></h3>
      <small class="brand">Gold Nutrition</small><span class="price">10.000</span>
    </li>
    <li class="product-list__item">
      <h3><a href="/p/creatina">Creatina 300g</a></h3>
      <small class="brand">Star Nutrition</small><span class="price">5.000</span>
    </li>
    <li class="product-list__item">
      <h3><a href="/p/gel">Gel Energetico</a></h3>
      <small class="brand">Ena Sport</small><span class="price">Consultar</span>
    </li>
    <li class="product-list__item">
      <h3><a href="/p/barra">Barra Proteica</a></h3>
      <small class="brand">Acme</small><span class="price">900</span>
    </li>
    </ul></body></html>"#;

const RESELLER_LISTING: &str = r#"<html><body><ul class="product-list">
    <li class="product-list__item">
      <h3><a href="/p/whey">Whey Protein 2lb</a></h3>
      <small class="brand">Gold Nutrition</small><span class="price">8.000</span>
    </li>
    <li class="product-list__item">
      <h3><a href="/p/creatina">Creatina 300g</a></h3>
      <small class="brand">Star Nutrition</small><span class="price">4.000</span>
    </li>
    </ul></body></html>"#;

const WHEY_DETAIL: &str = r#"<html><body><div class="product-detail">
    <span class="price">8.000</span>
    <table>
      <tr data-technical-info="SABOR"><th>Sabor</th><td>Chocolate</td></tr>
      <tr data-technical-info="PRESENTACION"><th>Presentacion</th><td>2 lb</td></tr>
    </table>
    <button class="add-to-cart">Agregar al carrito</button>
    </div></body></html>"#;

const LOGIN_PAGE: &str = r#"<html><body>
    <form method="post" action="/login_check">
      <input type="hidden" name="_csrf_token" value="tok-1">
      <input type="text" name="_username">
      <input type="password" name="_password">
    </form></body></html>"#;

/// Catalog with a public and a cookie-gated reseller view of the same listing
async fn mount_catalog(server: &MockServer, login_accepted: bool) {
    Mock::given(method("GET"))
        .and(path("/productos"))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESELLER_LISTING))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/productos"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PUBLIC_LISTING))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/whey"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WHEY_DETAIL))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(server)
        .await;

    let submit = if login_accepted {
        ResponseTemplate::new(200)
            .insert_header("set-cookie", format!("{}; Path=/", SESSION_COOKIE).as_str())
            .set_body_string("<p>Bienvenido</p>")
    } else {
        ResponseTemplate::new(200).set_body_string(LOGIN_PAGE)
    };
    Mock::given(method("POST"))
        .and(path("/login_check"))
        .respond_with(submit)
        .mount(server)
        .await;
}

#[derive(Default, Clone)]
struct Recorded {
    batches: Arc<Mutex<Vec<Vec<PriceChange>>>>,
    failures: Arc<Mutex<Vec<String>>>,
}

struct RecordingChannel(Recorded);

#[async_trait]
impl Notifier for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify_changes(&self, changes: &[PriceChange]) -> Result<()> {
        self.0.batches.lock().unwrap().push(changes.to_vec());
        Ok(())
    }

    async fn notify_failure(&self, message: &str) -> Result<()> {
        self.0.failures.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Channel whose change delivery always fails
struct BrokenChannel;

#[async_trait]
impl Notifier for BrokenChannel {
    fn name(&self) -> &str {
        "broken"
    }

    async fn notify_changes(&self, _changes: &[PriceChange]) -> Result<()> {
        Err(WatchError::Delivery("relay refused".to_string()))
    }

    async fn notify_failure(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}

struct BrokenRenderer;

impl ReportRenderer for BrokenRenderer {
    fn name(&self) -> &str {
        "broken"
    }

    fn render(&self, _grouped: &GroupedCatalog<'_>, _snapshot: &CatalogSnapshot) -> Result<PathBuf> {
        Err(WatchError::Report("disk full".to_string()))
    }
}

fn bare_pipeline(server: &MockServer, dir: &TempDir) -> Pipeline {
    let crawl = CrawlConfig::new(
        &format!("{}/productos", server.uri()),
        &format!("{}/login", server.uri()),
    )
    .unwrap();
    let credentials = Credentials::new("reseller", "s3cret").unwrap();
    let store = SnapshotStore::new(dir.path().join("last_prices.json"));
    Pipeline::new(crawl, credentials, store, dir.path().join("reports"))
}

/// Previous snapshot whose whey price differs from the mock catalog
fn outdated_snapshot(server: &MockServer) -> CatalogSnapshot {
    let mut whey = ProductRecord::from_listing(
        &format!("{}/p/whey", server.uri()),
        "Whey Protein 2lb",
        "Gold Nutrition",
        "9.500",
    );
    whey.reseller_price = Some("8.000".to_string());
    vec![whey].into()
}

fn pipeline_for(server: &MockServer, dir: &TempDir, recorded: &Recorded) -> Pipeline {
    let crawl = CrawlConfig::new(
        &format!("{}/productos", server.uri()),
        &format!("{}/login", server.uri()),
    )
    .unwrap();
    let credentials = Credentials::new("reseller", "s3cret").unwrap();
    let store = SnapshotStore::new(dir.path().join("last_prices.json"));
    let reports = dir.path().join("reports");

    Pipeline::new(crawl, credentials, store, &reports)
        .with_renderer(Box::new(CsvReport::new(&reports)))
        .with_renderer(Box::new(HtmlReport::new(&reports)))
        .with_dispatcher(
            Dispatcher::new().with_channel(Box::new(RecordingChannel(recorded.clone())), true),
        )
}

#[tokio::test]
async fn first_run_reports_everything_and_persists() {
    let server = MockServer::start().await;
    mount_catalog(&server, true).await;
    let dir = TempDir::new().unwrap();
    let recorded = Recorded::default();
    let pipeline = pipeline_for(&server, &dir, &recorded);

    let report = pipeline.run_job().await.unwrap();

    assert_eq!(report.state, RunState::Reporting);
    assert!(report.first_run);
    assert!(report.persisted);
    // Acme is off the allow-list, the gel has no public price
    assert_eq!(report.products, 2);
    assert_eq!(report.changes.len(), 2);

    let whey = &report.changes[0];
    assert_eq!(whey.identity, format!("{}/p/whey", server.uri()));
    assert_eq!(whey.old_public, "-");
    assert_eq!(whey.new_public, "10.000");
    assert_eq!(whey.old_reseller, "-");
    assert_eq!(whey.new_reseller, "8.000");
    assert_eq!(report.changes[1].name, "Creatina 300g");

    let saved = pipeline.store().load();
    let whey = saved.get(&format!("{}/p/whey", server.uri())).unwrap();
    assert_eq!(whey.flavor.as_deref(), Some("Chocolate"));
    assert_eq!(whey.presentation.as_deref(), Some("2 lb"));
    assert_eq!(whey.in_stock, StockStatus::InStock);
    let creatina = saved.get(&format!("{}/p/creatina", server.uri())).unwrap();
    assert_eq!(creatina.reseller_price.as_deref(), Some("4.000"));
    assert!(creatina.error.is_some());

    assert!(dir.path().join("reports").join("latest.csv").exists());
    assert!(dir.path().join("reports").join("latest.html").exists());
    assert_eq!(recorded.batches.lock().unwrap().len(), 1);
    assert!(recorded.failures.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unchanged_prices_end_idle_without_writing() {
    let server = MockServer::start().await;
    mount_catalog(&server, true).await;
    let dir = TempDir::new().unwrap();
    let recorded = Recorded::default();
    let pipeline = pipeline_for(&server, &dir, &recorded);

    pipeline.run_job().await.unwrap();
    let saved = std::fs::read_to_string(pipeline.store().path()).unwrap();

    let report = pipeline.run_job().await.unwrap();

    assert_eq!(report.state, RunState::Idle);
    assert!(report.changes.is_empty());
    assert!(!report.persisted);
    assert_eq!(std::fs::read_to_string(pipeline.store().path()).unwrap(), saved);
    assert_eq!(recorded.batches.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn changed_price_is_reported_and_removed_product_is_not() {
    let server = MockServer::start().await;
    mount_catalog(&server, true).await;
    let dir = TempDir::new().unwrap();
    let recorded = Recorded::default();
    let pipeline = pipeline_for(&server, &dir, &recorded);

    let whey_id = format!("{}/p/whey", server.uri());
    let creatina_id = format!("{}/p/creatina", server.uri());
    let mut whey = ProductRecord::from_listing(&whey_id, "Whey Protein 2lb", "Gold Nutrition", "9.500");
    whey.reseller_price = Some("8.000".to_string());
    let mut creatina =
        ProductRecord::from_listing(&creatina_id, "Creatina 300g", "Star Nutrition", "5.000");
    creatina.reseller_price = Some("4.000".to_string());
    let gone = ProductRecord::from_listing(
        &format!("{}/p/discontinued", server.uri()),
        "Old Product",
        "Gold Nutrition",
        "1.000",
    );
    let previous: CatalogSnapshot = vec![whey, creatina, gone].into();
    pipeline.store().save(&previous).unwrap();

    let report = pipeline.run_job().await.unwrap();

    assert_eq!(report.state, RunState::Reporting);
    assert!(!report.first_run);
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].identity, whey_id);
    assert_eq!(report.changes[0].old_public, "9.500");
    assert_eq!(report.changes[0].new_public, "10.000");

    let saved = pipeline.store().load();
    assert_eq!(saved.len(), 2);
    assert!(!saved.contains(&format!("{}/p/discontinued", server.uri())));
}

#[tokio::test]
async fn rejected_login_fails_and_keeps_previous_snapshot() {
    let server = MockServer::start().await;
    mount_catalog(&server, false).await;
    let dir = TempDir::new().unwrap();
    let recorded = Recorded::default();
    let pipeline = pipeline_for(&server, &dir, &recorded);

    let previous: CatalogSnapshot =
        vec![ProductRecord::from_listing("/p/old", "Old", "Gold", "1.000")].into();
    pipeline.store().save(&previous).unwrap();

    let result = pipeline.run_job().await;

    assert!(matches!(result, Err(WatchError::Authentication(_))));
    assert_eq!(pipeline.store().load(), previous);
    assert!(recorded.batches.lock().unwrap().is_empty());
    let failures = recorded.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("Authentication failed"));
    assert!(!dir.path().join("reports").join("latest.csv").exists());
}

#[tokio::test]
async fn unreachable_catalog_fails_before_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let recorded = Recorded::default();
    let pipeline = pipeline_for(&server, &dir, &recorded);

    let result = pipeline.run_job().await;

    assert!(matches!(result, Err(WatchError::HttpStatus(_))));
    assert!(!pipeline.store().path().exists());
    assert_eq!(recorded.failures.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn scrape_exports_without_touching_the_snapshot() {
    let server = MockServer::start().await;
    mount_catalog(&server, true).await;
    let dir = TempDir::new().unwrap();
    let recorded = Recorded::default();
    let pipeline = pipeline_for(&server, &dir, &recorded);

    let snapshot = pipeline.scrape().await.unwrap();

    assert_eq!(snapshot.len(), 2);
    let whey = snapshot.get(&format!("{}/p/whey", server.uri())).unwrap();
    assert_eq!(whey.reseller_price.as_deref(), Some("8.000"));
    assert!(!pipeline.store().path().exists());
    assert!(recorded.batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_delivery_keeps_previous_snapshot() {
    let server = MockServer::start().await;
    mount_catalog(&server, true).await;
    let dir = TempDir::new().unwrap();
    let recorded = Recorded::default();
    let pipeline = bare_pipeline(&server, &dir).with_dispatcher(
        Dispatcher::new()
            .with_channel(Box::new(BrokenChannel), true)
            .with_channel(Box::new(RecordingChannel(recorded.clone())), false),
    );
    let previous = outdated_snapshot(&server);
    pipeline.store().save(&previous).unwrap();

    let result = pipeline.run_job().await;

    match result {
        Err(WatchError::Delivery(msg)) => assert_eq!(msg, "broken: relay refused"),
        other => panic!("Expected Delivery, got: {other:?}"),
    }
    assert_eq!(pipeline.store().load(), previous);
    // The secondary channel still got the changes, then the alert
    assert_eq!(recorded.batches.lock().unwrap().len(), 1);
    let failures = recorded.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("relay refused"));
}

#[tokio::test]
async fn failed_renderer_keeps_previous_snapshot() {
    let server = MockServer::start().await;
    mount_catalog(&server, true).await;
    let dir = TempDir::new().unwrap();
    let recorded = Recorded::default();
    let pipeline = bare_pipeline(&server, &dir)
        .with_renderer(Box::new(BrokenRenderer))
        .with_dispatcher(
            Dispatcher::new().with_channel(Box::new(RecordingChannel(recorded.clone())), true),
        );
    let previous = outdated_snapshot(&server);
    pipeline.store().save(&previous).unwrap();

    let result = pipeline.run_job().await;

    match result {
        Err(WatchError::Report(msg)) => assert!(msg.contains("disk full")),
        other => panic!("Expected Report, got: {other:?}"),
    }
    assert_eq!(pipeline.store().load(), previous);
    assert!(recorded.batches.lock().unwrap().is_empty());
    assert_eq!(recorded.failures.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn from_config_attaches_every_configured_channel() {
    let dir = TempDir::new().unwrap();
    let config = WatchConfig {
        crawl: CrawlConfig::new("https://shop.test/productos", "https://shop.test/login").unwrap(),
        credentials: Credentials::new("reseller", "s3cret").unwrap(),
        snapshot_path: dir.path().join("last_prices.json"),
        report_dir: dir.path().join("reports"),
        telegram: TelegramConfig::from_parts(Some("TOKEN".to_string()), &["111".to_string()]),
        email: EmailConfig::from_parts(
            Some("smtp.shop.test".to_string()),
            587,
            None,
            None,
            Some("watch@shop.test".to_string()),
            &["owner@shop.test".to_string()],
        ),
    };

    let pipeline = Pipeline::from_config(config).unwrap();

    assert_eq!(pipeline.dispatcher.len(), 3);
    assert_eq!(pipeline.renderers.len(), 2);
}
