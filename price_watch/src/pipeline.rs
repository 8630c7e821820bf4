//! Run orchestration
//!
//! A run moves through `Crawling → Authenticating → Merging → Enriching →
//! Diffing` and ends in `Reporting`, `Idle` or `Failed`. Only a run that
//! reaches `Reporting` and finishes its reports writes the snapshot.

use crate::config::{CrawlConfig, Credentials, WatchConfig};
use crate::crawler::crawl_public;
use crate::differ::diff;
use crate::enricher::enrich;
use crate::error::{Result, WatchError};
use crate::merger::merge_reseller_phase;
use crate::model::{CatalogSnapshot, PriceChange};
use crate::notify::{Dispatcher, EmailNotifier, LogNotifier, TelegramNotifier};
use crate::report::{group_by_brand, CsvReport, HtmlReport, ReportRenderer};
use crate::session::CatalogSession;
use crate::store::SnapshotStore;
use std::fmt;
use std::path::{Path, PathBuf};

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Crawling,
    Authenticating,
    Merging,
    Enriching,
    Diffing,
    Reporting,
    Idle,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Crawling => "crawling",
            RunState::Authenticating => "authenticating",
            RunState::Merging => "merging",
            RunState::Enriching => "enriching",
            RunState::Diffing => "diffing",
            RunState::Reporting => "reporting",
            RunState::Idle => "idle",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tag of a finished phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed,
    Failed,
    /// Diff finished; `report` is true when there are changes or no previous snapshot
    Diffed { report: bool },
}

impl PhaseOutcome {
    fn of<T>(result: &Result<T>) -> Self {
        if result.is_ok() {
            PhaseOutcome::Completed
        } else {
            PhaseOutcome::Failed
        }
    }
}

/// Next state after `state` finished with `outcome`.
///
/// Merging and enriching absorb their own partial failures, so they always
/// advance. `Idle` and `Failed` are terminal; `Reporting` only leaves to `Failed`.
pub fn transition(state: RunState, outcome: PhaseOutcome) -> RunState {
    match (state, outcome) {
        (RunState::Idle, _) | (RunState::Failed, _) => state,
        (RunState::Crawling, PhaseOutcome::Failed)
        | (RunState::Authenticating, PhaseOutcome::Failed)
        | (RunState::Reporting, PhaseOutcome::Failed) => RunState::Failed,
        (RunState::Crawling, _) => RunState::Authenticating,
        (RunState::Authenticating, _) => RunState::Merging,
        (RunState::Merging, _) => RunState::Enriching,
        (RunState::Enriching, _) => RunState::Diffing,
        (RunState::Diffing, PhaseOutcome::Diffed { report: true }) => RunState::Reporting,
        (RunState::Diffing, _) => RunState::Idle,
        (RunState::Reporting, _) => RunState::Reporting,
    }
}

/// What a finished job did
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub state: RunState,
    pub changes: Vec<PriceChange>,
    pub first_run: bool,
    pub persisted: bool,
    pub products: usize,
}

/// Scrape, diff, report and persist
pub struct Pipeline {
    crawl: CrawlConfig,
    credentials: Credentials,
    store: SnapshotStore,
    renderers: Vec<Box<dyn ReportRenderer>>,
    dispatcher: Dispatcher,
    report_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        crawl: CrawlConfig,
        credentials: Credentials,
        store: SnapshotStore,
        report_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            crawl,
            credentials,
            store,
            renderers: Vec::new(),
            dispatcher: Dispatcher::new(),
            report_dir: report_dir.into(),
        }
    }

    /// Pipeline with the CSV and HTML reports and every configured channel.
    ///
    /// Email is the primary channel when configured, otherwise Telegram; the
    /// log channel is always attached as a secondary.
    pub fn from_config(config: WatchConfig) -> Result<Self> {
        let report_dir = config.report_dir.clone();
        let mut dispatcher = Dispatcher::new();
        let has_email = config.email.is_some();
        if let Some(email) = config.email {
            dispatcher = dispatcher.with_channel(Box::new(EmailNotifier::new(email, &report_dir)?), true);
        }
        if let Some(telegram) = config.telegram {
            dispatcher =
                dispatcher.with_channel(Box::new(TelegramNotifier::new(telegram)), !has_email);
        }
        dispatcher = dispatcher.with_channel(Box::new(LogNotifier), false);

        Ok(
            Self::new(config.crawl, config.credentials, SnapshotStore::new(config.snapshot_path), &report_dir)
                .with_renderer(Box::new(CsvReport::new(&report_dir)))
                .with_renderer(Box::new(HtmlReport::new(&report_dir)))
                .with_dispatcher(dispatcher),
        )
    }

    pub fn with_renderer(mut self, renderer: Box<dyn ReportRenderer>) -> Self {
        self.renderers.push(renderer);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    fn advance(state: &mut RunState, outcome: PhaseOutcome) {
        let next = transition(*state, outcome);
        if next != *state {
            log::info!("Run state: {} -> {}", state, next);
        }
        *state = next;
    }

    /// Crawl, log in, merge reseller prices and enrich.
    ///
    /// On error `state` is left at `Failed`. The session is dropped before
    /// returning on every path.
    async fn scrape_phases(&self, state: &mut RunState) -> Result<CatalogSnapshot> {
        let session = CatalogSession::new(&self.crawl);
        if session.is_err() {
            Self::advance(state, PhaseOutcome::Failed);
        }
        let session = session?;

        let crawl = crawl_public(&session, &self.crawl).await;
        Self::advance(state, PhaseOutcome::of(&crawl));
        let crawl = crawl?;

        let authed = session
            .authenticate(&self.crawl.login_url, &self.credentials, self.crawl.login_timeout)
            .await;
        Self::advance(state, PhaseOutcome::of(&authed));
        let authed = authed?;

        let merged =
            merge_reseller_phase(&authed, &self.crawl.base_url, crawl.total_pages, crawl.snapshot).await;
        Self::advance(state, PhaseOutcome::Completed);

        let enriched = enrich(&authed, merged).await;
        Self::advance(state, PhaseOutcome::Completed);

        Ok(enriched)
    }

    /// On-demand export: the scraped snapshot, without diffing or persisting
    pub async fn scrape(&self) -> Result<CatalogSnapshot> {
        let mut state = RunState::Crawling;
        self.scrape_phases(&mut state).await
    }

    fn render_reports(&self, snapshot: &CatalogSnapshot) -> Result<()> {
        let grouped = group_by_brand(snapshot);
        for renderer in &self.renderers {
            renderer
                .render(&grouped, snapshot)
                .map_err(|e| WatchError::Report(format!("{}: {}", renderer.name(), e)))?;
        }
        Ok(())
    }

    async fn run_phases(&self, state: &mut RunState) -> Result<JobReport> {
        let previous = self.store.load();
        let first_run = previous.is_empty();

        let current = self.scrape_phases(state).await?;

        let changes = diff(&previous, &current);
        log::info!("Detected {} price change(s)", changes.len());
        Self::advance(
            state,
            PhaseOutcome::Diffed {
                report: !changes.is_empty() || first_run,
            },
        );

        if *state == RunState::Idle {
            log::info!("No changes, nothing to report");
            return Ok(JobReport {
                state: *state,
                changes,
                first_run,
                persisted: false,
                products: current.len(),
            });
        }

        let reported = match self.render_reports(&current) {
            Ok(()) => self.dispatcher.dispatch(&changes).await,
            Err(e) => Err(e),
        };
        Self::advance(state, PhaseOutcome::of(&reported));
        reported?;

        let saved = self.store.save(&current);
        Self::advance(state, PhaseOutcome::of(&saved));
        saved?;

        log::info!("Job completed");
        Ok(JobReport {
            state: *state,
            changes,
            first_run,
            persisted: true,
            products: current.len(),
        })
    }

    /// Full scheduled job. A failed job alerts every channel before returning the error.
    pub async fn run_job(&self) -> Result<JobReport> {
        let mut state = RunState::Crawling;
        let result = self.run_phases(&mut state).await;

        if let Err(e) = &result {
            log::error!("Job failed while {}: {}", state, e);
            self.dispatcher.broadcast_failure(&e.to_string()).await;
        }
        result
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
