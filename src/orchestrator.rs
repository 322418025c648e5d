//! Per-keyword rank resolution and the daily batch sweep.
//!
//! One resolution runs: strategy lookup, page loop (build query, fetch,
//! extract), host matching, then recording. At most one resolution per
//! keyword is in flight at a time; see [`ConflictPolicy`].

use std::sync::Arc;

use futures::StreamExt;
use seo_monitor_search::host::normalize_host;
use seo_monitor_search::http::request_delay;
use seo_monitor_search::{
    HttpFetcher, PageFetcher, QueryRequest, ResolvedStrategy, ResultEntry, SearchConfig,
    StrategyRegistry, fetch_entries,
};

use crate::clock::{Clock, SystemClock};
use crate::config::{BatchConfig, ConflictPolicy, MonitorConfig};
use crate::error::{MonitorError, Result};
use crate::event_log::{EventSink, TracingSink};
use crate::locks::KeywordLocks;
use crate::matcher::match_rank;
use crate::model::{BatchSummary, KeywordFilter, KeywordId, RankOutcome, Severity};
use crate::proxy::{NoProxy, ProxyProvider, RotatingProxies};
use crate::recorder::RankRecorder;
use crate::store::{MonitorStore, SqliteStore};

const RANK_CATEGORY: &str = "rank";
const BATCH_CATEGORY: &str = "batch";

/// Entries gathered by one page loop.
#[derive(Debug, Default)]
struct PageRun {
    entries: Vec<ResultEntry>,
    pages_fetched: u32,
    /// The failure that ended the loop early, if any.
    stopped_by: Option<MonitorError>,
}

/// Resolves keyword ranks and records them.
pub struct RankResolver {
    store: Arc<dyn MonitorStore>,
    recorder: RankRecorder,
    registry: Arc<StrategyRegistry>,
    fetcher: Arc<dyn PageFetcher>,
    proxies: Arc<dyn ProxyProvider>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    locks: KeywordLocks,
    batch: BatchConfig,
    search: SearchConfig,
}

impl RankResolver {
    /// Resolver over `store` fetching through `fetcher`, with the default
    /// strategies, direct routing, tracing-only events and the system clock.
    pub fn new<S>(store: Arc<S>, fetcher: Arc<dyn PageFetcher>) -> Self
    where
        S: MonitorStore + 'static,
    {
        let recorder = RankRecorder::new(store.clone());
        Self {
            store,
            recorder,
            registry: Arc::new(StrategyRegistry::with_defaults()),
            fetcher,
            proxies: Arc::new(NoProxy),
            events: Arc::new(TracingSink),
            clock: Arc::new(SystemClock),
            locks: KeywordLocks::new(),
            batch: BatchConfig::default(),
            search: SearchConfig::default(),
        }
    }

    /// Production wiring: HTTP fetcher, configured proxies, and the store
    /// doubling as the persisted event log.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Config`] for an invalid configuration.
    pub fn from_config(config: &MonitorConfig, store: Arc<SqliteStore>) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(config.search.clone())?;
        let events: Arc<dyn EventSink> = store.clone();
        Ok(Self::new(store, Arc::new(fetcher))
            .with_proxies(Arc::new(RotatingProxies::from_config(&config.proxy)))
            .with_events(events)
            .with_batch(config.batch.clone())
            .with_search_config(config.search.clone()))
    }

    #[must_use]
    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    #[must_use]
    pub fn with_proxies(mut self, proxies: Arc<dyn ProxyProvider>) -> Self {
        self.proxies = proxies;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    #[must_use]
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.batch.on_conflict = policy;
        self
    }

    /// Search settings used for pacing between pages.
    #[must_use]
    pub fn with_search_config(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Resolve and record the current rank of one keyword.
    ///
    /// Returns the outcome, with rank 0 when the site was not found.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::ResolutionInProgress`] when the keyword is already
    ///   being resolved and the conflict policy is `reject`
    /// - [`MonitorError::StrategyNotFound`] / [`MonitorError::StrategyMisconfigured`]
    ///   before any page is requested
    /// - [`MonitorError::Fetch`] when not a single results page could be fetched
    /// - [`MonitorError::CaptchaDetected`] when the engine blocked us before
    ///   the site was found
    /// - [`MonitorError::RecordFailed`] when the rank was resolved but could
    ///   not be stored; the outcome travels inside the error
    pub async fn resolve_keyword_rank(&self, keyword_id: KeywordId) -> Result<RankOutcome> {
        let _guard = self
            .locks
            .acquire(keyword_id, self.batch.on_conflict)
            .await?;

        let keyword = self.store.get_keyword(keyword_id)?;
        if keyword.text.trim().is_empty() {
            return Err(MonitorError::InvalidInput(format!(
                "keyword {keyword_id} has empty text"
            )));
        }
        let site = self.store.get_site(keyword.site_id)?;
        let engine = self.store.get_engine(keyword.engine_id)?;
        if normalize_host(&site.url).is_none() {
            return Err(MonitorError::InvalidInput(format!(
                "site {} URL '{}' has no host",
                site.id, site.url
            )));
        }

        let strategy = match self.registry.resolve(&engine.short_name) {
            Ok(strategy) => strategy,
            Err(e) => {
                let err = MonitorError::from(e);
                self.log_event(
                    RANK_CATEGORY,
                    &format!("Keyword '{}' on {}: {err}", keyword.text, engine.name),
                    Severity::Error,
                );
                return Err(err);
            }
        };
        let base_url = match engine.base_url.trim() {
            "" => strategy.strategy().default_base_url().to_string(),
            configured => configured.to_string(),
        };

        let request = QueryRequest::new(
            keyword.text.clone(),
            site.location.clone(),
            site.language.clone(),
        );
        let run = self.collect_entries(&strategy, &base_url, &request).await;

        let outcome = match run.stopped_by {
            // Query construction problems are not page failures.
            Some(err)
                if !matches!(
                    err,
                    MonitorError::Fetch(_) | MonitorError::CaptchaDetected(_)
                ) =>
            {
                return Err(self.fail(&keyword.text, err));
            }
            Some(err) if run.pages_fetched == 0 => return Err(self.fail(&keyword.text, err)),
            Some(err) => {
                let outcome = match_rank(&run.entries, &site.url);
                if err.is_captcha() && !outcome.is_ranked() {
                    return Err(self.fail(&keyword.text, err));
                }
                outcome
            }
            None => match_rank(&run.entries, &site.url),
        };

        let observed_at = self.clock.now();
        match self.recorder.record(keyword_id, &outcome, observed_at) {
            Ok(recorded) => {
                let message = if outcome.is_ranked() {
                    format!(
                        "Keyword '{}' ranks {} on {} for {} (previous {}, top {})",
                        keyword.text,
                        recorded.keyword.rank,
                        engine.name,
                        site.url,
                        recorded.keyword.previous,
                        recorded.keyword.top_rank
                    )
                } else {
                    format!(
                        "Keyword '{}' not ranked on {} for {}: {}",
                        keyword.text,
                        engine.name,
                        site.url,
                        outcome.message.as_deref().unwrap_or("not found")
                    )
                };
                self.log_event(RANK_CATEGORY, &message, Severity::Event);
                Ok(outcome)
            }
            Err(e) => {
                let reason = e.to_string();
                self.log_event(
                    RANK_CATEGORY,
                    &format!(
                        "Keyword '{}' resolved to rank {} but was not stored: {reason}",
                        keyword.text, outcome.rank
                    ),
                    Severity::Error,
                );
                Err(MonitorError::RecordFailed {
                    outcome: Box::new(outcome),
                    reason,
                })
            }
        }
    }

    /// Resolve every keyword not yet checked today.
    ///
    /// Keywords are resolved concurrently, at most
    /// `batch.max_concurrent_keywords` at a time. Individual failures are
    /// tallied, never fatal to the sweep.
    ///
    /// # Errors
    ///
    /// Only when the due keywords cannot be listed.
    pub async fn resolve_all_due_keywords(&self) -> Result<BatchSummary> {
        let today = self.clock.today();
        let due = self.store.list_keywords(&KeywordFilter::due_on(today))?;
        tracing::info!(count = due.len(), %today, "resolving due keywords");

        let limit = self.batch.max_concurrent_keywords.max(1);
        let summary = futures::stream::iter(due.into_iter().map(|k| k.id))
            .map(|id| async move { (id, self.resolve_keyword_rank(id).await) })
            .buffer_unordered(limit)
            .fold(BatchSummary::default(), |mut summary, (id, result)| async move {
                summary.attempted += 1;
                match result {
                    Ok(_) => summary.succeeded += 1,
                    Err(e) => {
                        summary.failed += 1;
                        if e.is_captcha() {
                            summary.captcha_blocked += 1;
                        }
                        tracing::warn!(keyword_id = id, error = %e, "keyword resolution failed");
                    }
                }
                summary
            })
            .await;

        self.log_event(
            BATCH_CATEGORY,
            &format!(
                "Rank sweep finished: {} attempted, {} succeeded, {} failed ({} blocked by captcha)",
                summary.attempted, summary.succeeded, summary.failed, summary.captcha_blocked
            ),
            if summary.failed > 0 {
                Severity::Error
            } else {
                Severity::Event
            },
        );
        Ok(summary)
    }

    /// Fetch and extract pages in order until all are done or one fails.
    async fn collect_entries(
        &self,
        strategy: &ResolvedStrategy,
        base_url: &str,
        request: &QueryRequest,
    ) -> PageRun {
        let mut run = PageRun::default();
        for page in 1..=strategy.pages_to_fetch() {
            if page > 1 {
                let pause = request_delay(&self.search);
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }

            let route = self.proxies.route();
            match fetch_entries(
                strategy,
                base_url,
                &request.page(page),
                self.fetcher.as_ref(),
                &route,
            )
            .await
            {
                Ok(entries) => {
                    tracing::debug!(
                        keyword = %request.keyword,
                        page,
                        count = entries.len(),
                        proxied = route.is_proxied(),
                        "results page extracted"
                    );
                    run.pages_fetched += 1;
                    run.entries.extend(entries);
                }
                Err(e) => {
                    let err = MonitorError::from(e);
                    tracing::warn!(keyword = %request.keyword, page, error = %err, "page loop stopped");
                    self.log_event(
                        RANK_CATEGORY,
                        &format!(
                            "Keyword '{}': page {page} failed, {} page(s) kept: {err}",
                            request.keyword, run.pages_fetched
                        ),
                        Severity::Debug,
                    );
                    run.stopped_by = Some(err);
                    break;
                }
            }
        }
        run
    }

    /// Report an event stamped with the resolver's clock.
    fn log_event(&self, category: &str, message: &str, severity: Severity) {
        self.events.log(category, message, severity, self.clock.now());
    }

    fn fail(&self, keyword: &str, err: MonitorError) -> MonitorError {
        self.log_event(
            RANK_CATEGORY,
            &format!("Keyword '{keyword}' could not be resolved: {err}"),
            Severity::Error,
        );
        err
    }
}

impl std::fmt::Debug for RankResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankResolver")
            .field("strategies", &self.registry.keys())
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}
