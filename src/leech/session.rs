//! Session controller - owns the credential, the stop signal and the worker pool
//!
//! A session moves through `SessionState`:
//! - logs in once and caches the bearer credential
//! - launches a fixed pool of workers sharing one HTTP client
//! - collects or streams their results
//! - ends in `Stopped`, after which it cannot be run again

use crate::config::{validate, validate_leech_config, Config, LeechConfig};
use crate::leech::aggregator::{Aggregator, PageBatch, ResultSink, WorkerOutput};
use crate::leech::credentials::{authenticate, Credential};
use crate::leech::distributor::{PageDistributor, Pagination, StopSignal};
use crate::leech::fetcher::{build_http_client, PageFetcher, PageOutcome};
use crate::leech::report::{LeechReport, StopReason, WorkerReport};
use crate::state::SessionState;
use crate::LeechError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinSet;
use url::Url;

/// A leech session against one account
pub struct Session {
    config: Config,
    fetcher: PageFetcher,
    username: String,
    password: String,
    credential: AsyncMutex<Option<Credential>>,
    state: Mutex<SessionState>,
    active: AtomicBool,
    stop: StopSignal,
}

/// Everything a worker task needs, shared read-only across the pool
struct WorkerContext {
    fetcher: PageFetcher,
    credential: Credential,
    distributor: PageDistributor,
}

/// Clears the session's `active` flag when a run returns, early or not
struct ActiveRun<'a>(&'a AtomicBool);

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Session {
    /// Creates a new, unauthenticated session
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoints, timeouts and pool defaults
    /// * `username` - Account login
    /// * `password` - Account password
    ///
    /// # Returns
    ///
    /// * `Ok(Session)` - Ready to run; no network traffic has happened yet
    /// * `Err(LeechError)` - Invalid configuration or HTTP client setup failure
    pub fn new(
        config: Config,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, LeechError> {
        validate(&config)?;

        let client = build_http_client(&config.api)?;
        let search_url = Url::parse(&config.api.search_url)?;

        Ok(Self {
            fetcher: PageFetcher::new(client, search_url),
            config,
            username: username.into(),
            password: password.into(),
            credential: AsyncMutex::new(None),
            state: Mutex::new(SessionState::Unauthenticated),
            active: AtomicBool::new(false),
            stop: StopSignal::new(),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }

    /// The configuration this session was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A handle that can stop this session from another task (e.g. a signal handler)
    pub fn stop_handle(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Requests a cooperative stop
    ///
    /// Workers finish the page they are fetching and take no new ones. The
    /// state is left alone; a run started after this returns an empty,
    /// cancelled report without logging in.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Logs in, or returns the cached credential
    ///
    /// Exactly one login attempt is made per session: a failure moves the
    /// session to `Stopped`. Concurrent callers wait for the first attempt.
    pub async fn authenticate(&self) -> Result<Credential, LeechError> {
        let mut cached = self.credential.lock().await;
        if let Some(credential) = cached.as_ref() {
            return Ok(credential.clone());
        }

        let current = self.state();
        if current != SessionState::Unauthenticated {
            return Err(LeechError::InvalidTransition {
                from: current,
                to: SessionState::Authenticated,
            });
        }

        let result = authenticate(
            self.fetcher.client(),
            &self.config.api.login_url,
            &self.username,
            &self.password,
        )
        .await;

        match result {
            Ok(credential) => {
                self.transition(SessionState::Authenticated)?;
                *cached = Some(credential.clone());
                tracing::info!("Authenticated as {}", self.username);
                Ok(credential)
            }
            Err(e) => {
                tracing::error!("Login failed for {}: {}", self.username, e);
                self.force_stopped();
                Err(e.into())
            }
        }
    }

    /// Runs the bulk policy and returns every match at the end
    ///
    /// Pages `1..=ceiling` are queued up front and shared by `connections`
    /// workers. A worker that hits a failing page exits; the others keep
    /// draining the queue.
    pub async fn collect(
        &self,
        query: &str,
        connections: u32,
        ceiling: u32,
    ) -> Result<LeechReport, LeechError> {
        self.run(query, connections, Pagination::Bulk { ceiling }, None)
            .await
    }

    /// Runs the streaming policy, sending each page's matches to `output`
    ///
    /// Pages are numbered from 1 up to `limit`. The report's `matches` is empty;
    /// the consumer of `output` sees everything.
    pub async fn stream(
        &self,
        query: &str,
        connections: u32,
        limit: u32,
        output: mpsc::Sender<PageBatch>,
    ) -> Result<LeechReport, LeechError> {
        self.run(query, connections, Pagination::Streaming { limit }, Some(output))
            .await
    }

    /// Runs one pass of the worker pool
    ///
    /// # Returns
    ///
    /// * `Ok(LeechReport)` - Workers ran and stopped; per-page failures are in the report.
    ///   If the stop signal was already raised, the report is empty and `cancelled`.
    /// * `Err(LeechError::AlreadyRunning)` - Another run on this session is in progress
    /// * `Err(LeechError::InvalidTransition)` - The session is already stopped
    /// * `Err(LeechError::Auth)` - Login failed; no page was requested
    pub async fn run(
        &self,
        query: &str,
        connections: u32,
        pagination: Pagination,
        output: Option<mpsc::Sender<PageBatch>>,
    ) -> Result<LeechReport, LeechError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(LeechError::AlreadyRunning);
        }
        let _active = ActiveRun(&self.active);

        let current = self.state();
        if !current.can_start() {
            return Err(match current {
                SessionState::Running => LeechError::AlreadyRunning,
                from => LeechError::InvalidTransition {
                    from,
                    to: SessionState::Running,
                },
            });
        }

        let (page_ceiling, page_limit) = match pagination {
            Pagination::Bulk { ceiling } => (ceiling, LeechConfig::default().page_limit),
            Pagination::Streaming { limit } => (LeechConfig::default().page_ceiling, limit),
        };
        validate_leech_config(&LeechConfig {
            connections,
            page_ceiling,
            page_limit,
        })?;

        let mut aggregator = Aggregator::new(query, pagination);
        if self.stop.is_stopped() {
            tracing::info!("Stop requested before the run started");
            self.force_stopped();
            return Ok(aggregator.finish(true));
        }

        let credential = self.authenticate().await?;

        if self.stop.is_stopped() {
            tracing::info!("Stop requested before workers launched");
            self.force_stopped();
            return Ok(aggregator.finish(true));
        }

        self.transition(SessionState::Running)?;
        tracing::info!(
            "Leeching '{}' with {} workers, {}",
            query,
            connections,
            pagination
        );

        let context = Arc::new(WorkerContext {
            fetcher: self.fetcher.clone(),
            credential,
            distributor: PageDistributor::new(query, pagination, self.stop.clone()),
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..connections as usize {
            let sink = match &output {
                Some(tx) => ResultSink::Stream(tx.clone()),
                None => ResultSink::Buffer(Vec::new()),
            };
            workers.spawn(run_worker(worker_id, Arc::clone(&context), sink));
        }
        // Workers hold their own senders; the consumer sees the channel close
        // once the last one exits.
        drop(output);

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(finished) => {
                    tracing::debug!(
                        "Worker {} exited: {}",
                        finished.report.worker_id,
                        finished.report.stop_reason
                    );
                    aggregator.absorb(finished);
                }
                Err(e) => tracing::error!("Worker task failed: {}", e),
            }
        }

        let report = aggregator.finish(self.stop.is_stopped());
        self.transition(SessionState::Stopped)?;

        tracing::info!(
            "Run finished: {} pages requested, {} succeeded, {} matches in {}ms",
            context.distributor.pages_issued(),
            report.pages_succeeded(),
            report.match_count,
            report.duration().num_milliseconds()
        );

        Ok(report)
    }

    fn transition(&self, next: SessionState) -> Result<(), LeechError> {
        let mut state = self.lock_state();
        if !state.can_transition_to(next) {
            return Err(LeechError::InvalidTransition {
                from: *state,
                to: next,
            });
        }
        tracing::debug!("Session {} -> {}", *state, next);
        *state = next;
        Ok(())
    }

    fn force_stopped(&self) {
        let mut state = self.lock_state();
        if !state.is_terminal() {
            tracing::debug!("Session {} -> {}", *state, SessionState::Stopped);
            *state = SessionState::Stopped;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Pulls pages until the distributor runs dry, the stop signal is raised, or a page fails
async fn run_worker(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    mut sink: ResultSink,
) -> WorkerOutput {
    let mut report = WorkerReport::new(worker_id);

    let stop_reason = loop {
        let Some(request) = ctx.distributor.next_page() else {
            break if ctx.distributor.stop_signal().is_stopped() {
                StopReason::Cancelled
            } else {
                StopReason::Exhausted
            };
        };

        let page = request.page;
        report.pages_fetched.push(page);

        match ctx.fetcher.fetch(&ctx.credential, &request).await {
            PageOutcome::Matches(matches) => {
                tracing::debug!("Worker {} page {}: {} matches", worker_id, page, matches.len());
                report.pages_succeeded += 1;
                report.match_count += matches.len();
                if !sink.accept(page, matches).await {
                    tracing::info!("Worker {}: output closed, stopping", worker_id);
                    break StopReason::SinkClosed { page };
                }
            }
            PageOutcome::Rejected { status } => {
                if (400..500).contains(&status) {
                    tracing::info!(
                        "Worker {} page {}: HTTP {}, likely past the last page",
                        worker_id,
                        page,
                        status
                    );
                } else {
                    tracing::warn!("Worker {} page {}: HTTP {}", worker_id, page, status);
                }
                break StopReason::Rejected { page, status };
            }
            PageOutcome::Malformed(error) => {
                tracing::warn!("Worker {} page {}: malformed response: {}", worker_id, page, error);
                break StopReason::Malformed { page, error };
            }
            PageOutcome::Transport(error) => {
                tracing::warn!("Worker {} page {}: {}", worker_id, page, error);
                break StopReason::Transport { page, error };
            }
        }
    };

    report.stop_reason = stop_reason;
    WorkerOutput {
        report,
        matches: sink.into_matches(),
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("state", &self.state())
            .field("stopped", &self.stop.is_stopped())
            .finish()
    }
}
