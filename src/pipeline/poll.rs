// src/pipeline/poll.rs

//! Poll loop.
//!
//! A [`Poller`] owns the cursor and walks one cycle at a time:
//!
//! ```text
//! Idle ──tick──▶ Fetching ──full page──▶ Paging ──▶ Fetching ...
//!                   │                                  │
//!                   └──partial / empty / error──▶ Sleeping ◀┘
//! ```
//!
//! Ticks arrive as [`PollerCommand`]s on a capacity-1 channel. Cycles run
//! inline in [`Poller::run`], so they never overlap; a tick that shows up
//! while a cycle runs is dropped by the ticker or drained once the cycle
//! ends, so they never queue up either.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::{Config, CycleOutcome, CycleReport, PostId, ProjectPattern, SearchQuery};
use crate::pipeline::extract::extract;
use crate::pipeline::merge::Merger;
use crate::services::SearchClient;
use crate::storage::RecordStore;

/// Poller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Paging,
    Sleeping,
}

/// Messages accepted by [`Poller::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerCommand {
    /// Interval elapsed
    Tick,
    /// Poll right away, outside the schedule
    PollNow,
}

/// Channel carrying commands into a running poller.
pub fn command_channel() -> (mpsc::Sender<PollerCommand>, mpsc::Receiver<PollerCommand>) {
    mpsc::channel(1)
}

/// Drives search, extraction and merging for one hashtag.
pub struct Poller {
    client: Arc<dyn SearchClient>,
    merger: Merger,
    allowlist: HashSet<String>,
    pattern: ProjectPattern,
    hashtag: String,
    page_size: usize,
    max_pages: Option<usize>,
    cursor: PostId,
    state: PollState,
}

impl Poller {
    /// Create a poller from configuration.
    pub fn new(config: &Config, client: Arc<dyn SearchClient>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            client,
            merger: Merger::new(store, config.poller.merge_concurrency),
            allowlist: config.allowlist_set(),
            pattern: ProjectPattern::new(),
            hashtag: config.poller.hashtag.clone(),
            page_size: config.poller.page_size,
            max_pages: config.poller.max_pages.map(|cap| cap.max(1)),
            cursor: 0,
            state: PollState::Idle,
        }
    }

    /// Start from a known cursor instead of 0.
    pub fn with_cursor(mut self, cursor: PostId) -> Self {
        self.cursor = cursor;
        self
    }

    /// Highest post id covered by a completed cycle.
    pub fn cursor(&self) -> PostId {
        self.cursor
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Run one cycle, following full pages until a partial page arrives.
    ///
    /// The cursor only moves when the cycle reached the end of the results.
    /// After a failed fetch or a configured page cap the next cycle searches
    /// the same window again.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::start(self.cursor);
        let mut query = SearchQuery::recent(&self.hashtag, self.page_size, self.cursor);
        let mut high_water = self.cursor;
        self.state = PollState::Fetching;

        let outcome = loop {
            let page_started = Instant::now();
            let response = match self.client.search(&query).await {
                Ok(response) => response,
                Err(e) => {
                    log::error!("Search failed on page {}: {}", report.pages + 1, e);
                    break CycleOutcome::Failed;
                }
            };
            report.pages += 1;
            report.posts += response.posts.len();

            if response.posts.is_empty() {
                break if report.pages == 1 {
                    CycleOutcome::Empty
                } else {
                    CycleOutcome::Completed
                };
            }

            let batch = extract(&response, &self.allowlist, &self.pattern);
            let summary = self.merger.merge_all(&batch).await;
            report.projects_updated += summary.projects_updated;
            report.ids_added += summary.ids_added;
            report.merge_failures += summary.failures;
            high_water = high_water.max(response.next_cursor_hint);

            log::debug!(
                "Page {}: {} posts, {} projects referenced in {:?}",
                report.pages,
                response.posts.len(),
                batch.len(),
                page_started.elapsed()
            );

            if !response.is_full_page() {
                break CycleOutcome::Completed;
            }
            if self.max_pages.is_some_and(|cap| report.pages >= cap) {
                log::warn!(
                    "Stopping after {} full pages; ids older than post {} may be missing, cursor stays at {}",
                    report.pages,
                    response.last_post_id().unwrap_or_default(),
                    self.cursor
                );
                break CycleOutcome::PageLimit;
            }

            match response.last_post_id().and_then(|id| query.next_page(id)) {
                Some(next) => {
                    self.state = PollState::Paging;
                    query = next;
                }
                None => break CycleOutcome::Completed,
            }
        };

        if outcome == CycleOutcome::Completed && high_water > self.cursor {
            log::debug!("Cursor {} -> {}", self.cursor, high_water);
            self.cursor = high_water;
        }

        self.state = PollState::Sleeping;
        report.finish(outcome, self.cursor)
    }

    /// Serve commands until `shutdown` flips to true or the channel closes.
    ///
    /// A cycle in progress always runs to completion before shutdown.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<PollerCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        log::info!("Poller started for '{}'", self.hashtag);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let command = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            log::debug!("{:?}: starting cycle", command);
            let report = self.run_cycle().await;
            log_report(&report);

            let mut skipped = 0;
            while let Ok(command) = commands.try_recv() {
                log::debug!("Skipping {:?} that arrived during the cycle", command);
                skipped += 1;
            }
            if skipped > 0 {
                log::debug!("Coalesced {} commands", skipped);
            }
        }

        log::info!("Poller stopped at cursor {}", self.cursor);
        self
    }
}

/// Send a tick every `interval`, dropping ticks the poller is not ready for.
///
/// The first tick fires immediately.
pub fn spawn_ticker(
    interval: Duration,
    commands: mpsc::Sender<PollerCommand>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => match commands.try_send(PollerCommand::Tick) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        log::debug!("Tick dropped: previous cycle still running");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                },
            }
        }
    })
}

fn log_report(report: &CycleReport) {
    match report.outcome {
        CycleOutcome::Failed => log::warn!(
            "Cycle failed after {} pages; cursor stays at {}",
            report.pages,
            report.cursor_after
        ),
        CycleOutcome::Empty => log::info!("Cycle: no new posts ({} ms)", report.elapsed_ms()),
        CycleOutcome::PageLimit => log::warn!(
            "Cycle hit the page cap after {} pages (+{} ids); cursor stays at {}",
            report.pages,
            report.ids_added,
            report.cursor_after
        ),
        _ => log::info!(
            "Cycle: {} pages, {} posts, {} projects updated (+{} ids), cursor {} ({} ms)",
            report.pages,
            report.posts,
            report.projects_updated,
            report.ids_added,
            report.cursor_after,
            report.elapsed_ms()
        ),
    }
    if report.merge_failures > 0 {
        log::warn!("{} project updates dropped this cycle", report.merge_failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::{Notify, Semaphore};

    use crate::error::{AppError, Result};
    use crate::models::{Post, ProjectId, SearchResponse};
    use crate::storage::MemoryStorage;

    /// Replays canned pages and records every query.
    #[derive(Default)]
    struct ScriptedClient {
        pages: Mutex<VecDeque<Result<SearchResponse>>>,
        queries: Mutex<Vec<SearchQuery>>,
    }

    impl ScriptedClient {
        fn new(pages: Vec<Result<SearchResponse>>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.into()),
                queries: Mutex::new(Vec::new()),
            })
        }

        fn queries(&self) -> Vec<SearchQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchClient for ScriptedClient {
        async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
            self.queries.lock().unwrap().push(query.clone());
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(SearchResponse::default()))
        }
    }

    fn config(page_size: usize) -> Config {
        let mut config = Config {
            allowlist: vec!["trusted".into()],
            ..Config::default()
        };
        config.poller.hashtag = "#tagwatch".into();
        config.poller.page_size = page_size;
        config
    }

    fn post(id: PostId, hashtags: &[&str]) -> Post {
        Post {
            id,
            author: "Trusted".into(),
            is_repost: false,
            hashtags: hashtags.iter().map(|h| h.to_string()).collect(),
        }
    }

    fn page(posts: Vec<Post>, requested_count: usize) -> SearchResponse {
        SearchResponse {
            next_cursor_hint: posts.iter().map(|p| p.id).max().unwrap_or(0),
            requested_count,
            posts,
        }
    }

    fn key(digits: &str) -> ProjectId {
        ProjectId::from_digits(digits).unwrap()
    }

    fn poller(
        config: &Config,
        client: Arc<ScriptedClient>,
        store: Arc<MemoryStorage>,
    ) -> Poller {
        Poller::new(config, client, store)
    }

    #[tokio::test]
    async fn test_partial_page_ends_cycle() {
        let client = ScriptedClient::new(vec![Ok(page(vec![post(50, &["ID12345678"])], 2))]);
        let store = Arc::new(MemoryStorage::new());
        let mut poller = poller(&config(2), client.clone(), store.clone());

        let report = poller.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(client.queries().len(), 1);
        assert_eq!(poller.cursor(), 50);
        assert_eq!(poller.state(), PollState::Sleeping);
        assert_eq!(store.get(&key("12345678")), Some(vec![50]));
    }

    #[tokio::test]
    async fn test_full_page_fetches_exactly_one_follow_up() {
        let client = ScriptedClient::new(vec![
            Ok(page(
                vec![post(300, &["ID12345678"]), post(200, &["news"])],
                2,
            )),
            Ok(page(vec![post(100, &["id12345678"])], 2)),
        ]);
        let store = Arc::new(MemoryStorage::new());
        let mut poller = poller(&config(2), client.clone(), store.clone());

        let report = poller.run_cycle().await;

        let queries = client.queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].since_id, None);
        assert_eq!(queries[0].max_id, None);
        assert_eq!(queries[1].max_id, Some(199));
        assert_eq!(queries[1].since_id, None);
        assert_eq!(queries[1].result_type, "recent");

        assert_eq!(report.pages, 2);
        assert_eq!(report.ids_added, 2);
        assert_eq!(poller.cursor(), 300);
        assert_eq!(store.get(&key("12345678")), Some(vec![100, 300]));
    }

    #[tokio::test]
    async fn test_empty_page_leaves_cursor() {
        let client = ScriptedClient::new(vec![Ok(SearchResponse {
            posts: Vec::new(),
            next_cursor_hint: 999,
            requested_count: 2,
        })]);
        let store = Arc::new(MemoryStorage::new());
        let mut poller = poller(&config(2), client.clone(), store.clone()).with_cursor(10);

        let report = poller.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::Empty);
        assert_eq!(poller.cursor(), 10);
        assert_eq!(store.write_count(), 0);
        assert_eq!(client.queries()[0].since_id, Some(10));
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_cursor_and_sleeps() {
        let client = ScriptedClient::new(vec![Err(AppError::upstream(503, "over capacity"))]);
        let store = Arc::new(MemoryStorage::new());
        let mut poller = poller(&config(2), client.clone(), store.clone()).with_cursor(7);

        let report = poller.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::Failed);
        assert_eq!(report.pages, 0);
        assert_eq!(poller.cursor(), 7);
        assert_eq!(poller.state(), PollState::Sleeping);
        assert_eq!(client.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_on_second_page_keeps_first_page_data() {
        let client = ScriptedClient::new(vec![
            Ok(page(vec![post(300, &["ID12345678"]), post(290, &[])], 2)),
            Err(AppError::malformed("truncated body")),
        ]);
        let store = Arc::new(MemoryStorage::new());
        let mut poller = poller(&config(2), client.clone(), store.clone());

        let report = poller.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::Failed);
        assert_eq!(client.queries().len(), 2);
        assert_eq!(poller.cursor(), 0);
        assert_eq!(store.get(&key("12345678")), Some(vec![300]));
    }

    #[tokio::test]
    async fn test_cursor_never_moves_backwards() {
        let client = ScriptedClient::new(vec![
            Ok(page(vec![post(500, &[])], 10)),
            Ok(SearchResponse {
                posts: vec![post(400, &[])],
                next_cursor_hint: 400,
                requested_count: 10,
            }),
            Ok(page(vec![post(800, &[])], 10)),
        ]);
        let store = Arc::new(MemoryStorage::new());
        let mut poller = poller(&config(10), client.clone(), store);

        let mut previous = poller.cursor();
        for _ in 0..3 {
            poller.run_cycle().await;
            assert!(poller.cursor() >= previous);
            previous = poller.cursor();
        }

        assert_eq!(poller.cursor(), 800);
        let queries = client.queries();
        assert_eq!(queries[1].since_id, Some(500));
        assert_eq!(queries[2].since_id, Some(500));
    }

    #[tokio::test]
    async fn test_page_limit_keeps_cursor_so_older_posts_are_fetched_later() {
        let full = |hi: PostId| Ok(page(vec![post(hi, &[]), post(hi - 10, &[])], 2));
        let client = ScriptedClient::new(vec![
            full(100),
            full(80),
            // Next cycle, same window again without the cap getting in the way.
            full(100),
            full(80),
            Ok(page(vec![post(60, &["ID12345678"])], 2)),
        ]);
        let store = Arc::new(MemoryStorage::new());
        let mut config = config(2);
        config.poller.max_pages = Some(2);
        let mut poller = poller(&config, client.clone(), store.clone()).with_cursor(10);

        let report = poller.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::PageLimit);
        assert_eq!(client.queries().len(), 2);
        assert_eq!(poller.cursor(), 10);
        assert_eq!(report.cursor_after, 10);
        assert_eq!(store.get(&key("12345678")), None);

        poller.max_pages = None;
        let report = poller.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(client.queries()[2].since_id, Some(10));
        assert_eq!(poller.cursor(), 100);
        assert_eq!(store.get(&key("12345678")), Some(vec![60]));
    }

    #[tokio::test]
    async fn test_pages_are_unbounded_by_default() {
        let full = |hi: PostId| Ok(page(vec![post(hi, &[]), post(hi - 1, &[])], 2));
        let mut pages: Vec<_> = (0..60).map(|i| full(10_000 - i * 10)).collect();
        pages.push(Ok(page(vec![post(5, &["ID12345678"])], 2)));
        let client = ScriptedClient::new(pages);
        let store = Arc::new(MemoryStorage::new());
        let mut poller = poller(&config(2), client.clone(), store.clone());

        let report = poller.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(report.pages, 61);
        assert_eq!(poller.cursor(), 10_000);
        assert_eq!(store.get(&key("12345678")), Some(vec![5]));
    }

    #[tokio::test]
    async fn test_reposts_and_strangers_are_not_stored() {
        let mut repost = post(20, &["ID12345678"]);
        repost.is_repost = true;
        let mut stranger = post(10, &["ID12345678"]);
        stranger.author = "someone_else".into();
        let client = ScriptedClient::new(vec![Ok(page(vec![repost, stranger], 5))]);
        let store = Arc::new(MemoryStorage::new());
        let mut poller = poller(&config(5), client, store.clone());

        let report = poller.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(store.write_count(), 0);
        assert_eq!(poller.cursor(), 20);
    }

    /// Blocks every search until the test releases it.
    struct GatedClient {
        calls: AtomicUsize,
        entered: Notify,
        gate: Semaphore,
    }

    #[async_trait]
    impl SearchClient for GatedClient {
        async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.gate.acquire().await.expect("gate open").forget();
            Ok(SearchResponse {
                posts: Vec::new(),
                next_cursor_hint: 0,
                requested_count: query.count,
            })
        }
    }

    #[tokio::test]
    async fn test_ticks_during_cycle_are_coalesced() {
        let client = Arc::new(GatedClient {
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            gate: Semaphore::new(0),
        });
        let poller = Poller::new(&config(2), client.clone(), Arc::new(MemoryStorage::new()));
        let (commands, receiver) = command_channel();
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(poller.run(receiver, stop_rx));

        commands.send(PollerCommand::Tick).await.unwrap();
        client.entered.notified().await;

        // Arrives while the first cycle is blocked in search.
        commands.try_send(PollerCommand::Tick).unwrap();
        assert!(commands.try_send(PollerCommand::Tick).is_err());

        client.gate.add_permits(1);
        stop.send(true).unwrap();
        let poller = task.await.unwrap();

        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(poller.state(), PollState::Sleeping);
    }

    #[tokio::test]
    async fn test_poll_now_runs_a_cycle() {
        let client = ScriptedClient::new(vec![Ok(page(vec![post(42, &["ID00000042"])], 5))]);
        let store = Arc::new(MemoryStorage::new());
        let poller = poller(&config(5), client.clone(), store.clone());
        let (commands, receiver) = command_channel();
        let (_stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(poller.run(receiver, stop_rx));

        commands.send(PollerCommand::PollNow).await.unwrap();
        drop(commands);
        let poller = task.await.unwrap();

        assert_eq!(poller.cursor(), 42);
        assert_eq!(store.get(&key("00000042")), Some(vec![42]));
    }

    #[tokio::test]
    async fn test_shutdown_before_any_tick() {
        let client = ScriptedClient::new(Vec::new());
        let poller = poller(&config(5), client.clone(), Arc::new(MemoryStorage::new()));
        let (_commands, receiver) = command_channel();
        let (stop, stop_rx) = watch::channel(false);
        stop.send(true).unwrap();

        let poller = poller.run(receiver, stop_rx).await;

        assert!(client.queries().is_empty());
        assert_eq!(poller.state(), PollState::Idle);
    }
}
