//! have-posts - an infinite-scroll post loop for WP REST APIs
//!
//! [`PostLoop`] owns the query for one rendered loop, fetches pages through a
//! [`Fetcher`], accumulates the items, and publishes a [`LoadedSet`] signal for
//! the renderer. The host calls [`PostLoop::load`] (or
//! [`LoopHandle::on_near_end`]) whenever the viewport nears the end of the list.

pub mod config;
pub mod error;
pub mod fetch;
pub mod pager;
pub mod post;
pub mod query;
pub mod render;
pub mod tags;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ankurah_signals::{Mut, Peek, Read};
use tokio::task::JoinSet;

pub use config::LoopConfig;
pub use error::{Error, FetchError, Result};
pub use fetch::{Fetcher, RestClient};
pub use pager::LoadState;
pub use post::Post;
pub use query::{ListQuery, Query, Scalar};
pub use render::Fragment;
pub use tags::{TagRegistry, TemplateTag};

pub use ankurah_signals;

// ============================================================================
// Core Types
// ============================================================================

/// What the renderer sees of a loop
#[derive(Clone, Debug)]
pub struct LoadedSet<I> {
    /// Every item fetched so far, in page order
    pub items: Vec<I>,
    /// A request is in flight
    pub busy: bool,
    /// No further pages will be requested
    pub exhausted: bool,
    /// Message of the most recent failed fetch, cleared by the next success
    pub error: Option<String>,
}

impl<I> Default for LoadedSet<I> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            busy: false,
            exhausted: false,
            error: None,
        }
    }
}

/// Result of a call to [`PostLoop::load`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page with this many items was appended
    Loaded(usize),
    /// The server returned an empty page; the loop is now exhausted
    Exhausted,
    /// Nothing was requested (busy, exhausted, or single-item mode)
    Skipped,
}

struct LoopState<I> {
    pager: pager::Pager,
    items: Vec<I>,
    error: Option<String>,
}

// ============================================================================
// PostLoop
// ============================================================================

/// Paginated query controller for one rendered loop
pub struct PostLoop<F: Fetcher> {
    fetcher: F,
    post_type: String,
    state: Mutex<LoopState<F::Item>>,
    loaded_set: Mut<LoadedSet<F::Item>>,
    /// Serializes snapshot-then-set so publishes land in state order
    publishing: Mutex<()>,
}

impl<F: Fetcher> PostLoop<F> {
    /// Create a loop. Nothing is fetched until [`start`](Self::start) or
    /// [`load`](Self::load) runs; use [`launch`](Self::launch) to start right away.
    pub fn new(config: &LoopConfig, fetcher: F) -> Result<Self> {
        let query = Query::from_config(config)?;
        tracing::debug!("new loop: {:?}", query);
        Ok(Self {
            fetcher,
            post_type: query.endpoint().to_string(),
            state: Mutex::new(LoopState {
                pager: pager::Pager::new(query),
                items: Vec::new(),
                error: None,
            }),
            loaded_set: Mut::new(LoadedSet::default()),
            publishing: Mutex::new(()),
        })
    }

    /// Create a loop and spawn its initial fetch.
    ///
    /// Must be called from within a tokio runtime.
    pub fn launch(config: &LoopConfig, fetcher: F) -> Result<LoopHandle<F>> {
        let handle = LoopHandle::new(Arc::new(Self::new(config, fetcher)?));
        handle.spawn_start();
        Ok(handle)
    }

    /// Run the initial fetch: the item in single-item mode, otherwise the first page.
    pub async fn start(&self) -> Result<()> {
        let single = self.lock().pager.begin_single();
        let Some((endpoint, id)) = single else {
            return self.load().await.map(|_| ());
        };

        let mut guard = InFlight::new(self);
        self.publish();
        tracing::debug!("fetching {} {}", endpoint, id);
        let result = self.fetcher.fetch_one(&endpoint, &id).await;
        guard.disarm();

        match result {
            Ok(item) => {
                {
                    let mut state = self.lock();
                    state.items.push(item);
                    state.error = None;
                    state.pager.complete(1);
                }
                self.publish();
                Ok(())
            }
            Err(err) => Err(self.record_failure(err)),
        }
    }

    /// Fetch the next page and append it.
    ///
    /// A no-op while a request is in flight or after the loop is exhausted, so
    /// scroll handlers can call this freely.
    pub async fn load(&self) -> Result<LoadOutcome> {
        let request = self.lock().pager.begin_page();
        let Some(request) = request else {
            tracing::debug!("load skipped: state={:?}", self.state());
            return Ok(LoadOutcome::Skipped);
        };

        let mut guard = InFlight::new(self);
        self.publish();
        tracing::debug!(
            "load: endpoint={}, offset={}, per_page={}",
            request.endpoint,
            request.offset,
            request.per_page
        );
        let result = self.fetcher.fetch_page(&request).await;
        guard.disarm();

        match result {
            Ok(items) => {
                let received = items.len();
                let next = {
                    let mut state = self.lock();
                    state.items.extend(items);
                    state.error = None;
                    state.pager.complete(received)
                };
                tracing::debug!("load: received {} items, state={:?}", received, next);
                self.publish();
                Ok(match received {
                    0 => LoadOutcome::Exhausted,
                    n => LoadOutcome::Loaded(n),
                })
            }
            Err(err) => Err(self.record_failure(err)),
        }
    }

    fn record_failure(&self, err: FetchError) -> Error {
        tracing::warn!("fetch for {} failed: {}", self.post_type, err);
        {
            let mut state = self.lock();
            state.pager.fail();
            state.error = Some(err.to_string());
        }
        self.publish();
        Error::Fetch(err)
    }

    fn lock(&self) -> MutexGuard<'_, LoopState<F::Item>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push the current state to subscribers. Never called with the state lock held.
    ///
    /// The snapshot is taken after acquiring the publish lock, so a slower
    /// publisher can never overwrite a newer state with an older one.
    fn publish(&self) {
        let _publishing = self.publishing.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        self.loaded_set.set(snapshot);
    }

    // Accessors
    pub fn loaded_set(&self) -> Read<LoadedSet<F::Item>> {
        self.loaded_set.read()
    }

    /// Current state read directly, bypassing the signal
    pub fn snapshot(&self) -> LoadedSet<F::Item> {
        let state = self.lock();
        LoadedSet {
            items: state.items.clone(),
            busy: state.pager.is_busy(),
            exhausted: state.pager.state() == LoadState::Exhausted,
            error: state.error.clone(),
        }
    }

    /// Last published value of the signal
    pub fn published(&self) -> LoadedSet<F::Item> {
        self.loaded_set.peek()
    }

    pub fn items(&self) -> Vec<F::Item> {
        self.lock().items.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> LoadState {
        self.lock().pager.state()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().pager.is_busy()
    }

    /// The query the next load will send
    pub fn query(&self) -> Query {
        self.lock().pager.query().clone()
    }

    /// Page size, `None` in single-item mode
    pub fn per_page(&self) -> Option<u32> {
        self.lock().pager.query().as_list().map(|q| q.per_page)
    }

    pub fn post_type(&self) -> &str {
        &self.post_type
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

/// Releases the busy state if a fetch future is dropped before it resolves.
struct InFlight<'a, F: Fetcher> {
    owner: &'a PostLoop<F>,
    armed: bool,
}

impl<'a, F: Fetcher> InFlight<'a, F> {
    fn new(owner: &'a PostLoop<F>) -> Self {
        Self { owner, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<F: Fetcher> Drop for InFlight<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("fetch for {} cancelled", self.owner.post_type);
            self.owner.lock().pager.fail();
            self.owner.publish();
        }
    }
}

impl PostLoop<RestClient> {
    /// Create a loop that fetches from `config.api_root`.
    pub fn connect(config: &LoopConfig) -> Result<Self> {
        let api_root = config.api_root.trim();
        if api_root.is_empty() {
            return Err(Error::Configuration("api root is required".into()));
        }
        fetch::parse_api_root(api_root).map_err(|e| Error::Configuration(e.to_string()))?;
        let client = RestClient::new(api_root)?;
        Self::new(config, client)
    }

    /// [`connect`](Self::connect) and spawn the initial fetch.
    pub fn launch_connected(config: &LoopConfig) -> Result<LoopHandle<RestClient>> {
        let handle = LoopHandle::new(Arc::new(Self::connect(config)?));
        handle.spawn_start();
        Ok(handle)
    }
}

// ============================================================================
// LoopHandle
// ============================================================================

/// Owner of a launched loop. Dropping it aborts any fetch still in flight.
pub struct LoopHandle<F: Fetcher> {
    inner: Arc<PostLoop<F>>,
    tasks: Mutex<JoinSet<()>>,
}

impl<F: Fetcher> LoopHandle<F> {
    pub fn new(inner: Arc<PostLoop<F>>) -> Self {
        Self {
            inner,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Scroll-proximity entry point: spawn a [`PostLoop::load`] in the background.
    pub fn on_near_end(&self) {
        let post_loop = self.inner.clone();
        self.spawn(async move {
            // failures are published on the loaded set
            let _ = post_loop.load().await;
        });
    }

    fn spawn_start(&self) {
        let post_loop = self.inner.clone();
        self.spawn(async move {
            let _ = post_loop.start().await;
        });
    }

    fn spawn(&self, task: impl std::future::Future<Output = ()> + Send + 'static) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    pub fn shared(&self) -> Arc<PostLoop<F>> {
        self.inner.clone()
    }
}

impl<F: Fetcher> std::ops::Deref for LoopHandle<F> {
    type Target = PostLoop<F>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<F: Fetcher> Drop for LoopHandle<F> {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            tracing::debug!("tearing down {} loop, aborting {} task(s)", self.inner.post_type, tasks.len());
        }
        tasks.abort_all();
    }
}
