//! Test utilities for have-posts integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Semaphore};
use tracing::Level;

pub use ankurah_signals::Subscribe;
pub use have_posts::{
    Error, FetchError, Fetcher, ListQuery, LoadOutcome, LoadState, LoadedSet, LoopConfig, Post, PostLoop, Query,
    Scalar,
};

pub const API: &str = "http://example.jp";
const WAIT: Duration = Duration::from_secs(5);

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() {
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Fixtures
// ============================================================================

/// A post shaped like the API's, with id `n`
pub fn post(n: u32) -> Post {
    serde_json::from_value(serde_json::json!({
        "id": n,
        "slug": format!("post-{}", n),
        "title": {"rendered": format!("Title({})", n)},
        "content": {"rendered": format!("<p>Hello World({})</p>", n)},
        "excerpt": {"rendered": format!("<p>This is the excerpt. ({})</p>", n)},
        "date_gmt": "2016-02-16T13:54:13"
    }))
    .expect("fixture post")
}

pub fn posts(ids: impl IntoIterator<Item = u32>) -> Vec<Post> {
    ids.into_iter().map(post).collect()
}

pub fn ids(items: &[Post]) -> Vec<String> {
    items.iter().map(|p| p.id.clone()).collect()
}

pub fn list_query<F: Fetcher>(post_loop: &PostLoop<F>) -> ListQuery {
    post_loop.query().as_list().cloned().expect("list query")
}

// ============================================================================
// MockFetcher
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    Page(ListQuery),
    One { endpoint: String, id: String },
}

#[derive(Default)]
struct MockState {
    pages: Mutex<VecDeque<Result<Vec<Post>, FetchError>>>,
    single: Mutex<Option<Result<Post, FetchError>>>,
    requests: Mutex<Vec<Request>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

/// Scripted fetcher. Pages are served in the order they were queued; once the
/// queue runs dry every page is empty. Clones share the same script.
#[derive(Clone, Default)]
pub struct MockFetcher {
    inner: Arc<MockState>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(pages: impl IntoIterator<Item = Vec<Post>>) -> Self {
        let fetcher = Self::new();
        for page in pages {
            fetcher.push_page(page);
        }
        fetcher
    }

    pub fn push_page(&self, page: Vec<Post>) {
        self.inner.pages.lock().unwrap().push_back(Ok(page));
    }

    pub fn push_error(&self, err: FetchError) {
        self.inner.pages.lock().unwrap().push_back(Err(err));
    }

    pub fn set_single(&self, result: Result<Post, FetchError>) {
        *self.inner.single.lock().unwrap() = Some(result);
    }

    /// Hold every fetch until a permit is added to the returned semaphore.
    pub fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.inner.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn requests(&self) -> Vec<Request> {
        self.inner.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.inner.requests.lock().unwrap().len()
    }

    /// Offsets of every page requested so far
    pub fn offsets(&self) -> Vec<u64> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Page(q) => Some(q.offset),
                Request::One { .. } => None,
            })
            .collect()
    }

    async fn pass_gate(&self) {
        let gate = self.inner.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
    }
}

impl Fetcher for MockFetcher {
    type Item = Post;

    async fn fetch_page(&self, query: &ListQuery) -> Result<Vec<Post>, FetchError> {
        self.inner.requests.lock().unwrap().push(Request::Page(query.clone()));
        self.pass_gate().await;
        let next = self.inner.pages.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_one(&self, endpoint: &str, id: &str) -> Result<Post, FetchError> {
        self.inner.requests.lock().unwrap().push(Request::One {
            endpoint: endpoint.to_string(),
            id: id.to_string(),
        });
        self.pass_gate().await;
        let next = self.inner.single.lock().unwrap().take();
        next.unwrap_or_else(|| Err(FetchError::Status { status: 404, url: format!("{}/{}", endpoint, id) }))
    }
}

// ============================================================================
// Waiting helpers
// ============================================================================

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Let every ready task on the runtime run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// Receives every `LoadedSet` a loop publishes, like a renderer would.
pub struct Watcher<I: Clone + Send + Sync + 'static> {
    rx: mpsc::UnboundedReceiver<LoadedSet<I>>,
    _guard: ankurah_signals::SubscriptionGuard,
}

impl<I: Clone + Send + Sync + 'static> Watcher<I> {
    pub fn new<F: Fetcher<Item = I>>(post_loop: &PostLoop<F>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let guard = post_loop.loaded_set().subscribe(move |set: LoadedSet<I>| {
            let _ = tx.send(set);
        });
        Self { rx, _guard: guard }
    }

    /// Wait for a published set matching `pred`, checking the live state first.
    pub async fn until<F: Fetcher<Item = I>>(
        &mut self,
        post_loop: &PostLoop<F>,
        pred: impl Fn(&LoadedSet<I>) -> bool,
    ) -> LoadedSet<I> {
        let current = post_loop.snapshot();
        if pred(&current) {
            return current;
        }
        tokio::time::timeout(WAIT, async {
            loop {
                let set = self.rx.recv().await.expect("signal closed");
                if pred(&set) {
                    return set;
                }
            }
        })
        .await
        .expect("no matching loaded set published")
    }

    /// Everything published since the last call
    pub fn drain(&mut self) -> Vec<LoadedSet<I>> {
        let mut sets = Vec::new();
        while let Ok(set) = self.rx.try_recv() {
            sets.push(set);
        }
        sets
    }
}

// ============================================================================
// One-shot HTTP server
// ============================================================================

/// Serve a single HTTP response on a local port.
///
/// Returns the base url and a task resolving to the request line that was received.
pub async fn serve_once(status: u16, body: String) -> (String, impl Future<Output = String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.expect("read");
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 {} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.expect("write");
        socket.shutdown().await.ok();
        let text = String::from_utf8_lossy(&raw).to_string();
        text.lines().next().unwrap_or_default().to_string()
    });
    (format!("http://{}/wp-json/wp/v2", addr), async move { task.await.expect("server task") })
}
