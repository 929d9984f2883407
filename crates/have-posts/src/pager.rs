//! Pagination state machine
//!
//! Pure bookkeeping for one loop: which query goes out next and whether a
//! request may be issued at all. No I/O happens here.
//!
//! ```text
//! Idle --begin--> Fetching --non-empty page--> Idle (offset += per_page)
//!                 Fetching --empty page------> Exhausted
//!                 Fetching --offset at limit-> Exhausted
//!                 Fetching --failure---------> Idle (offset unchanged)
//! Fetching/Exhausted --begin--> no-op
//! ```

use crate::query::{ListQuery, Query};

/// Where the loop is in its request cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// Ready to issue the next request
    Idle,
    /// A request is in flight; further loads are ignored
    Fetching,
    /// Nothing more to load (an empty page came back, or the single item was fetched)
    Exhausted,
}

#[derive(Clone, Debug)]
pub struct Pager {
    query: Query,
    state: LoadState,
}

impl Pager {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            state: LoadState::Idle,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == LoadState::Fetching
    }

    /// Claim the next page. Returns the query to send, or `None` when the
    /// loop is busy, exhausted, or in single-item mode.
    pub fn begin_page(&mut self) -> Option<ListQuery> {
        if self.state != LoadState::Idle {
            return None;
        }
        let request = self.query.as_list()?.clone();
        self.state = LoadState::Fetching;
        Some(request)
    }

    /// Claim the single-item fetch. Returns `(endpoint, id)` once.
    pub fn begin_single(&mut self) -> Option<(String, String)> {
        if self.state != LoadState::Idle {
            return None;
        }
        match &self.query {
            Query::Single { endpoint, id } => {
                let request = (endpoint.clone(), id.clone());
                self.state = LoadState::Fetching;
                Some(request)
            }
            Query::List(_) => None,
        }
    }

    /// Record a successful response carrying `received` items.
    pub fn complete(&mut self, received: usize) -> LoadState {
        debug_assert!(self.is_busy(), "complete() without a request in flight");
        self.state = match &mut self.query {
            Query::Single { .. } => LoadState::Exhausted,
            Query::List(_) if received == 0 => LoadState::Exhausted,
            Query::List(list) => {
                if list.advance() {
                    LoadState::Idle
                } else {
                    tracing::warn!("{}: offset {} is at the limit, no further pages", list.endpoint, list.offset);
                    LoadState::Exhausted
                }
            }
        };
        self.state
    }

    /// Record a failed request; the same page will be requested again.
    pub fn fail(&mut self) {
        if self.state == LoadState::Fetching {
            self.state = LoadState::Idle;
        }
    }
}
