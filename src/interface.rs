//! Threaded interface for submitting and controlling path scripts.
//!
//! Each query runs on its own thread and streams rendered results back over a
//! channel. Cancellation is cooperative: the worker checks its token before
//! handing over each value, so a cancelled query stops at the next result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{QuadcladError, Result};
use crate::pathql::{Engine, Outcome, QueryResult};
use crate::store::Store;

/// One rendered result value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(pub String);

/// Cancellation token shared with the worker thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(u64);

/// Handle to a running or completed query.
pub struct QueryHandle {
    pub id: QueryId,
    cancel: CancelToken,
    started: Instant,
    join: Option<JoinHandle<Result<Outcome>>>,
    pub results: Option<Receiver<Row>>, // None when not streaming
}
impl QueryHandle {
    /// Request cancellation. The worker stops at its next result.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
    /// Waits for the query to finish.
    pub fn join(mut self) -> Result<Outcome> {
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| QuadcladError::Lock("query thread panicked".to_owned()))?,
            None => Err(QuadcladError::NotFound(format!("query {:?} already joined", self.id))),
        }
    }
    /// Drains the streamed rows and waits for the query to finish.
    pub fn collect(mut self) -> Result<QueryResult> {
        let values: Vec<String> = match self.results.take() {
            Some(rows) => rows.into_iter().map(|Row(value)| value).collect(),
            None => Vec::new(),
        };
        let outcome = self.join()?;
        Ok(QueryResult {
            values,
            row_count: outcome.row_count,
            limited: outcome.limited,
        })
    }
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

pub struct QueryOptions {
    pub stream_results: bool,
    /// Checked between results, like cancellation.
    pub timeout: Option<Duration>,
}
impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stream_results: true,
            timeout: None,
        }
    }
}

/// Registry managing query lifecycles.
pub struct QueryInterface {
    store: Arc<Store>,
    next_id: AtomicU64,
    active: Arc<Mutex<HashMap<QueryId, CancelToken>>>,
}

impl QueryInterface {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            next_id: AtomicU64::new(0),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Submits a script for execution on a background thread.
    pub fn start_query(&self, script: String, options: QueryOptions) -> Result<QueryHandle> {
        let id = QueryId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let cancel = CancelToken::new();
        self.active.lock()?.insert(id, cancel.clone());

        let (tx, rx) = if options.stream_results {
            let (tx, rx) = mpsc::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        let store = Arc::clone(&self.store);
        let active = Arc::clone(&self.active);
        let token = cancel.clone();
        let started = Instant::now();
        let deadline = options.timeout.map(|timeout| started + timeout);
        let join = std::thread::spawn(move || {
            let engine = Engine::new(&store);
            let outcome = engine.execute(&script, |value| {
                if token.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
                    return false;
                }
                match &tx {
                    // a dropped receiver means nobody is listening any more
                    Some(tx) => tx.send(Row(value)).is_ok(),
                    None => true,
                }
            });
            match active.lock() {
                Ok(mut active) => {
                    active.remove(&id);
                }
                Err(e) => warn!(error = %e, "could not deregister query"),
            }
            if let Ok(outcome) = &outcome {
                debug!(?id, rows = outcome.row_count, stopped = outcome.stopped, "query finished");
            }
            outcome
        });

        Ok(QueryHandle {
            id,
            cancel,
            started,
            join: Some(join),
            results: rx,
        })
    }

    /// Runs a script on the current thread.
    pub fn run_sync(&self, script: &str) -> Result<QueryResult> {
        Engine::new(&self.store).execute_collect(script)
    }

    /// Cancels a query by id; false when it is not running.
    pub fn cancel(&self, id: QueryId) -> Result<bool> {
        Ok(match self.active.lock()?.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        })
    }
    pub fn active_count(&self) -> Result<usize> {
        Ok(self.active.lock()?.len())
    }
}
