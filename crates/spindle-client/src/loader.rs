//! Memoized asynchronous resource loading.
//!
//! A [`ResourceScope`] hands out at most one underlying fetch per key.
//! The first request stores a shared future before anything is awaited,
//! so every later request for the same key, however it interleaves with
//! the first, receives a clone of the same future. Entries are never
//! invalidated: callers needing fresh data discard the scope and build a
//! new one, and a settled failure stays failed for the scope's lifetime.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::watch;

use spindle_core::PollReply;

/// Error surfaced by resource fetches.
///
/// Cloneable so a memoized failure is observed identically by every
/// caller of the key.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    /// The underlying request failed.
    #[error("request for {path} failed: {reason}")]
    Fetch { path: String, reason: String },
    /// A binary transfer did not decode.
    #[error("{path}: {source}")]
    Buffer {
        path: String,
        #[source]
        source: spindle_core::BufferError,
    },
    /// A reply had the wrong shape.
    #[error("{path}: {source}")]
    Reply {
        path: String,
        #[source]
        source: spindle_core::FrameError,
    },
}

impl LoadError {
    pub(crate) fn fetch(path: &str, reason: impl ToString) -> Self {
        LoadError::Fetch {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

type SharedLoad<V> = Shared<BoxFuture<'static, Result<V, LoadError>>>;

struct Entry<V> {
    load: SharedLoad<V>,
    /// Present only for polling entries.
    progress: Option<watch::Receiver<f64>>,
}

/// One memoization scope: a map from resource key to its single pending
/// or settled load.
pub struct ResourceScope<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V> Default for ResourceScope<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ResourceScope<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> ResourceScope<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Fetch-once: await the stored future for `key`, creating it with
    /// `fetch` on first request.
    ///
    /// `fetch` is invoked at most once per key for the scope's lifetime,
    /// no matter how many callers race on the same key; the stored future
    /// is registered before the first poll, so there is no window for a
    /// second fetch to slip in.
    pub async fn get_or_load<F, Fut>(&self, key: &str, fetch: F) -> Result<V, LoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, LoadError>> + Send + 'static,
    {
        let load = {
            let mut entries = self.entries.lock().unwrap();
            match entries.get(key) {
                Some(entry) => entry.load.clone(),
                None => {
                    let load = fetch().boxed().shared();
                    entries.insert(
                        key.to_string(),
                        Entry {
                            load: load.clone(),
                            progress: None,
                        },
                    );
                    load
                }
            }
        };

        load.await
    }

    /// Fetch-once with completion polling.
    ///
    /// `fetch` is issued repeatedly, immediately after every in-progress
    /// reply, until it yields a terminal value; interim progress is
    /// recorded on the entry and readable through [`progress`]. The loop
    /// has no timeout and no backoff: each reply costs a full round trip,
    /// so the server paces it. Callers racing on `key` share the one
    /// loop and observe the same resolution.
    ///
    /// [`progress`]: ResourceScope::progress
    pub async fn get_or_load_polling<F, Fut>(&self, key: &str, fetch: F) -> Result<V, LoadError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PollReply<V>, LoadError>> + Send + 'static,
    {
        let load = {
            let mut entries = self.entries.lock().unwrap();
            match entries.get(key) {
                Some(entry) => entry.load.clone(),
                None => {
                    let (tx, rx) = watch::channel(0.0f64);
                    let load = async move {
                        loop {
                            match fetch().await? {
                                PollReply::InProgress(progress) => {
                                    let _ = tx.send(progress);
                                }
                                PollReply::Complete(value) => {
                                    let _ = tx.send(1.0);
                                    return Ok(value);
                                }
                            }
                        }
                    }
                    .boxed()
                    .shared();
                    entries.insert(
                        key.to_string(),
                        Entry {
                            load: load.clone(),
                            progress: Some(rx),
                        },
                    );
                    load
                }
            }
        };

        load.await
    }

    /// Last recorded progress for `key`. `None` unless `key` names a
    /// polling entry.
    pub fn progress(&self, key: &str) -> Option<f64> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .and_then(|entry| entry.progress.as_ref())
            .map(|rx| *rx.borrow())
    }

    /// Watch progress updates for `key`.
    pub fn watch_progress(&self, key: &str) -> Option<watch::Receiver<f64>> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .and_then(|entry| entry.progress.as_ref())
            .cloned()
    }

    /// Whether `key` has an entry (pending or settled).
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}
