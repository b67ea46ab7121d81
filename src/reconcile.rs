//! Optimistic local mutations reconciled against a remote API.
//!
//! A [`Reconciler`] applies a guessed value to local state right away, runs the
//! remote call, then either replaces the guess with the server's canonical
//! value or restores what was there before. Mutations of the same key are
//! serialized in the order they were requested; mutations of different keys
//! run concurrently.
//!
//! # Example
//!
//! ```no_run
//! # use chapter_live::reconcile::{OptimisticTarget, Reconciler};
//! # use parking_lot::Mutex;
//! # use std::collections::HashMap;
//! struct Flags(Mutex<HashMap<u32, bool>>);
//!
//! impl OptimisticTarget for Flags {
//!     type Key = u32;
//!     type Value = bool;
//!
//!     fn current(&self, key: &u32) -> Option<bool> {
//!         self.0.lock().get(key).copied()
//!     }
//!
//!     fn apply(&self, key: &u32, value: Option<bool>) {
//!         let mut map = self.0.lock();
//!         match value {
//!             Some(v) => { map.insert(*key, v); }
//!             None => { map.remove(key); }
//!         }
//!     }
//! }
//!
//! # async fn run() -> chapter_live::Result<()> {
//! let reconciler = Reconciler::new(Flags(Mutex::new(HashMap::new())));
//! let confirmed = reconciler
//!     .mutate(7, Some(true), |_previous| async { Ok(Some(true)) })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Local state an optimistic mutation reads from and writes to
///
/// `apply(key, None)` removes the entry for `key`.
pub trait OptimisticTarget: Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;
    type Value: Clone + Send + Sync + 'static;

    fn current(&self, key: &Self::Key) -> Option<Self::Value>;

    fn apply(&self, key: &Self::Key, value: Option<Self::Value>);
}

/// Lifecycle of an optimistic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Committed,
    RolledBack,
}

/// An in-flight optimistic mutation
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticEntry<V> {
    pub previous: Option<V>,
    pub pending: Option<V>,
    pub status: EntryStatus,
}

/// Result of one item of a bulk mutation
#[derive(Debug)]
pub struct ItemOutcome<K, V> {
    pub key: K,
    pub result: Result<Option<V>>,
}

/// Itemized result of a bulk mutation; items keep request order
#[derive(Debug)]
pub struct BatchOutcome<K, V> {
    pub items: Vec<ItemOutcome<K, V>>,
}

impl<K, V> BatchOutcome<K, V> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every item committed
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(|item| item.result.is_ok())
    }

    pub fn committed(&self) -> impl Iterator<Item = (&K, Option<&V>)> {
        self.items.iter().filter_map(|item| match &item.result {
            Ok(value) => Some((&item.key, value.as_ref())),
            Err(_) => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&K, &Error)> {
        self.items.iter().filter_map(|item| match &item.result {
            Ok(_) => None,
            Err(e) => Some((&item.key, e)),
        })
    }
}

/// Applies optimistic mutations to an [`OptimisticTarget`]
pub struct Reconciler<T: OptimisticTarget> {
    inner: Arc<Inner<T>>,
}

impl<T: OptimisticTarget> Clone for Reconciler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T: OptimisticTarget> {
    target: Arc<T>,
    queues: Mutex<HashMap<T::Key, KeyQueue>>,
    entries: Mutex<HashMap<T::Key, OptimisticEntry<T::Value>>>,
}

/// FIFO of mutations waiting on one key
struct KeyQueue {
    next: u64,
    serving: u64,
    /// Tickets dropped before their turn came up
    abandoned: BTreeSet<u64>,
    turn: watch::Sender<u64>,
}

/// A place in a key's queue; dropping it hands the key to the next ticket
struct Ticket<T: OptimisticTarget> {
    inner: Arc<Inner<T>>,
    key: T::Key,
    number: u64,
    turn: watch::Receiver<u64>,
}

impl<T: OptimisticTarget> Ticket<T> {
    /// No earlier mutation of this key is still in flight
    fn is_serving(&self) -> bool {
        *self.turn.borrow() == self.number
    }

    async fn wait(&mut self) {
        let number = self.number;
        // the sender outlives every ticket of its queue
        let _ = self.turn.wait_for(|serving| *serving == number).await;
    }
}

impl<T: OptimisticTarget> Drop for Ticket<T> {
    fn drop(&mut self) {
        self.inner.release(&self.key, self.number);
    }
}

impl<T: OptimisticTarget> Reconciler<T> {
    pub fn new(target: T) -> Self {
        Self::from_shared(Arc::new(target))
    }

    pub fn from_shared(target: Arc<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                target,
                queues: Mutex::new(HashMap::new()),
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn target(&self) -> &Arc<T> {
        &self.inner.target
    }

    /// The in-flight entry for `key`, if a mutation is between apply and
    /// reconcile
    pub fn pending(&self, key: &T::Key) -> Option<OptimisticEntry<T::Value>> {
        self.inner.entries.lock().get(key).cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Apply `pending` optimistically, then reconcile with `remote`
    ///
    /// Same as [`mutate_with`](Self::mutate_with) with a fixed pending value.
    pub fn mutate<F, Fut>(
        &self,
        key: T::Key,
        pending: Option<T::Value>,
        remote: F,
    ) -> impl Future<Output = Result<Option<T::Value>>> + Send + 'static
    where
        F: FnOnce(Option<T::Value>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T::Value>>> + Send + 'static,
    {
        self.mutate_with(key, move |_| pending, remote)
    }

    /// Apply the value built by `pending` optimistically, then reconcile with
    /// `remote`
    ///
    /// The queue position for `key` is taken when this method is called. If no
    /// other mutation of `key` is in flight, the optimistic value is applied
    /// before this method returns; otherwise it is applied once the earlier
    /// mutations have settled. `pending` receives the value in place at that
    /// moment.
    ///
    /// The remote call runs on its own task: dropping the returned future
    /// does not cancel it, and its outcome is still applied to local state.
    /// `remote` receives the value that was in place before the optimistic
    /// write. On success the value it returns replaces the optimistic one
    /// (`None` removes the entry). On failure the pre-mutation value is
    /// restored and the error is returned.
    pub fn mutate_with<P, F, Fut>(
        &self,
        key: T::Key,
        pending: P,
        remote: F,
    ) -> impl Future<Output = Result<Option<T::Value>>> + Send + 'static
    where
        P: FnOnce(Option<T::Value>) -> Option<T::Value> + Send + 'static,
        F: FnOnce(Option<T::Value>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T::Value>>> + Send + 'static,
    {
        let mut ticket = self.inner.enqueue(&key);
        let start = if ticket.is_serving() {
            Start::Applied(self.inner.begin(&key, pending))
        } else {
            Start::Queued(pending)
        };

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let previous = match start {
                Start::Applied(previous) => previous,
                Start::Queued(pending) => {
                    ticket.wait().await;
                    inner.begin(&key, pending)
                }
            };
            let outcome = inner.settle(&key, previous, remote).await;
            drop(ticket);
            outcome
        });
        async move { task.await? }
    }

    /// Run independent mutations concurrently and report each one
    ///
    /// Items are enqueued and, where their key is free, applied in iteration
    /// order before this method returns, so two items for the same key still
    /// apply in that order.
    pub fn mutate_all<I, P, F, Fut>(
        &self,
        items: I,
    ) -> impl Future<Output = BatchOutcome<T::Key, T::Value>> + Send + 'static
    where
        I: IntoIterator<Item = (T::Key, P, F)>,
        P: FnOnce(Option<T::Value>) -> Option<T::Value> + Send + 'static,
        F: FnOnce(Option<T::Value>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T::Value>>> + Send + 'static,
    {
        let (keys, futures): (Vec<_>, Vec<_>) = items
            .into_iter()
            .map(|(key, pending, remote)| {
                (key.clone(), self.mutate_with(key, pending, remote))
            })
            .unzip();

        async move {
            let results = join_all(futures).await;
            let outcome = BatchOutcome {
                items: keys
                    .into_iter()
                    .zip(results)
                    .map(|(key, result)| ItemOutcome { key, result })
                    .collect(),
            };

            let failures = outcome.failed().count();
            if failures > 0 {
                warn!("{} of {} bulk mutations rolled back", failures, outcome.len());
            }
            outcome
        }
    }
}

/// Where a mutation stands when `mutate_with` returns
enum Start<V, P> {
    /// Optimistic value already written; holds the value it replaced
    Applied(Option<V>),
    /// Waiting behind earlier mutations of the same key
    Queued(P),
}

impl<T: OptimisticTarget> Inner<T> {
    fn enqueue(self: &Arc<Self>, key: &T::Key) -> Ticket<T> {
        let mut queues = self.queues.lock();
        let queue = queues.entry(key.clone()).or_insert_with(|| KeyQueue {
            next: 0,
            serving: 0,
            abandoned: BTreeSet::new(),
            turn: watch::channel(0).0,
        });
        let number = queue.next;
        queue.next += 1;

        Ticket {
            inner: Arc::clone(self),
            key: key.clone(),
            number,
            turn: queue.turn.subscribe(),
        }
    }

    fn release(&self, key: &T::Key, number: u64) {
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(key) else {
            return;
        };

        if number == queue.serving {
            queue.serving += 1;
            while queue.abandoned.remove(&queue.serving) {
                queue.serving += 1;
            }
            queue.turn.send_replace(queue.serving);
        } else if number > queue.serving {
            queue.abandoned.insert(number);
        }

        if queue.serving == queue.next {
            queues.remove(key);
        }
    }

    /// Write the optimistic value and record the entry; returns the value it
    /// replaced
    fn begin<P>(&self, key: &T::Key, pending: P) -> Option<T::Value>
    where
        P: FnOnce(Option<T::Value>) -> Option<T::Value>,
    {
        let previous = self.target.current(key);
        let pending = pending(previous.clone());
        self.target.apply(key, pending.clone());
        self.entries.lock().insert(
            key.clone(),
            OptimisticEntry {
                previous: previous.clone(),
                pending,
                status: EntryStatus::Pending,
            },
        );
        debug!(?key, "Applied optimistic value");
        previous
    }

    /// Run the remote call, then commit its value or roll back to `previous`
    async fn settle<F, Fut>(
        &self,
        key: &T::Key,
        previous: Option<T::Value>,
        remote: F,
    ) -> Result<Option<T::Value>>
    where
        F: FnOnce(Option<T::Value>) -> Fut,
        Fut: Future<Output = Result<Option<T::Value>>>,
    {
        match remote(previous.clone()).await {
            Ok(canonical) => {
                self.target.apply(key, canonical.clone());
                self.finish(key, EntryStatus::Committed);
                debug!(?key, "Optimistic value committed");
                Ok(canonical)
            }
            Err(e) => {
                self.target.apply(key, previous);
                self.finish(key, EntryStatus::RolledBack);
                warn!(?key, "Optimistic value rolled back: {}", e);
                Err(e)
            }
        }
    }

    fn finish(&self, key: &T::Key, status: EntryStatus) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.status = status;
        }
        entries.remove(key);
    }
}
