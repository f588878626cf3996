use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::{Stream, StreamExt};

use super::document::{CollectionPath, Document, Query, SnapshotStream};
use crate::error::StoreError;

type Snapshot = Result<Vec<Document>, StoreError>;

struct Watcher {
    query: Query,
    sender: UnboundedSender<Snapshot>,
}

#[derive(Default)]
struct Watchers {
    next_id: u64,
    entries: HashMap<u64, Watcher>,
}

/// Live queries registered against a store. Each watch is released when its
/// stream is dropped.
#[derive(Default)]
pub struct WatchRegistry {
    inner: Arc<Mutex<Watchers>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `query` and queues `initial` as its first snapshot.
    pub fn register(&self, query: Query, initial: Vec<Document>) -> SnapshotStream {
        let (sender, receiver) = mpsc::unbounded();
        // A fresh receiver is still connected.
        let _ = sender.unbounded_send(Ok(initial));

        let mut watchers = lock_watchers(&self.inner);
        let id = watchers.next_id;
        watchers.next_id += 1;
        log::debug!("Watch {id} registered on {}", query.collection);
        watchers.entries.insert(id, Watcher { query, sender });

        let stream = WatchStream {
            receiver,
            _guard: WatchGuard {
                id,
                registry: Arc::downgrade(&self.inner),
            },
        };
        stream.boxed()
    }

    /// Watches whose query reads `collection`.
    pub fn watching(&self, collection: &CollectionPath) -> Vec<(u64, Query)> {
        lock_watchers(&self.inner)
            .entries
            .iter()
            .filter(|(_, watcher)| &watcher.query.collection == collection)
            .map(|(id, watcher)| (*id, watcher.query.clone()))
            .collect()
    }

    pub fn deliver(&self, id: u64, snapshot: Snapshot) {
        let mut watchers = lock_watchers(&self.inner);
        let disconnected = match watchers.entries.get(&id) {
            Some(watcher) => watcher.sender.unbounded_send(snapshot).is_err(),
            None => false,
        };
        if disconnected {
            watchers.entries.remove(&id);
            log::debug!("Watch {id} dropped by its reader");
        }
    }

    pub fn active(&self) -> usize {
        lock_watchers(&self.inner).entries.len()
    }
}

/// Every registry operation leaves the map consistent, so a panic on
/// another thread does not invalidate it.
fn lock_watchers(inner: &Mutex<Watchers>) -> MutexGuard<'_, Watchers> {
    inner.lock().unwrap_or_else(|poisoned| {
        log::warn!("Watch registry lock was poisoned; recovering");
        poisoned.into_inner()
    })
}

struct WatchGuard {
    id: u64,
    registry: Weak<Mutex<Watchers>>,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut watchers = lock_watchers(&registry);
        if watchers.entries.remove(&self.id).is_some() {
            log::debug!("Watch {} released", self.id);
        }
    }
}

struct WatchStream {
    receiver: UnboundedReceiver<Snapshot>,
    _guard: WatchGuard,
}

impl Stream for WatchStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}
