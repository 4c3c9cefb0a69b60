//! Minimal pub/sub primitive used by every component of the engine.
//!
//! An [`EventEmitter`] owns any number of named channels. Each channel keeps
//! its listeners in registration order, and emitting collects whatever the
//! listeners return. Components compose one emitter per payload type and
//! expose typed `add_*_listener` / `emit_*` wrappers around it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Handle returned by [`EventEmitter::add_listener`], used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<A, R> = Arc<dyn Fn(&A) -> R + Send + Sync>;

/// Named-channel event emitter with ordered listeners.
///
/// Listeners receive `&A` and return `R`. [`emit`](Self::emit) returns the
/// values in registration order; [`emit_serial`](Self::emit_serial) treats
/// `R` as a future and awaits each listener before calling the next one.
pub struct EventEmitter<A, R = ()> {
    listeners: RwLock<HashMap<&'static str, Vec<(ListenerId, Listener<A, R>)>>>,
    next_id: AtomicU64,
}

impl<A, R> EventEmitter<A, R> {
    /// Create an emitter with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a listener on `channel`. It runs after every listener
    /// already registered on that channel.
    pub fn add_listener<F>(&self, channel: &'static str, listener: F) -> ListenerId
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut guard = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        guard
            .entry(channel)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, channel: &'static str, id: ListenerId) -> bool {
        let mut guard = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = guard.get_mut(channel) else {
            return false;
        };
        let before = list.len();
        list.retain(|(listener_id, _)| *listener_id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            guard.remove(channel);
        }
        removed
    }

    /// Number of listeners currently registered on `channel`.
    pub fn listener_count(&self, channel: &'static str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .map_or(0, Vec::len)
    }

    // Listeners are cloned out so they can (un)register listeners themselves.
    fn snapshot(&self, channel: &'static str) -> Vec<Listener<A, R>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    /// Call every listener of `channel` in order and collect their results.
    ///
    /// A channel without listeners yields an empty vector.
    pub fn emit(&self, channel: &'static str, args: &A) -> Vec<R> {
        self.snapshot(channel)
            .into_iter()
            .map(|listener| listener(args))
            .collect()
    }

    /// Call every listener of `channel`, awaiting the future it returns
    /// before the next listener is called.
    pub async fn emit_serial<T>(&self, channel: &'static str, args: &A) -> Vec<T>
    where
        R: Future<Output = T>,
    {
        let mut results = Vec::new();
        for listener in self.snapshot(channel) {
            results.push(listener(args).await);
        }
        results
    }

    /// Like [`emit_serial`](Self::emit_serial) for fallible listeners: the
    /// first error is returned and the remaining listeners are not called.
    pub async fn try_emit_serial<T, E>(
        &self,
        channel: &'static str,
        args: &A,
    ) -> Result<Vec<T>, E>
    where
        R: Future<Output = Result<T, E>>,
    {
        let mut results = Vec::new();
        for listener in self.snapshot(channel) {
            results.push(listener(args).await?);
        }
        Ok(results)
    }
}

impl<A, R> Default for EventEmitter<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> std::fmt::Debug for EventEmitter<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<&str, usize> = guard.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventEmitter")
            .field("listeners", &counts)
            .finish()
    }
}
