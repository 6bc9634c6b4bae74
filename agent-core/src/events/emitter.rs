//! Event emitter (C6): pub/sub with persistent + one-shot listeners,
//! concurrency-bounded dispatch, per-listener failure isolation.

use super::Event;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

const DEFAULT_MAX_LISTENERS: usize = 200;
const DISPATCH_CONCURRENCY: usize = 50;

pub type ListenerFn = Arc<dyn Fn(Event) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct Listener {
    id: String,
    /// Caller-supplied dedupe key, standing in for the source's
    /// bound-method-identity comparison (§9 Open Question; no two Rust
    /// closures can be compared by identity, so the emitter asks for an
    /// explicit key instead).
    dedupe_key: Option<String>,
    callback: ListenerFn,
    once: bool,
}

#[derive(Default)]
struct Stats {
    total_emitted: u64,
    total_listeners_called: u64,
    errors: u64,
    total_emit_time: Duration,
    max_emit_time: Duration,
}

pub struct EmitterStats {
    pub total_emitted: u64,
    pub total_listeners_called: u64,
    pub errors: u64,
    pub avg_emit_time: Duration,
    pub max_emit_time: Duration,
}

/// A handle returned on registration; dropping it does not remove the
/// listener, only an explicit `.remove()` does (matching the source's
/// handle-based lifecycle rather than RAII removal).
pub struct ListenerHandle {
    emitter: Arc<EventEmitterInner>,
    event_type: String,
    id: String,
}

impl ListenerHandle {
    pub fn remove(&self) -> bool {
        self.emitter.remove_by_id(&self.event_type, &self.id)
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

struct EventEmitterInner {
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    max_listeners: usize,
    stats: RwLock<Stats>,
    next_id: AtomicU64,
}

/// Clonable handle to the emitter; cloning shares the same underlying
/// listener maps and statistics.
#[derive(Clone)]
pub struct EventEmitter {
    inner: Arc<EventEmitterInner>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::with_max_listeners(DEFAULT_MAX_LISTENERS)
    }
}

impl EventEmitter {
    pub fn with_max_listeners(max_listeners: usize) -> Self {
        Self {
            inner: Arc::new(EventEmitterInner {
                listeners: RwLock::new(HashMap::new()),
                max_listeners,
                stats: RwLock::new(Stats::default()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    fn register(
        &self,
        event_type: &str,
        dedupe_key: Option<&str>,
        once: bool,
        callback: ListenerFn,
    ) -> Result<ListenerHandle, String> {
        let mut listeners = self.inner.listeners.write();
        let bucket = listeners.entry(event_type.to_string()).or_default();

        if bucket.len() >= self.inner.max_listeners {
            return Err(format!(
                "listener limit exceeded ({}) for event type: {event_type}",
                self.inner.max_listeners
            ));
        }

        if let Some(key) = dedupe_key {
            if let Some(existing) = bucket.iter().find(|l| l.dedupe_key.as_deref() == Some(key)) {
                log::warn!("duplicate listener registration for {event_type}: {key}");
                return Ok(ListenerHandle {
                    emitter: self.inner.clone(),
                    event_type: event_type.to_string(),
                    id: existing.id.clone(),
                });
            }
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        bucket.push(Listener {
            id: id.clone(),
            dedupe_key: dedupe_key.map(|s| s.to_string()),
            callback,
            once,
        });

        Ok(ListenerHandle {
            emitter: self.inner.clone(),
            event_type: event_type.to_string(),
            id,
        })
    }

    pub fn on(
        &self,
        event_type: &str,
        dedupe_key: Option<&str>,
        callback: ListenerFn,
    ) -> Result<ListenerHandle, String> {
        self.register(event_type, dedupe_key, false, callback)
    }

    pub fn once(
        &self,
        event_type: &str,
        dedupe_key: Option<&str>,
        callback: ListenerFn,
    ) -> Result<ListenerHandle, String> {
        self.register(event_type, dedupe_key, true, callback)
    }

    pub fn off(&self, event_type: &str) -> usize {
        let mut listeners = self.inner.listeners.write();
        listeners.remove(event_type).map(|v| v.len()).unwrap_or(0)
    }

    pub fn remove_all_listeners(&self, event_type: Option<&str>) -> usize {
        match event_type {
            Some(t) => self.off(t),
            None => {
                let mut listeners = self.inner.listeners.write();
                let total: usize = listeners.values().map(|v| v.len()).sum();
                listeners.clear();
                total
            }
        }
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner
            .listeners
            .read()
            .get(event_type)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    pub fn event_names(&self) -> Vec<String> {
        self.inner.listeners.read().keys().cloned().collect()
    }

    /// Dispatches `event` to every listener registered for its type,
    /// bounded to `DISPATCH_CONCURRENCY` concurrent invocations. Each
    /// listener runs under its own failure boundary; a panicking or
    /// erroring listener only increments the error counter, it never
    /// stops delivery to the others.
    pub async fn emit(&self, event: Event) {
        let start = Instant::now();
        let event_type = event.event_type.clone();

        let to_call: Vec<(String, ListenerFn)> = {
            let mut listeners = self.inner.listeners.write();
            let Some(bucket) = listeners.get_mut(&event_type) else {
                return;
            };
            let snapshot: Vec<(String, ListenerFn)> = bucket
                .iter()
                .map(|l| (l.id.clone(), l.callback.clone()))
                .collect();
            bucket.retain(|l| !l.once);
            snapshot
        };

        if to_call.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(DISPATCH_CONCURRENCY));
        let mut handles = Vec::with_capacity(to_call.len());
        for (_id, callback) in to_call {
            let semaphore = semaphore.clone();
            let event = event.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await;
                callback(event).await;
            }));
        }

        let called = handles.len() as u64;
        let mut panicked = 0u64;
        for (id, h) in handles.into_iter().enumerate() {
            // A listener that panics is caught by tokio's task boundary
            // (the join fails rather than unwinding into the emitter), so
            // one failing listener can never stop delivery to the others.
            if h.await.is_err() {
                log::error!("event listener #{id} panicked");
                panicked += 1;
            }
        }

        let elapsed = start.elapsed();
        let mut stats = self.inner.stats.write();
        stats.total_emitted += 1;
        stats.total_listeners_called += called;
        stats.errors += panicked;
        stats.total_emit_time += elapsed;
        if elapsed > stats.max_emit_time {
            stats.max_emit_time = elapsed;
        }
    }

    pub fn stats(&self) -> EmitterStats {
        let stats = self.inner.stats.read();
        let avg = if stats.total_emitted > 0 {
            stats.total_emit_time / stats.total_emitted as u32
        } else {
            Duration::ZERO
        };
        EmitterStats {
            total_emitted: stats.total_emitted,
            total_listeners_called: stats.total_listeners_called,
            errors: stats.errors,
            avg_emit_time: avg,
            max_emit_time: stats.max_emit_time,
        }
    }
}

impl EventEmitterInner {
    fn remove_by_id(&self, event_type: &str, id: &str) -> bool {
        let mut listeners = self.listeners.write();
        if let Some(bucket) = listeners.get_mut(event_type) {
            let before = bucket.len();
            bucket.retain(|l| l.id != id);
            let removed = bucket.len() < before;
            if bucket.is_empty() {
                listeners.remove(event_type);
            }
            removed
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChatEvent, EventData};
    use std::sync::atomic::AtomicUsize;

    fn chat_event() -> Event {
        Event {
            event_type: "chat".into(),
            game_tick: 0,
            timestamp: 0.0,
            data: EventData::Chat(ChatEvent {
                sender: "A".into(),
                message: "hi".into(),
                chat_type: None,
            }),
        }
    }

    #[tokio::test]
    async fn persistent_listener_fires_every_emit() {
        let emitter = EventEmitter::default();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        emitter
            .on(
                "chat",
                None,
                Arc::new(move |_| {
                    let c = c.clone();
                    Box::pin(async move {
                        c.fetch_add(1, Ordering::SeqCst);
                    })
                }),
            )
            .unwrap();

        emitter.emit(chat_event()).await;
        emitter.emit(chat_event()).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn once_listener_fires_exactly_once() {
        let emitter = EventEmitter::default();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        emitter
            .once(
                "chat",
                None,
                Arc::new(move |_| {
                    let c = c.clone();
                    Box::pin(async move {
                        c.fetch_add(1, Ordering::SeqCst);
                    })
                }),
            )
            .unwrap();

        emitter.emit(chat_event()).await;
        emitter.emit(chat_event()).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_panicking_listener_does_not_block_others() {
        let emitter = EventEmitter::default();
        let counter = Arc::new(AtomicUsize::new(0));

        emitter
            .on("chat", None, Arc::new(|_| Box::pin(async { panic!("boom") })))
            .unwrap();
        let c = counter.clone();
        emitter
            .on(
                "chat",
                None,
                Arc::new(move |_| {
                    let c = c.clone();
                    Box::pin(async move {
                        c.fetch_add(1, Ordering::SeqCst);
                    })
                }),
            )
            .unwrap();

        emitter.emit(chat_event()).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.stats().errors, 1);
    }

    #[test]
    fn duplicate_dedupe_key_is_ignored_with_a_warning() {
        let emitter = EventEmitter::default();
        let h1 = emitter
            .on("chat", Some("k"), Arc::new(|_| Box::pin(async {})))
            .unwrap();
        let h2 = emitter
            .on("chat", Some("k"), Arc::new(|_| Box::pin(async {})))
            .unwrap();
        assert_eq!(h1.id, h2.id);
        assert_eq!(emitter.listener_count("chat"), 1);
    }
}
