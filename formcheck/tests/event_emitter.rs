//! Tests for serial emission of async listeners.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;

use formcheck::EventEmitter;

const CHANNEL: &str = "CHANNEL";

fn logging_listener(
    log: &Arc<Mutex<Vec<String>>>,
    name: &'static str,
) -> impl Fn(&u32) -> BoxFuture<'static, u32> + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |value: &u32| {
        log.lock().unwrap().push(format!("{name} start"));
        let log = Arc::clone(&log);
        let value = *value;
        async move {
            tokio::task::yield_now().await;
            log.lock().unwrap().push(format!("{name} end"));
            value + 1
        }
        .boxed()
    }
}

#[tokio::test]
async fn test_emit_serial_awaits_each_listener() {
    let emitter: EventEmitter<u32, BoxFuture<'static, u32>> = EventEmitter::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    emitter.add_listener(CHANNEL, logging_listener(&log, "a"));
    emitter.add_listener(CHANNEL, logging_listener(&log, "b"));

    let results = emitter.emit_serial(CHANNEL, &1).await;

    assert_eq!(results, vec![2, 2]);
    assert_eq!(*log.lock().unwrap(), ["a start", "a end", "b start", "b end"]);
}

#[tokio::test]
async fn test_try_emit_serial_stops_at_first_error() {
    let emitter: EventEmitter<u32, BoxFuture<'static, Result<u32, String>>> = EventEmitter::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    emitter.add_listener(CHANNEL, move |value: &u32| {
        counter.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(*value)).boxed()
    });
    let counter = Arc::clone(&calls);
    emitter.add_listener(CHANNEL, move |_: &u32| {
        counter.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Err("second failed".to_string())).boxed()
    });
    let counter = Arc::clone(&calls);
    emitter.add_listener(CHANNEL, move |value: &u32| {
        counter.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(*value)).boxed()
    });

    let result = emitter.try_emit_serial(CHANNEL, &7).await;

    assert_eq!(result, Err("second failed".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_try_emit_serial_collects_in_order() {
    let emitter: EventEmitter<u32, BoxFuture<'static, Result<u32, String>>> = EventEmitter::new();
    for offset in [10, 20, 30] {
        emitter.add_listener(CHANNEL, move |value: &u32| futures::future::ready(Ok(value + offset)).boxed());
    }

    let result = emitter.try_emit_serial(CHANNEL, &1).await;

    assert_eq!(result, Ok(vec![11, 21, 31]));
}

#[test]
fn test_listener_added_during_emit_runs_next_time() {
    let emitter: Arc<EventEmitter<(), usize>> = Arc::new(EventEmitter::new());
    let weak = Arc::downgrade(&emitter);
    emitter.add_listener(CHANNEL, move |_| {
        if let Some(emitter) = weak.upgrade() {
            emitter.add_listener(CHANNEL, |_| 2);
        }
        1
    });

    assert_eq!(emitter.emit(CHANNEL, &()), vec![1]);
    assert_eq!(emitter.emit(CHANNEL, &()), vec![1, 2]);
    assert_eq!(emitter.listener_count(CHANNEL), 3);
}
