//! Long-lived live streams.
//!
//! The extension stream counts itself as an open connection for as long as
//! it lives: it increments on open and its [`ConnectionGuard`] decrements and
//! republishes the count exactly once when the stream is dropped, which is
//! what happens when the client aborts. The dashboard stream only observes.

use crate::counter::ConnectionCounter;
use crate::event::LiveEvent;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

pub type LiveStream = Pin<Box<dyn Stream<Item = LiveEvent> + Send>>;

fn degraded() -> LiveStream {
    metrics::counter!("realtime.degraded").increment(1);
    Box::pin(tokio_stream::once(LiveEvent::ConnectionCount { count: 0 }))
}

/// Releases one counted connection. Cleanup runs at most once, on the first
/// of `release` or drop.
pub struct ConnectionGuard {
    counter: Arc<ConnectionCounter>,
    released: AtomicBool,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<ConnectionCounter>) -> Self {
        metrics::counter!("realtime.connections.opened").increment(1);
        Self {
            counter,
            released: AtomicBool::new(false),
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        metrics::counter!("realtime.connections.closed").increment(1);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available, connection count not decremented");
            return;
        };
        let counter = self.counter.clone();
        handle.spawn(async move {
            match counter.decrement().await {
                Ok(count) => {
                    if let Err(e) = counter.publish_count(count).await {
                        debug!(error = %e, "Count publish after disconnect failed");
                    }
                }
                Err(e) => debug!(error = %e, "Decrement after disconnect failed"),
            }
        });
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Stream for the browser extension: the current count first, then every
/// count update and pushed notification.
pub async fn extension_stream(counter: Arc<ConnectionCounter>) -> LiveStream {
    if !counter.is_available() {
        return degraded();
    }

    let updates = match counter.subscribe().await {
        Ok(updates) => updates,
        Err(e) => {
            warn!(error = %e, "Live subscribe failed");
            return degraded();
        }
    };

    let count = match counter.increment().await {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "Connection increment failed");
            return degraded();
        }
    };
    let guard = ConnectionGuard::new(counter.clone());

    if let Err(e) = counter.publish_count(count).await {
        warn!(error = %e, "Count publish failed");
    }

    // The subscription predates our own publish, so its echo arrives first.
    let mut last_count = count;
    let updates = updates.filter(move |event| match event {
        LiveEvent::ConnectionCount { count } if *count == last_count => false,
        LiveEvent::ConnectionCount { count } => {
            last_count = *count;
            true
        }
        LiveEvent::Notification { .. } => true,
    });

    let stream = tokio_stream::once(LiveEvent::ConnectionCount { count })
        .chain(updates)
        .map(move |event| {
            let _held = &guard;
            event
        });
    Box::pin(stream)
}

/// Read-only stream for the dashboard: count updates only.
pub async fn dashboard_stream(counter: Arc<ConnectionCounter>) -> LiveStream {
    let updates = match counter.subscribe().await {
        Ok(updates) => updates,
        Err(e) => {
            debug!(error = %e, "Dashboard subscribe failed");
            return degraded();
        }
    };
    let count = match counter.current().await {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "Count read failed");
            return degraded();
        }
    };

    let stream = tokio_stream::once(LiveEvent::ConnectionCount { count })
        .chain(updates.filter(LiveEvent::is_count));
    Box::pin(stream)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use serde_json::json;

    fn live_counter() -> (Arc<MemoryBackend>, Arc<ConnectionCounter>) {
        let backend = Arc::new(MemoryBackend::new());
        let counter = Arc::new(ConnectionCounter::with_backend(backend.clone()));
        (backend, counter)
    }

    /// Let spawned cleanup tasks run until `done` holds.
    async fn settle(done: impl Fn() -> bool) {
        for _ in 0..100 {
            if done() {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_degraded_extension_stream() {
        let counter = Arc::new(ConnectionCounter::disabled());
        let events: Vec<LiveEvent> = extension_stream(counter).await.collect().await;
        assert_eq!(events, vec![LiveEvent::ConnectionCount { count: 0 }]);
    }

    #[tokio::test]
    async fn test_degraded_dashboard_stream() {
        let counter = Arc::new(ConnectionCounter::disabled());
        let events: Vec<LiveEvent> = dashboard_stream(counter).await.collect().await;
        assert_eq!(events, vec![LiveEvent::ConnectionCount { count: 0 }]);
    }

    #[tokio::test]
    async fn test_extension_stream_counts_until_dropped() {
        let (backend, counter) = live_counter();

        let mut stream = extension_stream(counter).await;
        assert_eq!(backend.count(), 1);
        assert_eq!(stream.next().await, Some(LiveEvent::ConnectionCount { count: 1 }));

        drop(stream);
        settle(|| backend.published().len() == 2).await;
        assert_eq!(backend.count(), 0);
        assert_eq!(backend.decrements(), 1);
        assert_eq!(
            backend.published(),
            vec![
                LiveEvent::ConnectionCount { count: 1 },
                LiveEvent::ConnectionCount { count: 0 },
            ]
        );

        settle(|| false).await;
        assert_eq!(backend.decrements(), 1);
    }

    #[tokio::test]
    async fn test_extension_stream_skips_own_echo() {
        let (_backend, counter) = live_counter();

        let mut stream = extension_stream(counter.clone()).await;
        assert_eq!(stream.next().await, Some(LiveEvent::ConnectionCount { count: 1 }));

        counter.publish(&LiveEvent::Notification { payload: json!({"title": "Hi"}) }).await.unwrap();
        counter.publish_count(2).await.unwrap();
        counter.publish_count(1).await.unwrap();

        assert_eq!(
            stream.next().await,
            Some(LiveEvent::Notification { payload: json!({"title": "Hi"}) })
        );
        assert_eq!(stream.next().await, Some(LiveEvent::ConnectionCount { count: 2 }));
        assert_eq!(stream.next().await, Some(LiveEvent::ConnectionCount { count: 1 }));
    }

    #[tokio::test]
    async fn test_dashboard_stream_only_observes() {
        let (backend, counter) = live_counter();
        counter.increment().await.unwrap();

        let mut stream = dashboard_stream(counter.clone()).await;
        assert_eq!(stream.next().await, Some(LiveEvent::ConnectionCount { count: 1 }));
        assert_eq!(backend.count(), 1);

        counter.publish(&LiveEvent::Notification { payload: json!({}) }).await.unwrap();
        counter.publish_count(3).await.unwrap();
        assert_eq!(stream.next().await, Some(LiveEvent::ConnectionCount { count: 3 }));

        drop(stream);
        settle(|| false).await;
        assert_eq!(backend.count(), 1);
        assert_eq!(backend.decrements(), 0);
    }

    #[tokio::test]
    async fn test_guard_releases_once() {
        let (backend, counter) = live_counter();
        counter.increment().await.unwrap();

        let guard = ConnectionGuard::new(counter);
        assert!(!guard.is_released());
        guard.release();
        assert!(guard.is_released());
        guard.release();
        drop(guard);

        settle(|| backend.published().len() == 1).await;
        settle(|| false).await;
        assert_eq!(backend.decrements(), 1);
        assert_eq!(backend.count(), 0);
    }

    #[test]
    fn test_guard_drop_outside_runtime() {
        let guard = ConnectionGuard::new(Arc::new(ConnectionCounter::disabled()));
        drop(guard);
    }
}
