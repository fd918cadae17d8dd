//! Open-connection counter with pub/sub fan-out.

use crate::backend::{LiveBackend, RedisBackend};
use crate::event::LiveEvent;
use crate::memory::MemoryBackend;
use crate::stream::LiveStream;
use anyhow::anyhow;
use campaign_core::config::RedisConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ConnectionCounter {
    backend: Option<Arc<dyn LiveBackend>>,
}

impl ConnectionCounter {
    /// Connect to Redis. An unreachable server yields a disabled counter
    /// rather than an error.
    pub async fn connect(config: &RedisConfig) -> Self {
        match RedisBackend::open(config).await {
            Ok(backend) => {
                info!(url = %config.url, "Realtime counter connected to Redis");
                Self::with_backend(Arc::new(backend))
            }
            Err(e) => {
                warn!(url = %config.url, error = %e, "Redis unavailable, realtime endpoints degraded");
                Self::disabled()
            }
        }
    }

    pub fn with_backend(backend: Arc<dyn LiveBackend>) -> Self {
        Self { backend: Some(backend) }
    }

    /// Counts connections of this process only.
    pub fn in_process() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()))
    }

    /// A counter with no backend; every operation errors.
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> anyhow::Result<&dyn LiveBackend> {
        self.backend
            .as_deref()
            .ok_or_else(|| anyhow!("realtime counter disabled"))
    }

    pub async fn increment(&self) -> anyhow::Result<i64> {
        self.backend()?.increment().await
    }

    pub async fn decrement(&self) -> anyhow::Result<i64> {
        self.backend()?.decrement().await
    }

    pub async fn current(&self) -> anyhow::Result<i64> {
        self.backend()?.current().await
    }

    pub async fn publish(&self, event: &LiveEvent) -> anyhow::Result<()> {
        let backend = self.backend()?;
        backend.publish(event.to_wire()?).await?;
        debug!(event = event.event_name(), "Live event published");
        Ok(())
    }

    pub async fn publish_count(&self, count: i64) -> anyhow::Result<()> {
        self.publish(&LiveEvent::ConnectionCount { count }).await
    }

    pub async fn subscribe(&self) -> anyhow::Result<LiveStream> {
        self.backend()?.subscribe().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_counter_errors() {
        let counter = ConnectionCounter::disabled();
        assert!(!counter.is_available());
        assert!(counter.increment().await.is_err());
        assert!(counter.decrement().await.is_err());
        assert!(counter.current().await.is_err());
        assert!(counter.publish_count(1).await.is_err());
        assert!(counter.subscribe().await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_redis_degrades() {
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
            connect_timeout_ms: 200,
            ..RedisConfig::default()
        };
        let counter = ConnectionCounter::connect(&config).await;
        assert!(!counter.is_available());
    }

    #[tokio::test]
    async fn test_counter_never_negative() {
        let backend = Arc::new(MemoryBackend::new());
        let counter = ConnectionCounter::with_backend(backend.clone());
        assert!(counter.is_available());

        assert_eq!(counter.decrement().await.unwrap(), 0);
        assert_eq!(counter.increment().await.unwrap(), 1);
        assert_eq!(counter.decrement().await.unwrap(), 0);
        assert_eq!(counter.decrement().await.unwrap(), 0);
        assert_eq!(counter.current().await.unwrap(), 0);

        counter.publish_count(0).await.unwrap();
        assert_eq!(backend.published(), vec![LiveEvent::ConnectionCount { count: 0 }]);
    }
}
