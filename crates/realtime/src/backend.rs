//! Storage seam behind the live counter.

use crate::event::parse_live_message;
use crate::stream::LiveStream;
use async_trait::async_trait;
use campaign_core::config::RedisConfig;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::debug;

/// Shared counter plus a fan-out channel of wire-encoded [`LiveEvent`]s.
///
/// [`LiveEvent`]: crate::LiveEvent
#[async_trait]
pub trait LiveBackend: Send + Sync {
    async fn increment(&self) -> anyhow::Result<i64>;

    /// Decrement, clamped at zero.
    async fn decrement(&self) -> anyhow::Result<i64>;

    async fn current(&self) -> anyhow::Result<i64>;

    async fn publish(&self, payload: String) -> anyhow::Result<()>;

    /// Every message published after this call returns, decoded.
    async fn subscribe(&self) -> anyhow::Result<LiveStream>;
}

// Decrement that never goes below zero.
const CLAMPED_DECR: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current <= 0 then
    redis.call('SET', KEYS[1], 0)
    return 0
end
return redis.call('DECR', KEYS[1])
"#;

/// A shared connection for counter commands; each subscriber opens its own.
pub struct RedisBackend {
    client: redis::Client,
    conn: ConnectionManager,
    counter_key: String,
    channel: String,
}

impl RedisBackend {
    pub async fn open(config: &RedisConfig) -> anyhow::Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        let mut conn = tokio::time::timeout(timeout, ConnectionManager::new(client.clone())).await??;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!(response = %pong, "Redis ping");
        Ok(Self {
            client,
            conn,
            counter_key: config.counter_key.clone(),
            channel: config.live_channel.clone(),
        })
    }
}

#[async_trait]
impl LiveBackend for RedisBackend {
    async fn increment(&self) -> anyhow::Result<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(&self.counter_key, 1).await?;
        Ok(count)
    }

    async fn decrement(&self) -> anyhow::Result<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::Script::new(CLAMPED_DECR)
            .key(&self.counter_key)
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn current(&self) -> anyhow::Result<i64> {
        let mut conn = self.conn.clone();
        let count: Option<i64> = conn.get(&self.counter_key).await?;
        Ok(count.unwrap_or(0).max(0))
    }

    async fn publish(&self, payload: String) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(&self.channel, payload).await?;
        debug!(receivers = receivers, "Live message published");
        Ok(())
    }

    /// Dropping the returned stream closes the dedicated connection, which
    /// ends the subscription.
    async fn subscribe(&self) -> anyhow::Result<LiveStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;

        let messages = pubsub.into_on_message().filter_map(|msg| {
            let payload: String = msg.get_payload().ok()?;
            parse_live_message(&payload)
        });
        Ok(Box::pin(messages))
    }
}
