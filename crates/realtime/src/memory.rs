//! In-process live backend for single-instance development and tests.

use crate::backend::LiveBackend;
use crate::event::{parse_live_message, LiveEvent};
use crate::stream::LiveStream;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 256;

pub struct MemoryBackend {
    count: Mutex<i64>,
    decrements: AtomicUsize,
    published: Mutex<Vec<LiveEvent>>,
    sender: broadcast::Sender<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            count: Mutex::new(0),
            decrements: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
            sender,
        }
    }

    pub fn count(&self) -> i64 {
        *self.count.lock()
    }

    /// Decrement calls so far, including ones clamped at zero.
    pub fn decrements(&self) -> usize {
        self.decrements.load(Ordering::Acquire)
    }

    pub fn published(&self) -> Vec<LiveEvent> {
        self.published.lock().clone()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiveBackend for MemoryBackend {
    async fn increment(&self) -> anyhow::Result<i64> {
        let mut count = self.count.lock();
        *count += 1;
        Ok(*count)
    }

    async fn decrement(&self) -> anyhow::Result<i64> {
        self.decrements.fetch_add(1, Ordering::AcqRel);
        let mut count = self.count.lock();
        *count = (*count - 1).max(0);
        Ok(*count)
    }

    async fn current(&self) -> anyhow::Result<i64> {
        Ok(self.count())
    }

    async fn publish(&self, payload: String) -> anyhow::Result<()> {
        if let Some(event) = parse_live_message(&payload) {
            self.published.lock().push(event);
        }
        if self.sender.send(payload).is_err() {
            trace!("Live message published with no subscribers");
        }
        Ok(())
    }

    async fn subscribe(&self) -> anyhow::Result<LiveStream> {
        let messages = BroadcastStream::new(self.sender.subscribe())
            .filter_map(|msg| msg.ok().and_then(|payload| parse_live_message(&payload)));
        Ok(Box::pin(messages))
    }
}
