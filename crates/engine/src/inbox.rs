//! Unread-notification pull, keyed by visitor and tracked with read
//! receipts.
//!
//! Independent of campaign-gated notifications served by `ServeProcessor`:
//! receipts here do not count towards campaign frequency caps and campaign
//! events do not mark notifications as read.

use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::types::UnreadNotification;
use campaign_store::CampaignRepository;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct NotificationInbox {
    repo: Arc<dyn CampaignRepository>,
}

impl NotificationInbox {
    pub fn new(repo: Arc<dyn CampaignRepository>) -> Self {
        Self { repo }
    }

    /// Return every unread notification and mark them read for the visitor.
    pub async fn pull_unread(&self, visitor_id: &str) -> CampaignResult<Vec<UnreadNotification>> {
        let unread = self
            .repo
            .unread_notifications(visitor_id)
            .await
            .map_err(|e| CampaignError::Store(format!("{e:#}")))?;

        let ids: Vec<Uuid> = unread.iter().map(|n| n.id).collect();
        self.repo
            .mark_notifications_read(visitor_id, &ids)
            .await
            .map_err(|e| CampaignError::Store(format!("{e:#}")))?;

        debug!(visitor_id = visitor_id, count = ids.len(), "Unread notifications delivered");
        Ok(unread.iter().map(UnreadNotification::from).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use campaign_store::InMemoryRepository;

    #[tokio::test]
    async fn test_pull_marks_read() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.add_notification("Maintenance", "Down at midnight");
        let inbox = NotificationInbox::new(repo.clone());

        let first = inbox.pull_unread("v1").await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].title, "Maintenance");

        assert!(inbox.pull_unread("v1").await.unwrap().is_empty());
        assert_eq!(inbox.pull_unread("v2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pull_does_not_touch_event_log() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.add_notification("Hi", "there");
        let inbox = NotificationInbox::new(repo.clone());

        inbox.pull_unread("v1").await.unwrap();
        assert!(repo.events().is_empty());
    }
}
