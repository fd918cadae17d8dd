//! Visitor event recorder.
//!
//! Every serving request leaves at least one row in the visitor event log:
//! one row per served campaign, or a single `request` row with no campaign
//! when nothing was served. The same log feeds frequency capping and the
//! first-seen lookup of later requests.

use campaign_core::types::{EventType, VisitorEvent};
use campaign_store::CampaignRepository;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Domain logged for notification-only calls that carry no page domain.
pub const EXTENSION_DOMAIN: &str = "extension";

const STATUS_OK: i32 = 200;

/// A campaign whose content was actually returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServedCampaign {
    pub campaign_id: Uuid,
    pub event_type: EventType,
}

/// Build the rows for one request. Never returns an empty vector.
pub fn plan_events(
    visitor_id: &str,
    domain: Option<&str>,
    country: Option<&str>,
    served: &[ServedCampaign],
    now: DateTime<Utc>,
) -> Vec<VisitorEvent> {
    let domain = domain
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(EXTENSION_DOMAIN);

    let row = |campaign_id: Option<Uuid>, event_type: EventType| VisitorEvent {
        id: Uuid::new_v4(),
        visitor_id: visitor_id.to_string(),
        campaign_id,
        domain: domain.to_string(),
        country: country.map(str::to_string),
        event_type,
        status_code: STATUS_OK,
        created_at: now,
    };

    let mut credited = HashSet::with_capacity(served.len());
    let events: Vec<VisitorEvent> = served
        .iter()
        .filter(|s| credited.insert(s.campaign_id))
        .map(|s| row(Some(s.campaign_id), s.event_type))
        .collect();

    if events.is_empty() {
        vec![row(None, EventType::Request)]
    } else {
        events
    }
}

/// Appends planned events through the repository.
pub struct EventRecorder {
    repo: Arc<dyn CampaignRepository>,
}

impl EventRecorder {
    pub fn new(repo: Arc<dyn CampaignRepository>) -> Self {
        Self { repo }
    }

    /// Write the rows for one request as a single batch and return how many
    /// were written.
    pub async fn record(
        &self,
        visitor_id: &str,
        domain: Option<&str>,
        country: Option<&str>,
        served: &[ServedCampaign],
    ) -> anyhow::Result<u64> {
        let events = plan_events(visitor_id, domain, country, served, Utc::now());

        match self.repo.append_visitor_events(&events).await {
            Ok(written) => {
                metrics::counter!("events.recorded").increment(written);
                debug!(visitor_id = visitor_id, rows = written, "Visitor events recorded");
                Ok(written)
            }
            Err(e) => {
                metrics::counter!("events.record_errors").increment(1);
                error!(error = %e, visitor_id = visitor_id, rows = events.len(), "Failed to record visitor events");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use campaign_store::InMemoryRepository;

    fn served(event_type: EventType) -> ServedCampaign {
        ServedCampaign {
            campaign_id: Uuid::new_v4(),
            event_type,
        }
    }

    #[test]
    fn test_one_row_per_served_campaign() {
        let items = vec![served(EventType::Ad), served(EventType::Popup), served(EventType::Notification)];
        let events = plan_events("v1", Some("youtube.com"), Some("US"), &items, Utc::now());

        assert_eq!(events.len(), 3);
        for (event, item) in events.iter().zip(&items) {
            assert_eq!(event.campaign_id, Some(item.campaign_id));
            assert_eq!(event.event_type, item.event_type);
            assert_eq!(event.domain, "youtube.com");
            assert_eq!(event.country.as_deref(), Some("US"));
            assert_eq!(event.status_code, 200);
        }
    }

    #[test]
    fn test_duplicate_campaign_credited_once() {
        let item = served(EventType::Ad);
        let events = plan_events("v1", Some("youtube.com"), None, &[item, item], Utc::now());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_fallback_request_row() {
        let events = plan_events("v1", Some("reddit.com"), None, &[], Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].campaign_id, None);
        assert_eq!(events[0].event_type, EventType::Request);
        assert_eq!(events[0].domain, "reddit.com");
    }

    #[test]
    fn test_missing_domain_uses_sentinel() {
        let events = plan_events("v1", None, None, &[served(EventType::Notification)], Utc::now());
        assert_eq!(events[0].domain, EXTENSION_DOMAIN);

        let blank = plan_events("v1", Some("  "), None, &[], Utc::now());
        assert_eq!(blank[0].domain, EXTENSION_DOMAIN);
    }

    #[tokio::test]
    async fn test_record_appends_batch() {
        let repo = Arc::new(InMemoryRepository::new());
        let recorder = EventRecorder::new(repo.clone());

        let written = recorder
            .record("v1", Some("youtube.com"), None, &[served(EventType::Ad), served(EventType::Ad)])
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(repo.events_for("v1").len(), 2);
    }

    #[tokio::test]
    async fn test_record_surfaces_write_failure() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.set_event_writes_fail(true);
        let recorder = EventRecorder::new(repo.clone());

        assert!(recorder.record("v1", None, None, &[]).await.is_err());
        assert!(repo.events().is_empty());
    }
}
