//! Repository trait and the fan-out helpers built on it.

use async_trait::async_trait;
use campaign_core::types::{Ad, Campaign, Notification, Platform, VisitorEvent, VisitorSummary};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Read-only campaign queries plus the visitor event log append.
///
/// Batch methods accept an id slice and must return an empty map (without a
/// round trip) when the slice is empty.
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn active_platforms(&self) -> anyhow::Result<Vec<Platform>>;

    /// Campaigns linked to the platform through `campaign_platforms`.
    async fn platform_campaigns(&self, platform_id: Uuid) -> anyhow::Result<Vec<Campaign>>;

    /// Notification campaigns with no `campaign_platforms` rows at all.
    async fn global_notification_campaigns(&self) -> anyhow::Result<Vec<Campaign>>;

    async fn campaign_countries(
        &self,
        campaign_ids: &[Uuid],
    ) -> anyhow::Result<HashMap<Uuid, HashSet<String>>>;

    /// Past events for this visitor per campaign, across all event types.
    async fn visitor_view_counts(
        &self,
        visitor_id: &str,
        campaign_ids: &[Uuid],
    ) -> anyhow::Result<HashMap<Uuid, i64>>;

    async fn campaign_ad_links(&self, campaign_ids: &[Uuid]) -> anyhow::Result<HashMap<Uuid, Uuid>>;

    async fn campaign_notification_links(
        &self,
        campaign_ids: &[Uuid],
    ) -> anyhow::Result<HashMap<Uuid, Uuid>>;

    /// Earliest event timestamp for the visitor.
    async fn visitor_first_seen(&self, visitor_id: &str) -> anyhow::Result<Option<DateTime<Utc>>>;

    async fn ads_by_ids(&self, ad_ids: &[Uuid]) -> anyhow::Result<Vec<Ad>>;

    async fn notifications_by_ids(&self, notification_ids: &[Uuid]) -> anyhow::Result<Vec<Notification>>;

    /// Append events in one batch. Returns the number of rows written.
    async fn append_visitor_events(&self, events: &[VisitorEvent]) -> anyhow::Result<u64>;

    async fn visitor_summary(&self, visitor_id: &str) -> anyhow::Result<Option<VisitorSummary>>;

    /// Notifications without a read receipt for the visitor, newest first.
    async fn unread_notifications(&self, visitor_id: &str) -> anyhow::Result<Vec<Notification>>;

    async fn mark_notifications_read(
        &self,
        visitor_id: &str,
        notification_ids: &[Uuid],
    ) -> anyhow::Result<()>;

    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Per-request lookup tables for the candidate campaign set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignLookups {
    pub countries: HashMap<Uuid, HashSet<String>>,
    pub view_counts: HashMap<Uuid, i64>,
    pub ad_links: HashMap<Uuid, Uuid>,
    pub notification_links: HashMap<Uuid, Uuid>,
}

impl CampaignLookups {
    pub fn views(&self, campaign_id: &Uuid) -> i64 {
        self.view_counts.get(campaign_id).copied().unwrap_or(0)
    }
}

/// Union of the platform's campaigns and (optionally) the global
/// notification campaigns, deduplicated by id in first-seen order.
pub async fn load_candidates(
    repo: &dyn CampaignRepository,
    platform: Option<&Platform>,
    include_global_notifications: bool,
) -> anyhow::Result<Vec<Campaign>> {
    let linked = async {
        match platform {
            Some(p) => repo.platform_campaigns(p.id).await,
            None => Ok(Vec::new()),
        }
    };
    let global = async {
        if include_global_notifications {
            repo.global_notification_campaigns().await
        } else {
            Ok(Vec::new())
        }
    };

    let (linked, global) = tokio::try_join!(linked, global)?;

    let mut seen = HashSet::with_capacity(linked.len() + global.len());
    Ok(linked
        .into_iter()
        .chain(global)
        .filter(|c| seen.insert(c.id))
        .collect())
}

/// Fetch every lookup table concurrently. An empty candidate set skips all
/// queries.
pub async fn load_lookups(
    repo: &dyn CampaignRepository,
    visitor_id: &str,
    campaign_ids: &[Uuid],
) -> anyhow::Result<CampaignLookups> {
    if campaign_ids.is_empty() {
        return Ok(CampaignLookups::default());
    }

    let (countries, view_counts, ad_links, notification_links) = tokio::try_join!(
        repo.campaign_countries(campaign_ids),
        repo.visitor_view_counts(visitor_id, campaign_ids),
        repo.campaign_ad_links(campaign_ids),
        repo.campaign_notification_links(campaign_ids),
    )?;

    Ok(CampaignLookups {
        countries,
        view_counts,
        ad_links,
        notification_links,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::{default_campaign, InMemoryRepository};
    use campaign_core::types::CampaignType;

    #[tokio::test]
    async fn test_candidates_union_and_dedup() {
        let repo = InMemoryRepository::new();
        let platform = repo.add_platform("youtube.com", true);

        let linked_ad = repo.add_campaign(default_campaign(CampaignType::Ads));
        repo.link_platform(linked_ad.id, platform.id);

        let global = repo.add_campaign(default_campaign(CampaignType::Notification));

        // Linked notification: not global, but served on this platform.
        let linked_notification = repo.add_campaign(default_campaign(CampaignType::Notification));
        repo.link_platform(linked_notification.id, platform.id);

        // Ads campaign with no platform is never a candidate.
        repo.add_campaign(default_campaign(CampaignType::Ads));

        let candidates = load_candidates(&repo, Some(&platform), true).await.unwrap();
        let ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&linked_ad.id));
        assert!(ids.contains(&linked_notification.id));
        assert!(ids.contains(&global.id));
    }

    #[tokio::test]
    async fn test_candidates_without_platform() {
        let repo = InMemoryRepository::new();
        let global = repo.add_campaign(default_campaign(CampaignType::Notification));
        repo.add_campaign(default_campaign(CampaignType::Ads));

        let candidates = load_candidates(&repo, None, true).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, global.id);

        let none = load_candidates(&repo, None, false).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_lookups_empty_set_skips_store() {
        let repo = InMemoryRepository::new();
        repo.set_unavailable(true);
        let lookups = load_lookups(&repo, "v1", &[]).await.unwrap();
        assert_eq!(lookups, CampaignLookups::default());
    }

    #[tokio::test]
    async fn test_lookups_fan_out() {
        let repo = InMemoryRepository::new();
        let campaign = repo.add_campaign(default_campaign(CampaignType::Ads));
        repo.add_country(campaign.id, "us");
        let ad = repo.add_ad("Summer Sale");
        repo.link_ad(campaign.id, ad.id);

        let lookups = load_lookups(&repo, "v1", &[campaign.id]).await.unwrap();
        assert!(lookups.countries[&campaign.id].contains("US"));
        assert_eq!(lookups.ad_links[&campaign.id], ad.id);
        assert!(lookups.notification_links.is_empty());
        assert_eq!(lookups.views(&campaign.id), 0);
    }
}
