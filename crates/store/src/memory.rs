//! In-memory repository for development mode and tests.
//!
//! Mirrors the relational schema table by table so join semantics (platform
//! links, global notification campaigns, content links) behave the same as
//! the PostgreSQL backend.

use crate::repository::CampaignRepository;
use async_trait::async_trait;
use campaign_core::types::{
    Ad, Campaign, CampaignStatus, CampaignType, FrequencyType, Notification, Platform,
    TargetAudience, VisitorEvent, VisitorSummary,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use uuid::Uuid;

/// Active, all-users, uncapped campaign with no date bounds.
pub fn default_campaign(campaign_type: CampaignType) -> Campaign {
    Campaign {
        id: Uuid::new_v4(),
        name: format!("{campaign_type} campaign"),
        target_audience: TargetAudience::AllUsers,
        campaign_type,
        frequency_type: FrequencyType::Always,
        frequency_count: None,
        time_start: None,
        time_end: None,
        status: CampaignStatus::Active,
        start_date: None,
        end_date: None,
        created_by: "admin".to_string(),
    }
}

#[derive(Default)]
struct Tables {
    platforms: Vec<Platform>,
    campaigns: Vec<Campaign>,
    campaign_platforms: Vec<(Uuid, Uuid)>,
    campaign_countries: Vec<(Uuid, String)>,
    campaign_ads: HashMap<Uuid, Uuid>,
    campaign_notifications: HashMap<Uuid, Uuid>,
    ads: Vec<Ad>,
    notifications: Vec<Notification>,
    events: Vec<VisitorEvent>,
}

pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    read_receipts: DashMap<String, HashSet<Uuid>>,
    unavailable: AtomicBool,
    event_writes_fail: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            read_receipts: DashMap::new(),
            unavailable: AtomicBool::new(false),
            event_writes_fail: AtomicBool::new(false),
        }
    }

    /// Repository pre-populated with a few platforms and campaigns.
    pub fn with_demo_data() -> Self {
        let repo = Self::new();
        repo.seed_demo_data();
        info!("In-memory repository initialized (development mode)");
        repo
    }

    /// Make every query fail, as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make only event appends fail.
    pub fn set_event_writes_fail(&self, fail: bool) {
        self.event_writes_fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("relational store unavailable");
        }
        Ok(())
    }

    // ─── Fixtures ──────────────────────────────────────────────────────────

    pub fn add_platform(&self, domain: &str, is_active: bool) -> Platform {
        let platform = Platform {
            id: Uuid::new_v4(),
            domain: domain.to_string(),
            is_active,
        };
        self.tables.write().platforms.push(platform.clone());
        platform
    }

    pub fn add_campaign(&self, campaign: Campaign) -> Campaign {
        self.tables.write().campaigns.push(campaign.clone());
        campaign
    }

    pub fn link_platform(&self, campaign_id: Uuid, platform_id: Uuid) {
        let mut tables = self.tables.write();
        if !tables.campaign_platforms.contains(&(campaign_id, platform_id)) {
            tables.campaign_platforms.push((campaign_id, platform_id));
        }
    }

    pub fn add_country(&self, campaign_id: Uuid, country_code: &str) {
        self.tables
            .write()
            .campaign_countries
            .push((campaign_id, country_code.trim().to_ascii_uppercase()));
    }

    pub fn add_ad(&self, name: &str) -> Ad {
        let ad = Ad {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{name} description"),
            image_url: format!("https://cdn.example.com/{}.png", name.to_lowercase().replace(' ', "-")),
            target_url: "https://example.com/landing".to_string(),
            html_code: None,
            status: "active".to_string(),
            start_date: None,
            end_date: None,
        };
        self.tables.write().ads.push(ad.clone());
        ad
    }

    pub fn remove_ad(&self, ad_id: Uuid) {
        self.tables.write().ads.retain(|a| a.id != ad_id);
    }

    /// A campaign carries at most one content item: linking an ad drops any
    /// notification link.
    pub fn link_ad(&self, campaign_id: Uuid, ad_id: Uuid) {
        let mut tables = self.tables.write();
        tables.campaign_notifications.remove(&campaign_id);
        tables.campaign_ads.insert(campaign_id, ad_id);
    }

    pub fn add_notification(&self, title: &str, message: &str) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            title: title.to_string(),
            message: message.to_string(),
            cta_link: None,
            created_at: Utc::now(),
        };
        self.tables.write().notifications.push(notification.clone());
        notification
    }

    pub fn remove_notification(&self, notification_id: Uuid) {
        self.tables.write().notifications.retain(|n| n.id != notification_id);
    }

    pub fn link_notification(&self, campaign_id: Uuid, notification_id: Uuid) {
        let mut tables = self.tables.write();
        tables.campaign_ads.remove(&campaign_id);
        tables.campaign_notifications.insert(campaign_id, notification_id);
    }

    /// Insert a historical event directly (bypasses availability flags).
    pub fn insert_event(&self, event: VisitorEvent) {
        self.tables.write().events.push(event);
    }

    pub fn events(&self) -> Vec<VisitorEvent> {
        self.tables.read().events.clone()
    }

    pub fn events_for(&self, visitor_id: &str) -> Vec<VisitorEvent> {
        self.tables
            .read()
            .events
            .iter()
            .filter(|e| e.visitor_id == visitor_id)
            .cloned()
            .collect()
    }

    pub fn seed_demo_data(&self) {
        let now = Utc::now();

        let youtube = self.add_platform("youtube.com", true);
        let instagram = self.add_platform("www.instagram.com", true);
        self.add_platform("legacy.example.com", false);

        let summer = self.add_ad("Summer Sale");
        let mut inline = default_campaign(CampaignType::Ads);
        inline.name = "Summer Sale inline".to_string();
        inline.start_date = Some(now - Duration::days(1));
        inline.end_date = Some(now + Duration::days(30));
        let inline = self.add_campaign(inline);
        self.link_platform(inline.id, youtube.id);
        self.link_platform(inline.id, instagram.id);
        self.link_ad(inline.id, summer.id);

        let welcome = self.add_ad("Welcome Offer");
        let mut popup = default_campaign(CampaignType::Popup);
        popup.name = "Welcome popup".to_string();
        popup.target_audience = TargetAudience::NewUsers;
        popup.frequency_type = FrequencyType::OnlyOnce;
        let popup = self.add_campaign(popup);
        self.link_platform(popup.id, youtube.id);
        self.link_ad(popup.id, welcome.id);

        let notice = self.add_notification("Night owl deals", "Late-night discounts are live.");
        let mut night = default_campaign(CampaignType::Notification);
        night.name = "Night owl".to_string();
        night.frequency_type = FrequencyType::TimeBased;
        night.time_start = Some("22:00".to_string());
        night.time_end = Some("06:00".to_string());
        let night = self.add_campaign(night);
        self.link_notification(night.id, notice.id);

        let update = self.add_notification("Extension updated", "Version 2 brings a new look.");
        let mut global = default_campaign(CampaignType::Notification);
        global.name = "Release notes".to_string();
        global.frequency_type = FrequencyType::SpecificCount;
        global.frequency_count = Some(3);
        let global = self.add_campaign(global);
        self.add_country(global.id, "US");
        self.add_country(global.id, "CA");
        self.link_notification(global.id, update.id);
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CampaignRepository for InMemoryRepository {
    async fn active_platforms(&self) -> anyhow::Result<Vec<Platform>> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .platforms
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn platform_campaigns(&self, platform_id: Uuid) -> anyhow::Result<Vec<Campaign>> {
        self.check()?;
        let tables = self.tables.read();
        Ok(tables
            .campaigns
            .iter()
            .filter(|c| tables.campaign_platforms.contains(&(c.id, platform_id)))
            .cloned()
            .collect())
    }

    async fn global_notification_campaigns(&self) -> anyhow::Result<Vec<Campaign>> {
        self.check()?;
        let tables = self.tables.read();
        let restricted: HashSet<Uuid> = tables.campaign_platforms.iter().map(|(c, _)| *c).collect();
        Ok(tables
            .campaigns
            .iter()
            .filter(|c| c.campaign_type == CampaignType::Notification && !restricted.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn campaign_countries(
        &self,
        campaign_ids: &[Uuid],
    ) -> anyhow::Result<HashMap<Uuid, HashSet<String>>> {
        if campaign_ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.check()?;
        let mut grouped: HashMap<Uuid, HashSet<String>> = HashMap::new();
        for (campaign_id, code) in &self.tables.read().campaign_countries {
            if campaign_ids.contains(campaign_id) {
                grouped.entry(*campaign_id).or_default().insert(code.clone());
            }
        }
        Ok(grouped)
    }

    async fn visitor_view_counts(
        &self,
        visitor_id: &str,
        campaign_ids: &[Uuid],
    ) -> anyhow::Result<HashMap<Uuid, i64>> {
        if campaign_ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.check()?;
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for event in &self.tables.read().events {
            if event.visitor_id != visitor_id {
                continue;
            }
            if let Some(campaign_id) = event.campaign_id.filter(|id| campaign_ids.contains(id)) {
                *counts.entry(campaign_id).or_default() += 1;
            }
        }
        Ok(counts)
    }

    async fn campaign_ad_links(&self, campaign_ids: &[Uuid]) -> anyhow::Result<HashMap<Uuid, Uuid>> {
        if campaign_ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.check()?;
        Ok(self
            .tables
            .read()
            .campaign_ads
            .iter()
            .filter(|(campaign_id, _)| campaign_ids.contains(campaign_id))
            .map(|(c, a)| (*c, *a))
            .collect())
    }

    async fn campaign_notification_links(
        &self,
        campaign_ids: &[Uuid],
    ) -> anyhow::Result<HashMap<Uuid, Uuid>> {
        if campaign_ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.check()?;
        Ok(self
            .tables
            .read()
            .campaign_notifications
            .iter()
            .filter(|(campaign_id, _)| campaign_ids.contains(campaign_id))
            .map(|(c, n)| (*c, *n))
            .collect())
    }

    async fn visitor_first_seen(&self, visitor_id: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .events
            .iter()
            .filter(|e| e.visitor_id == visitor_id)
            .map(|e| e.created_at)
            .min())
    }

    async fn ads_by_ids(&self, ad_ids: &[Uuid]) -> anyhow::Result<Vec<Ad>> {
        if ad_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.check()?;
        Ok(self
            .tables
            .read()
            .ads
            .iter()
            .filter(|a| ad_ids.contains(&a.id))
            .cloned()
            .collect())
    }

    async fn notifications_by_ids(&self, notification_ids: &[Uuid]) -> anyhow::Result<Vec<Notification>> {
        if notification_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.check()?;
        Ok(self
            .tables
            .read()
            .notifications
            .iter()
            .filter(|n| notification_ids.contains(&n.id))
            .cloned()
            .collect())
    }

    async fn append_visitor_events(&self, events: &[VisitorEvent]) -> anyhow::Result<u64> {
        self.check()?;
        if self.event_writes_fail.load(Ordering::SeqCst) {
            anyhow::bail!("visitor_events insert rejected");
        }
        self.tables.write().events.extend_from_slice(events);
        Ok(events.len() as u64)
    }

    async fn visitor_summary(&self, visitor_id: &str) -> anyhow::Result<Option<VisitorSummary>> {
        self.check()?;
        let tables = self.tables.read();
        let mut times = tables
            .events
            .iter()
            .filter(|e| e.visitor_id == visitor_id)
            .map(|e| e.created_at);

        let Some(first) = times.next() else {
            return Ok(None);
        };
        let (first_seen, last_seen, total) = times.fold((first, first, 1i64), |(lo, hi, n), t| {
            (lo.min(t), hi.max(t), n + 1)
        });

        Ok(Some(VisitorSummary {
            visitor_id: visitor_id.to_string(),
            first_seen,
            last_seen,
            total_events: total,
        }))
    }

    async fn unread_notifications(&self, visitor_id: &str) -> anyhow::Result<Vec<Notification>> {
        self.check()?;
        let read = self
            .read_receipts
            .get(visitor_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        let mut unread: Vec<Notification> = self
            .tables
            .read()
            .notifications
            .iter()
            .filter(|n| !read.contains(&n.id))
            .cloned()
            .collect();
        unread.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(unread)
    }

    async fn mark_notifications_read(
        &self,
        visitor_id: &str,
        notification_ids: &[Uuid],
    ) -> anyhow::Result<()> {
        if notification_ids.is_empty() {
            return Ok(());
        }
        self.check()?;
        self.read_receipts
            .entry(visitor_id.to_string())
            .or_default()
            .extend(notification_ids.iter().copied());
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.check()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use campaign_core::types::EventType;

    fn event(visitor_id: &str, campaign_id: Option<Uuid>, created_at: DateTime<Utc>) -> VisitorEvent {
        VisitorEvent {
            id: Uuid::new_v4(),
            visitor_id: visitor_id.to_string(),
            campaign_id,
            domain: "youtube.com".to_string(),
            country: None,
            event_type: if campaign_id.is_some() { EventType::Ad } else { EventType::Request },
            status_code: 200,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_view_counts_per_visitor_and_campaign() {
        let repo = InMemoryRepository::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        repo.insert_event(event("v1", Some(a), now));
        repo.insert_event(event("v1", Some(a), now));
        repo.insert_event(event("v1", Some(b), now));
        repo.insert_event(event("v1", None, now));
        repo.insert_event(event("v2", Some(a), now));

        let counts = repo.visitor_view_counts("v1", &[a, b]).await.unwrap();
        assert_eq!(counts[&a], 2);
        assert_eq!(counts[&b], 1);

        let only_a = repo.visitor_view_counts("v1", &[a]).await.unwrap();
        assert_eq!(only_a.len(), 1);
    }

    #[tokio::test]
    async fn test_visitor_summary_and_first_seen() {
        let repo = InMemoryRepository::new();
        let now = Utc::now();
        assert!(repo.visitor_summary("v1").await.unwrap().is_none());
        assert!(repo.visitor_first_seen("v1").await.unwrap().is_none());

        repo.insert_event(event("v1", None, now - Duration::days(3)));
        repo.insert_event(event("v1", None, now));
        repo.insert_event(event("v1", None, now - Duration::days(1)));

        let summary = repo.visitor_summary("v1").await.unwrap().unwrap();
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.first_seen, now - Duration::days(3));
        assert_eq!(summary.last_seen, now);
        assert_eq!(repo.visitor_first_seen("v1").await.unwrap(), Some(now - Duration::days(3)));
    }

    #[tokio::test]
    async fn test_single_content_link() {
        let repo = InMemoryRepository::new();
        let campaign = repo.add_campaign(default_campaign(CampaignType::Popup));
        let ad = repo.add_ad("Promo");
        let notification = repo.add_notification("Hi", "There");

        repo.link_notification(campaign.id, notification.id);
        repo.link_ad(campaign.id, ad.id);

        assert!(repo.campaign_notification_links(&[campaign.id]).await.unwrap().is_empty());
        assert_eq!(repo.campaign_ad_links(&[campaign.id]).await.unwrap()[&campaign.id], ad.id);
    }

    #[tokio::test]
    async fn test_read_receipts() {
        let repo = InMemoryRepository::new();
        let first = repo.add_notification("First", "one");
        let second = repo.add_notification("Second", "two");

        let unread = repo.unread_notifications("v1").await.unwrap();
        assert_eq!(unread.len(), 2);

        repo.mark_notifications_read("v1", &[first.id]).await.unwrap();
        let unread = repo.unread_notifications("v1").await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, second.id);

        assert_eq!(repo.unread_notifications("v2").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let repo = InMemoryRepository::with_demo_data();
        assert!(repo.ping().await.is_ok());
        repo.set_unavailable(true);
        assert!(repo.active_platforms().await.is_err());
        assert!(repo.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_demo_data_shape() {
        let repo = InMemoryRepository::with_demo_data();
        let platforms = repo.active_platforms().await.unwrap();
        assert_eq!(platforms.len(), 2);
        let globals = repo.global_notification_campaigns().await.unwrap();
        assert_eq!(globals.len(), 2);
    }
}
