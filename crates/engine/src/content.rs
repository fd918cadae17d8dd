//! Content resolution: turns qualifying campaigns into the public payload.
//!
//! Ad and notification rows are fetched in one batch each. A linked id that
//! no longer resolves to a row is dropped from the payload and the campaign
//! is not credited.

use crate::request::FetchScope;
use campaign_analytics::ServedCampaign;
use campaign_core::types::{
    Ad, AdPayload, Campaign, Notification, NotificationPayload, ServeResponse,
};
use campaign_store::{CampaignLookups, CampaignRepository};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedContent {
    pub response: ServeResponse,
    /// Campaigns whose content made it into `response`, in payload order.
    pub served: Vec<ServedCampaign>,
}

fn distinct(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

pub async fn resolve_content(
    repo: &dyn CampaignRepository,
    qualifying: &[Campaign],
    lookups: &CampaignLookups,
    scope: FetchScope,
) -> anyhow::Result<ResolvedContent> {
    let ad_links: Vec<(&Campaign, Uuid)> = if scope.includes_ads() {
        qualifying
            .iter()
            .filter(|c| c.campaign_type.is_ad_like())
            .filter_map(|c| lookups.ad_links.get(&c.id).map(|ad_id| (c, *ad_id)))
            .collect()
    } else {
        Vec::new()
    };

    let notification_links: Vec<(&Campaign, Uuid)> = if scope.includes_notifications() {
        qualifying
            .iter()
            .filter(|c| !c.campaign_type.is_ad_like())
            .filter_map(|c| lookups.notification_links.get(&c.id).map(|n_id| (c, *n_id)))
            .collect()
    } else {
        Vec::new()
    };

    let ad_ids = distinct(ad_links.iter().map(|(_, id)| *id));
    let notification_ids = distinct(notification_links.iter().map(|(_, id)| *id));

    let (ads, notifications) = tokio::try_join!(
        repo.ads_by_ids(&ad_ids),
        repo.notifications_by_ids(&notification_ids),
    )?;

    let ads: HashMap<Uuid, Ad> = ads.into_iter().map(|a| (a.id, a)).collect();
    let notifications: HashMap<Uuid, Notification> =
        notifications.into_iter().map(|n| (n.id, n)).collect();

    let mut resolved = ResolvedContent::default();

    let mut emitted = HashSet::new();
    for (campaign, ad_id) in &ad_links {
        let Some(ad) = ads.get(ad_id) else {
            debug!(campaign_id = %campaign.id, ad_id = %ad_id, "Linked ad not found, skipping");
            continue;
        };
        if emitted.insert(*ad_id) {
            resolved
                .response
                .ads
                .push(AdPayload::from_ad(ad, campaign.campaign_type.display_mode()));
        }
        resolved.served.push(ServedCampaign {
            campaign_id: campaign.id,
            event_type: campaign.campaign_type.event_type(),
        });
    }

    let mut emitted = HashSet::new();
    for (campaign, notification_id) in &notification_links {
        let Some(notification) = notifications.get(notification_id) else {
            debug!(
                campaign_id = %campaign.id,
                notification_id = %notification_id,
                "Linked notification not found, skipping"
            );
            continue;
        };
        if emitted.insert(*notification_id) {
            resolved
                .response
                .notifications
                .push(NotificationPayload::from(notification));
        }
        resolved.served.push(ServedCampaign {
            campaign_id: campaign.id,
            event_type: campaign.campaign_type.event_type(),
        });
    }

    Ok(resolved)
}
