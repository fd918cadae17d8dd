//! Frequency capping: limits how many times a visitor is served a campaign.
//!
//! The view count comes from the visitor event log (all event types for the
//! visitor/campaign pair), read before this request's events are written.
//! Concurrent requests for the same pair can all read the same stale count.

use campaign_core::types::{Campaign, FrequencyType};

/// Maximum lifetime views for a campaign, `None` when uncapped.
///
/// `full_day` is not a numeric cap: it only means "any time while the date
/// window is open".
pub fn view_cap(campaign: &Campaign) -> Option<i64> {
    match campaign.frequency_type {
        FrequencyType::OnlyOnce => Some(1),
        FrequencyType::SpecificCount => campaign.frequency_count.map(i64::from),
        FrequencyType::Always | FrequencyType::FullDay | FrequencyType::TimeBased => None,
    }
}

pub fn under_cap(campaign: &Campaign, past_views: i64) -> bool {
    match view_cap(campaign) {
        Some(cap) => past_views < cap,
        None => true,
    }
}
