//! Eligibility evaluation: decides whether a candidate campaign qualifies
//! for one visitor at one instant.
//!
//! Filters run in a fixed order and short-circuit on the first failure:
//! status, date window, audience, time-of-day, frequency cap, geography.
//! All of them are independent AND conditions.

use crate::frequency_capping;
use crate::geo;
use crate::time_window;
use campaign_core::types::{Campaign, CampaignStatus, FrequencyType, TargetAudience};
use chrono::{DateTime, Duration, Local, Timelike, Utc};
use std::collections::HashSet;
use std::fmt;

/// Visitors first seen within this many days (inclusive) count as new.
pub const NEW_USER_WINDOW_DAYS: i64 = 7;

/// The instant a request is evaluated at, plus the local wall-clock minute
/// used by time-of-day windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalTime {
    pub now: DateTime<Utc>,
    pub minute_of_day: u32,
}

impl EvalTime {
    /// Wall-clock minute taken from the server's local timezone.
    pub fn local(now: DateTime<Utc>) -> Self {
        let local = now.with_timezone(&Local);
        Self {
            now,
            minute_of_day: local.hour() * 60 + local.minute(),
        }
    }

    pub fn with_minute(now: DateTime<Utc>, minute_of_day: u32) -> Self {
        Self {
            now,
            minute_of_day: minute_of_day % time_window::MINUTES_PER_DAY,
        }
    }
}

/// What is known about the visitor before any campaign is evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorContext {
    /// Earliest logged event. `None` for a visitor never seen before.
    pub first_seen_at: Option<DateTime<Utc>>,
    /// Uppercase two-letter code, `None` when unknown.
    pub country: Option<String>,
}

impl VisitorContext {
    /// A visitor with no history is first seen now and therefore new.
    pub fn is_new_user(&self, now: DateTime<Utc>) -> bool {
        match self.first_seen_at {
            Some(first_seen) => now - first_seen <= Duration::days(NEW_USER_WINDOW_DAYS),
            None => true,
        }
    }
}

/// The filter that rejected a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disqualification {
    NotActive(CampaignStatus),
    NotStarted,
    Ended,
    NotNewUser,
    OutsideTimeWindow,
    FrequencyCapReached { views: i64 },
    CountryNotAllowed,
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disqualification::NotActive(status) => write!(f, "status is {status}"),
            Disqualification::NotStarted => f.write_str("start date not reached"),
            Disqualification::Ended => f.write_str("end date passed"),
            Disqualification::NotNewUser => f.write_str("visitor is not a new user"),
            Disqualification::OutsideTimeWindow => f.write_str("outside time-of-day window"),
            Disqualification::FrequencyCapReached { views } => {
                write!(f, "frequency cap reached after {views} views")
            }
            Disqualification::CountryNotAllowed => f.write_str("country not in allow-list"),
        }
    }
}

/// Run every filter against a campaign.
///
/// `countries` is the campaign's allow-list (empty or `None` = everywhere);
/// `past_views` is the visitor's historical event count for this campaign.
pub fn evaluate(
    campaign: &Campaign,
    time: &EvalTime,
    visitor: &VisitorContext,
    countries: Option<&HashSet<String>>,
    past_views: i64,
) -> Result<(), Disqualification> {
    if campaign.status != CampaignStatus::Active {
        return Err(Disqualification::NotActive(campaign.status));
    }

    if campaign.start_date.is_some_and(|start| time.now < start) {
        return Err(Disqualification::NotStarted);
    }
    if campaign.end_date.is_some_and(|end| time.now > end) {
        return Err(Disqualification::Ended);
    }

    if campaign.target_audience == TargetAudience::NewUsers && !visitor.is_new_user(time.now) {
        return Err(Disqualification::NotNewUser);
    }

    if campaign.frequency_type == FrequencyType::TimeBased
        && !time_window::campaign_in_window(
            campaign.time_start.as_deref(),
            campaign.time_end.as_deref(),
            time.minute_of_day,
        )
    {
        return Err(Disqualification::OutsideTimeWindow);
    }

    if !frequency_capping::under_cap(campaign, past_views) {
        return Err(Disqualification::FrequencyCapReached { views: past_views });
    }

    if !geo::country_allowed(countries, visitor.country.as_deref()) {
        return Err(Disqualification::CountryNotAllowed);
    }

    Ok(())
}

pub fn is_qualifying(
    campaign: &Campaign,
    time: &EvalTime,
    visitor: &VisitorContext,
    countries: Option<&HashSet<String>>,
    past_views: i64,
) -> bool {
    evaluate(campaign, time, visitor, countries, past_views).is_ok()
}
