//! Domain model shared by the serving engine, the store and the HTTP layer.
//!
//! Enum values are persisted as lowercase/snake_case text; `as_str` and
//! `FromStr` are the single mapping between the two representations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "invalid {} value '{}'",
                        stringify!($name),
                        other
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ─── Platform ──────────────────────────────────────────────────────────────

/// A target website an extension may report as the current page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Platform {
    pub id: Uuid,
    pub domain: String,
    pub is_active: bool,
}

// ─── Campaign ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TargetAudience {
    AllUsers,
    NewUsers,
}

text_enum!(TargetAudience {
    AllUsers => "all_users",
    NewUsers => "new_users",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    Ads,
    Popup,
    Notification,
}

text_enum!(CampaignType {
    Ads => "ads",
    Popup => "popup",
    Notification => "notification",
});

impl CampaignType {
    /// Ads and popups are served from the ad join table; notifications from
    /// the notification join table.
    pub fn is_ad_like(&self) -> bool {
        matches!(self, CampaignType::Ads | CampaignType::Popup)
    }

    pub fn event_type(&self) -> EventType {
        match self {
            CampaignType::Ads => EventType::Ad,
            CampaignType::Popup => EventType::Popup,
            CampaignType::Notification => EventType::Notification,
        }
    }

    pub fn display_mode(&self) -> Option<DisplayMode> {
        match self {
            CampaignType::Ads => Some(DisplayMode::Inline),
            CampaignType::Popup => Some(DisplayMode::Popup),
            CampaignType::Notification => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyType {
    Always,
    FullDay,
    TimeBased,
    OnlyOnce,
    SpecificCount,
}

text_enum!(FrequencyType {
    Always => "always",
    FullDay => "full_day",
    TimeBased => "time_based",
    OnlyOnce => "only_once",
    SpecificCount => "specific_count",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Active,
    Inactive,
    Scheduled,
    Expired,
}

text_enum!(CampaignStatus {
    Active => "active",
    Inactive => "inactive",
    Scheduled => "scheduled",
    Expired => "expired",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub target_audience: TargetAudience,
    pub campaign_type: CampaignType,
    pub frequency_type: FrequencyType,
    /// Required iff `frequency_type` is `specific_count`.
    pub frequency_count: Option<i32>,
    /// Local `HH:MM`, required iff `frequency_type` is `time_based`.
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub status: CampaignStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_by: String,
}

// ─── Content ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ad {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub target_url: String,
    pub html_code: Option<String>,
    pub status: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub cta_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ─── Visitor events ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Ad,
    Notification,
    Popup,
    Request,
}

text_enum!(EventType {
    Ad => "ad",
    Notification => "notification",
    Popup => "popup",
    Request => "request",
});

/// A row of the append-only visitor event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitorEvent {
    pub id: Uuid,
    pub visitor_id: String,
    /// `None` marks a bare request where nothing qualified.
    pub campaign_id: Option<Uuid>,
    pub domain: String,
    pub country: Option<String>,
    pub event_type: EventType,
    pub status_code: i32,
    pub created_at: DateTime<Utc>,
}

/// Aggregate view over a visitor's events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitorSummary {
    pub visitor_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub total_events: i64,
}

// ─── Public payloads ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Inline,
    Popup,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdPayload {
    pub title: String,
    pub image: String,
    pub description: String,
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_as: Option<DisplayMode>,
}

impl AdPayload {
    pub fn from_ad(ad: &Ad, display_as: Option<DisplayMode>) -> Self {
        Self {
            title: ad.name.clone(),
            image: ad.image_url.clone(),
            description: ad.description.clone(),
            redirect_url: ad.target_url.clone(),
            html_code: ad.html_code.clone(),
            display_as,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    pub cta_link: Option<String>,
}

impl From<&Notification> for NotificationPayload {
    fn from(n: &Notification) -> Self {
        Self {
            title: n.title.clone(),
            message: n.message.clone(),
            cta_link: n.cta_link.clone(),
        }
    }
}

/// Body of a successful ad-block response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ServeResponse {
    pub ads: Vec<AdPayload>,
    pub notifications: Vec<NotificationPayload>,
}

impl ServeResponse {
    pub fn is_empty(&self) -> bool {
        self.ads.is_empty() && self.notifications.is_empty()
    }
}

/// Item of the unread-notification pull endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnreadNotification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub cta_link: Option<String>,
}

impl From<&Notification> for UnreadNotification {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            title: n.title.clone(),
            message: n.message.clone(),
            cta_link: n.cta_link.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_text_mapping() {
        assert_eq!(FrequencyType::SpecificCount.as_str(), "specific_count");
        assert_eq!("time_based".parse::<FrequencyType>().unwrap(), FrequencyType::TimeBased);
        assert_eq!("new_users".parse::<TargetAudience>().unwrap(), TargetAudience::NewUsers);
        assert!("weekly".parse::<FrequencyType>().is_err());
        assert_eq!(EventType::Request.to_string(), "request");
    }

    #[test]
    fn test_campaign_type_routing() {
        assert!(CampaignType::Ads.is_ad_like());
        assert!(CampaignType::Popup.is_ad_like());
        assert!(!CampaignType::Notification.is_ad_like());
        assert_eq!(CampaignType::Popup.display_mode(), Some(DisplayMode::Popup));
        assert_eq!(CampaignType::Ads.event_type(), EventType::Ad);
    }

    #[test]
    fn test_ad_payload_shape() {
        let ad = Ad {
            id: Uuid::new_v4(),
            name: "Summer Sale".into(),
            description: "50% off".into(),
            image_url: "https://cdn.example.com/a.png".into(),
            target_url: "https://shop.example.com".into(),
            html_code: None,
            status: "active".into(),
            start_date: None,
            end_date: None,
        };
        let json = serde_json::to_value(AdPayload::from_ad(&ad, Some(DisplayMode::Inline))).unwrap();
        assert_eq!(json["title"], "Summer Sale");
        assert_eq!(json["redirectUrl"], "https://shop.example.com");
        assert_eq!(json["displayAs"], "inline");
        assert!(json.get("htmlCode").is_none());
    }
}
