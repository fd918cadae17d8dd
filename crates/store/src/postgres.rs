//! PostgreSQL backend via `sqlx::PgPool`.
//!
//! Every method borrows a pooled connection for a single statement, so no
//! connection is held across the engine's other awaits. Enum columns are
//! stored as text and parsed on the way out.

use crate::repository::CampaignRepository;
use crate::schema;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use campaign_core::config::DatabaseConfig;
use campaign_core::types::{Ad, Campaign, Notification, Platform, VisitorEvent, VisitorSummary};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const CAMPAIGN_COLUMNS: &str = "c.id, c.name, c.target_audience, c.campaign_type, c.frequency_type,
     c.frequency_count, c.time_start, c.time_end, c.status, c.start_date, c.end_date, c.created_by";

#[derive(sqlx::FromRow)]
struct PlatformRow {
    id: Uuid,
    domain: String,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: Uuid,
    name: String,
    target_audience: String,
    campaign_type: String,
    frequency_type: String,
    frequency_count: Option<i32>,
    time_start: Option<String>,
    time_end: Option<String>,
    status: String,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    created_by: String,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = anyhow::Error;

    fn try_from(row: CampaignRow) -> Result<Self> {
        let id = row.id;
        let invalid = |e: String| anyhow!("campaign {id}: {e}");
        Ok(Campaign {
            id,
            target_audience: row.target_audience.parse().map_err(invalid)?,
            campaign_type: row.campaign_type.parse().map_err(invalid)?,
            frequency_type: row.frequency_type.parse().map_err(invalid)?,
            status: row.status.parse().map_err(invalid)?,
            name: row.name,
            frequency_count: row.frequency_count,
            time_start: row.time_start,
            time_end: row.time_end,
            start_date: row.start_date,
            end_date: row.end_date,
            created_by: row.created_by,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AdRow {
    id: Uuid,
    name: String,
    description: String,
    image_url: String,
    target_url: String,
    html_code: Option<String>,
    status: String,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

impl From<AdRow> for Ad {
    fn from(row: AdRow) -> Self {
        Ad {
            id: row.id,
            name: row.name,
            description: row.description,
            image_url: row.image_url,
            target_url: row.target_url,
            html_code: row.html_code,
            status: row.status,
            start_date: row.start_date,
            end_date: row.end_date,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    title: String,
    message: String,
    cta_link: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            title: row.title,
            message: row.message,
            cta_link: row.cta_link,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    visitor_id: String,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    total_events: i64,
}

fn into_campaigns(rows: Vec<CampaignRow>) -> Result<Vec<Campaign>> {
    rows.into_iter().map(Campaign::try_from).collect()
}

#[derive(Clone)]
pub struct PgCampaignRepository {
    pool: PgPool,
}

impl PgCampaignRepository {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "PostgreSQL pool established");

        let repo = Self { pool };
        if config.run_schema {
            schema::ensure_schema(&repo.pool).await?;
        }
        Ok(repo)
    }
}

#[async_trait]
impl CampaignRepository for PgCampaignRepository {
    async fn active_platforms(&self) -> Result<Vec<Platform>> {
        let rows = sqlx::query_as::<_, PlatformRow>(
            "SELECT id, domain, is_active FROM platforms WHERE is_active = TRUE ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Platform {
                id: r.id,
                domain: r.domain,
                is_active: r.is_active,
            })
            .collect())
    }

    async fn platform_campaigns(&self, platform_id: Uuid) -> Result<Vec<Campaign>> {
        let sql = format!(
            "SELECT {CAMPAIGN_COLUMNS}
             FROM campaigns c
             JOIN campaign_platforms cp ON cp.campaign_id = c.id
             WHERE cp.platform_id = $1
             ORDER BY c.created_at"
        );
        let rows = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(platform_id)
            .fetch_all(&self.pool)
            .await?;
        into_campaigns(rows)
    }

    async fn global_notification_campaigns(&self) -> Result<Vec<Campaign>> {
        let sql = format!(
            "SELECT {CAMPAIGN_COLUMNS}
             FROM campaigns c
             WHERE c.campaign_type = 'notification'
               AND NOT EXISTS (SELECT 1 FROM campaign_platforms cp WHERE cp.campaign_id = c.id)
             ORDER BY c.created_at"
        );
        let rows = sqlx::query_as::<_, CampaignRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        into_campaigns(rows)
    }

    async fn campaign_countries(&self, campaign_ids: &[Uuid]) -> Result<HashMap<Uuid, HashSet<String>>> {
        if campaign_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT campaign_id, country_code FROM campaign_countries WHERE campaign_id = ANY($1)",
        )
        .bind(campaign_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, HashSet<String>> = HashMap::new();
        for (campaign_id, code) in rows {
            grouped
                .entry(campaign_id)
                .or_default()
                .insert(code.trim().to_ascii_uppercase());
        }
        Ok(grouped)
    }

    async fn visitor_view_counts(&self, visitor_id: &str, campaign_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        if campaign_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT campaign_id, COUNT(*) FROM visitor_events
             WHERE visitor_id = $1 AND campaign_id = ANY($2)
             GROUP BY campaign_id",
        )
        .bind(visitor_id)
        .bind(campaign_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn campaign_ad_links(&self, campaign_ids: &[Uuid]) -> Result<HashMap<Uuid, Uuid>> {
        if campaign_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT campaign_id, ad_id FROM campaign_ads WHERE campaign_id = ANY($1)",
        )
        .bind(campaign_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn campaign_notification_links(&self, campaign_ids: &[Uuid]) -> Result<HashMap<Uuid, Uuid>> {
        if campaign_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT campaign_id, notification_id FROM campaign_notifications WHERE campaign_id = ANY($1)",
        )
        .bind(campaign_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn visitor_first_seen(&self, visitor_id: &str) -> Result<Option<DateTime<Utc>>> {
        let first_seen = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MIN(created_at) FROM visitor_events WHERE visitor_id = $1",
        )
        .bind(visitor_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(first_seen)
    }

    async fn ads_by_ids(&self, ad_ids: &[Uuid]) -> Result<Vec<Ad>> {
        if ad_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, AdRow>(
            "SELECT id, name, description, image_url, target_url, html_code, status, start_date, end_date
             FROM ads WHERE id = ANY($1)",
        )
        .bind(ad_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Ad::from).collect())
    }

    async fn notifications_by_ids(&self, notification_ids: &[Uuid]) -> Result<Vec<Notification>> {
        if notification_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT id, title, message, cta_link, created_at FROM notifications WHERE id = ANY($1)",
        )
        .bind(notification_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn append_visitor_events(&self, events: &[VisitorEvent]) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO visitor_events
                (id, visitor_id, campaign_id, domain, country, event_type, status_code, created_at) ",
        );
        builder.push_values(events, |mut row, event| {
            row.push_bind(event.id)
                .push_bind(&event.visitor_id)
                .push_bind(event.campaign_id)
                .push_bind(&event.domain)
                .push_bind(&event.country)
                .push_bind(event.event_type.as_str())
                .push_bind(event.status_code)
                .push_bind(event.created_at);
        });
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn visitor_summary(&self, visitor_id: &str) -> Result<Option<VisitorSummary>> {
        let row = sqlx::query_as::<_, SummaryRow>(
            "SELECT visitor_id, MIN(created_at) AS first_seen, MAX(created_at) AS last_seen,
                    COUNT(*) AS total_events
             FROM visitor_events WHERE visitor_id = $1
             GROUP BY visitor_id",
        )
        .bind(visitor_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| VisitorSummary {
            visitor_id: r.visitor_id,
            first_seen: r.first_seen,
            last_seen: r.last_seen,
            total_events: r.total_events,
        }))
    }

    async fn unread_notifications(&self, visitor_id: &str) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT n.id, n.title, n.message, n.cta_link, n.created_at
             FROM notifications n
             WHERE NOT EXISTS (
                 SELECT 1 FROM notification_reads r
                 WHERE r.notification_id = n.id AND r.visitor_id = $1
             )
             ORDER BY n.created_at DESC",
        )
        .bind(visitor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_notifications_read(&self, visitor_id: &str, notification_ids: &[Uuid]) -> Result<()> {
        if notification_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO notification_reads (visitor_id, notification_id)
             SELECT $1, UNNEST($2::uuid[])
             ON CONFLICT DO NOTHING",
        )
        .bind(visitor_id)
        .bind(notification_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
