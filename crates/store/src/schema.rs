//! Idempotent schema bootstrap for the serving tables.

use sqlx::PgPool;
use tracing::info;

const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS platforms (
        id UUID PRIMARY KEY,
        domain TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS campaigns (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        target_audience TEXT NOT NULL CHECK (target_audience IN ('all_users', 'new_users')),
        campaign_type TEXT NOT NULL CHECK (campaign_type IN ('ads', 'popup', 'notification')),
        frequency_type TEXT NOT NULL
            CHECK (frequency_type IN ('always', 'full_day', 'time_based', 'only_once', 'specific_count')),
        frequency_count INTEGER,
        time_start TEXT,
        time_end TEXT,
        status TEXT NOT NULL CHECK (status IN ('active', 'inactive', 'scheduled', 'expired')),
        start_date TIMESTAMPTZ,
        end_date TIMESTAMPTZ,
        created_by TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS campaign_platforms (
        campaign_id UUID NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
        platform_id UUID NOT NULL REFERENCES platforms(id) ON DELETE CASCADE,
        PRIMARY KEY (campaign_id, platform_id)
    )",
    "CREATE TABLE IF NOT EXISTS campaign_countries (
        campaign_id UUID NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
        country_code TEXT NOT NULL,
        PRIMARY KEY (campaign_id, country_code)
    )",
    "CREATE TABLE IF NOT EXISTS ads (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        image_url TEXT NOT NULL DEFAULT '',
        target_url TEXT NOT NULL DEFAULT '',
        html_code TEXT,
        status TEXT NOT NULL DEFAULT 'active',
        start_date TIMESTAMPTZ,
        end_date TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS notifications (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        cta_link TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS campaign_ads (
        campaign_id UUID PRIMARY KEY REFERENCES campaigns(id) ON DELETE CASCADE,
        ad_id UUID NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS campaign_notifications (
        campaign_id UUID PRIMARY KEY REFERENCES campaigns(id) ON DELETE CASCADE,
        notification_id UUID NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS visitor_events (
        id UUID PRIMARY KEY,
        visitor_id TEXT NOT NULL,
        campaign_id UUID,
        domain TEXT NOT NULL,
        country TEXT,
        event_type TEXT NOT NULL CHECK (event_type IN ('ad', 'notification', 'popup', 'request')),
        status_code INTEGER NOT NULL DEFAULT 200,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS visitor_events_visitor_campaign_idx
        ON visitor_events (visitor_id, campaign_id)",
    "CREATE INDEX IF NOT EXISTS visitor_events_visitor_created_idx
        ON visitor_events (visitor_id, created_at)",
    "CREATE TABLE IF NOT EXISTS notification_reads (
        visitor_id TEXT NOT NULL,
        notification_id UUID NOT NULL REFERENCES notifications(id) ON DELETE CASCADE,
        read_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (visitor_id, notification_id)
    )",
];

pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    info!(statements = STATEMENTS.len(), "PostgreSQL schema verified");
    Ok(())
}
