//! OpenAPI document and Swagger UI configuration.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campaign Serve API",
        version = "0.1.0",
        description = "Eligibility and serving engine for browser-extension ads, popups and notifications.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Extension", description = "Endpoints called by the browser extension"),
        (name = "Realtime", description = "Dashboard endpoints for live connections and visitors"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        crate::extension_rest::ad_block,
        crate::extension_rest::domains,
        crate::extension_rest::unread_notifications,
        crate::realtime_rest::connection_count,
        crate::realtime_rest::push_notification,
        crate::realtime_rest::visitor_summary,
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        crate::extension_rest::AdBlockRequest,
        crate::extension_rest::NotificationsRequest,
        crate::extension_rest::NotificationsResponse,
        crate::extension_rest::DomainsResponse,
        crate::realtime_rest::ConnectionCountResponse,
        crate::realtime_rest::NotifyResponse,
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
        campaign_core::types::ServeResponse,
        campaign_core::types::AdPayload,
        campaign_core::types::NotificationPayload,
        campaign_core::types::DisplayMode,
        campaign_core::types::UnreadNotification,
        campaign_core::types::VisitorSummary,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
