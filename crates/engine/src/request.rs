//! Validated serving request.

use campaign_core::types::CampaignType;
use thiserror::Error;

/// Which content branches a request asks for. An unrequested branch is
/// skipped entirely: no candidate query, no content fetch, no events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScope {
    Ads,
    Notifications,
    Both,
}

impl FetchScope {
    /// Map the wire `requestType` (`"ad"`, `"notification"` or absent).
    pub fn from_request_type(request_type: Option<&str>) -> Result<Self, RequestError> {
        match request_type {
            None => Ok(FetchScope::Both),
            Some("ad") => Ok(FetchScope::Ads),
            Some("notification") => Ok(FetchScope::Notifications),
            Some(other) => Err(RequestError::InvalidRequestType(other.to_string())),
        }
    }

    pub fn includes_ads(self) -> bool {
        matches!(self, FetchScope::Ads | FetchScope::Both)
    }

    pub fn includes_notifications(self) -> bool {
        matches!(self, FetchScope::Notifications | FetchScope::Both)
    }

    pub fn admits(self, campaign_type: CampaignType) -> bool {
        if campaign_type.is_ad_like() {
            self.includes_ads()
        } else {
            self.includes_notifications()
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("visitorId is required")]
    MissingVisitorId,

    #[error("domain is required unless requestType is \"notification\"")]
    MissingDomain,

    #[error("requestType must be \"ad\" or \"notification\", got \"{0}\"")]
    InvalidRequestType(String),
}

impl RequestError {
    /// Machine-readable code returned in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::MissingVisitorId => "missing_visitor_id",
            RequestError::MissingDomain => "missing_domain",
            RequestError::InvalidRequestType(_) => "invalid_request_type",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeRequest {
    pub visitor_id: String,
    /// Page domain as reported by the extension. `None` only for
    /// notification-only requests.
    pub domain: Option<String>,
    pub scope: FetchScope,
    /// Uppercase two-letter code from trusted proxy headers.
    pub country: Option<String>,
}

impl ServeRequest {
    pub fn new(
        visitor_id: Option<&str>,
        domain: Option<&str>,
        request_type: Option<&str>,
        country: Option<String>,
    ) -> Result<Self, RequestError> {
        let visitor_id = visitor_id
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(RequestError::MissingVisitorId)?;

        let scope = FetchScope::from_request_type(request_type)?;

        let domain = domain.map(str::trim).filter(|d| !d.is_empty());
        if domain.is_none() && scope.includes_ads() {
            return Err(RequestError::MissingDomain);
        }

        Ok(Self {
            visitor_id: visitor_id.to_string(),
            domain: domain.map(str::to_string),
            scope,
            country,
        })
    }
}
