//! Serving pipeline: receives a validated request, resolves the platform,
//! loads and filters candidate campaigns, resolves content and logs the
//! outcome.
//!
//! Nothing is cached between requests. Reads happen before the eligibility
//! decision, which happens before content resolution; the event write comes
//! last, using the already-computed served set.

use crate::content::resolve_content;
use crate::request::ServeRequest;
use campaign_analytics::EventRecorder;
use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::types::{Campaign, Platform, ServeResponse};
use campaign_delivery::{canonical_domain, evaluate, resolve_platform, EvalTime, VisitorContext};
use campaign_store::{load_candidates, load_lookups, CampaignRepository};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

fn store_error(e: anyhow::Error) -> CampaignError {
    CampaignError::Store(format!("{e:#}"))
}

/// Processes extension requests against the campaign repository.
pub struct ServeProcessor {
    repo: Arc<dyn CampaignRepository>,
    recorder: EventRecorder,
}

impl ServeProcessor {
    pub fn new(repo: Arc<dyn CampaignRepository>) -> Self {
        Self {
            recorder: EventRecorder::new(repo.clone()),
            repo,
        }
    }

    pub fn repository(&self) -> &Arc<dyn CampaignRepository> {
        &self.repo
    }

    /// Serve a request at the current instant.
    pub async fn serve(&self, request: &ServeRequest) -> CampaignResult<ServeResponse> {
        self.serve_at(request, EvalTime::local(Utc::now())).await
    }

    /// Serve a request as if evaluated at `time`.
    pub async fn serve_at(&self, request: &ServeRequest, time: EvalTime) -> CampaignResult<ServeResponse> {
        let start = std::time::Instant::now();
        let repo = self.repo.as_ref();
        let visitor_id = request.visitor_id.as_str();

        metrics::counter!("serve.requests").increment(1);

        let platform = async {
            match request.domain.as_deref() {
                Some(domain) => {
                    let platforms = repo.active_platforms().await?;
                    Ok::<_, anyhow::Error>(resolve_platform(domain, &platforms).cloned())
                }
                None => Ok(None),
            }
        };
        let (platform, first_seen_at) =
            tokio::try_join!(platform, repo.visitor_first_seen(visitor_id)).map_err(store_error)?;

        if platform.is_none() && request.domain.is_some() {
            debug!(domain = ?request.domain, "No active platform matches page domain");
        }

        let candidates = self.candidates(request, platform.as_ref()).await?;
        metrics::counter!("serve.campaigns.candidates").increment(candidates.len() as u64);

        let candidate_ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
        let lookups = load_lookups(repo, visitor_id, &candidate_ids)
            .await
            .map_err(store_error)?;

        let visitor = VisitorContext {
            first_seen_at,
            country: request.country.clone(),
        };

        let qualifying: Vec<Campaign> = candidates
            .into_iter()
            .filter(|campaign| {
                match evaluate(
                    campaign,
                    &time,
                    &visitor,
                    lookups.countries.get(&campaign.id),
                    lookups.views(&campaign.id),
                ) {
                    Ok(()) => true,
                    Err(reason) => {
                        debug!(campaign_id = %campaign.id, reason = %reason, "Campaign disqualified");
                        false
                    }
                }
            })
            .collect();
        metrics::counter!("serve.campaigns.qualified").increment(qualifying.len() as u64);

        let resolved = resolve_content(repo, &qualifying, &lookups, request.scope)
            .await
            .map_err(store_error)?;

        // The response is already determined; a failed write never fails it.
        if let Err(e) = self
            .recorder
            .record(
                visitor_id,
                request.domain.as_deref(),
                request.country.as_deref(),
                &resolved.served,
            )
            .await
        {
            warn!(error = %e, visitor_id = visitor_id, "Serving without a logged event");
        }

        let response = resolved.response;
        metrics::counter!("serve.ads.served").increment(response.ads.len() as u64);
        metrics::counter!("serve.notifications.served").increment(response.notifications.len() as u64);
        metrics::histogram!("serve.latency_us").record(start.elapsed().as_micros() as f64);

        info!(
            visitor_id = visitor_id,
            platform = ?platform.as_ref().map(|p| p.domain.as_str()),
            qualified = qualifying.len(),
            ads = response.ads.len(),
            notifications = response.notifications.len(),
            "Serve request completed"
        );

        Ok(response)
    }

    /// Candidate campaigns restricted to the requested scope. Global
    /// notification campaigns are only loaded when notifications were asked
    /// for.
    async fn candidates(
        &self,
        request: &ServeRequest,
        platform: Option<&Platform>,
    ) -> CampaignResult<Vec<Campaign>> {
        let mut candidates = load_candidates(
            self.repo.as_ref(),
            platform,
            request.scope.includes_notifications(),
        )
        .await
        .map_err(store_error)?;
        candidates.retain(|c| request.scope.admits(c.campaign_type));
        Ok(candidates)
    }

    /// Canonical (www-stripped), distinct, sorted domains of active platforms.
    pub async fn active_domains(&self) -> CampaignResult<Vec<String>> {
        let platforms = self.repo.active_platforms().await.map_err(store_error)?;
        let domains: BTreeSet<String> = platforms
            .iter()
            .map(|p| canonical_domain(&p.domain))
            .filter(|d| !d.is_empty())
            .collect();
        Ok(domains.into_iter().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use campaign_store::InMemoryRepository;

    #[tokio::test]
    async fn test_active_domains_canonical_and_distinct() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.add_platform("www.instagram.com", true);
        repo.add_platform("instagram.com", true);
        repo.add_platform("https://youtube.com/", true);
        repo.add_platform("hidden.com", false);

        let processor = ServeProcessor::new(repo);
        let domains = processor.active_domains().await.unwrap();
        assert_eq!(domains, vec!["instagram.com".to_string(), "youtube.com".to_string()]);
    }

    #[tokio::test]
    async fn test_store_failure_is_fatal() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.set_unavailable(true);
        let processor = ServeProcessor::new(repo);

        let request = ServeRequest::new(Some("v1"), Some("youtube.com"), None, None).unwrap();
        let err = processor.serve(&request).await.unwrap_err();
        assert!(matches!(err, CampaignError::Store(_)));
    }

    #[tokio::test]
    async fn test_event_write_failure_is_not_fatal() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.add_platform("youtube.com", true);
        repo.set_event_writes_fail(true);
        let processor = ServeProcessor::new(repo.clone());

        let request = ServeRequest::new(Some("v1"), Some("youtube.com"), None, None).unwrap();
        let response = processor.serve(&request).await.unwrap();
        assert!(response.ads.is_empty());
        assert!(repo.events().is_empty());
    }
}
