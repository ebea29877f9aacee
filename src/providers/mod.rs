//! Collaborator interfaces consumed by the pipeline.
//!
//! The engine never talks HTTP itself: the LinkedIn (Unipile) client, the web
//! search provider, and the web fetch provider are injected behind these
//! traits by the embedding application. Tests inject fakes.

pub mod types;
pub mod unconfigured;

use async_trait::async_trait;

use crate::errors::{ErrorKind, ProviderError};
pub use types::{
    ActivityFeed, ActivityItem, ActivityTimestamp, ApiKeySource, LinkedInAccount, LinkedInApi,
    LinkedInApiError, LinkedInProfile, SearchFilter, SourcedCandidate, TalentSearchOutcome,
    TalentSearchParams, WebFetchRequest, WebFetchResponse, WebSearchRequest, WebSearchResponse,
    WebSearchResult,
};

/// LinkedIn talent access: account resolution, search, and per-member
/// profile/activity reads.
#[async_trait]
pub trait LinkedInClient: Send + Sync {
    /// Resolve the account this process sources with.
    async fn resolve_account(&self) -> LinkedInAccount;

    /// Run a talent search. Failures are reported in-band on the outcome.
    async fn search_talent(&self, params: &TalentSearchParams) -> TalentSearchOutcome;

    async fn get_user_profile(&self, provider_id: &str)
        -> Result<LinkedInProfile, LinkedInApiError>;

    async fn get_user_posts(&self, provider_id: &str) -> Result<ActivityFeed, LinkedInApiError>;

    async fn get_user_comments(&self, provider_id: &str) -> Result<ActivityFeed, LinkedInApiError>;

    async fn get_user_reactions(&self, provider_id: &str)
        -> Result<ActivityFeed, LinkedInApiError>;
}

/// Deep person search over the public web.
#[async_trait]
pub trait WebSearchClient: Send + Sync {
    async fn execute(&self, request: &WebSearchRequest) -> Result<WebSearchResponse, ProviderError>;
}

/// Text extraction for a single URL.
#[async_trait]
pub trait WebFetchClient: Send + Sync {
    async fn execute(&self, request: &WebFetchRequest) -> Result<WebFetchResponse, ProviderError>;
}

/// Classify a raw LinkedIn client error into the pipeline taxonomy.
///
/// Transient: network, timeout, rate limit, and 5xx server errors. Message
/// keywords win over the HTTP status so wrapped transport failures classify
/// correctly.
pub fn classify_linkedin_error(err: &LinkedInApiError) -> ProviderError {
    let lower = err.message.to_lowercase();

    if lower.contains("timeout") || lower.contains("timed out") {
        return ProviderError::new(ErrorKind::Timeout, err.message.clone());
    }
    if lower.contains("econn") || lower.contains("network") || lower.contains("dns") {
        return ProviderError::new(ErrorKind::Network, err.message.clone());
    }

    match err.status {
        Some(429) => ProviderError::new(ErrorKind::RateLimit, err.message.clone()),
        Some(401) | Some(403) => ProviderError::fatal(ErrorKind::Auth, err.message.clone()),
        Some(404) => ProviderError::fatal(ErrorKind::NotFound, err.message.clone()),
        Some(400) | Some(422) => ProviderError::fatal(ErrorKind::Validation, err.message.clone()),
        Some(status) if (500..=599).contains(&status) => ProviderError {
            kind: ErrorKind::Api,
            message: err.message.clone(),
            retryable: true,
        },
        Some(_) => ProviderError::fatal(ErrorKind::Api, err.message.clone()),
        None => ProviderError::fatal(ErrorKind::Unknown, err.message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_rate_limit_is_retryable() {
        let err = classify_linkedin_error(&LinkedInApiError::new(Some(429), "Too Many Requests"));
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert!(err.retryable);
    }

    #[test]
    fn classify_auth_is_fatal() {
        let err = classify_linkedin_error(&LinkedInApiError::new(Some(401), "invalid api key"));
        assert_eq!(err.kind, ErrorKind::Auth);
        assert!(!err.retryable);
    }

    #[test]
    fn classify_server_errors_are_retryable_api() {
        for status in [500, 502, 503] {
            let err =
                classify_linkedin_error(&LinkedInApiError::new(Some(status), "upstream blew up"));
            assert_eq!(err.kind, ErrorKind::Api);
            assert!(err.retryable, "status {} should be retryable", status);
        }
    }

    #[test]
    fn classify_message_keywords_win_over_status() {
        let err = classify_linkedin_error(&LinkedInApiError::new(
            Some(400),
            "request timed out after 30s",
        ));
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.retryable);
    }

    #[test]
    fn classify_not_found_and_validation() {
        let err = classify_linkedin_error(&LinkedInApiError::new(Some(404), "no such member"));
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(!err.retryable);

        let err = classify_linkedin_error(&LinkedInApiError::new(Some(422), "bad cursor"));
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(!err.retryable);
    }

    #[test]
    fn classify_statusless_is_unknown() {
        let err = classify_linkedin_error(&LinkedInApiError::new(None, "mystery"));
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(!err.retryable);
    }
}
