//! Null collaborators for deployments where the embedding application has
//! not wired real provider clients. Read-side and workflow operations never
//! touch these; a sourcing run fails preflight with a clear message.

use async_trait::async_trait;

use crate::errors::{ErrorKind, ProviderError};

use super::types::*;
use super::{LinkedInClient, WebFetchClient, WebSearchClient};

pub struct UnconfiguredLinkedIn;

#[async_trait]
impl LinkedInClient for UnconfiguredLinkedIn {
    async fn resolve_account(&self) -> LinkedInAccount {
        LinkedInAccount {
            account_id: "unconfigured".to_string(),
            unipile_account_id: None,
            enabled: false,
            api_key_source: ApiKeySource::None,
            missing_credentials: vec![
                "UNIPILE_API_KEY".to_string(),
                "UNIPILE_ACCOUNT_ID".to_string(),
            ],
        }
    }

    async fn search_talent(&self, _params: &TalentSearchParams) -> TalentSearchOutcome {
        TalentSearchOutcome {
            success: false,
            candidates: Vec::new(),
            error: Some(LinkedInApiError::new(
                Some(401),
                "no LinkedIn client configured",
            )),
        }
    }

    async fn get_user_profile(
        &self,
        _provider_id: &str,
    ) -> Result<LinkedInProfile, LinkedInApiError> {
        Err(LinkedInApiError::new(
            Some(401),
            "no LinkedIn client configured",
        ))
    }

    async fn get_user_posts(&self, _provider_id: &str) -> Result<ActivityFeed, LinkedInApiError> {
        Err(LinkedInApiError::new(
            Some(401),
            "no LinkedIn client configured",
        ))
    }

    async fn get_user_comments(
        &self,
        _provider_id: &str,
    ) -> Result<ActivityFeed, LinkedInApiError> {
        Err(LinkedInApiError::new(
            Some(401),
            "no LinkedIn client configured",
        ))
    }

    async fn get_user_reactions(
        &self,
        _provider_id: &str,
    ) -> Result<ActivityFeed, LinkedInApiError> {
        Err(LinkedInApiError::new(
            Some(401),
            "no LinkedIn client configured",
        ))
    }
}

pub struct UnconfiguredWebSearch;

#[async_trait]
impl WebSearchClient for UnconfiguredWebSearch {
    async fn execute(
        &self,
        _request: &WebSearchRequest,
    ) -> Result<WebSearchResponse, ProviderError> {
        Err(ProviderError::fatal(
            ErrorKind::Auth,
            "no web search provider configured",
        ))
    }
}

pub struct UnconfiguredWebFetch;

#[async_trait]
impl WebFetchClient for UnconfiguredWebFetch {
    async fn execute(
        &self,
        _request: &WebFetchRequest,
    ) -> Result<WebFetchResponse, ProviderError> {
        Err(ProviderError::fatal(
            ErrorKind::Auth,
            "no web fetch provider configured",
        ))
    }
}
