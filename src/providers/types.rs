//! Typed request/response records for the collaborator interfaces.
//!
//! Collaborators return defined records; unknown upstream fields are dropped
//! at the boundary instead of being read dynamically downstream.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which LinkedIn search API variant a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkedInApi {
    #[default]
    Classic,
    Recruiter,
    SalesNavigator,
}

impl LinkedInApi {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Recruiter => "recruiter",
            Self::SalesNavigator => "sales_navigator",
        }
    }
}

impl FromStr for LinkedInApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(Self::Classic),
            "recruiter" => Ok(Self::Recruiter),
            "sales_navigator" => Ok(Self::SalesNavigator),
            _ => Err(format!("Invalid LinkedIn API mode: {}", s)),
        }
    }
}

/// A search filter fragment. Text-only filters that normalise to empty are
/// dropped; filters carrying a provider id survive normalisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub text: Option<String>,
    pub id: Option<String>,
}

impl SearchFilter {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            text: Some(value.into()),
            id: None,
        }
    }
}

/// Parameters for a talent search call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TalentSearchParams {
    pub keywords: Option<String>,
    pub role_keywords: Vec<SearchFilter>,
    pub skills: Vec<SearchFilter>,
    pub companies: Vec<SearchFilter>,
    pub location: Option<String>,
    pub industry: Option<String>,
    pub api: LinkedInApi,
    pub account_id: Option<String>,
    pub page_size: u32,
    pub max_pages: u32,
}

/// One sourced candidate row from a talent search page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcedCandidate {
    pub provider_id: Option<String>,
    pub public_identifier: Option<String>,
    pub profile_url: Option<String>,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub current_company: Option<String>,
    pub current_role: Option<String>,
}

/// Raw error surface from the LinkedIn client, before classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInApiError {
    pub status: Option<u16>,
    pub message: String,
}

impl LinkedInApiError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Talent search result: success/error are in-band, matching the wire
/// contract.
#[derive(Debug, Clone, Default)]
pub struct TalentSearchOutcome {
    pub success: bool,
    pub candidates: Vec<SourcedCandidate>,
    pub error: Option<LinkedInApiError>,
}

/// A fetched member profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkedInProfile {
    pub headline: Option<String>,
    pub employer: Option<String>,
    pub location: Option<String>,
    pub skills: Vec<String>,
    pub open_to_work: bool,
}

/// Activity item timestamps arrive as epoch seconds, epoch millis, or an ISO
/// string depending on the upstream endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActivityTimestamp {
    Number(f64),
    Text(String),
}

impl ActivityTimestamp {
    /// Normalise to epoch millis. Numbers above 10^12 are already millis,
    /// above 10^9 are seconds; smaller numbers are ignored. Strings parse as
    /// RFC 3339.
    pub fn as_epoch_millis(&self) -> Option<i64> {
        match self {
            Self::Number(n) => {
                if *n > 1e12 {
                    Some(*n as i64)
                } else if *n > 1e9 {
                    Some((*n * 1000.0) as i64)
                } else {
                    None
                }
            }
            Self::Text(s) => chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.timestamp_millis()),
        }
    }
}

/// One post, comment, or reaction from a member's activity feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityItem {
    pub timestamp: Option<ActivityTimestamp>,
    pub text: Option<String>,
}

/// An activity feed page (`items[]` on the wire).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityFeed {
    pub items: Vec<ActivityItem>,
}

/// Where the LinkedIn API key was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeySource {
    Env,
    Config,
    None,
}

impl ApiKeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Env => "env",
            Self::Config => "config",
            Self::None => "none",
        }
    }
}

/// Resolved LinkedIn account health, attached to run diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInAccount {
    pub account_id: String,
    pub unipile_account_id: Option<String>,
    pub enabled: bool,
    pub api_key_source: ApiKeySource,
    pub missing_credentials: Vec<String>,
}

impl LinkedInAccount {
    /// Ready to source: enabled with no missing credentials.
    pub fn is_ready(&self) -> bool {
        self.enabled && self.missing_credentials.is_empty()
    }
}

/// A web search request. The search type is always "deep person search".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WebSearchRequest {
    pub query: String,
    pub count: u32,
    pub category: Option<String>,
    pub include_domains: Vec<String>,
}

/// One web search hit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_name: Option<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSearchResponse {
    pub results: Vec<WebSearchResult>,
}

/// A web fetch request. Extraction mode is always plain text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebFetchRequest {
    pub url: String,
    pub max_chars: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebFetchResponse {
    pub content: String,
}
