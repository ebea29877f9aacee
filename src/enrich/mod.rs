//! External-web evidence enrichment.
//!
//! For each candidate this issues four parallel deep person searches
//! (GitHub, X, personal web, and an optional strict AI-evidence pass),
//! extracts cross-platform identity hints from the hits, fetches body text
//! for the best evidence URLs, and derives keyword-presence signals.
//!
//! Search and fetch responses are cached process-wide with TTLs (15 min for
//! searches, 60 min for fetches) so re-runs and same-day retries stay cheap.

pub mod cache;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::errors::ProviderError;
use crate::identity::{GithubHint, PersonalSiteHint, XHint};
use crate::providers::{
    WebFetchClient, WebFetchRequest, WebSearchClient, WebSearchRequest, WebSearchResponse,
    WebSearchResult,
};
use crate::store::models::{EvidenceLink, EvidenceQueryMode, Signal, SignalKey};
use cache::TtlCache;

const SEARCH_CACHE_TTL: Duration = Duration::from_secs(15 * 60);
const FETCH_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const FETCH_MAX_CHARS: u32 = 8000;
const SEARCH_CATEGORY: &str = "person";
const RESULT_COUNT: u32 = 5;
const STRICT_RESULT_COUNT: u32 = 8;

const AI_KEYWORDS: [&str; 6] = ["codex", "claude code", "mcp", "agent", "agents", "autogen"];
const BUILDER_KEYWORDS: [&str; 7] = [
    "shipped",
    "release",
    "launched",
    "production",
    "deployed",
    "commit",
    "pr",
];
/// Any strict-search hit floors the AI-native signal here.
const STRICT_HIT_FLOOR: f64 = 0.35;

/// What the enricher needs to know about a candidate.
#[derive(Debug, Clone, Default)]
pub struct EnrichInput {
    pub name: Option<String>,
    pub current_company: Option<String>,
    pub headline: Option<String>,
}

/// Everything the enricher found.
#[derive(Debug, Clone, Default)]
pub struct ExternalFootprint {
    pub signals: Vec<Signal>,
    pub evidence: Vec<EvidenceLink>,
    pub github: Option<GithubHint>,
    pub x: Option<XHint>,
    pub personal_site: Option<PersonalSiteHint>,
}

pub struct ExternalEnricher {
    search: Arc<dyn WebSearchClient>,
    fetch: Arc<dyn WebFetchClient>,
    search_cache: TtlCache<WebSearchRequest, WebSearchResponse>,
    fetch_cache: TtlCache<String, String>,
}

impl ExternalEnricher {
    pub fn new(search: Arc<dyn WebSearchClient>, fetch: Arc<dyn WebFetchClient>) -> Self {
        Self {
            search,
            fetch,
            search_cache: TtlCache::new(SEARCH_CACHE_TTL),
            fetch_cache: TtlCache::new(FETCH_CACHE_TTL),
        }
    }

    /// Caches disabled; every call reaches the collaborators. For tests.
    pub fn without_caches(search: Arc<dyn WebSearchClient>, fetch: Arc<dyn WebFetchClient>) -> Self {
        Self {
            search,
            fetch,
            search_cache: TtlCache::disabled(),
            fetch_cache: TtlCache::disabled(),
        }
    }

    async fn cached_search(
        &self,
        request: WebSearchRequest,
    ) -> Result<WebSearchResponse, ProviderError> {
        if let Some(hit) = self.search_cache.get(&request) {
            return Ok(hit);
        }
        let response = self.search.execute(&request).await?;
        self.search_cache.insert(request, response.clone());
        Ok(response)
    }

    async fn cached_fetch(&self, url: &str) -> Result<String, ProviderError> {
        let key = url.to_string();
        if let Some(hit) = self.fetch_cache.get(&key) {
            return Ok(hit);
        }
        let response = self
            .fetch
            .execute(&WebFetchRequest {
                url: key.clone(),
                max_chars: FETCH_MAX_CHARS,
            })
            .await?;
        self.fetch_cache.insert(key, response.content.clone());
        Ok(response.content)
    }

    /// Search the web for the candidate's external footprint. Search failures
    /// propagate; the orchestrator owns retries.
    pub async fn enrich_external_footprint(
        &self,
        input: &EnrichInput,
        mode: EvidenceQueryMode,
    ) -> Result<ExternalFootprint, ProviderError> {
        let base_query = [
            input.name.as_deref(),
            input.current_company.as_deref(),
            input.headline.as_deref(),
        ]
        .iter()
        .filter_map(|part| part.map(str::trim))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        if base_query.is_empty() {
            return Ok(ExternalFootprint::default());
        }

        let strict = mode == EvidenceQueryMode::Strict;
        let github_request = WebSearchRequest {
            query: format!("{} github", base_query),
            count: RESULT_COUNT,
            category: Some(SEARCH_CATEGORY.to_string()),
            include_domains: vec!["github.com".to_string()],
        };
        let social_request = WebSearchRequest {
            query: format!("{} x.com OR twitter.com", base_query),
            count: RESULT_COUNT,
            category: Some(SEARCH_CATEGORY.to_string()),
            include_domains: vec!["x.com".to_string(), "twitter.com".to_string()],
        };
        let web_request = WebSearchRequest {
            query: format!("{} blog portfolio personal site", base_query),
            count: RESULT_COUNT,
            category: Some(SEARCH_CATEGORY.to_string()),
            include_domains: Vec::new(),
        };
        let strict_request = strict.then(|| WebSearchRequest {
            query: format!(
                "{} (\"claude code\" OR codex OR mcp OR agent tooling OR \"model context protocol\")",
                base_query
            ),
            count: STRICT_RESULT_COUNT,
            category: Some(SEARCH_CATEGORY.to_string()),
            include_domains: Vec::new(),
        });

        let (github_response, social_response, web_response, strict_response) = tokio::join!(
            self.cached_search(github_request),
            self.cached_search(social_request),
            self.cached_search(web_request),
            async {
                match strict_request {
                    Some(request) => self.cached_search(request).await.map(Some),
                    None => Ok(None),
                }
            }
        );
        let github_response = github_response?;
        let social_response = social_response?;
        let web_response = web_response?;
        let strict_results = strict_response?.map(|r| r.results).unwrap_or_default();

        // Identity hints from the first matching hit per platform.
        let github_hit = github_response
            .results
            .iter()
            .find(|result| host_contains(&result.url, &["github.com"]));
        let github = github_hit.and_then(|result| {
            first_path_segment(&result.url).map(|handle| GithubHint {
                handle: Some(handle),
                url: Some(result.url.clone()),
                ..GithubHint::default()
            })
        });

        let x_hit = social_response
            .results
            .iter()
            .find(|result| host_contains(&result.url, &["x.com", "twitter.com"]));
        let x = x_hit.and_then(|result| {
            first_path_segment(&result.url).map(|handle| XHint {
                handle: Some(handle),
                url: Some(result.url.clone()),
                ..XHint::default()
            })
        });

        let site_hit = web_response
            .results
            .iter()
            .find(|result| !host_contains(&result.url, &["linkedin.com", "github.com"]));
        let personal_site = site_hit.map(|result| PersonalSiteHint {
            url: Some(result.url.clone()),
            ..PersonalSiteHint::default()
        });

        // Evidence: the identity hits plus every strict hit, URL-deduped
        // (first seen wins).
        let mut seen = HashSet::new();
        let mut evidence = Vec::new();
        for (result, source) in github_hit
            .into_iter()
            .chain(x_hit)
            .chain(site_hit)
            .map(|result| (result, "web_search"))
            .chain(strict_results.iter().map(|result| (result, "web_search_strict")))
        {
            if seen.insert(result.url.clone()) {
                evidence.push(evidence_link(result, source));
            }
        }

        // Body text for the best evidence URLs. A failed fetch drops that
        // URL's content, not the candidate.
        let fetch_limit = if strict { 5 } else { 3 };
        let mut fetched_content = String::new();
        for link in evidence.iter().take(fetch_limit) {
            if let Ok(content) = self.cached_fetch(&link.url).await {
                fetched_content.push_str(&content.to_lowercase());
                fetched_content.push('\n');
            }
        }

        let mut signals = Vec::new();

        let strict_text = strict_results
            .iter()
            .flat_map(|result| [result.title.as_deref(), result.description.as_deref()])
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let strict_hit = AI_KEYWORDS.iter().any(|kw| strict_text.contains(kw));
        let mut ai_score = keyword_score(&fetched_content, &AI_KEYWORDS);
        if strict_hit {
            ai_score = ai_score.max(STRICT_HIT_FLOOR);
        }
        if ai_score > 0.0 {
            signals.push(Signal::numeric(
                SignalKey::AiNativeEvidence,
                ai_score,
                "external_web",
            ));
        }

        let builder_score = keyword_score(&fetched_content, &BUILDER_KEYWORDS);
        if builder_score > 0.0 {
            signals.push(Signal::numeric(
                SignalKey::BuilderActivity,
                builder_score,
                "external_web",
            ));
        }

        Ok(ExternalFootprint {
            signals,
            evidence,
            github,
            x,
            personal_site,
        })
    }
}

fn evidence_link(result: &WebSearchResult, source: &str) -> EvidenceLink {
    EvidenceLink {
        url: result.url.clone(),
        title: result.title.clone(),
        source: source.to_string(),
        relevance: result.score.unwrap_or(0.5),
    }
}

fn host_contains(url: &str, needles: &[&str]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    needles.iter().any(|needle| host.contains(needle))
}

/// First non-empty path segment, without a leading `@`.
fn first_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.find(|segment| !segment.is_empty())?;
    let handle = segment.trim_start_matches('@');
    (!handle.is_empty()).then(|| handle.to_string())
}

/// Distinct-keyword presence score: `min(1, matches / max(2, |KW|/2))`.
fn keyword_score(content: &str, keywords: &[&str]) -> f64 {
    if content.is_empty() {
        return 0.0;
    }
    let matches = keywords
        .iter()
        .filter(|keyword| content.contains(*keyword))
        .count() as f64;
    let denominator = (keywords.len() as f64 / 2.0).max(2.0);
    (matches / denominator).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::providers::WebFetchResponse;

    struct FakeSearch {
        calls: Mutex<Vec<WebSearchRequest>>,
        responses: Box<dyn Fn(&WebSearchRequest) -> WebSearchResponse + Send + Sync>,
    }

    impl FakeSearch {
        fn new(
            responses: impl Fn(&WebSearchRequest) -> WebSearchResponse + Send + Sync + 'static,
        ) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                responses: Box::new(responses),
            }
        }
    }

    #[async_trait]
    impl WebSearchClient for FakeSearch {
        async fn execute(
            &self,
            request: &WebSearchRequest,
        ) -> Result<WebSearchResponse, ProviderError> {
            self.calls.lock().unwrap().push(request.clone());
            Ok((self.responses)(request))
        }
    }

    struct FakeFetch {
        calls: Mutex<Vec<String>>,
        content: String,
    }

    impl FakeFetch {
        fn new(content: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                content: content.to_string(),
            }
        }
    }

    #[async_trait]
    impl WebFetchClient for FakeFetch {
        async fn execute(
            &self,
            request: &WebFetchRequest,
        ) -> Result<WebFetchResponse, ProviderError> {
            self.calls.lock().unwrap().push(request.url.clone());
            Ok(WebFetchResponse {
                content: self.content.clone(),
            })
        }
    }

    fn hit(url: &str) -> WebSearchResult {
        WebSearchResult {
            url: url.to_string(),
            title: Some("hit".to_string()),
            ..WebSearchResult::default()
        }
    }

    fn routed_search(request: &WebSearchRequest) -> WebSearchResponse {
        let results = if request.include_domains.contains(&"github.com".to_string()) {
            vec![hit("https://github.com/@alice-dev/project")]
        } else if request.include_domains.contains(&"x.com".to_string()) {
            vec![hit("https://x.com/alice_dev")]
        } else if request.query.contains("blog portfolio") {
            vec![
                hit("https://linkedin.com/in/alice"),
                hit("https://alice.dev/writing"),
            ]
        } else {
            vec![WebSearchResult {
                url: "https://blog.example.com/agents".to_string(),
                title: Some("Building agent tooling with Claude Code".to_string()),
                description: Some("mcp servers in production".to_string()),
                ..WebSearchResult::default()
            }]
        };
        WebSearchResponse { results }
    }

    fn input() -> EnrichInput {
        EnrichInput {
            name: Some("Alice".to_string()),
            current_company: Some("OpenClaw".to_string()),
            headline: Some("Staff Engineer".to_string()),
        }
    }

    #[tokio::test]
    async fn extracts_identity_hints_from_first_matching_hits() {
        let search = Arc::new(FakeSearch::new(routed_search));
        let fetch = Arc::new(FakeFetch::new(""));
        let enricher = ExternalEnricher::without_caches(search, fetch);

        let footprint = enricher
            .enrich_external_footprint(&input(), EvidenceQueryMode::Default)
            .await
            .unwrap();

        assert_eq!(
            footprint.github.as_ref().unwrap().handle.as_deref(),
            Some("alice-dev")
        );
        assert_eq!(
            footprint.x.as_ref().unwrap().handle.as_deref(),
            Some("alice_dev")
        );
        // LinkedIn hit is skipped for the personal site.
        assert_eq!(
            footprint.personal_site.as_ref().unwrap().url.as_deref(),
            Some("https://alice.dev/writing")
        );
    }

    #[tokio::test]
    async fn default_mode_issues_three_searches_and_three_fetches() {
        let search = Arc::new(FakeSearch::new(routed_search));
        let fetch = Arc::new(FakeFetch::new("nothing interesting"));
        let enricher =
            ExternalEnricher::without_caches(Arc::clone(&search) as _, Arc::clone(&fetch) as _);

        let footprint = enricher
            .enrich_external_footprint(&input(), EvidenceQueryMode::Default)
            .await
            .unwrap();

        assert_eq!(search.calls.lock().unwrap().len(), 3);
        assert_eq!(footprint.evidence.len(), 3);
        assert!(fetch.calls.lock().unwrap().len() <= 3);
    }

    #[tokio::test]
    async fn strict_mode_adds_strict_hits_and_floors_ai_signal() {
        let search = Arc::new(FakeSearch::new(routed_search));
        let fetch = Arc::new(FakeFetch::new("plain text"));
        let enricher = ExternalEnricher::without_caches(Arc::clone(&search) as _, fetch);

        let footprint = enricher
            .enrich_external_footprint(&input(), EvidenceQueryMode::Strict)
            .await
            .unwrap();

        assert_eq!(search.calls.lock().unwrap().len(), 4);
        assert!(footprint
            .evidence
            .iter()
            .any(|link| link.source == "web_search_strict"));
        let ai = footprint
            .signals
            .iter()
            .find(|signal| signal.key == SignalKey::AiNativeEvidence)
            .unwrap();
        assert!(ai.numeric_value.unwrap() >= STRICT_HIT_FLOOR);
    }

    #[tokio::test]
    async fn fetched_content_drives_builder_signal() {
        let search = Arc::new(FakeSearch::new(routed_search));
        let fetch = Arc::new(FakeFetch::new(
            "We shipped the release and deployed to production",
        ));
        let enricher = ExternalEnricher::without_caches(search, fetch);

        let footprint = enricher
            .enrich_external_footprint(&input(), EvidenceQueryMode::Default)
            .await
            .unwrap();

        let builder = footprint
            .signals
            .iter()
            .find(|signal| signal.key == SignalKey::BuilderActivity)
            .unwrap();
        // 5 of 7 keywords ("production" also matches "pr") over 3.5, capped at 1.
        assert!((builder.numeric_value.unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn evidence_urls_are_deduped_first_seen_wins() {
        let search = Arc::new(FakeSearch::new(|request: &WebSearchRequest| {
            // Every search returns the same URL.
            let _ = request;
            WebSearchResponse {
                results: vec![hit("https://github.com/alice-dev")],
            }
        }));
        let fetch = Arc::new(FakeFetch::new(""));
        let enricher = ExternalEnricher::without_caches(search, fetch);

        let footprint = enricher
            .enrich_external_footprint(&input(), EvidenceQueryMode::Strict)
            .await
            .unwrap();

        assert_eq!(footprint.evidence.len(), 1);
        assert_eq!(footprint.evidence[0].source, "web_search");
    }

    #[tokio::test]
    async fn search_cache_short_circuits_repeat_queries() {
        let search = Arc::new(FakeSearch::new(routed_search));
        let fetch = Arc::new(FakeFetch::new(""));
        let enricher = ExternalEnricher::new(Arc::clone(&search) as _, fetch);

        enricher
            .enrich_external_footprint(&input(), EvidenceQueryMode::Default)
            .await
            .unwrap();
        enricher
            .enrich_external_footprint(&input(), EvidenceQueryMode::Default)
            .await
            .unwrap();

        assert_eq!(search.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn blank_input_skips_searching() {
        let search = Arc::new(FakeSearch::new(routed_search));
        let fetch = Arc::new(FakeFetch::new(""));
        let enricher = ExternalEnricher::without_caches(Arc::clone(&search) as _, fetch);

        let footprint = enricher
            .enrich_external_footprint(&EnrichInput::default(), EvidenceQueryMode::Default)
            .await
            .unwrap();

        assert!(footprint.evidence.is_empty());
        assert!(search.calls.lock().unwrap().is_empty());
    }
}
