//! Cross-platform identity resolution.
//!
//! Rule-based and deterministic: reads only the passed input, applies every
//! rule, and keeps the highest score encountered. Confidence discretises into
//! bands; shortlist eligibility combines the band rule with the configured
//! confidence threshold.

use serde::{Deserialize, Serialize};

use crate::store::models::ConfidenceBand;

pub const REASON_DIRECT_PROFILE_LINK: &str = "direct_profile_link";
pub const REASON_REVERSE_LINK_VIA_SITE: &str = "reverse_link_via_site";
pub const REASON_STRONG_CONTEXT: &str = "strong_context_employer_location_handle";
pub const REASON_PARTIAL_CONTEXT: &str = "context_partial_match";
pub const REASON_UNCONFIRMED: &str = "unconfirmed_no_strong_match";

/// The candidate's LinkedIn side of the comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkedInIdentity {
    pub profile_url: Option<String>,
    pub employer: Option<String>,
    pub location: Option<String>,
}

/// A discovered GitHub presence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubHint {
    pub handle: Option<String>,
    pub url: Option<String>,
    /// LinkedIn URL declared on the GitHub profile, if any.
    pub linkedin_url: Option<String>,
    pub employer: Option<String>,
    pub location: Option<String>,
}

/// A discovered X presence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XHint {
    pub handle: Option<String>,
    pub url: Option<String>,
    pub linkedin_url: Option<String>,
}

/// A discovered personal site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalSiteHint {
    pub url: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub x_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityInput {
    pub linkedin: LinkedInIdentity,
    pub github: Option<GithubHint>,
    pub x: Option<XHint>,
    pub personal_site: Option<PersonalSiteHint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityResolution {
    pub confidence: f64,
    pub band: ConfidenceBand,
    pub reasons: Vec<String>,
    pub shortlist_eligible: bool,
}

impl IdentityResolution {
    /// Re-derive eligibility against a configured confidence threshold. The
    /// band rule still applies; the threshold is inclusive.
    pub fn with_threshold(mut self, min_confidence: f64) -> Self {
        self.shortlist_eligible =
            self.band.is_shortlist_band() && self.confidence >= min_confidence;
        self
    }
}

/// Trim, lowercase, strip trailing slashes.
fn normalize_url(url: &str) -> String {
    let mut normalized = url.trim().to_lowercase();
    while normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

fn urls_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) if !a.trim().is_empty() && !b.trim().is_empty() => {
            normalize_url(a) == normalize_url(b)
        }
        _ => false,
    }
}

fn text_matches(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let a = a.trim().to_lowercase();
            let b = b.trim().to_lowercase();
            !a.is_empty() && a == b
        }
        _ => false,
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Resolve the candidate's cross-platform identity confidence.
pub fn resolve_identity(input: &IdentityInput) -> IdentityResolution {
    let linkedin_url = input.linkedin.profile_url.as_deref();
    let mut confidence: f64 = 0.0;
    let mut reasons = Vec::new();

    // Direct profile link: any declared LinkedIn URL on another platform
    // points at this candidate.
    let declared_linkedin_urls = [
        input.github.as_ref().and_then(|g| g.linkedin_url.as_deref()),
        input.x.as_ref().and_then(|x| x.linkedin_url.as_deref()),
        input
            .personal_site
            .as_ref()
            .and_then(|site| site.linkedin_url.as_deref()),
    ];
    if declared_linkedin_urls
        .iter()
        .any(|declared| urls_match(*declared, linkedin_url))
    {
        confidence = confidence.max(0.95);
        reasons.push(REASON_DIRECT_PROFILE_LINK.to_string());
    }

    // Reverse link via the personal site: the site vouches for the GitHub or
    // X presence we found.
    if linkedin_url.is_some_and(|url| !url.trim().is_empty())
        && let Some(site) = input.personal_site.as_ref()
    {
        let github_reverse = urls_match(
            site.github_url.as_deref(),
            input.github.as_ref().and_then(|g| g.url.as_deref()),
        );
        let x_reverse = urls_match(
            site.x_url.as_deref(),
            input.x.as_ref().and_then(|x| x.url.as_deref()),
        );
        if github_reverse || x_reverse {
            confidence = confidence.max(0.90);
            reasons.push(REASON_REVERSE_LINK_VIA_SITE.to_string());
        }
    }

    // Context rules: employer, location, and handle agreement.
    let employer_match = text_matches(
        input.linkedin.employer.as_deref(),
        input.github.as_ref().and_then(|g| g.employer.as_deref()),
    );
    let location_match = text_matches(
        input.linkedin.location.as_deref(),
        input.github.as_ref().and_then(|g| g.location.as_deref()),
    );
    let handle_match = text_matches(
        input.github.as_ref().and_then(|g| g.handle.as_deref()),
        input.x.as_ref().and_then(|x| x.handle.as_deref()),
    );

    if employer_match && location_match && handle_match {
        confidence = confidence.max(0.82);
        reasons.push(REASON_STRONG_CONTEXT.to_string());
    } else if (employer_match && location_match) || (employer_match && handle_match) {
        confidence = confidence.max(0.70);
        reasons.push(REASON_PARTIAL_CONTEXT.to_string());
    }

    if reasons.is_empty() {
        reasons.push(REASON_UNCONFIRMED.to_string());
    }

    let confidence = round3(confidence);
    let band = ConfidenceBand::from_confidence(confidence);
    IdentityResolution {
        confidence,
        band,
        reasons,
        shortlist_eligible: band.is_shortlist_band(),
    }
}
