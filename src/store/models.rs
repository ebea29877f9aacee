use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::providers::LinkedInAccount;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid run status: {}", s)),
        }
    }
}

/// One logical sourcing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub idempotency_key: String,
    pub status: RunStatus,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub target_candidates: u32,
    pub role_key: String,
    pub role_title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    CrossPlatform,
    Github,
    X,
    Linkedin,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrossPlatform => "cross_platform",
            Self::Github => "github",
            Self::X => "x",
            Self::Linkedin => "linkedin",
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cross_platform" => Ok(Self::CrossPlatform),
            "github" => Ok(Self::Github),
            "x" => Ok(Self::X),
            "linkedin" => Ok(Self::Linkedin),
            _ => Err(format!("Invalid platform: {}", s)),
        }
    }
}

/// Discretised identity confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceBand {
    Confirmed,
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// Band thresholds: >= 0.9 CONFIRMED, >= 0.8 HIGH, >= 0.6 MEDIUM,
    /// else LOW.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            Self::Confirmed
        } else if confidence >= 0.8 {
            Self::High
        } else if confidence >= 0.6 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "CONFIRMED",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    pub fn is_shortlist_band(&self) -> bool {
        matches!(self, Self::Confirmed | Self::High)
    }
}

impl FromStr for ConfidenceBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(Self::Confirmed),
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            _ => Err(format!("Invalid confidence band: {}", s)),
        }
    }
}

/// A candidate's resolved identity on one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateIdentity {
    pub platform: Platform,
    pub handle: Option<String>,
    pub url: Option<String>,
    pub confidence: f64,
    pub band: ConfidenceBand,
    pub reasons: Vec<String>,
    pub shortlist_eligible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKey {
    BuilderActivity,
    AiNativeEvidence,
    TechnicalDepth,
    RoleFit,
    BrowserVerificationNeeded,
}

impl SignalKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuilderActivity => "builder_activity",
            Self::AiNativeEvidence => "ai_native_evidence",
            Self::TechnicalDepth => "technical_depth",
            Self::RoleFit => "role_fit",
            Self::BrowserVerificationNeeded => "browser_verification_needed",
        }
    }
}

impl FromStr for SignalKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "builder_activity" => Ok(Self::BuilderActivity),
            "ai_native_evidence" => Ok(Self::AiNativeEvidence),
            "technical_depth" => Ok(Self::TechnicalDepth),
            "role_fit" => Ok(Self::RoleFit),
            "browser_verification_needed" => Ok(Self::BrowserVerificationNeeded),
            _ => Err(format!("Invalid signal key: {}", s)),
        }
    }
}

/// An append-only evidence signal derived during enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub key: SignalKey,
    pub numeric_value: Option<f64>,
    pub source: String,
    pub details: Option<String>,
}

impl Signal {
    pub fn numeric(key: SignalKey, value: f64, source: impl Into<String>) -> Self {
        Self {
            key,
            numeric_value: Some(value),
            source: source.into(),
            details: None,
        }
    }
}

/// The five-component rubric breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub builder_activity: f64,
    pub ai_native_evidence: f64,
    pub technical_depth: f64,
    pub role_fit: f64,
    pub identity_confidence: f64,
}

/// A candidate's score for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub total: f64,
    pub breakdown: ScoreBreakdown,
    pub concerns: Vec<String>,
    pub shortlist_eligible: bool,
    pub outreach_angle: String,
}

/// An external evidence URL attached to a (candidate, run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceLink {
    pub url: String,
    pub title: Option<String>,
    pub source: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    NewReview,
    UnderVerification,
    PromotedShortlist,
    Rejected,
    Deferred,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewReview => "new_review",
            Self::UnderVerification => "under_verification",
            Self::PromotedShortlist => "promoted_shortlist",
            Self::Rejected => "rejected",
            Self::Deferred => "deferred",
        }
    }
}

impl FromStr for ReviewState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_review" => Ok(Self::NewReview),
            "under_verification" => Ok(Self::UnderVerification),
            "promoted_shortlist" => Ok(Self::PromotedShortlist),
            "rejected" => Ok(Self::Rejected),
            "deferred" => Ok(Self::Deferred),
            _ => Err(format!("Invalid review state: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    Browser,
    Api,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Api => "api",
        }
    }
}

impl FromStr for VerificationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "browser" => Ok(Self::Browser),
            "api" => Ok(Self::Api),
            _ => Err(format!("Invalid verification method: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Confirmed,
    Rejected,
    Inconclusive,
}

impl VerificationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Inconclusive => "inconclusive",
        }
    }
}

impl FromStr for VerificationOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "rejected" => Ok(Self::Rejected),
            "inconclusive" => Ok(Self::Inconclusive),
            _ => Err(format!("Invalid verification outcome: {}", s)),
        }
    }
}

/// A sourced candidate as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub provider: String,
    pub provider_id: Option<String>,
    pub public_identifier: Option<String>,
    pub profile_url: Option<String>,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub current_company: Option<String>,
    pub current_role: Option<String>,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
}

/// Review workflow row for a (candidate, run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub candidate_id: String,
    pub run_id: String,
    pub status: ReviewState,
    pub priority: i64,
    pub notes: Option<String>,
    pub updated_at: i64,
}

/// An append-only verification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub candidate_id: String,
    pub run_id: String,
    pub method: VerificationMethod,
    pub outcome: VerificationOutcome,
    pub confidence_before: f64,
    pub confidence_after: f64,
    pub proof_links: Vec<String>,
    pub notes: Option<String>,
    pub created_at: i64,
}

/// The single promotion record for a (candidate, run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub candidate_id: String,
    pub run_id: String,
    pub promotion_reason: String,
    pub confidence_override: Option<f64>,
    pub outreach_angle: Option<String>,
    pub proof_links: Vec<String>,
    pub promoted_at: i64,
}

/// An append-only run failure row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    pub stage: String,
    pub candidate_ref: Option<String>,
    pub error_type: String,
    pub message: String,
    pub retryable: bool,
    pub payload: Option<serde_json::Value>,
}

// ── Diagnostics blob (persisted as `summary_json`) ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceQueryMode {
    #[default]
    Default,
    Broad,
}

impl SourceQueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Broad => "broad",
        }
    }
}

impl FromStr for SourceQueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "broad" => Ok(Self::Broad),
            _ => Err(format!("Invalid source query mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceQueryMode {
    #[default]
    Default,
    Strict,
}

impl EvidenceQueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Strict => "strict",
        }
    }
}

impl FromStr for EvidenceQueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "strict" => Ok(Self::Strict),
            _ => Err(format!("Invalid evidence query mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunModes {
    pub source_query_mode: SourceQueryMode,
    pub evidence_query_mode: EvidenceQueryMode,
}

/// Per-run counters threaded through enrichment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub sourced: u32,
    pub enriched: u32,
    pub enrich_failed: u32,
    pub external_discovered: u32,
    pub identity_confirmed_high: u32,
    pub identity_medium_low: u32,
    pub shortlist_eligible: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMessageCount {
    pub message: String,
    pub error_type: String,
    pub count: u32,
}

/// Aggregated failures for one stage: total plus the top-3 messages by count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageErrorAggregate {
    pub stage: String,
    pub total: u32,
    pub top_messages: Vec<StageMessageCount>,
}

/// The fatal failure descriptor for a run marked failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDescriptor {
    pub stage: String,
    pub error_type: String,
    pub message: String,
    pub retryable: bool,
}

/// The serialised summary attached to a completed or failed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidatePipelineDiagnostics {
    pub counts: RunCounts,
    #[serde(default)]
    pub stage_errors: Vec<StageErrorAggregate>,
    #[serde(default)]
    pub account: Option<LinkedInAccount>,
    #[serde(default)]
    pub effective_query: Option<String>,
    #[serde(default)]
    pub modes: RunModes,
    #[serde(default)]
    pub failure: Option<FailureDescriptor>,
}

// ── Read-side views ───────────────────────────────────────────────────

/// One result row: candidate joined with score, cross-platform identity, and
/// its top evidence links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResultRow {
    pub candidate: Candidate,
    pub score: CandidateScore,
    pub identity: Option<CandidateIdentity>,
    pub evidence: Vec<EvidenceLink>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsMeta {
    pub run_id: String,
    pub role_key: String,
    pub status: Option<RunStatus>,
    #[serde(default)]
    pub diagnostics: Option<CandidatePipelineDiagnostics>,
    #[serde(default)]
    pub modes: RunModes,
}

/// Results partitioned by shortlist eligibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePipelineResults {
    pub shortlist: Vec<CandidateResultRow>,
    pub review_queue: Vec<CandidateResultRow>,
    pub meta: ResultsMeta,
}

/// Full candidate document for the detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDetail {
    pub candidate: Candidate,
    pub identities: Vec<CandidateIdentity>,
    pub signals: Vec<Signal>,
    pub scores: Vec<(String, CandidateScore)>,
    pub evidence: Vec<EvidenceLink>,
    pub reviews: Vec<Review>,
    pub verifications: Vec<Verification>,
    pub promotions: Vec<Promotion>,
}

/// Review-state counters over one UTC day.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub new_review: u32,
    pub under_verification: u32,
    pub promoted_shortlist: u32,
    pub rejected: u32,
    pub deferred: u32,
}

/// Verification counters over one UTC day.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VerificationStats {
    pub submitted: u32,
    pub confirmed: u32,
    pub rejected: u32,
    pub inconclusive: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuotaProgress {
    pub target: u32,
    pub actual: u32,
    pub met: bool,
}

impl QuotaProgress {
    pub fn new(target: u32, actual: u32) -> Self {
        Self {
            target,
            actual,
            met: actual >= target,
        }
    }
}

/// Daily quota accounting versus the configured targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub promoted: QuotaProgress,
    pub reviewed: QuotaProgress,
    pub verification_budget: QuotaProgress,
}

/// The contract block of the daily report: what was promised for the day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyContract {
    pub date: String,
    pub role_key: String,
    pub run_id: String,
    pub promoted_target: u32,
    pub reviewed_target: u32,
    pub verification_budget: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub contract: DailyContract,
    pub workflow: WorkflowStats,
    pub verification: VerificationStats,
    pub quota: QuotaStatus,
}
