//! The per-run state machine and the hybrid review workflow operations.
//!
//! A run flows one way: search, upsert each candidate, enrich it (profile +
//! activity + external web), resolve identity, score, persist. Candidates
//! are processed sequentially to bound outstanding traffic; the four
//! per-candidate LinkedIn calls are issued in parallel. Per-candidate
//! failures are isolated and recorded; preflight and sourcing failures are
//! fatal for the run.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{BrowserVerificationMode, RecruitingConfig};
use crate::enrich::{EnrichInput, ExternalEnricher};
use crate::errors::{EngineError, ErrorKind, ProviderError, StageError};
use crate::identity::{resolve_identity, IdentityInput, LinkedInIdentity};
use crate::providers::{
    classify_linkedin_error, ActivityFeed, LinkedInClient, SourcedCandidate, TalentSearchParams,
    WebFetchClient, WebSearchClient,
};
use crate::scoring::{compute_candidate_score, ScoreInput};
use crate::store::models::*;
use crate::store::{BeginRun, DbHandle, RunStatusView, VerificationQueueEntry};

use super::diagnostics::RunAccumulator;
use super::query::normalize_for_broad_mode;
use super::retry::with_retry;

pub const STAGE_PREFLIGHT: &str = "linkedin_preflight";
pub const STAGE_SEARCH: &str = "linkedin_search";
pub const STAGE_ENRICH: &str = "candidate_enrich_score";

const PAGE_SIZE: u32 = 50;
const MIN_PAGES: u32 = 3;
const RECENT_ACTIVITY_WINDOW_MS: i64 = 90 * 86_400_000;
const ACTIVITY_SATURATION: f64 = 12.0;
const SKILLS_SATURATION: f64 = 12.0;
const RECENT_RUN_SCAN: u32 = 20;

/// The role a run sources for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub role_key: String,
    pub role_title: String,
    pub search: TalentSearchParams,
    pub target_candidates: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunRequest {
    pub role: RoleSpec,
    pub idempotency_key: Option<String>,
    /// Overrides the configured browser-verification switch for this run.
    pub browser_verification_enabled: Option<bool>,
    #[serde(default)]
    pub source_query_mode: SourceQueryMode,
    #[serde(default)]
    pub evidence_query_mode: EvidenceQueryMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub resumed: bool,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub candidate_id: String,
    pub run_id: String,
    pub method: VerificationMethod,
    pub outcome: VerificationOutcome,
    pub confidence_after: Option<f64>,
    pub proof_links: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitVerificationOutcome {
    pub outcome: VerificationOutcome,
    pub confidence_before: f64,
    pub confidence_after: f64,
    pub review: Option<Review>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRequest {
    pub candidate_id: String,
    pub run_id: String,
    pub promotion_reason: String,
    pub confidence_override: Option<f64>,
    pub outreach_angle: Option<String>,
    pub proof_links: Vec<String>,
}

/// Business-rule rejections come back as `success: false`, not errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionOutcome {
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueuePriority {
    #[default]
    All,
    High,
}

impl FromStr for QueuePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "high" => Ok(Self::High),
            _ => Err(format!("Invalid queue priority: {}", s)),
        }
    }
}

/// Serialised into `run_roles.criteria_json` so a run's effective search is
/// auditable later.
#[derive(Debug, Serialize)]
struct RunCriteria<'a> {
    role_key: &'a str,
    role_title: &'a str,
    target_candidates: u32,
    search: &'a TalentSearchParams,
    modes: RunModes,
}

struct CandidateOutcome {
    band: ConfidenceBand,
    shortlist_eligible: bool,
    external_links: usize,
}

fn today_utc() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn store_error(err: anyhow::Error) -> ProviderError {
    ProviderError::fatal(ErrorKind::Unknown, format!("store failure: {:#}", err))
}

/// Recency signal for one activity feed: items in the last 90 days,
/// saturating at 12.
fn activity_signal(feed: &ActivityFeed, source: &str, now_ms: i64) -> Signal {
    let cutoff = now_ms - RECENT_ACTIVITY_WINDOW_MS;
    let recent = feed
        .items
        .iter()
        .filter_map(|item| item.timestamp.as_ref().and_then(|ts| ts.as_epoch_millis()))
        .filter(|ts| *ts >= cutoff)
        .count();
    Signal::numeric(
        SignalKey::BuilderActivity,
        (recent as f64 / ACTIVITY_SATURATION).min(1.0),
        source,
    )
}

fn compose_notes(prefix: &str, notes: Option<&str>) -> String {
    match notes.map(str::trim).filter(|notes| !notes.is_empty()) {
        Some(notes) => format!("{} {}", prefix, notes),
        None => prefix.to_string(),
    }
}

pub struct CandidatePipeline {
    config: RecruitingConfig,
    store: DbHandle,
    linkedin: Arc<dyn LinkedInClient>,
    enricher: ExternalEnricher,
}

impl CandidatePipeline {
    pub fn new(
        config: RecruitingConfig,
        store: DbHandle,
        linkedin: Arc<dyn LinkedInClient>,
        search: Arc<dyn WebSearchClient>,
        fetch: Arc<dyn WebFetchClient>,
    ) -> Self {
        Self {
            config,
            store,
            linkedin,
            enricher: ExternalEnricher::new(search, fetch),
        }
    }

    /// Construct with a pre-built enricher (tests pass one without caches).
    pub fn with_enricher(
        config: RecruitingConfig,
        store: DbHandle,
        linkedin: Arc<dyn LinkedInClient>,
        enricher: ExternalEnricher,
    ) -> Self {
        Self {
            config,
            store,
            linkedin,
            enricher,
        }
    }

    // ── The run state machine ─────────────────────────────────────────

    /// Execute (or resume) a sourcing run. Pipeline failures never surface
    /// as errors: the run is marked failed with a diagnostics blob and the
    /// outcome reports `status: failed`. Only infrastructure failures around
    /// run bookkeeping bubble up.
    pub async fn run(&self, request: PipelineRunRequest) -> Result<RunOutcome> {
        if !self.config.enabled {
            return Err(EngineError::Disabled.into());
        }

        let target = self
            .config
            .clamp_target_candidates(request.role.target_candidates);
        let idempotency_key = match request.idempotency_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => format!("{}:{}:{}", request.role.role_key, target, today_utc()),
        };
        let modes = RunModes {
            source_query_mode: request.source_query_mode,
            evidence_query_mode: request.evidence_query_mode,
        };

        let mut search = match request.source_query_mode {
            SourceQueryMode::Broad => normalize_for_broad_mode(&request.role.search),
            SourceQueryMode::Default => request.role.search.clone(),
        };
        search.page_size = PAGE_SIZE;
        search.max_pages = MIN_PAGES.max(target.div_ceil(PAGE_SIZE));

        let criteria_json = serde_json::to_string(&RunCriteria {
            role_key: &request.role.role_key,
            role_title: &request.role.role_title,
            target_candidates: target,
            search: &search,
            modes,
        })
        .context("Failed to serialise run criteria")?;

        let begin_input = BeginRun {
            idempotency_key,
            role_key: request.role.role_key.clone(),
            role_title: request.role.role_title.clone(),
            target_candidates: target,
            criteria_json,
        };
        let begin = self
            .store
            .call(move |db| db.begin_run(&begin_input))
            .await?;
        if begin.resumed {
            info!(run_id = %begin.run_id, status = begin.status.as_str(), "run resumed by idempotency key");
            return Ok(RunOutcome {
                run_id: begin.run_id,
                resumed: true,
                status: begin.status,
            });
        }

        let run_id = begin.run_id;
        let browser_enabled = request
            .browser_verification_enabled
            .unwrap_or(self.config.browser_verification.enabled);

        let mut acc = RunAccumulator::new();
        acc.effective_query = search.keywords.clone();

        let outcome = self
            .execute(&run_id, &search, target, modes, browser_enabled, &mut acc)
            .await;

        let status = match outcome {
            Ok(()) => {
                let diagnostics = acc.into_diagnostics(modes, None);
                let finish_run_id = run_id.clone();
                self.store
                    .call(move |db| db.mark_run_completed(&finish_run_id, &diagnostics))
                    .await?;
                info!(run_id = %run_id, "run completed");
                RunStatus::Completed
            }
            Err(stage_error) => {
                warn!(run_id = %run_id, stage = %stage_error.stage, "run failed: {}", stage_error.error);
                let failure_row = RunFailure {
                    stage: stage_error.stage.clone(),
                    candidate_ref: None,
                    error_type: stage_error.error.kind.as_str().to_string(),
                    message: stage_error.error.message.clone(),
                    retryable: stage_error.error.retryable,
                    payload: None,
                };
                let failure_run_id = run_id.clone();
                if let Err(db_err) = self
                    .store
                    .call(move |db| db.record_run_failure(&failure_run_id, &failure_row))
                    .await
                {
                    warn!(run_id = %run_id, "failed to record run failure: {:#}", db_err);
                }
                let diagnostics = acc.into_diagnostics(
                    modes,
                    Some(FailureDescriptor {
                        stage: stage_error.stage,
                        error_type: stage_error.error.kind.as_str().to_string(),
                        message: stage_error.error.message,
                        retryable: stage_error.error.retryable,
                    }),
                );
                let finish_run_id = run_id.clone();
                self.store
                    .call(move |db| db.mark_run_failed(&finish_run_id, &diagnostics))
                    .await?;
                RunStatus::Failed
            }
        };

        Ok(RunOutcome {
            run_id,
            resumed: false,
            status,
        })
    }

    async fn execute(
        &self,
        run_id: &str,
        search: &TalentSearchParams,
        target: u32,
        modes: RunModes,
        browser_enabled: bool,
        acc: &mut RunAccumulator,
    ) -> Result<(), StageError> {
        // Preflight: the account must be enabled with complete credentials.
        let account = self.linkedin.resolve_account().await;
        let ready = account.is_ready();
        let account_id = account.account_id.clone();
        let missing = account.missing_credentials.join(", ");
        acc.account = Some(account);
        if !ready {
            let detail = if missing.is_empty() {
                format!("LinkedIn account '{}' is disabled", account_id)
            } else {
                format!(
                    "LinkedIn account '{}' is missing credentials: {}",
                    account_id, missing
                )
            };
            return Err(StageError::new(
                STAGE_PREFLIGHT,
                ProviderError::fatal(ErrorKind::Auth, detail),
            ));
        }

        // Source.
        let mut candidates = with_retry(STAGE_SEARCH, || async {
            let outcome = self.linkedin.search_talent(search).await;
            if outcome.success {
                Ok(outcome.candidates)
            } else {
                Err(outcome
                    .error
                    .as_ref()
                    .map(classify_linkedin_error)
                    .unwrap_or_else(|| {
                        ProviderError::fatal(
                            ErrorKind::Unknown,
                            "talent search failed without error detail",
                        )
                    }))
            }
        })
        .await
        .map_err(|err| StageError::new(STAGE_SEARCH, err))?;
        candidates.truncate(target as usize);

        // Enrich sequentially in sourced order; failures are isolated.
        for (index, sourced) in candidates.iter().enumerate() {
            let rank = index as u32 + 1;
            acc.counts.sourced += 1;
            match self
                .enrich_candidate(run_id, rank, sourced, modes.evidence_query_mode, browser_enabled)
                .await
            {
                Ok(outcome) => {
                    acc.counts.enriched += 1;
                    if outcome.external_links > 0 {
                        acc.counts.external_discovered += 1;
                    }
                    if outcome.band.is_shortlist_band() {
                        acc.counts.identity_confirmed_high += 1;
                    } else {
                        acc.counts.identity_medium_low += 1;
                    }
                    if outcome.shortlist_eligible {
                        acc.counts.shortlist_eligible += 1;
                    }
                }
                Err(err) => {
                    acc.counts.enrich_failed += 1;
                    acc.record_stage_error(STAGE_ENRICH, err.kind.as_str(), &err.message);
                    let candidate_ref = sourced
                        .public_identifier
                        .clone()
                        .or_else(|| sourced.provider_id.clone())
                        .or_else(|| sourced.name.clone());
                    warn!(
                        run_id,
                        rank,
                        candidate = candidate_ref.as_deref().unwrap_or("<unknown>"),
                        "candidate enrichment failed: {}",
                        err
                    );
                    let failure = RunFailure {
                        stage: STAGE_ENRICH.to_string(),
                        candidate_ref,
                        error_type: err.kind.as_str().to_string(),
                        message: err.message.clone(),
                        retryable: err.retryable,
                        payload: None,
                    };
                    let failure_run_id = run_id.to_string();
                    if let Err(db_err) = self
                        .store
                        .call(move |db| db.record_run_failure(&failure_run_id, &failure))
                        .await
                    {
                        warn!(run_id, "failed to record candidate failure: {:#}", db_err);
                    }
                }
            }
        }
        Ok(())
    }

    async fn enrich_candidate(
        &self,
        run_id: &str,
        rank: u32,
        sourced: &SourcedCandidate,
        evidence_mode: EvidenceQueryMode,
        browser_enabled: bool,
    ) -> Result<CandidateOutcome, ProviderError> {
        let sourced_owned = sourced.clone();
        let candidate = self
            .store
            .call(move |db| db.upsert_candidate(&sourced_owned))
            .await
            .map_err(store_error)?;

        let payload = serde_json::to_string(sourced).ok();
        let record_candidate_id = candidate.id.clone();
        let record_run_id = run_id.to_string();
        self.store
            .call(move |db| {
                db.add_source_record(
                    &record_candidate_id,
                    &record_run_id,
                    "linkedin_search",
                    rank,
                    payload.as_deref(),
                )
            })
            .await
            .map_err(store_error)?;

        let member_ref = sourced
            .provider_id
            .as_deref()
            .or(sourced.public_identifier.as_deref())
            .ok_or_else(|| {
                ProviderError::fatal(
                    ErrorKind::Validation,
                    "candidate has no provider id or public identifier",
                )
            })?;

        // Profile and the three activity feeds, in parallel, each retried.
        let (profile, posts, comments, reactions) = tokio::join!(
            with_retry("linkedin_profile", || async {
                self.linkedin
                    .get_user_profile(member_ref)
                    .await
                    .map_err(|err| classify_linkedin_error(&err))
            }),
            with_retry("linkedin_posts", || async {
                self.linkedin
                    .get_user_posts(member_ref)
                    .await
                    .map_err(|err| classify_linkedin_error(&err))
            }),
            with_retry("linkedin_comments", || async {
                self.linkedin
                    .get_user_comments(member_ref)
                    .await
                    .map_err(|err| classify_linkedin_error(&err))
            }),
            with_retry("linkedin_reactions", || async {
                self.linkedin
                    .get_user_reactions(member_ref)
                    .await
                    .map_err(|err| classify_linkedin_error(&err))
            }),
        );
        let profile = profile?;
        let posts = posts?;
        let comments = comments?;
        let reactions = reactions?;

        let now_ms = Utc::now().timestamp_millis();
        let mut signals = vec![
            activity_signal(&posts, "posts", now_ms),
            activity_signal(&comments, "comments", now_ms),
            activity_signal(&reactions, "reactions", now_ms),
        ];

        let technical_depth = if profile.skills.is_empty() {
            0.0
        } else {
            (profile.skills.len() as f64 / SKILLS_SATURATION).min(1.0)
        };
        signals.push(Signal::numeric(
            SignalKey::TechnicalDepth,
            technical_depth,
            "profile",
        ));

        let headline = profile
            .headline
            .clone()
            .or_else(|| sourced.headline.clone());
        signals.push(Signal::numeric(
            SignalKey::RoleFit,
            if headline.is_some() { 0.6 } else { 0.3 },
            "profile",
        ));

        // External web evidence, retried as one unit.
        let enrich_input = EnrichInput {
            name: candidate.name.clone(),
            current_company: profile
                .employer
                .clone()
                .or_else(|| candidate.current_company.clone()),
            headline: headline.clone(),
        };
        let footprint = with_retry("external_search", || {
            self.enricher
                .enrich_external_footprint(&enrich_input, evidence_mode)
        })
        .await?;
        signals.extend(footprint.signals.iter().cloned());

        // Cross-platform identity.
        let identity_input = IdentityInput {
            linkedin: LinkedInIdentity {
                profile_url: candidate.profile_url.clone(),
                employer: enrich_input.current_company.clone(),
                location: profile
                    .location
                    .clone()
                    .or_else(|| candidate.location.clone()),
            },
            github: footprint.github.clone(),
            x: footprint.x.clone(),
            personal_site: footprint.personal_site.clone(),
        };
        let resolution = resolve_identity(&identity_input)
            .with_threshold(self.config.identity.min_confidence_for_shortlist);

        let needs_browser = browser_enabled
            && match self.config.browser_verification.mode {
                BrowserVerificationMode::Always => true,
                BrowserVerificationMode::HighOnly => resolution.band == ConfidenceBand::High,
            };
        if needs_browser {
            signals.push(Signal::numeric(
                SignalKey::BrowserVerificationNeeded,
                1.0,
                "identity",
            ));
        }

        // Evidence: the LinkedIn profile first, then external links,
        // URL-deduped.
        let mut seen = HashSet::new();
        let mut evidence = Vec::new();
        if let Some(url) = candidate.profile_url.clone() {
            seen.insert(url.clone());
            evidence.push(EvidenceLink {
                url,
                title: candidate.name.clone(),
                source: "linkedin".to_string(),
                relevance: 1.0,
            });
        }
        let external_links = footprint.evidence.len();
        for link in &footprint.evidence {
            if seen.insert(link.url.clone()) {
                evidence.push(link.clone());
            }
        }

        let score = compute_candidate_score(&ScoreInput {
            signals: signals.clone(),
            identity_confidence: resolution.confidence,
            identity_shortlist_eligible: resolution.shortlist_eligible,
            evidence: evidence
                .iter()
                .map(|link| (link.url.clone(), link.title.clone()))
                .collect(),
            open_to_work: profile.open_to_work,
        });

        // Per-platform identity rows.
        let mut identities = vec![
            CandidateIdentity {
                platform: Platform::CrossPlatform,
                handle: None,
                url: None,
                confidence: resolution.confidence,
                band: resolution.band,
                reasons: resolution.reasons.clone(),
                shortlist_eligible: resolution.shortlist_eligible,
            },
            CandidateIdentity {
                platform: Platform::Linkedin,
                handle: candidate
                    .public_identifier
                    .clone()
                    .or_else(|| candidate.provider_id.clone()),
                url: candidate.profile_url.clone(),
                confidence: 1.0,
                band: ConfidenceBand::Confirmed,
                reasons: vec!["source_platform".to_string()],
                shortlist_eligible: true,
            },
        ];
        if let Some(github) = footprint.github.as_ref() {
            identities.push(CandidateIdentity {
                platform: Platform::Github,
                handle: github.handle.clone(),
                url: github.url.clone(),
                confidence: resolution.confidence,
                band: resolution.band,
                reasons: resolution.reasons.clone(),
                shortlist_eligible: resolution.shortlist_eligible,
            });
        }
        if let Some(x) = footprint.x.as_ref() {
            identities.push(CandidateIdentity {
                platform: Platform::X,
                handle: x.handle.clone(),
                url: x.url.clone(),
                confidence: resolution.confidence,
                band: resolution.band,
                reasons: resolution.reasons.clone(),
                shortlist_eligible: resolution.shortlist_eligible,
            });
        }

        // Persist after every collaborator call has returned, so the
        // candidate's rows land together.
        let outcome = CandidateOutcome {
            band: resolution.band,
            shortlist_eligible: resolution.shortlist_eligible,
            external_links,
        };
        let persist_candidate_id = candidate.id.clone();
        let persist_run_id = run_id.to_string();
        self.store
            .call(move |db| {
                for identity in &identities {
                    db.upsert_identity(&persist_candidate_id, identity)?;
                }
                db.add_signals(&persist_candidate_id, &persist_run_id, &signals)?;
                db.upsert_score(&persist_candidate_id, &persist_run_id, &score)?;
                db.add_evidence_links(&persist_candidate_id, &persist_run_id, &evidence)?;
                Ok(())
            })
            .await
            .map_err(store_error)?;

        Ok(outcome)
    }

    // ── Read-side operations ──────────────────────────────────────────

    pub async fn status(&self, run_id: &str) -> Result<RunStatusView> {
        let run_id_owned = run_id.to_string();
        self.store
            .call(move |db| db.get_run_status(&run_id_owned))
            .await?
            .ok_or_else(|| {
                EngineError::RunNotFound {
                    id: run_id.to_string(),
                }
                .into()
            })
    }

    pub async fn recent_runs(&self) -> Result<Vec<RunStatusView>> {
        self.store
            .call(move |db| db.list_recent_runs(RECENT_RUN_SCAN))
            .await
    }

    pub async fn results(&self, run_id: &str, limit: u32) -> Result<CandidatePipelineResults> {
        let run_id_owned = run_id.to_string();
        self.store
            .call(move |db| db.get_results(&run_id_owned, limit))
            .await
    }

    pub async fn candidate(&self, candidate_id: &str) -> Result<CandidateDetail> {
        let id_owned = candidate_id.to_string();
        self.store
            .call(move |db| db.get_candidate_detail(&id_owned))
            .await?
            .ok_or_else(|| {
                EngineError::CandidateNotFound {
                    id: candidate_id.to_string(),
                }
                .into()
            })
    }

    // ── Hybrid workflow operations ────────────────────────────────────

    pub async fn update_review_status(
        &self,
        candidate_id: &str,
        run_id: &str,
        status: ReviewState,
        notes: Option<String>,
        priority: Option<i64>,
    ) -> Result<Review> {
        let candidate_id = candidate_id.to_string();
        let run_id = run_id.to_string();
        self.store
            .call(move |db| {
                db.upsert_review_status(&candidate_id, &run_id, status, notes.as_deref(), priority)
            })
            .await
    }

    pub async fn get_verification_queue(
        &self,
        run_id: &str,
        limit: u32,
        priority: QueuePriority,
    ) -> Result<Vec<VerificationQueueEntry>> {
        let run_id = run_id.to_string();
        let high_only = priority == QueuePriority::High;
        self.store
            .call(move |db| db.get_verification_queue(&run_id, limit, high_only))
            .await
    }

    /// Record a verification and drive the review transition: `confirmed`
    /// promotes, `rejected` rejects, `inconclusive` leaves the review
    /// untouched.
    pub async fn submit_verification(
        &self,
        request: VerificationRequest,
    ) -> Result<SubmitVerificationOutcome> {
        let identity_candidate_id = request.candidate_id.clone();
        let confidence_before = self
            .store
            .call(move |db| db.get_identity(&identity_candidate_id, Platform::CrossPlatform))
            .await?
            .map(|identity| identity.confidence)
            .unwrap_or(0.0);
        let confidence_after = request.confidence_after.unwrap_or(confidence_before);

        let verification = Verification {
            candidate_id: request.candidate_id.clone(),
            run_id: request.run_id.clone(),
            method: request.method,
            outcome: request.outcome,
            confidence_before,
            confidence_after,
            proof_links: request.proof_links.clone(),
            notes: request.notes.clone(),
            created_at: 0,
        };
        self.store
            .call(move |db| db.insert_verification(&verification))
            .await?;

        let review = match request.outcome {
            VerificationOutcome::Confirmed => Some(
                self.update_review_status(
                    &request.candidate_id,
                    &request.run_id,
                    ReviewState::PromotedShortlist,
                    Some(compose_notes(
                        "Verified via browser.",
                        request.notes.as_deref(),
                    )),
                    None,
                )
                .await?,
            ),
            VerificationOutcome::Rejected => Some(
                self.update_review_status(
                    &request.candidate_id,
                    &request.run_id,
                    ReviewState::Rejected,
                    Some(compose_notes(
                        "Verification rejected.",
                        request.notes.as_deref(),
                    )),
                    None,
                )
                .await?,
            ),
            VerificationOutcome::Inconclusive => {
                let candidate_id = request.candidate_id.clone();
                let run_id = request.run_id.clone();
                self.store
                    .call(move |db| db.get_review(&candidate_id, &run_id))
                    .await?
            }
        };

        Ok(SubmitVerificationOutcome {
            outcome: request.outcome,
            confidence_before,
            confidence_after,
            review,
        })
    }

    /// Promote a candidate onto the accepted shortlist. Enforces the
    /// proof-link minimum and the one-promotion-per-(candidate, run) rule;
    /// the store moves the review in the same transaction.
    pub async fn promote_candidate(&self, request: PromotionRequest) -> Result<PromotionOutcome> {
        let min_proof_links = self.config.promotion.min_proof_links as usize;
        if request.proof_links.len() < min_proof_links {
            return Ok(PromotionOutcome {
                success: false,
                error: Some(format!(
                    "promotion requires at least {} proof links, got {}",
                    min_proof_links,
                    request.proof_links.len()
                )),
            });
        }

        self.store
            .call(move |db| {
                if db.has_promotion(&request.candidate_id, &request.run_id)? {
                    return Ok(PromotionOutcome {
                        success: false,
                        error: Some("candidate is already promoted for this run".to_string()),
                    });
                }
                db.insert_promotion(&Promotion {
                    candidate_id: request.candidate_id.clone(),
                    run_id: request.run_id.clone(),
                    promotion_reason: request.promotion_reason.clone(),
                    confidence_override: request.confidence_override,
                    outreach_angle: request.outreach_angle.clone(),
                    proof_links: request.proof_links.clone(),
                    promoted_at: 0,
                })?;
                Ok(PromotionOutcome {
                    success: true,
                    error: None,
                })
            })
            .await
    }

    /// Daily report for a run (or the most recent run for the role),
    /// defaulting to today UTC.
    pub async fn get_daily_report(
        &self,
        run_id: Option<String>,
        role_key: Option<String>,
        date: Option<String>,
    ) -> Result<DailyReport> {
        let date = date.unwrap_or_else(today_utc);

        let run = match run_id {
            Some(id) => {
                let lookup = id.clone();
                self.store
                    .call(move |db| db.get_run_status(&lookup))
                    .await?
                    .map(|view| view.run)
                    .ok_or(EngineError::RunNotFound { id })?
            }
            None => {
                let role = role_key
                    .clone()
                    .context("either a run id or a role key is required")?;
                let lookup = role.clone();
                self.store
                    .call(move |db| db.find_recent_run_for_role(&lookup, RECENT_RUN_SCAN))
                    .await?
                    .ok_or(EngineError::RunNotFound { id: role })?
            }
        };

        let quotas = self.config.daily_quotas.clone();
        let stats_run_id = run.id.clone();
        let stats_date = date.clone();
        let (workflow, verification, quota) = self
            .store
            .call(move |db| {
                Ok((
                    db.get_workflow_stats(&stats_run_id, &stats_date)?,
                    db.get_verification_stats(&stats_run_id, &stats_date)?,
                    db.get_quota_status(&stats_run_id, &stats_date, &quotas)?,
                ))
            })
            .await?;

        Ok(DailyReport {
            contract: DailyContract {
                date,
                role_key: run.role_key,
                run_id: run.id,
                promoted_target: self.config.daily_quotas.promoted_target,
                reviewed_target: self.config.daily_quotas.reviewed_target,
                verification_budget: self.config.daily_quotas.verification_budget,
            },
            workflow,
            verification,
            quota,
        })
    }

    pub fn config(&self) -> &RecruitingConfig {
        &self.config
    }
}
