//! `scout recruiting ...` — thin mapping of subcommands onto the pipeline
//! orchestrator. Structured output is JSON; human output is a short summary.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use serde::Serialize;

use scout::config::RecruitingConfig;
use scout::errors::EngineError;
use scout::pipeline::{
    CandidatePipeline, PipelineRunRequest, PromotionRequest, QueuePriority, RoleSpec,
    VerificationRequest,
};
use scout::providers::unconfigured::{
    UnconfiguredLinkedIn, UnconfiguredWebFetch, UnconfiguredWebSearch,
};
use scout::providers::{LinkedInApi, SearchFilter, TalentSearchParams};
use scout::store::models::{ReviewState, VerificationMethod, VerificationOutcome};
use scout::store::{DbHandle, Store};

use super::super::{ConfigCommands, RecruitingCommands};

fn parse_arg<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|err| anyhow::anyhow!("{}", err))
}

fn load_config(project_dir: &Path) -> Result<RecruitingConfig> {
    RecruitingConfig::load_or_default(project_dir)
}

fn open_store(project_dir: &Path, config: &RecruitingConfig) -> Result<DbHandle> {
    let path = if config.store.path.is_absolute() {
        config.store.path.clone()
    } else {
        project_dir.join(&config.store.path)
    };
    Ok(DbHandle::new(Store::open(&path)?))
}

/// The engine refuses to start unless `tools.recruiting.enabled` is true.
fn build_pipeline(project_dir: &Path) -> Result<CandidatePipeline> {
    let config = load_config(project_dir)?;
    if !config.enabled {
        return Err(EngineError::Disabled.into());
    }
    let store = open_store(project_dir, &config)?;
    Ok(CandidatePipeline::new(
        config,
        store,
        Arc::new(UnconfiguredLinkedIn),
        Arc::new(UnconfiguredWebSearch),
        Arc::new(UnconfiguredWebFetch),
    ))
}

fn emit<T: Serialize>(value: &T, json: bool, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("Failed to serialise output")?
        );
    } else {
        human(value);
    }
    Ok(())
}

pub async fn run(project_dir: PathBuf, command: RecruitingCommands) -> Result<()> {
    match command {
        RecruitingCommands::Run {
            role_key,
            role_title,
            keywords,
            role_keywords,
            skills,
            companies,
            location,
            industry,
            api,
            account_id,
            target_candidates,
            idempotency_key,
            source_query_mode,
            evidence_query_mode,
            json,
        } => {
            let pipeline = build_pipeline(&project_dir)?;
            let request = PipelineRunRequest {
                role: RoleSpec {
                    role_key,
                    role_title,
                    search: TalentSearchParams {
                        keywords,
                        role_keywords: role_keywords.into_iter().map(SearchFilter::text).collect(),
                        skills: skills.into_iter().map(SearchFilter::text).collect(),
                        companies: companies.into_iter().map(SearchFilter::text).collect(),
                        location,
                        industry,
                        api: parse_arg::<LinkedInApi>(&api)?,
                        account_id,
                        page_size: 0,
                        max_pages: 0,
                    },
                    target_candidates,
                },
                idempotency_key,
                browser_verification_enabled: None,
                source_query_mode: parse_arg(&source_query_mode)?,
                evidence_query_mode: parse_arg(&evidence_query_mode)?,
            };
            let outcome = pipeline.run(request).await?;
            emit(&outcome, json, |outcome| {
                println!(
                    "run {} status={} resumed={}",
                    outcome.run_id,
                    outcome.status.as_str(),
                    outcome.resumed
                );
            })
        }

        RecruitingCommands::Status { run_id, json } => {
            let pipeline = build_pipeline(&project_dir)?;
            match run_id {
                Some(run_id) => {
                    let status = pipeline.status(&run_id).await?;
                    emit(&status, json, |status| {
                        println!(
                            "run {} [{}] role={} target={}",
                            status.run.id,
                            status.run.status.as_str(),
                            status.run.role_key,
                            status.run.target_candidates
                        );
                        if let Some(diagnostics) = &status.diagnostics {
                            let counts = diagnostics.counts;
                            println!(
                                "  sourced={} enriched={} failed={} shortlist={}",
                                counts.sourced,
                                counts.enriched,
                                counts.enrich_failed,
                                counts.shortlist_eligible
                            );
                        }
                    })
                }
                None => {
                    let runs = pipeline.recent_runs().await?;
                    emit(&runs, json, |runs| {
                        for view in runs {
                            println!(
                                "run {} [{}] role={}",
                                view.run.id,
                                view.run.status.as_str(),
                                view.run.role_key
                            );
                        }
                        if runs.is_empty() {
                            println!("no runs yet");
                        }
                    })
                }
            }
        }

        RecruitingCommands::Results { run_id, limit, json } => {
            let pipeline = build_pipeline(&project_dir)?;
            let results = pipeline.results(&run_id, limit).await?;
            emit(&results, json, |results| {
                println!(
                    "shortlist: {} candidates, review queue: {}",
                    results.shortlist.len(),
                    results.review_queue.len()
                );
                for row in &results.shortlist {
                    println!(
                        "  {} {} score={:.3}",
                        row.candidate.id,
                        row.candidate.name.as_deref().unwrap_or("<unnamed>"),
                        row.score.total
                    );
                }
            })
        }

        RecruitingCommands::Candidate { candidate_id, json } => {
            let pipeline = build_pipeline(&project_dir)?;
            let detail = pipeline.candidate(&candidate_id).await?;
            emit(&detail, json, |detail| {
                println!(
                    "{} {}",
                    detail.candidate.id,
                    detail.candidate.name.as_deref().unwrap_or("<unnamed>")
                );
                for identity in &detail.identities {
                    println!(
                        "  identity {}: {} ({:.3})",
                        identity.platform.as_str(),
                        identity.band.as_str(),
                        identity.confidence
                    );
                }
                for (run_id, score) in &detail.scores {
                    println!("  score {:.3} in run {}", score.total, run_id);
                }
            })
        }

        RecruitingCommands::Review {
            candidate_id,
            run_id,
            status,
            notes,
            priority,
            json,
        } => {
            let pipeline = build_pipeline(&project_dir)?;
            let status = parse_arg::<ReviewState>(&status)?;
            let review = pipeline
                .update_review_status(&candidate_id, &run_id, status, notes, priority)
                .await?;
            emit(&review, json, |review| {
                println!(
                    "review {} -> {} (priority {})",
                    review.candidate_id,
                    review.status.as_str(),
                    review.priority
                );
            })
        }

        RecruitingCommands::Queue {
            run_id,
            limit,
            priority,
            json,
        } => {
            let pipeline = build_pipeline(&project_dir)?;
            let priority = parse_arg::<QueuePriority>(&priority)?;
            let queue = pipeline
                .get_verification_queue(&run_id, limit, priority)
                .await?;
            emit(&queue, json, |queue| {
                for entry in queue {
                    println!(
                        "{} priority={} score={:.3}",
                        entry.candidate.id, entry.priority, entry.total_score
                    );
                }
                if queue.is_empty() {
                    println!("verification queue is empty");
                }
            })
        }

        RecruitingCommands::Verify {
            candidate_id,
            run_id,
            method,
            outcome,
            proof_links,
            confidence_after,
            notes,
            json,
        } => {
            let pipeline = build_pipeline(&project_dir)?;
            let request = VerificationRequest {
                candidate_id,
                run_id,
                method: parse_arg::<VerificationMethod>(&method)?,
                outcome: parse_arg::<VerificationOutcome>(&outcome)?,
                confidence_after,
                proof_links,
                notes,
            };
            let submitted = pipeline.submit_verification(request).await?;
            emit(&submitted, json, |submitted| {
                println!(
                    "verification recorded: {} (confidence {:.3} -> {:.3})",
                    submitted.outcome.as_str(),
                    submitted.confidence_before,
                    submitted.confidence_after
                );
                if let Some(review) = &submitted.review {
                    println!("  review now {}", review.status.as_str());
                }
            })
        }

        RecruitingCommands::Promote {
            candidate_id,
            run_id,
            reason,
            proof_links,
            confidence_override,
            outreach_angle,
            json,
        } => {
            let pipeline = build_pipeline(&project_dir)?;
            let outcome = pipeline
                .promote_candidate(PromotionRequest {
                    candidate_id,
                    run_id,
                    promotion_reason: reason,
                    confidence_override,
                    outreach_angle,
                    proof_links,
                })
                .await?;
            emit(&outcome, json, |outcome| {
                if outcome.success {
                    println!("{}", style("promoted to shortlist").green());
                } else {
                    println!(
                        "{}",
                        style(format!(
                            "not promoted: {}",
                            outcome.error.as_deref().unwrap_or("unknown reason")
                        ))
                        .yellow()
                    );
                }
            })
        }

        RecruitingCommands::Report {
            run_id,
            role_key,
            date,
            json,
        } => {
            let pipeline = build_pipeline(&project_dir)?;
            let report = pipeline.get_daily_report(run_id, role_key, date).await?;
            emit(&report, json, |report| {
                println!(
                    "daily report {} role={} run={}",
                    report.contract.date, report.contract.role_key, report.contract.run_id
                );
                println!(
                    "  promoted {}/{} reviewed {}/{} verifications {}/{}",
                    report.quota.promoted.actual,
                    report.quota.promoted.target,
                    report.quota.reviewed.actual,
                    report.quota.reviewed.target,
                    report.quota.verification_budget.actual,
                    report.quota.verification_budget.target
                );
            })
        }

        RecruitingCommands::Config { command } => {
            let config = load_config(&project_dir)?;
            match command.unwrap_or(ConfigCommands::Show) {
                ConfigCommands::Show => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config)
                            .context("Failed to serialise config")?
                    );
                }
                ConfigCommands::Validate => {
                    let warnings = config.validate();
                    if warnings.is_empty() {
                        println!("{}", style("configuration is valid").green());
                    } else {
                        for warning in &warnings {
                            println!("{}", style(format!("warning: {}", warning)).yellow());
                        }
                    }
                }
            }
            Ok(())
        }
    }
}
