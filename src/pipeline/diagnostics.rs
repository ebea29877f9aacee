//! Shared mutable run diagnostics.
//!
//! The run state machine threads one `RunAccumulator` by reference through
//! every step, so counter updates and stage-failure tallies stay in one
//! auditable place instead of captured closures.

use std::collections::BTreeMap;

use crate::providers::LinkedInAccount;
use crate::store::models::{
    CandidatePipelineDiagnostics, FailureDescriptor, RunCounts, RunModes, StageErrorAggregate,
    StageMessageCount,
};

const TOP_MESSAGES: usize = 3;

#[derive(Debug, Default)]
struct StageTally {
    total: u32,
    /// (message, error_type) -> count
    messages: BTreeMap<(String, String), u32>,
}

#[derive(Debug, Default)]
pub struct RunAccumulator {
    pub counts: RunCounts,
    pub account: Option<LinkedInAccount>,
    pub effective_query: Option<String>,
    stage_errors: BTreeMap<String, StageTally>,
}

impl RunAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_stage_error(&mut self, stage: &str, error_type: &str, message: &str) {
        let tally = self.stage_errors.entry(stage.to_string()).or_default();
        tally.total += 1;
        *tally
            .messages
            .entry((message.to_string(), error_type.to_string()))
            .or_insert(0) += 1;
    }

    /// Per-stage aggregates carrying the top-3 messages by count.
    pub fn stage_error_aggregates(&self) -> Vec<StageErrorAggregate> {
        self.stage_errors
            .iter()
            .map(|(stage, tally)| {
                let mut messages: Vec<StageMessageCount> = tally
                    .messages
                    .iter()
                    .map(|((message, error_type), count)| StageMessageCount {
                        message: message.clone(),
                        error_type: error_type.clone(),
                        count: *count,
                    })
                    .collect();
                messages.sort_by(|a, b| b.count.cmp(&a.count).then(a.message.cmp(&b.message)));
                messages.truncate(TOP_MESSAGES);
                StageErrorAggregate {
                    stage: stage.clone(),
                    total: tally.total,
                    top_messages: messages,
                }
            })
            .collect()
    }

    pub fn into_diagnostics(
        self,
        modes: RunModes,
        failure: Option<FailureDescriptor>,
    ) -> CandidatePipelineDiagnostics {
        let stage_errors = self.stage_error_aggregates();
        CandidatePipelineDiagnostics {
            counts: self.counts,
            stage_errors,
            account: self.account,
            effective_query: self.effective_query,
            modes,
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_count_per_stage_and_keep_top_messages() {
        let mut acc = RunAccumulator::new();
        for _ in 0..3 {
            acc.record_stage_error("candidate_enrich_score", "rate_limit", "429");
        }
        for _ in 0..2 {
            acc.record_stage_error("candidate_enrich_score", "timeout", "deadline");
        }
        acc.record_stage_error("candidate_enrich_score", "network", "reset");
        acc.record_stage_error("candidate_enrich_score", "api", "500");
        acc.record_stage_error("linkedin_search", "rate_limit", "429");

        let aggregates = acc.stage_error_aggregates();
        assert_eq!(aggregates.len(), 2);

        let enrich = &aggregates[0];
        assert_eq!(enrich.stage, "candidate_enrich_score");
        assert_eq!(enrich.total, 7);
        assert_eq!(enrich.top_messages.len(), 3);
        assert_eq!(enrich.top_messages[0].message, "429");
        assert_eq!(enrich.top_messages[0].count, 3);
        assert_eq!(enrich.top_messages[1].message, "deadline");

        assert_eq!(aggregates[1].stage, "linkedin_search");
        assert_eq!(aggregates[1].total, 1);
    }

    #[test]
    fn into_diagnostics_carries_everything() {
        let mut acc = RunAccumulator::new();
        acc.counts.sourced = 5;
        acc.counts.enriched = 4;
        acc.effective_query = Some("rust engineer".to_string());
        acc.record_stage_error("linkedin_search", "rate_limit", "429");

        let failure = FailureDescriptor {
            stage: "linkedin_search".to_string(),
            error_type: "rate_limit".to_string(),
            message: "429".to_string(),
            retryable: true,
        };
        let diagnostics = acc.into_diagnostics(RunModes::default(), Some(failure));
        assert_eq!(diagnostics.counts.sourced, 5);
        assert_eq!(diagnostics.stage_errors.len(), 1);
        assert_eq!(diagnostics.effective_query.as_deref(), Some("rust engineer"));
        assert_eq!(diagnostics.failure.unwrap().stage, "linkedin_search");
    }
}
