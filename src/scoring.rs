//! Weighted rubric scoring.
//!
//! Deterministic: the same input always produces a byte-identical score.
//! Components are the maxima of their signals, rounded to 3 decimals before
//! the weighted sum; the total is rounded the same way (half away from zero).

use serde::{Deserialize, Serialize};

use crate::store::models::{CandidateScore, ScoreBreakdown, Signal, SignalKey};

pub const WEIGHT_BUILDER_ACTIVITY: f64 = 0.25;
pub const WEIGHT_AI_NATIVE_EVIDENCE: f64 = 0.25;
pub const WEIGHT_TECHNICAL_DEPTH: f64 = 0.20;
pub const WEIGHT_ROLE_FIT: f64 = 0.20;
pub const WEIGHT_IDENTITY_CONFIDENCE: f64 = 0.10;

/// Evidence URLs/titles mentioning any of these grant an AI-native floor of
/// 0.7.
const AI_EVIDENCE_MARKERS: [&str; 6] = [
    "codex",
    "claude code",
    "mcp",
    "agent",
    "agents",
    "automation",
];
const AI_EVIDENCE_FLOOR: f64 = 0.7;

pub const CONCERN_IDENTITY_UNCONFIRMED: &str = "identity_unconfirmed";
pub const CONCERN_LOW_BUILDER_ACTIVITY: &str = "low_recent_builder_activity";
pub const CONCERN_LIMITED_AI_EVIDENCE: &str = "limited_ai_native_evidence";
pub const CONCERN_WEAK_ROLE_FIT: &str = "weak_role_fit";
pub const CONCERN_OPEN_TO_WORK: &str = "open_to_work_signal_recorded_no_penalty";

const ANGLE_AI_NATIVE: &str =
    "Lead with AI-native shipping evidence and ask about current build velocity.";
const ANGLE_BUILDER: &str =
    "Lead with recent shipped work and invite a builder-focused conversation.";
const ANGLE_ROLE_FIT: &str = "Lead with role fit and verify current hands-on project scope.";

/// Everything the scorer reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreInput {
    pub signals: Vec<Signal>,
    pub identity_confidence: f64,
    pub identity_shortlist_eligible: bool,
    /// (url, title) pairs of the candidate's evidence links.
    pub evidence: Vec<(String, Option<String>)>,
    pub open_to_work: bool,
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn max_signal(signals: &[Signal], key: SignalKey) -> f64 {
    signals
        .iter()
        .filter(|signal| signal.key == key)
        .filter_map(|signal| signal.numeric_value)
        .fold(0.0, f64::max)
}

fn evidence_mentions_ai(evidence: &[(String, Option<String>)]) -> bool {
    evidence.iter().any(|(url, title)| {
        let haystack = format!("{} {}", url, title.as_deref().unwrap_or("")).to_lowercase();
        AI_EVIDENCE_MARKERS
            .iter()
            .any(|marker| haystack.contains(marker))
    })
}

/// Compute the rubric score for one candidate.
pub fn compute_candidate_score(input: &ScoreInput) -> CandidateScore {
    let builder_activity = round3(clamp_unit(max_signal(&input.signals, SignalKey::BuilderActivity)));

    let mut ai_native = max_signal(&input.signals, SignalKey::AiNativeEvidence);
    if evidence_mentions_ai(&input.evidence) {
        ai_native = ai_native.max(AI_EVIDENCE_FLOOR);
    }
    let ai_native_evidence = round3(clamp_unit(ai_native));

    let technical_depth = round3(clamp_unit(max_signal(&input.signals, SignalKey::TechnicalDepth)));
    let role_fit = round3(clamp_unit(max_signal(&input.signals, SignalKey::RoleFit)));
    let identity_confidence = round3(clamp_unit(input.identity_confidence));

    let total = round3(
        WEIGHT_BUILDER_ACTIVITY * builder_activity
            + WEIGHT_AI_NATIVE_EVIDENCE * ai_native_evidence
            + WEIGHT_TECHNICAL_DEPTH * technical_depth
            + WEIGHT_ROLE_FIT * role_fit
            + WEIGHT_IDENTITY_CONFIDENCE * identity_confidence,
    );

    let mut concerns = Vec::new();
    if !input.identity_shortlist_eligible {
        concerns.push(CONCERN_IDENTITY_UNCONFIRMED.to_string());
    }
    if builder_activity < 0.3 {
        concerns.push(CONCERN_LOW_BUILDER_ACTIVITY.to_string());
    }
    if ai_native_evidence < 0.3 {
        concerns.push(CONCERN_LIMITED_AI_EVIDENCE.to_string());
    }
    if role_fit < 0.3 {
        concerns.push(CONCERN_WEAK_ROLE_FIT.to_string());
    }
    if input.open_to_work {
        concerns.push(CONCERN_OPEN_TO_WORK.to_string());
    }

    let outreach_angle = if ai_native_evidence >= 0.6 {
        ANGLE_AI_NATIVE
    } else if builder_activity >= 0.6 {
        ANGLE_BUILDER
    } else {
        ANGLE_ROLE_FIT
    };

    CandidateScore {
        total,
        breakdown: ScoreBreakdown {
            builder_activity,
            ai_native_evidence,
            technical_depth,
            role_fit,
            identity_confidence,
        },
        concerns,
        shortlist_eligible: input.identity_shortlist_eligible,
        outreach_angle: outreach_angle.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(key: SignalKey, value: f64) -> Signal {
        Signal::numeric(key, value, "test")
    }

    fn rich_input() -> ScoreInput {
        ScoreInput {
            signals: vec![
                signal(SignalKey::BuilderActivity, 0.8),
                signal(SignalKey::AiNativeEvidence, 0.7),
                signal(SignalKey::TechnicalDepth, 0.6),
                signal(SignalKey::RoleFit, 0.9),
            ],
            identity_confidence: 0.91,
            identity_shortlist_eligible: true,
            evidence: vec![("https://github.com/alice/agent-kit".to_string(), None)],
            open_to_work: true,
        }
    }

    #[test]
    fn scoring_is_deterministic_and_records_open_to_work() {
        let first = compute_candidate_score(&rich_input());
        let second = compute_candidate_score(&rich_input());
        assert_eq!(first, second);
        assert!(first.concerns.contains(&CONCERN_OPEN_TO_WORK.to_string()));
        assert!(first.shortlist_eligible);
    }

    #[test]
    fn total_is_the_weighted_sum_of_the_breakdown() {
        let score = compute_candidate_score(&rich_input());
        let expected = 0.25 * score.breakdown.builder_activity
            + 0.25 * score.breakdown.ai_native_evidence
            + 0.20 * score.breakdown.technical_depth
            + 0.20 * score.breakdown.role_fit
            + 0.10 * score.breakdown.identity_confidence;
        assert!((score.total - expected).abs() <= 1e-3);
    }

    #[test]
    fn open_to_work_has_no_score_effect() {
        let mut with_flag = rich_input();
        let mut without_flag = rich_input();
        with_flag.open_to_work = true;
        without_flag.open_to_work = false;
        assert_eq!(
            compute_candidate_score(&with_flag).total,
            compute_candidate_score(&without_flag).total
        );
    }

    #[test]
    fn low_confidence_identity_raises_concern() {
        let input = ScoreInput {
            signals: vec![
                signal(SignalKey::BuilderActivity, 0.5),
                signal(SignalKey::RoleFit, 0.6),
            ],
            identity_confidence: 0.55,
            identity_shortlist_eligible: false,
            evidence: Vec::new(),
            open_to_work: false,
        };
        let score = compute_candidate_score(&input);
        assert!(!score.shortlist_eligible);
        assert!(score
            .concerns
            .contains(&CONCERN_IDENTITY_UNCONFIRMED.to_string()));
    }

    #[test]
    fn evidence_keywords_floor_ai_native_at_07() {
        let input = ScoreInput {
            signals: vec![signal(SignalKey::AiNativeEvidence, 0.2)],
            evidence: vec![(
                "https://blog.example.com/post".to_string(),
                Some("Shipping with Claude Code".to_string()),
            )],
            ..ScoreInput::default()
        };
        let score = compute_candidate_score(&input);
        assert_eq!(score.breakdown.ai_native_evidence, 0.7);

        // A higher signal is not pulled down by the floor.
        let input = ScoreInput {
            signals: vec![signal(SignalKey::AiNativeEvidence, 0.9)],
            evidence: vec![("https://github.com/a/mcp-server".to_string(), None)],
            ..ScoreInput::default()
        };
        assert_eq!(
            compute_candidate_score(&input).breakdown.ai_native_evidence,
            0.9
        );
    }

    #[test]
    fn components_take_the_max_signal_and_clamp() {
        let input = ScoreInput {
            signals: vec![
                signal(SignalKey::BuilderActivity, 0.4),
                signal(SignalKey::BuilderActivity, 0.9),
                signal(SignalKey::BuilderActivity, 1.7),
            ],
            ..ScoreInput::default()
        };
        assert_eq!(
            compute_candidate_score(&input).breakdown.builder_activity,
            1.0
        );
    }

    #[test]
    fn missing_signals_score_zero_with_concerns_in_order() {
        let score = compute_candidate_score(&ScoreInput::default());
        assert_eq!(score.total, 0.0);
        assert_eq!(
            score.concerns,
            vec![
                CONCERN_IDENTITY_UNCONFIRMED.to_string(),
                CONCERN_LOW_BUILDER_ACTIVITY.to_string(),
                CONCERN_LIMITED_AI_EVIDENCE.to_string(),
                CONCERN_WEAK_ROLE_FIT.to_string(),
            ]
        );
    }

    #[test]
    fn outreach_angle_prefers_ai_then_builder_then_role_fit() {
        let ai = ScoreInput {
            signals: vec![
                signal(SignalKey::AiNativeEvidence, 0.6),
                signal(SignalKey::BuilderActivity, 0.9),
            ],
            ..ScoreInput::default()
        };
        assert_eq!(compute_candidate_score(&ai).outreach_angle, ANGLE_AI_NATIVE);

        let builder = ScoreInput {
            signals: vec![
                signal(SignalKey::AiNativeEvidence, 0.5),
                signal(SignalKey::BuilderActivity, 0.6),
            ],
            ..ScoreInput::default()
        };
        assert_eq!(
            compute_candidate_score(&builder).outreach_angle,
            ANGLE_BUILDER
        );

        let fallback = ScoreInput::default();
        assert_eq!(
            compute_candidate_score(&fallback).outreach_angle,
            ANGLE_ROLE_FIT
        );
    }

    #[test]
    fn components_round_to_3_decimals() {
        let input = ScoreInput {
            signals: vec![signal(SignalKey::BuilderActivity, 0.123456)],
            ..ScoreInput::default()
        };
        assert_eq!(
            compute_candidate_score(&input).breakdown.builder_activity,
            0.123
        );
        let input = ScoreInput {
            signals: vec![signal(SignalKey::BuilderActivity, 0.1239)],
            ..ScoreInput::default()
        };
        assert_eq!(
            compute_candidate_score(&input).breakdown.builder_activity,
            0.124
        );
    }
}
