//! The run orchestrator and its supporting pieces.

pub mod diagnostics;
pub mod query;
pub mod retry;

mod orchestrator;

pub use orchestrator::{
    CandidatePipeline, PipelineRunRequest, PromotionOutcome, PromotionRequest, QueuePriority,
    RoleSpec, RunOutcome, SubmitVerificationOutcome, VerificationRequest,
};
