//! Typed error taxonomy for the candidate pipeline.
//!
//! Three layers cover the three failure surfaces:
//! - `ProviderError` — a classified collaborator failure (kind + retryability)
//! - `StageError` — a provider failure pinned to a pipeline stage
//! - `EngineError` — orchestrator operation failures (lookups, preconditions)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    RateLimit,
    Auth,
    Validation,
    NotFound,
    Api,
    BlockedDomain,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Api => "api",
            Self::BlockedDomain => "blocked_domain",
            Self::Unknown => "unknown",
        }
    }

    /// Kinds that are worth retrying on their own, before looking at the
    /// message or HTTP status.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::RateLimit)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "network" => Ok(Self::Network),
            "timeout" => Ok(Self::Timeout),
            "rate_limit" => Ok(Self::RateLimit),
            "auth" => Ok(Self::Auth),
            "validation" => Ok(Self::Validation),
            "not_found" => Ok(Self::NotFound),
            "api" => Ok(Self::Api),
            "blocked_domain" => Ok(Self::BlockedDomain),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Invalid error kind: {}", s)),
        }
    }
}

/// A classified failure from a collaborator (LinkedIn, web search, web fetch).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            retryable: kind.is_transient(),
            kind,
            message: message.into(),
        }
    }

    /// Non-retryable error regardless of kind.
    pub fn fatal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: false,
        }
    }

    /// Classify a failure message from an external collaborator (web search,
    /// web fetch) where no structured status is available. Retryable when the
    /// message looks like throttling or connectivity trouble.
    pub fn classify_external(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let retryable = ["429", "503", "timeout", "network", "econn"]
            .iter()
            .any(|needle| lower.contains(needle));
        let kind = if lower.contains("timeout") {
            ErrorKind::Timeout
        } else if lower.contains("429") {
            ErrorKind::RateLimit
        } else if lower.contains("network") || lower.contains("econn") {
            ErrorKind::Network
        } else if lower.contains("blocked") {
            ErrorKind::BlockedDomain
        } else {
            ErrorKind::Unknown
        };
        Self {
            kind,
            message,
            retryable,
        }
    }
}

/// A provider failure pinned to the pipeline stage where it happened.
#[derive(Debug, Clone, Error)]
#[error("stage '{stage}' failed: {error}")]
pub struct StageError {
    pub stage: String,
    #[source]
    pub error: ProviderError,
}

impl StageError {
    pub fn new(stage: impl Into<String>, error: ProviderError) -> Self {
        Self {
            stage: stage.into(),
            error,
        }
    }
}

/// Errors from orchestrator operations outside the run state machine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Pipeline run {id} not found")]
    RunNotFound { id: String },

    #[error("Candidate {id} not found")]
    CandidateNotFound { id: String },

    #[error("Recruiting pipeline is disabled (set tools.recruiting.enabled = true)")]
    Disabled,

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn error_kind_roundtrip() {
        for s in &[
            "network",
            "timeout",
            "rate_limit",
            "auth",
            "validation",
            "not_found",
            "api",
            "blocked_domain",
            "unknown",
        ] {
            let parsed = ErrorKind::from_str(s).unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        assert!(ErrorKind::from_str("bogus").is_err());
    }

    #[test]
    fn transient_kinds_are_retryable_by_default() {
        assert!(ProviderError::new(ErrorKind::Network, "conn reset").retryable);
        assert!(ProviderError::new(ErrorKind::Timeout, "deadline").retryable);
        assert!(ProviderError::new(ErrorKind::RateLimit, "slow down").retryable);
        assert!(!ProviderError::new(ErrorKind::Auth, "bad token").retryable);
        assert!(!ProviderError::new(ErrorKind::Validation, "bad input").retryable);
    }

    #[test]
    fn external_classification_detects_throttling_tokens() {
        for msg in &[
            "HTTP 429 Too Many Requests",
            "upstream returned 503",
            "request timeout after 30s",
            "network unreachable",
            "ECONNRESET while reading body",
        ] {
            let err = ProviderError::classify_external(*msg);
            assert!(err.retryable, "expected retryable for {:?}", msg);
        }
        let err = ProviderError::classify_external("invalid query syntax");
        assert!(!err.retryable);
        assert_eq!(err.kind, ErrorKind::Unknown);
    }

    #[test]
    fn stage_error_display_carries_stage_and_kind() {
        let err = StageError::new(
            "linkedin_preflight",
            ProviderError::fatal(ErrorKind::Auth, "missing credentials"),
        );
        let text = err.to_string();
        assert!(text.contains("linkedin_preflight"));
        assert!(text.contains("auth"));
    }

    #[test]
    fn engine_error_wraps_stage_error() {
        let stage = StageError::new(
            "linkedin_search",
            ProviderError::new(ErrorKind::RateLimit, "429"),
        );
        let engine: EngineError = stage.into();
        assert!(matches!(engine, EngineError::Stage(_)));
    }
}
