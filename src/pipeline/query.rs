//! Broad-mode search normalisation.
//!
//! Broad sourcing casts a wider net by removing the AI-native source terms
//! from every text fragment of the search, so the LinkedIn query matches
//! generalist builders too. Separators (`|`, `/`) collapse to spaces and
//! whitespace is normalised. Filters whose text reduces to nothing are
//! dropped unless they carry a provider id.

use crate::providers::{SearchFilter, TalentSearchParams};

/// Stripped in this order: longest terms first so shorter terms never leave
/// fragments behind ("agentic" before "agent", "model context protocol"
/// before "mcp").
const AI_SOURCE_TERMS: [&str; 12] = [
    "model context protocol",
    "claude code",
    "ai-native",
    "langgraph",
    "windsurf",
    "agentic",
    "autogen",
    "agents",
    "cursor",
    "codex",
    "agent",
    "mcp",
];

/// Remove every case-insensitive occurrence of `term` from `text`.
fn strip_term(text: &str, term: &str) -> String {
    let term_lower = term.to_lowercase();
    let mut remaining = text.to_string();
    loop {
        let lower = remaining.to_lowercase();
        match lower.find(&term_lower) {
            Some(idx) => {
                remaining.replace_range(idx..idx + term_lower.len(), " ");
            }
            None => return remaining,
        }
    }
}

/// Strip AI-native terms, collapse `|` and `/` to spaces, normalise
/// whitespace.
pub fn strip_source_terms(text: &str) -> String {
    let mut stripped = text.to_string();
    for term in AI_SOURCE_TERMS {
        stripped = strip_term(&stripped, term);
    }
    stripped
        .replace(['|', '/'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_filters(filters: &[SearchFilter]) -> Vec<SearchFilter> {
    filters
        .iter()
        .filter_map(|filter| {
            let text = filter
                .text
                .as_deref()
                .map(strip_source_terms)
                .filter(|text| !text.is_empty());
            if text.is_none() && filter.id.is_none() {
                return None;
            }
            Some(SearchFilter {
                text,
                id: filter.id.clone(),
            })
        })
        .collect()
}

/// Rewrite the search for broad sourcing.
pub fn normalize_for_broad_mode(params: &TalentSearchParams) -> TalentSearchParams {
    TalentSearchParams {
        keywords: params
            .keywords
            .as_deref()
            .map(strip_source_terms)
            .filter(|keywords| !keywords.is_empty()),
        role_keywords: normalize_filters(&params.role_keywords),
        skills: normalize_filters(&params.skills),
        companies: normalize_filters(&params.companies),
        ..params.clone()
    }
}
