use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

mod cmd;

#[derive(Parser)]
#[command(name = "scout")]
#[command(version, about = "Candidate sourcing pipeline orchestrator")]
pub struct Cli {
    /// Directory holding scout.toml and the pipeline store
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Talent sourcing pipeline and review workflow
    Recruiting {
        #[command(subcommand)]
        command: RecruitingCommands,
    },
}

#[derive(Subcommand)]
pub enum RecruitingCommands {
    /// Execute (or resume) a sourcing run for a role
    Run {
        #[arg(long)]
        role_key: String,
        #[arg(long)]
        role_title: String,
        #[arg(long)]
        keywords: Option<String>,
        /// Role keyword filter, repeatable
        #[arg(long = "role-keyword")]
        role_keywords: Vec<String>,
        /// Skill filter, repeatable
        #[arg(long = "skill")]
        skills: Vec<String>,
        /// Company filter, repeatable
        #[arg(long = "company")]
        companies: Vec<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        industry: Option<String>,
        /// LinkedIn API variant: classic, recruiter, sales_navigator
        #[arg(long, default_value = "classic")]
        api: String,
        #[arg(long)]
        account_id: Option<String>,
        #[arg(long)]
        target_candidates: Option<u32>,
        #[arg(long)]
        idempotency_key: Option<String>,
        /// default or broad
        #[arg(long, default_value = "default")]
        source_query_mode: String,
        /// default or strict
        #[arg(long, default_value = "default")]
        evidence_query_mode: String,
        #[arg(long)]
        json: bool,
    },
    /// Show one run, or the 20 most recent
    Status {
        #[arg(long)]
        run_id: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Scored results for a run, partitioned by shortlist eligibility
    Results {
        #[arg(long)]
        run_id: String,
        #[arg(long, default_value_t = 100)]
        limit: u32,
        #[arg(long)]
        json: bool,
    },
    /// Full candidate document
    Candidate {
        candidate_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Move a candidate through the review workflow
    Review {
        candidate_id: String,
        #[arg(long)]
        run_id: String,
        /// new_review, under_verification, promoted_shortlist, rejected, deferred
        #[arg(long)]
        status: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        priority: Option<i64>,
        #[arg(long)]
        json: bool,
    },
    /// Candidates waiting on verification
    Queue {
        #[arg(long)]
        run_id: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// all or high
        #[arg(long, default_value = "all")]
        priority: String,
        #[arg(long)]
        json: bool,
    },
    /// Record a verification outcome
    Verify {
        candidate_id: String,
        #[arg(long)]
        run_id: String,
        /// browser or api
        #[arg(long, default_value = "browser")]
        method: String,
        /// confirmed, rejected, inconclusive
        #[arg(long)]
        outcome: String,
        #[arg(long = "proof-link")]
        proof_links: Vec<String>,
        #[arg(long)]
        confidence_after: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Promote a candidate onto the accepted shortlist
    Promote {
        candidate_id: String,
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        reason: String,
        #[arg(long = "proof-link")]
        proof_links: Vec<String>,
        #[arg(long)]
        confidence_override: Option<f64>,
        #[arg(long)]
        outreach_angle: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Daily quota and workflow report
    Report {
        #[arg(long)]
        run_id: Option<String>,
        #[arg(long)]
        role_key: Option<String>,
        /// YYYY-MM-DD, defaults to today UTC
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Check the configuration and report warnings
    Validate,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scout=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = cmd::run(cli).await {
        eprintln!("{}", style(format!("Error: {:#}", err)).red());
        std::process::exit(1);
    }
}
