//! Subcommand dispatch.

mod recruiting;

use anyhow::Result;

use super::{Cli, Commands};

pub async fn run(cli: Cli) -> Result<()> {
    let project_dir = cli
        .project_dir
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("."));

    match cli.command {
        Commands::Recruiting { command } => recruiting::run(project_dir, command).await,
    }
}
