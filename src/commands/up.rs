use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use stackctl_lib::{Orchestrator, UpOptions};
use tracing::debug;

use crate::{
    commands::{CommandEnv, TargetArgs},
    output::LogPrinter,
    progress::UpProgress,
};

/// Create and start containers
#[derive(Parser, Debug, Clone)]
pub struct UpArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Detached mode: Run containers in the background
    #[arg(short, long)]
    pub detach: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Container NIS domain name, filled in from `--domainname` on contexts
    /// that register it
    #[arg(skip)]
    pub domain_name: Option<String>,
}

pub async fn handle_up(args: &UpArgs, env: &CommandEnv) -> Result<()> {
    let project = args.target.load(args.domain_name.as_deref())?;
    let compose = env.compose()?;

    debug!(
        project = %project.name,
        context = %env.context,
        detach = args.detach,
        "up"
    );

    let progress = UpProgress::new(&project, args.quiet);
    let mut engine = Orchestrator::new(compose).with_observer(&progress);

    if env.context.splits_create_start() {
        let options = if args.detach {
            UpOptions::detached()
        } else {
            UpOptions::attached(Arc::new(LogPrinter::new(project.service_names())))
        };

        progress.begin();
        engine.run_up(&env.ctx, &project, options).await?;
    } else {
        engine
            .run_delegated_up(&env.ctx, &project, args.detach)
            .await?;
    }

    Ok(())
}
