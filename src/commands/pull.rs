use anyhow::Result;
use clap::Parser;
use stackctl_lib::{ComposeError, Operation};

use crate::commands::{CommandEnv, TargetArgs};

/// Pull service images
#[derive(Parser, Debug, Clone)]
pub struct PullArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

pub async fn handle_pull(args: &PullArgs, env: &CommandEnv) -> Result<()> {
    let project = args.target.load(None)?;

    env.images()?
        .pull(&env.ctx, &project)
        .await
        .map_err(ComposeError::backend(Operation::Pull))?;

    Ok(())
}
