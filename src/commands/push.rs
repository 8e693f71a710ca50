use anyhow::Result;
use clap::Parser;
use stackctl_lib::{ComposeError, Operation};

use crate::commands::{CommandEnv, TargetArgs};

/// Push service images
#[derive(Parser, Debug, Clone)]
pub struct PushArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

pub async fn handle_push(args: &PushArgs, env: &CommandEnv) -> Result<()> {
    let project = args.target.load(None)?;

    env.images()?
        .push(&env.ctx, &project)
        .await
        .map_err(ComposeError::backend(Operation::Push))?;

    Ok(())
}
