use anyhow::Result;
use clap::Parser;
use stackctl_lib::{ComposeError, Operation};

use crate::commands::{CommandEnv, TargetArgs};

/// Build images for services
#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

pub async fn handle_build(args: &BuildArgs, env: &CommandEnv) -> Result<()> {
    let project = args.target.load(None)?;

    env.images()?
        .build(&env.ctx, &project)
        .await
        .map_err(ComposeError::backend(Operation::Build))?;

    Ok(())
}
