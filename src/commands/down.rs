use anyhow::Result;
use clap::Parser;
use crossterm::style::Stylize;
use stackctl_lib::{ComposeError, Operation};

use crate::{
    commands::{CommandEnv, CommonArgs, FileArgs},
    progress::spinner,
};

/// Stop and remove containers and networks
#[derive(Parser, Debug, Clone)]
pub struct DownArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub files: FileArgs,
}

pub async fn handle_down(args: &DownArgs, env: &CommandEnv) -> Result<()> {
    let name = args
        .files
        .project_name(args.common.project_name.as_ref())?;
    let compose = env.compose()?;

    let pb = (!args.common.quiet).then(|| spinner(format!("Stopping {}", name.as_str().cyan())));

    let result = compose.down(&env.ctx, &name).await;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    result.map_err(ComposeError::backend(Operation::Down))?;

    if !args.common.quiet {
        println!("{} Removed {}", "✓".green(), name.as_str().cyan());
    }
    Ok(())
}
