use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use stackctl_lib::{ComposeError, Operation};

use crate::{
    commands::{CommandEnv, CommonArgs, FileArgs},
    output::LogPrinter,
};

/// View output from containers
#[derive(Parser, Debug, Clone)]
pub struct LogsArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub files: FileArgs,
}

pub async fn handle_logs(args: &LogsArgs, env: &CommandEnv) -> Result<()> {
    let name = args
        .files
        .project_name(args.common.project_name.as_ref())?;

    env.compose()?
        .logs(&env.ctx, &name, Arc::new(LogPrinter::default()))
        .await
        .map_err(ComposeError::backend(Operation::Logs))?;

    Ok(())
}
