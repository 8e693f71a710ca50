use anyhow::Result;
use clap::Parser;
use stackctl_lib::{ComposeError, ConvertFormat, Operation, load_project};

use crate::commands::{CommandEnv, CommonArgs, FileArgs, OutputFormat};

/// Converts the compose file to the active context's format
#[derive(Parser, Debug, Clone)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub files: FileArgs,
}

impl From<OutputFormat> for ConvertFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Pretty => ConvertFormat::Yaml,
            OutputFormat::Json => ConvertFormat::Json,
        }
    }
}

pub async fn handle_convert(args: &ConvertArgs, env: &CommandEnv) -> Result<()> {
    let options = args
        .files
        .project_options(args.common.project_name.clone());
    let project = load_project(&options).map_err(ComposeError::from)?;

    let rendered = env
        .compose()?
        .convert(&env.ctx, &project, args.common.format.into())
        .await
        .map_err(ComposeError::backend(Operation::Convert))?;

    // Quiet only validates.
    if !args.common.quiet {
        print!("{rendered}");
        if !rendered.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
