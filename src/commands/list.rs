use anyhow::Result;
use clap::Parser;
use crossterm::style::Stylize;
use stackctl_lib::{ComposeError, Operation, StackSummary};
use stackctl_tui_lib::table::Table;

use crate::commands::{CommandEnv, CommonArgs, OutputFormat};

/// List running compose projects
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn handle_list(args: &ListArgs, env: &CommandEnv) -> Result<()> {
    let mut stacks = env
        .compose()?
        .list(&env.ctx)
        .await
        .map_err(ComposeError::backend(Operation::List))?;

    if let Some(name) = &args.common.project_name {
        stacks.retain(|s| &s.name == name);
    }

    if args.common.quiet {
        for stack in &stacks {
            println!("{}", stack.name);
        }
        return Ok(());
    }

    match args.common.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stacks)?),
        OutputFormat::Pretty => stack_table(&stacks).print(),
    }
    Ok(())
}

fn stack_table(stacks: &[StackSummary]) -> Table {
    let mut table = Table::new(["NAME", "STATUS", "CONFIG FILES"]);
    for stack in stacks {
        table.push_row([
            stack.name.as_str().cyan().to_string(),
            stack.status.clone(),
            stack.config_files.clone(),
        ]);
    }
    table
}
