use anyhow::Result;
use clap::Parser;
use crossterm::style::Stylize;
use stackctl_lib::{ComposeError, Operation, ServiceStatus};
use stackctl_tui_lib::table::Table;

use crate::commands::{CommandEnv, CommonArgs, FileArgs, OutputFormat};

/// List containers
#[derive(Parser, Debug, Clone)]
pub struct PsArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub files: FileArgs,
}

pub async fn handle_ps(args: &PsArgs, env: &CommandEnv) -> Result<()> {
    let name = args
        .files
        .project_name(args.common.project_name.as_ref())?;

    let services = env
        .compose()?
        .ps(&env.ctx, &name)
        .await
        .map_err(ComposeError::backend(Operation::Ps))?;

    if args.common.quiet {
        for service in &services {
            println!("{}", service.id);
        }
        return Ok(());
    }

    match args.common.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&services)?),
        OutputFormat::Pretty => status_table(&services).print(),
    }
    Ok(())
}

fn colored_state(service: &ServiceStatus) -> String {
    let state = match service.state.as_str() {
        "running" => service.state.as_str().green(),
        "exited" | "dead" => service.state.as_str().red(),
        "restarting" | "created" | "paused" => service.state.as_str().yellow(),
        other => other.stylize(),
    };

    match service.health.as_deref() {
        Some("healthy") => format!("{state} ({})", "healthy".green()),
        Some("unhealthy") => format!("{state} ({})", "unhealthy".red()),
        Some(health) => format!("{state} ({health})"),
        None => state.to_string(),
    }
}

fn status_table(services: &[ServiceStatus]) -> Table {
    let mut table = Table::new(["NAME", "SERVICE", "STATE", "PORTS"]);
    for service in services {
        table.push_row([
            service.name.clone(),
            service.service.as_str().cyan().to_string(),
            colored_state(service),
            service.ports.join(", "),
        ]);
    }
    table
}
