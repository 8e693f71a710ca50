use std::sync::Arc;

use clap::{Arg, ArgMatches, Command, CommandFactory, FromArgMatches, Parser, Subcommand};
use crossterm::style::Stylize;
use stackctl_lib::{BackendRegistry, ContextType, ExecContext};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    commands::{
        CommandEnv, Commands, ImageCommands, handle_command,
        handle_image_command,
    },
    docker::DockerCompose,
};

mod commands;
mod docker;
mod logging;
mod output;
mod progress;

/// Everything needed before the command tree can be built.
#[derive(Parser, Debug)]
#[command(
    disable_help_flag = true,
    disable_version_flag = true,
    allow_hyphen_values = true,
    ignore_errors = true
)]
struct CoreCli {
    #[command(flatten)]
    global: GlobalArgs,

    #[clap(trailing_var_arg = true)]
    args: Vec<String>,
}

#[derive(clap::Args, Debug, Clone)]
struct GlobalArgs {
    /// Deployment context to run against
    #[arg(
        short = 'c',
        long,
        env = "STACKCTL_CONTEXT",
        default_value = "local"
    )]
    context: ContextType,

    /// Docker binary driven by the local context
    #[arg(
        long,
        env = "STACKCTL_DOCKER_BIN",
        default_value = "docker",
        hide_env_values = true
    )]
    docker_bin: String,

    /// Log filter, e.g. `debug` or `stackctl_lib=trace`
    #[arg(long, env = "STACKCTL_LOG", default_value = "warn")]
    log_level: String,
}

#[derive(Parser)]
#[command(name = "stackctl", version)]
/// Run multi-service applications on local and cloud contexts
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

enum Invocation {
    Compose(Commands),
    Images(ImageCommands),
}

/// The command tree for `context`: image commands only where there is a
/// local image store, `--domainname` only where a single domain name can be
/// exposed.
fn build_command(context: ContextType) -> Command {
    let mut command =
        Cli::command().mut_subcommand("list", |list| list.visible_alias("ls"));

    if context.supports_image_commands() {
        command = ImageCommands::augment_subcommands(command);
    }

    if context.supports_domain_name() {
        command = command.mut_subcommand("up", |up| {
            up.arg(
                Arg::new("domainname")
                    .long("domainname")
                    .value_name("NAME")
                    .help("Container NIS domain name"),
            )
        });
    }

    command
}

fn parse_invocation(matches: &ArgMatches) -> Result<Invocation, clap::Error> {
    if let Some(name) = matches.subcommand_name() {
        if ImageCommands::has_subcommand(name) {
            return Ok(Invocation::Images(ImageCommands::from_arg_matches(matches)?));
        }
    }

    let mut command = Commands::from_arg_matches(matches)?;
    if let Commands::Up { args } = &mut command {
        args.domain_name = matches
            .subcommand_matches("up")
            .and_then(|up| up.try_get_one::<String>("domainname").ok().flatten())
            .cloned();
    }
    Ok(Invocation::Compose(command))
}

fn backends(global: &GlobalArgs) -> BackendRegistry {
    let mut registry = BackendRegistry::default();

    let docker_bin = global.docker_bin.clone();
    registry.register(ContextType::Local, move || {
        Ok(Arc::new(DockerCompose::new(docker_bin.clone())))
    });

    registry
}

/// First Ctrl+C cancels `token`, the second one exits right away.
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        debug!("interrupt received");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Forced exit".red());
            std::process::exit(130);
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clap_complete::CompleteEnv::with_factory(|| {
        build_command(CoreCli::parse().global.context)
    })
    .complete();

    let core_cli = CoreCli::parse();
    logging::init_logger(&core_cli.global.log_level);

    let context = core_cli.global.context;
    let matches = build_command(context).get_matches();
    let global = GlobalArgs::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    let invocation = parse_invocation(&matches).unwrap_or_else(|e| e.exit());

    let client = backends(&global).check_compose_support(context)?;
    debug!(%context, "compose support confirmed");

    let token = CancellationToken::new();
    spawn_interrupt_handler(token.clone());

    let env = CommandEnv {
        client,
        ctx: ExecContext::new(token),
        context,
    };

    match invocation {
        Invocation::Compose(command) => handle_command(&command, &env).await?,
        Invocation::Images(command) => handle_image_command(&command, &env).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(context: ContextType, args: &[&str]) -> Result<Invocation, clap::Error> {
        let matches = build_command(context).try_get_matches_from(args)?;
        parse_invocation(&matches)
    }

    #[test]
    fn command_tree_is_valid_for_every_context() {
        for context in ContextType::ALL {
            build_command(context).debug_assert();
        }
    }

    #[test]
    fn image_commands_only_exist_locally() {
        assert!(matches!(
            parse(ContextType::Local, &["stackctl", "build", "web"]),
            Ok(Invocation::Images(ImageCommands::Build { .. }))
        ));

        for context in [ContextType::Aci, ContextType::Ecs] {
            assert!(parse(context, &["stackctl", "pull"]).is_err());
        }
    }

    #[test]
    fn domainname_only_exists_on_aci() {
        let invocation = parse(
            ContextType::Aci,
            &["stackctl", "up", "--domainname", "shop", "web"],
        )
        .unwrap();
        let Invocation::Compose(Commands::Up { args }) = invocation else {
            panic!("expected up");
        };
        assert_eq!(args.domain_name.as_deref(), Some("shop"));
        assert_eq!(args.target.services, vec!["web"]);

        let invocation = parse(ContextType::Aci, &["stackctl", "up", "-d"]).unwrap();
        let Invocation::Compose(Commands::Up { args }) = invocation else {
            panic!("expected up");
        };
        assert_eq!(args.domain_name, None);
        assert!(args.detach);
        assert!(!args.quiet);

        assert!(
            parse(ContextType::Local, &["stackctl", "up", "--domainname", "shop"])
                .is_err()
        );
    }

    #[test]
    fn shared_flags_parse() {
        let invocation = parse(
            ContextType::Local,
            &[
                "stackctl", "ps", "-p", "shop", "--format", "json", "-q", "-f",
                "a.yaml", "-f", "b.yaml", "-e", "TAG=1",
            ],
        )
        .unwrap();
        let Invocation::Compose(Commands::Ps { args }) = invocation else {
            panic!("expected ps");
        };
        assert_eq!(args.common.project_name.as_deref(), Some("shop"));
        assert_eq!(args.common.format, commands::OutputFormat::Json);
        assert!(args.common.quiet);
        assert_eq!(args.files.files.len(), 2);
        assert_eq!(args.files.environment, vec!["TAG=1"]);
    }

    #[test]
    fn up_can_run_quietly() {
        let invocation =
            parse(ContextType::Local, &["stackctl", "up", "-q", "web"]).unwrap();
        let Invocation::Compose(Commands::Up { args }) = invocation else {
            panic!("expected up");
        };
        assert!(args.quiet);
        assert!(!args.detach);
        assert_eq!(args.target.services, vec!["web"]);
    }

    #[test]
    fn ls_is_an_alias_for_list() {
        assert!(matches!(
            parse(ContextType::Ecs, &["stackctl", "ls"]),
            Ok(Invocation::Compose(Commands::List { .. }))
        ));
    }

    #[test]
    fn core_cli_learns_the_context_before_the_command_tree() {
        let core = CoreCli::parse_from([
            "stackctl", "--context", "aci", "up", "--domainname", "x",
        ]);
        assert_eq!(core.global.context, ContextType::Aci);
        assert_eq!(core.args, vec!["up", "--domainname", "x"]);
    }

    #[test]
    fn unregistered_contexts_are_not_implemented() {
        let global = GlobalArgs {
            context: ContextType::Aci,
            docker_bin: "docker".into(),
            log_level: "warn".into(),
        };
        let registry = backends(&global);

        assert!(registry.check_compose_support(ContextType::Local).is_ok());
        assert!(
            registry
                .check_compose_support(ContextType::Aci)
                .err()
                .is_some_and(|e| e.is_not_implemented())
        );
    }
}
