use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use paste::paste;
use stackctl_lib::{Client, ComposeService, ContextType, ExecContext, ImageService, ProjectOptions};

/// Everything a command handler needs besides its own arguments.
pub struct CommandEnv {
    pub client: Client,
    pub ctx: ExecContext,
    pub context: ContextType,
}

impl CommandEnv {
    pub fn compose(&self) -> anyhow::Result<&dyn ComposeService> {
        Ok(self.client.compose()?)
    }

    pub fn images(&self) -> anyhow::Result<&dyn ImageService> {
        Ok(self.client.images()?)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Project name
    #[arg(short = 'p', long)]
    pub project_name: Option<String>,

    /// Format the output
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Only display IDs
    #[arg(short, long)]
    pub quiet: bool,
}

/// Where the project definition comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct FileArgs {
    /// Work dir
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Compose configuration files
    #[arg(short = 'f', long = "file")]
    pub files: Vec<PathBuf>,

    /// Environment variables
    #[arg(short = 'e', long = "environment")]
    pub environment: Vec<String>,
}

impl FileArgs {
    pub fn project_options(&self, name: Option<String>) -> ProjectOptions {
        ProjectOptions::new(self.files.iter().cloned())
            .with_os_env()
            .with_env(self.environment.iter().cloned())
            .with_working_dir(self.workdir.clone())
            .with_name(name)
    }

    /// The explicit name if given, otherwise the name of the project the
    /// files describe.
    pub fn project_name(&self, name: Option<&String>) -> anyhow::Result<String> {
        let options = self.project_options(name.cloned());
        Ok(stackctl_lib::project_name(&options)?.into())
    }
}

/// Project selection shared by commands that act on a subset of services.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Project name
    #[arg(short = 'p', long)]
    pub project_name: Option<String>,

    #[command(flatten)]
    pub files: FileArgs,

    /// Services to act on, together with their dependencies
    pub services: Vec<String>,
}

impl TargetArgs {
    pub fn load(&self, domain_name: Option<&str>) -> anyhow::Result<stackctl_lib::Project> {
        let options = self.files.project_options(self.project_name.clone());
        Ok(stackctl_lib::load_selected(&options, domain_name, &self.services)?)
    }
}

macro_rules! define_commands {
    (
        $enum_name:ident, $handler:ident,
        [ $( $modname:ident ),* $(,)? ]
    ) => {
        paste! {
            $(
                pub mod $modname;
                use crate::commands::$modname::{ [<handle_ $modname>], [<$modname:camel Args>] };
            )*

            #[derive(Subcommand, Debug)]
            pub enum $enum_name {
                $(
                    [<$modname:camel>] {
                        #[command(flatten)]
                        args: [<$modname:camel Args>],
                    },
                )*
            }

            pub async fn $handler(
                command: &$enum_name,
                env: &CommandEnv,
            ) -> anyhow::Result<()> {
                match command {
                    $(
                        $enum_name::[<$modname:camel>] { args } =>
                            [<handle_ $modname>](args, env).await?,
                    )*
                }
                Ok(())
            }
        }
    };
}

define_commands!(Commands, handle_command, [up, down, ps, list, logs, convert]);

// Registered only for contexts with a local image store.
define_commands!(ImageCommands, handle_image_command, [build, push, pull]);
