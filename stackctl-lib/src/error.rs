use std::{fmt::Display, path::PathBuf};

use thiserror::Error;

use crate::{
    context::ContextType,
    engine::{UpEvent, UpState},
};

/// Backend primitive a [`ComposeError::Backend`] failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Start,
    Up,
    Down,
    Ps,
    List,
    Logs,
    Convert,
    Build,
    Push,
    Pull,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Start => "start",
            Operation::Up => "up",
            Operation::Down => "down",
            Operation::Ps => "ps",
            Operation::List => "list",
            Operation::Logs => "logs",
            Operation::Convert => "convert",
            Operation::Build => "build",
            Operation::Push => "push",
            Operation::Pull => "pull",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("compose command not implemented for the {context} context")]
    NotImplemented { context: ContextType },

    #[error("failed to initialize the {context} backend: {source:#}")]
    BackendInit {
        context: ContextType,
        #[source]
        source: anyhow::Error,
    },

    #[error("no such service: {0}")]
    ServiceNotFound(String),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("{operation} failed: {source:#}")]
    Backend {
        operation: Operation,
        #[source]
        source: anyhow::Error,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid up transition from {from:?} on {event:?}")]
    InvalidTransition { from: UpState, event: UpEvent },
}

impl ComposeError {
    /// Adapter for `map_err` on raw backend results.
    pub fn backend(operation: Operation) -> impl FnOnce(anyhow::Error) -> ComposeError {
        move |source| ComposeError::Backend { operation, source }
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, ComposeError::NotImplemented { .. })
    }
}

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("invalid environment entry '{0}', expected KEY=VALUE")]
    InvalidEnvironment(String),

    #[error("no configuration file provided: not found in {}", .0.display())]
    NoConfigFile(PathBuf),

    #[error("no service defined in {}", .0.display())]
    NoServices(PathBuf),

    #[error("service '{0}' is defined more than once")]
    DuplicateService(String),

    #[error("service '{service}': {message}")]
    InvalidService { service: String, message: String },

    #[error("invalid interpolation format for '{0}'")]
    Interpolation(String),

    #[error("required variable {name} is missing a value: {message}")]
    RequiredVariable { name: String, message: String },

    #[error("invalid project name '{0}'")]
    InvalidProjectName(String),
}

pub type Result<T> = std::result::Result<T, ComposeError>;
