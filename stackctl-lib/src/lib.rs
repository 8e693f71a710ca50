pub mod assembler;
pub mod backend;
pub mod context;
pub mod engine;
pub mod error;
pub mod project;
pub mod selector;

pub use assembler::{ProjectOptions, load_project, load_selected, project_name};
pub use backend::{
    Backend, BackendRegistry, Client, ComposeService, ConvertFormat,
    ImageService, LogConsumer, ServiceStatus, StackSummary,
};
pub use context::{ContextType, ExecContext};
pub use engine::{Orchestrator, UpObserver, UpOptions, UpState};
pub use error::{AssemblyError, ComposeError, Operation};
pub use project::{Project, ProjectName, Service};
pub use selector::{dependency_closure, select_services};
