//! Deployment backends and the client that gates access to them.
//!
//! A backend advertises what it can do through capability queries on
//! [`Backend`]; commands go through [`Client`], which turns a missing
//! capability into [`ComposeError::NotImplemented`].

use std::{collections::BTreeMap, fmt::Display, str::FromStr, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    context::{ContextType, ExecContext},
    error::{ComposeError, Result},
    project::Project,
};

/// Receives log lines from running services.
pub trait LogConsumer: Send + Sync {
    fn log(&self, service: &str, message: &str);
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub id: String,
    pub name: String,
    pub service: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
    #[serde(default)]
    pub ports: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSummary {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub config_files: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConvertFormat {
    #[default]
    Yaml,
    Json,
}

impl Display for ConvertFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvertFormat::Yaml => f.write_str("yaml"),
            ConvertFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for ConvertFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "yaml" | "yml" => Ok(ConvertFormat::Yaml),
            "json" => Ok(ConvertFormat::Json),
            other => Err(format!("unsupported convert format '{other}'")),
        }
    }
}

/// Compose-style lifecycle primitives of one deployment backend.
///
/// Every call is attempted once; retrying is the caller's business.
#[async_trait]
pub trait ComposeService: Send + Sync {
    /// Provisions every resource of `project` without starting anything.
    async fn create(&self, ctx: &ExecContext, project: &Project) -> anyhow::Result<()>;

    /// Starts the created resources. With a consumer, stays attached and
    /// forwards service output until the application exits or `ctx` is
    /// cancelled; without one, returns once everything is started.
    async fn start(
        &self,
        ctx: &ExecContext,
        project: &Project,
        consumer: Option<Arc<dyn LogConsumer>>,
    ) -> anyhow::Result<()>;

    /// Create and start in one backend-side operation.
    async fn up(&self, ctx: &ExecContext, project: &Project, detach: bool) -> anyhow::Result<()>;

    async fn down(&self, ctx: &ExecContext, project_name: &str) -> anyhow::Result<()>;

    async fn ps(&self, ctx: &ExecContext, project_name: &str) -> anyhow::Result<Vec<ServiceStatus>>;

    async fn list(&self, ctx: &ExecContext) -> anyhow::Result<Vec<StackSummary>>;

    async fn logs(
        &self,
        ctx: &ExecContext,
        project_name: &str,
        consumer: Arc<dyn LogConsumer>,
    ) -> anyhow::Result<()>;

    /// Renders the project in the backend's own format. The default is the
    /// assembled project itself.
    async fn convert(
        &self,
        _ctx: &ExecContext,
        project: &Project,
        format: ConvertFormat,
    ) -> anyhow::Result<String> {
        Ok(match format {
            ConvertFormat::Yaml => serde_yml::to_string(project)?,
            ConvertFormat::Json => serde_json::to_string_pretty(project)?,
        })
    }
}

/// Image lifecycle, only offered by backends with a local image store.
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn build(&self, ctx: &ExecContext, project: &Project) -> anyhow::Result<()>;
    async fn push(&self, ctx: &ExecContext, project: &Project) -> anyhow::Result<()>;
    async fn pull(&self, ctx: &ExecContext, project: &Project) -> anyhow::Result<()>;
}

pub trait Backend: Send + Sync {
    fn context_type(&self) -> ContextType;

    fn compose_service(&self) -> Option<&dyn ComposeService>;

    fn image_service(&self) -> Option<&dyn ImageService> {
        None
    }
}

/// Handle on the backend of the active context.
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn Backend>,
}

impl Client {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn context_type(&self) -> ContextType {
        self.backend.context_type()
    }

    pub fn compose(&self) -> Result<&dyn ComposeService> {
        self.backend
            .compose_service()
            .ok_or(ComposeError::NotImplemented {
                context: self.context_type(),
            })
    }

    pub fn images(&self) -> Result<&dyn ImageService> {
        self.backend
            .image_service()
            .ok_or(ComposeError::NotImplemented {
                context: self.context_type(),
            })
    }
}

pub type BackendFactory =
    Box<dyn Fn() -> anyhow::Result<Arc<dyn Backend>> + Send + Sync>;

/// Backends available to this build, keyed by the context they serve.
#[derive(Default)]
pub struct BackendRegistry {
    factories: BTreeMap<ContextType, BackendFactory>,
}

impl BackendRegistry {
    pub fn register<F>(&mut self, context: ContextType, factory: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn Backend>> + Send + Sync + 'static,
    {
        self.factories.insert(context, Box::new(factory));
    }

    pub fn client(&self, context: ContextType) -> Result<Client> {
        let factory = self
            .factories
            .get(&context)
            .ok_or(ComposeError::NotImplemented { context })?;

        let backend = factory()
            .map_err(|source| ComposeError::BackendInit { context, source })?;

        debug!(%context, "backend client ready");
        Ok(Client::new(backend))
    }

    /// Resolves the client for `context` and makes sure it can run
    /// compose commands at all.
    pub fn check_compose_support(&self, context: ContextType) -> Result<Client> {
        let client = self.client(context)?;
        client.compose()?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare(ContextType);

    impl Backend for Bare {
        fn context_type(&self) -> ContextType {
            self.0
        }

        fn compose_service(&self) -> Option<&dyn ComposeService> {
            None
        }
    }

    #[test]
    fn unregistered_context_is_not_implemented() {
        let registry = BackendRegistry::default();

        let err = registry
            .check_compose_support(ContextType::Ecs)
            .err()
            .unwrap();

        assert!(err.is_not_implemented());
        assert_eq!(
            err.to_string(),
            "compose command not implemented for the ecs context"
        );
    }

    #[test]
    fn backend_without_compose_capability_is_not_implemented() {
        let mut registry = BackendRegistry::default();
        registry.register(ContextType::Aci, || Ok(Arc::new(Bare(ContextType::Aci))));

        let client = registry.client(ContextType::Aci).unwrap();
        assert!(client.compose().err().unwrap().is_not_implemented());
        assert!(client.images().err().unwrap().is_not_implemented());
        assert!(
            registry
                .check_compose_support(ContextType::Aci)
                .err()
                .unwrap()
                .is_not_implemented()
        );
    }

    #[test]
    fn failing_factory_is_a_plain_error() {
        let mut registry = BackendRegistry::default();
        registry.register(ContextType::Local, || anyhow::bail!("engine socket missing"));

        let err = registry.client(ContextType::Local).err().unwrap();

        assert!(!err.is_not_implemented());
        assert!(err.to_string().contains("engine socket missing"));
    }

    #[test]
    fn parses_convert_formats() {
        assert_eq!("yml".parse::<ConvertFormat>(), Ok(ConvertFormat::Yaml));
        assert_eq!("json".parse::<ConvertFormat>(), Ok(ConvertFormat::Json));
        assert!("toml".parse::<ConvertFormat>().is_err());
    }
}
