use std::{
    collections::{BTreeMap, HashSet},
    fmt::Display,
    ops::Deref,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

use crate::error::{AssemblyError, ComposeError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectName(pub String);

impl ProjectName {
    /// Lowercases and drops everything but `[a-z0-9_-]`, the charset
    /// container engines accept for project labels.
    pub fn normalized(raw: &str) -> Self {
        let name = raw
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        Self(name)
    }
}

impl Display for ProjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<ProjectName> for String {
    fn from(name: ProjectName) -> Self {
        name.0
    }
}

impl Deref for ProjectName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(
        default,
        rename = "domainname",
        skip_serializing_if = "Option::is_none"
    )]
    pub domain_name: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes_from: Vec<String>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Every service this one needs running first: `depends_on`, `links`,
    /// `network_mode: service:..` and `volumes_from` (minus `container:..`
    /// references), in that order, without duplicates.
    pub fn dependencies(&self) -> Vec<&str> {
        let links = self
            .links
            .iter()
            .map(|l| l.split(':').next().unwrap_or(l));

        let network = self
            .network_mode
            .as_deref()
            .and_then(|m| m.strip_prefix("service:"));

        let volumes = self
            .volumes_from
            .iter()
            .filter(|v| !v.starts_with("container:"))
            .map(|v| v.split(':').next().unwrap_or(v));

        let mut seen = HashSet::new();
        self.depends_on
            .iter()
            .map(String::as_str)
            .chain(links)
            .chain(network)
            .chain(volumes)
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: ProjectName,

    #[serde(skip)]
    pub working_dir: PathBuf,

    #[serde(skip)]
    pub config_files: Vec<PathBuf>,

    #[serde(skip)]
    pub environment: BTreeMap<String, String>,

    pub services: Vec<Service>,
}

impl Project {
    pub fn new(name: ProjectName, services: Vec<Service>) -> Result<Self, AssemblyError> {
        let mut names = HashSet::new();
        for service in &services {
            if !names.insert(service.name.as_str()) {
                return Err(AssemblyError::DuplicateService(
                    service.name.clone(),
                ));
            }
        }

        Ok(Self {
            name,
            working_dir: PathBuf::new(),
            config_files: Vec::new(),
            environment: BTreeMap::new(),
            services,
        })
    }

    pub fn get_service(&self, name: &str) -> Result<&Service, ComposeError> {
        self.services
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ComposeError::ServiceNotFound(name.to_string()))
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|s| s.name.as_str())
    }

    /// Sets the domain name on the first service only. Backends
    /// with a single exposed endpoint publish the whole project under it.
    pub fn assign_domain_name(&mut self, domain_name: &str) {
        if let Some(first) = self.services.first_mut() {
            first.domain_name = Some(domain_name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_project_names() {
        assert_eq!(ProjectName::normalized("My App.v2").0, "myappv2");
        assert_eq!(ProjectName::normalized("web_stack-1").0, "web_stack-1");
    }

    #[test]
    fn rejects_duplicate_service_names() {
        let err = Project::new(
            ProjectName("demo".into()),
            vec![Service::new("web"), Service::new("web")],
        )
        .unwrap_err();

        assert!(matches!(err, AssemblyError::DuplicateService(name) if name == "web"));
    }

    #[test]
    fn dependencies_merge_all_reference_kinds() {
        let service = Service {
            links: vec!["db:database".into(), "cache".into()],
            network_mode: Some("service:vpn".into()),
            volumes_from: vec![
                "data:ro".into(),
                "container:abc123".into(),
                "db".into(),
            ],
            ..Service::new("web").with_dependencies(["db"])
        };

        assert_eq!(service.dependencies(), vec!["db", "cache", "vpn", "data"]);
    }

    #[test]
    fn domain_name_lands_on_first_service() {
        let mut project = Project::new(
            ProjectName("demo".into()),
            vec![Service::new("front"), Service::new("back")],
        )
        .unwrap();

        project.assign_domain_name("demo-app");

        assert_eq!(project.services[0].domain_name.as_deref(), Some("demo-app"));
        assert_eq!(project.services[1].domain_name, None);
    }

    #[test]
    fn missing_service_lookup_is_an_error() {
        let project =
            Project::new(ProjectName("demo".into()), vec![Service::new("web")])
                .unwrap();

        assert!(project.get_service("web").is_ok());
        assert!(matches!(
            project.get_service("db"),
            Err(ComposeError::ServiceNotFound(name)) if name == "db"
        ));
    }
}
