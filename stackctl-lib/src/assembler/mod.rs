//! Turns config paths, environment and name overrides into a [`Project`].

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde_yml::{Mapping, Value};
use tracing::{debug, trace};

use crate::{
    error::AssemblyError,
    project::{Project, ProjectName},
};

mod interpolation;
mod service;

pub use interpolation::interpolate;

/// File names tried, in order, when no config path is given.
pub const DEFAULT_FILE_NAMES: [&str; 4] = [
    "compose.yaml",
    "compose.yml",
    "docker-compose.yml",
    "docker-compose.yaml",
];

#[derive(Clone, Debug, Default)]
pub struct ProjectOptions {
    pub config_paths: Vec<PathBuf>,
    /// `KEY=VALUE` entries layered over the OS environment.
    pub environment: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub name: Option<String>,
    pub os_env: bool,
}

impl ProjectOptions {
    pub fn new<I, P>(config_paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            config_paths: config_paths.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_os_env(mut self) -> Self {
        self.os_env = true;
        self
    }

    pub fn with_env<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment
            .extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir.filter(|d| !d.as_os_str().is_empty());
        self
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name.filter(|n| !n.is_empty());
        self
    }

    pub fn resolve_environment(&self) -> Result<BTreeMap<String, String>, AssemblyError> {
        let mut env: BTreeMap<String, String> = if self.os_env {
            std::env::vars().collect()
        } else {
            BTreeMap::new()
        };

        for entry in &self.environment {
            let (key, value) = entry
                .split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .ok_or_else(|| AssemblyError::InvalidEnvironment(entry.clone()))?;
            env.insert(key.to_string(), value.to_string());
        }

        Ok(env)
    }

    fn base_dir(&self) -> Result<PathBuf, AssemblyError> {
        let cwd = std::env::current_dir().map_err(|source| AssemblyError::Io {
            path: PathBuf::from("."),
            source,
        })?;
        Ok(match &self.working_dir {
            Some(dir) => cwd.join(dir),
            None => cwd,
        })
    }

    fn config_files(
        &self,
        env: &BTreeMap<String, String>,
        base_dir: &Path,
    ) -> Result<Vec<PathBuf>, AssemblyError> {
        if !self.config_paths.is_empty() {
            return Ok(self
                .config_paths
                .iter()
                .map(|p| base_dir.join(p))
                .collect());
        }

        if let Some(files) = env.get("COMPOSE_FILE").filter(|f| !f.is_empty()) {
            let separator = env
                .get("COMPOSE_PATH_SEPARATOR")
                .map(String::as_str)
                .unwrap_or(":");
            return Ok(files
                .split(separator)
                .filter(|f| !f.is_empty())
                .map(|f| base_dir.join(f))
                .collect());
        }

        find_default_file(base_dir)
            .map(|file| vec![file])
            .ok_or_else(|| AssemblyError::NoConfigFile(base_dir.to_path_buf()))
    }
}

fn find_default_file(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        DEFAULT_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

fn read_config(path: &Path, env: &BTreeMap<String, String>) -> Result<Mapping, AssemblyError> {
    let data = fs::read_to_string(path).map_err(|source| AssemblyError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut value: Value =
        serde_yml::from_str(&data).map_err(|source| AssemblyError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

    interpolation::interpolate_value(&mut value, env)?;

    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(AssemblyError::InvalidService {
            service: path.display().to_string(),
            message: "top level must be a mapping".to_string(),
        }),
    }
}

/// Service definitions from all files, merged key by key. Later files win;
/// a service keeps the position of its first appearance.
fn merge_services(configs: &[(PathBuf, Mapping)]) -> Result<Vec<(String, Value)>, AssemblyError> {
    let mut merged: Vec<(String, Value)> = Vec::new();

    for (path, config) in configs {
        let services = match config.get("services") {
            None | Some(Value::Null) => continue,
            Some(Value::Mapping(services)) => services,
            Some(_) => {
                return Err(AssemblyError::InvalidService {
                    service: path.display().to_string(),
                    message: "services must be a mapping".to_string(),
                });
            }
        };

        for (name, definition) in services {
            let name = name
                .as_str()
                .ok_or_else(|| AssemblyError::InvalidService {
                    service: format!("{:?}", name),
                    message: "service names must be strings".to_string(),
                })?
                .to_string();

            match merged.iter_mut().find(|(n, _)| *n == name) {
                Some((_, Value::Mapping(existing))) => {
                    if let Value::Mapping(overrides) = definition {
                        for (key, value) in overrides {
                            existing.insert(key.clone(), value.clone());
                        }
                    }
                }
                Some((_, existing)) => *existing = definition.clone(),
                None => merged.push((name, definition.clone())),
            }
        }
    }

    Ok(merged)
}

fn resolve_name(
    options: &ProjectOptions,
    env: &BTreeMap<String, String>,
    configs: &[(PathBuf, Mapping)],
    working_dir: &Path,
) -> Result<ProjectName, AssemblyError> {
    let declared = configs
        .iter()
        .rev()
        .find_map(|(_, config)| config.get("name").and_then(Value::as_str));

    let raw = options
        .name
        .as_deref()
        .or_else(|| {
            env.get("COMPOSE_PROJECT_NAME")
                .map(String::as_str)
                .filter(|n| !n.is_empty())
        })
        .or(declared)
        .map(str::to_string)
        .or_else(|| {
            working_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_default();

    let name = ProjectName::normalized(&raw);
    if name.is_empty() {
        return Err(AssemblyError::InvalidProjectName(raw));
    }
    Ok(name)
}

pub fn load_project(options: &ProjectOptions) -> Result<Project, AssemblyError> {
    let env = options.resolve_environment()?;
    let base_dir = options.base_dir()?;
    let config_files = options.config_files(&env, &base_dir)?;

    let working_dir = match &options.working_dir {
        Some(_) => base_dir.clone(),
        None => config_files
            .first()
            .and_then(|f| f.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| base_dir.clone()),
    };

    let configs = config_files
        .iter()
        .map(|path| {
            trace!(path = %path.display(), "reading compose file");
            read_config(path, &env).map(|config| (path.clone(), config))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let definitions = merge_services(&configs)?;
    if definitions.is_empty() {
        return Err(AssemblyError::NoServices(
            config_files
                .first()
                .cloned()
                .unwrap_or_else(|| working_dir.clone()),
        ));
    }

    let services = definitions
        .iter()
        .map(|(name, definition)| service::parse_service(name, definition, &env))
        .collect::<Result<Vec<_>, _>>()?;

    let name = resolve_name(options, &env, &configs, &working_dir)?;

    let mut project = Project::new(name, services)?;
    project.working_dir = working_dir;
    project.config_files = config_files;
    project.environment = env;

    debug!(
        project = %project.name,
        services = project.services.len(),
        files = project.config_files.len(),
        "assembled project"
    );

    Ok(project)
}

/// The explicit name when one was given, otherwise the name of the
/// assembled project.
pub fn project_name(options: &ProjectOptions) -> Result<ProjectName, AssemblyError> {
    match &options.name {
        Some(name) => Ok(ProjectName(name.clone())),
        None => Ok(load_project(options)?.name),
    }
}

/// Assembles the project, narrows it to `services` plus their dependencies
/// and puts `domain_name` on the first service that remains.
pub fn load_selected<S: AsRef<str>>(
    options: &ProjectOptions,
    domain_name: Option<&str>,
    services: &[S],
) -> crate::error::Result<Project> {
    let mut project = load_project(options)?;
    project.filter_services(services)?;

    if let Some(domain_name) = domain_name.filter(|d| !d.is_empty()) {
        project.assign_domain_name(domain_name);
    }

    Ok(project)
}
