use std::collections::BTreeMap;

use serde_yml::{Mapping, Value};

use crate::{error::AssemblyError, project::Service};

fn invalid(service: &str, message: impl Into<String>) -> AssemblyError {
    AssemblyError::InvalidService {
        service: service.to_string(),
        message: message.into(),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_field(service: &str, map: &Mapping, key: &str) -> Result<Option<String>, AssemblyError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar(value)
            .map(Some)
            .ok_or_else(|| invalid(service, format!("{key} must be a string"))),
    }
}

fn string_list(service: &str, map: &Mapping, key: &str) -> Result<Vec<String>, AssemblyError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| {
                scalar(item).ok_or_else(|| {
                    invalid(service, format!("{key} entries must be strings"))
                })
            })
            .collect(),
        Some(_) => Err(invalid(service, format!("{key} must be a list"))),
    }
}

/// `depends_on` comes either as a list of names or as a mapping from name
/// to start conditions.
fn depends_on(service: &str, map: &Mapping) -> Result<Vec<String>, AssemblyError> {
    match map.get("depends_on") {
        Some(Value::Mapping(deps)) => deps
            .keys()
            .map(|k| {
                k.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(service, "depends_on keys must be service names"))
            })
            .collect(),
        _ => string_list(service, map, "depends_on"),
    }
}

fn build_context(service: &str, map: &Mapping) -> Result<Option<String>, AssemblyError> {
    match map.get("build") {
        Some(Value::Mapping(build)) => Ok(build
            .get("context")
            .and_then(scalar)
            .or_else(|| Some(".".to_string()))),
        _ => string_field(service, map, "build"),
    }
}

/// Entries without a value (`KEY` or `KEY:`) are taken from the project
/// environment and dropped when it does not define them either.
fn environment(
    service: &str,
    map: &Mapping,
    project_env: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, AssemblyError> {
    let mut env = BTreeMap::new();

    match map.get("environment") {
        None | Some(Value::Null) => {}
        Some(Value::Mapping(entries)) => {
            for (key, value) in entries {
                let key = scalar(key)
                    .ok_or_else(|| invalid(service, "environment keys must be strings"))?;
                let value = match value {
                    Value::Null => project_env.get(&key).cloned(),
                    other => Some(scalar(other).ok_or_else(|| {
                        invalid(service, format!("environment value for {key} must be a scalar"))
                    })?),
                };
                if let Some(value) = value {
                    env.insert(key, value);
                }
            }
        }
        Some(Value::Sequence(_)) => {
            for entry in string_list(service, map, "environment")? {
                match entry.split_once('=') {
                    Some((key, value)) => {
                        env.insert(key.to_string(), value.to_string());
                    }
                    None => {
                        if let Some(value) = project_env.get(&entry) {
                            env.insert(entry, value.clone());
                        }
                    }
                }
            }
        }
        Some(_) => {
            return Err(invalid(service, "environment must be a mapping or a list"));
        }
    }

    Ok(env)
}

pub fn parse_service(
    name: &str,
    definition: &Value,
    project_env: &BTreeMap<String, String>,
) -> Result<Service, AssemblyError> {
    let empty = Mapping::new();
    let map = match definition {
        Value::Mapping(map) => map,
        Value::Null => &empty,
        _ => return Err(invalid(name, "service definition must be a mapping")),
    };

    Ok(Service {
        name: name.to_string(),
        image: string_field(name, map, "image")?,
        build: build_context(name, map)?,
        depends_on: depends_on(name, map)?,
        domain_name: string_field(name, map, "domainname")?,
        environment: environment(name, map, project_env)?,
        ports: string_list(name, map, "ports")?,
        links: string_list(name, map, "links")?,
        network_mode: string_field(name, map, "network_mode")?,
        volumes_from: string_list(name, map, "volumes_from")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<Service, AssemblyError> {
        let value: Value = serde_yml::from_str(yaml).unwrap();
        let env = BTreeMap::from([("SECRET".to_string(), "s3cr3t".to_string())]);
        parse_service("web", &value, &env)
    }

    #[test]
    fn parses_short_form_fields() {
        let service = parse(
            r#"
image: nginx
build: ./web
depends_on: [db, cache]
domainname: shop
ports: ["80:80", 443]
environment:
  - MODE=prod
  - SECRET
  - UNSET
"#,
        )
        .unwrap();

        assert_eq!(service.image.as_deref(), Some("nginx"));
        assert_eq!(service.build.as_deref(), Some("./web"));
        assert_eq!(service.depends_on, vec!["db", "cache"]);
        assert_eq!(service.domain_name.as_deref(), Some("shop"));
        assert_eq!(service.ports, vec!["80:80", "443"]);
        assert_eq!(service.environment["MODE"], "prod");
        assert_eq!(service.environment["SECRET"], "s3cr3t");
        assert!(!service.environment.contains_key("UNSET"));
    }

    #[test]
    fn parses_long_form_fields() {
        let service = parse(
            r#"
build:
  context: ./api
  dockerfile: Dockerfile.dev
depends_on:
  db:
    condition: service_healthy
  queue:
    condition: service_started
environment:
  DEBUG: true
  SECRET:
"#,
        )
        .unwrap();

        assert_eq!(service.build.as_deref(), Some("./api"));
        assert_eq!(service.depends_on, vec!["db", "queue"]);
        assert_eq!(service.environment["DEBUG"], "true");
        assert_eq!(service.environment["SECRET"], "s3cr3t");
    }

    #[test]
    fn empty_definition_is_allowed() {
        let service = parse("~").unwrap();
        assert_eq!(service, Service::new("web"));
    }

    #[test]
    fn rejects_malformed_fields() {
        assert!(parse("- not a mapping").is_err());
        assert!(parse("depends_on: db").is_err());
        assert!(parse("image: [a, b]").is_err());
        assert!(parse("environment: 3").is_err());
    }
}
