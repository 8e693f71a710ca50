//! Narrowing a project down to the services a command was asked for.
//!
//! Requesting a service implies everything it depends on, directly or
//! through other services, so selection works on the dependency closure of
//! the requested names rather than on the names alone.

use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    error::Result,
    project::{Project, Service},
};

/// Names reachable from `requested` over dependency edges, the requested
/// names included.
///
/// Walks the graph with an explicit work stack and visited set, so deep
/// chains cannot overflow the call stack and cycles are visited once. Any
/// name that does not resolve to a service aborts the walk.
pub fn dependency_closure<S: AsRef<str>>(
    project: &Project,
    requested: &[S],
) -> Result<BTreeSet<String>> {
    let mut visited = BTreeSet::new();
    let mut pending: Vec<&str> = requested
        .iter()
        .rev()
        .map(AsRef::as_ref)
        .collect();

    while let Some(name) = pending.pop() {
        if visited.contains(name) {
            continue;
        }

        let service = project.get_service(name)?;
        visited.insert(service.name.clone());

        pending.extend(
            service
                .dependencies()
                .into_iter()
                .rev()
                .filter(|dep| !visited.contains(*dep)),
        );
    }

    Ok(visited)
}

/// The project's services restricted to the closure of `requested`, in the
/// project's declared order. An empty request selects every service.
pub fn select_services<S: AsRef<str>>(project: &Project, requested: &[S]) -> Result<Vec<Service>> {
    if requested.is_empty() {
        return Ok(project.services.clone());
    }

    let closure = dependency_closure(project, requested)?;

    let selected: Vec<Service> = project
        .services
        .iter()
        .filter(|s| closure.contains(&s.name))
        .cloned()
        .collect();

    debug!(
        project = %project.name,
        requested = requested.len(),
        selected = selected.len(),
        "resolved service selection"
    );

    Ok(selected)
}

impl Project {
    /// In-place [`select_services`]. The project is left untouched when
    /// selection fails.
    pub fn filter_services<S: AsRef<str>>(&mut self, requested: &[S]) -> Result<()> {
        if requested.is_empty() {
            return Ok(());
        }
        self.services = select_services(self, requested)?;
        Ok(())
    }
}
