use std::{fmt::Display, str::FromStr};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Deployment context a command runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContextType {
    /// Local container engine driven through `docker compose`.
    Local,
    /// Azure Container Instances.
    Aci,
    /// Amazon ECS.
    Ecs,
}

impl ContextType {
    pub const ALL: [ContextType; 3] =
        [ContextType::Local, ContextType::Aci, ContextType::Ecs];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Local => "local",
            ContextType::Aci => "aci",
            ContextType::Ecs => "ecs",
        }
    }

    /// ACI exposes a whole project behind a single DNS label.
    pub fn supports_domain_name(&self) -> bool {
        matches!(self, ContextType::Aci)
    }

    /// `build`, `push` and `pull` only make sense against a local engine.
    pub fn supports_image_commands(&self) -> bool {
        matches!(self, ContextType::Local)
    }

    /// Whether `up` is driven as separate create and start phases rather
    /// than one backend-side up call.
    pub fn splits_create_start(&self) -> bool {
        matches!(self, ContextType::Local)
    }
}

impl Display for ContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContextType::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown context type '{}', expected one of: {}",
                    s,
                    ContextType::ALL
                        .map(|c| c.as_str())
                        .join(", ")
                )
            })
    }
}

/// Execution context handed to every backend call.
///
/// Carries the cancellation signal for the invocation. A context obtained
/// from [`ExecContext::background`] shares nothing with any other context,
/// so cancelling one never affects calls made with the other.
#[derive(Clone, Debug, Default)]
pub struct ExecContext {
    token: CancellationToken,
}

impl ExecContext {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn background() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_context_names_case_insensitively() {
        assert_eq!("ACI".parse::<ContextType>(), Ok(ContextType::Aci));
        assert_eq!(" local ".parse::<ContextType>(), Ok(ContextType::Local));
        let err = "kube".parse::<ContextType>().unwrap_err();
        assert!(err.contains("local, aci, ecs"));
    }

    #[test]
    fn capabilities_per_context() {
        assert!(ContextType::Local.supports_image_commands());
        assert!(!ContextType::Aci.supports_image_commands());
        assert!(ContextType::Aci.supports_domain_name());
        assert!(!ContextType::Ecs.supports_domain_name());
        assert!(ContextType::Local.splits_create_start());
        assert!(!ContextType::Ecs.splits_create_start());
    }

    #[test]
    fn background_context_is_independent() {
        let token = CancellationToken::new();
        let ctx = ExecContext::new(token.clone());
        let background = ExecContext::background();

        token.cancel();

        assert!(ctx.is_cancelled());
        assert!(!background.is_cancelled());
    }
}
