//! The `up` sequence: create, start, run, and on interrupt a teardown that
//! is not cut short by the interrupt that caused it.
//!
//! Every backend call is reduced to a [`StepOutcome`], turned into an
//! [`UpEvent`] and fed through [`UpState::on`]. The engine never inspects
//! error values to find out whether it was interrupted; it asks the
//! [`ExecContext`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    backend::{ComposeService, LogConsumer},
    context::ExecContext,
    error::{ComposeError, Operation, Result},
    project::Project,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpState {
    Idle,
    Created,
    Started,
    Running,
    CancelRequested,
    TearingDown,
    Terminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpEvent {
    CreateSucceeded,
    CreateFailed,
    /// Start is about to be called in the foreground.
    Attached,
    StartSucceeded,
    StartFailed,
    Cancelled,
    TeardownBegun,
    Finished,
}

impl UpState {
    /// The transition table. `None` means `event` cannot happen in `self`.
    pub fn on(self, event: UpEvent) -> Option<UpState> {
        use UpEvent as E;
        use UpState as S;

        match (self, event) {
            (S::Idle, E::CreateSucceeded) => Some(S::Created),
            (S::Idle, E::CreateFailed | E::Cancelled) => Some(S::Terminated),

            (S::Created, E::Attached) => Some(S::Running),
            (S::Created, E::StartSucceeded) => Some(S::Started),
            (S::Created, E::StartFailed | E::Cancelled) => Some(S::Terminated),

            (S::Started, E::Finished) => Some(S::Terminated),

            (S::Running, E::StartSucceeded | E::StartFailed) => Some(S::Terminated),
            (S::Running, E::Cancelled) => Some(S::CancelRequested),

            (S::CancelRequested, E::TeardownBegun) => Some(S::TearingDown),
            (S::TearingDown, E::Finished) => Some(S::Terminated),

            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == UpState::Terminated
    }
}

/// What a single backend call amounted to.
#[derive(Debug)]
pub enum StepOutcome {
    Succeeded,
    Cancelled,
    Failed(anyhow::Error),
}

impl StepOutcome {
    /// A failure raised while `ctx` is cancelled is a cancellation; a
    /// success stands even if the cancel arrived meanwhile.
    pub fn from_result(ctx: &ExecContext, result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => StepOutcome::Succeeded,
            Err(_) if ctx.is_cancelled() => StepOutcome::Cancelled,
            Err(err) => StepOutcome::Failed(err),
        }
    }

    /// Cancellation wins over whatever the call returned. An attached start
    /// commonly ends with `Ok` once its log stream closes on interrupt.
    pub fn cancellation_first(ctx: &ExecContext, result: anyhow::Result<()>) -> Self {
        if ctx.is_cancelled() {
            StepOutcome::Cancelled
        } else {
            Self::from_result(ctx, result)
        }
    }
}

pub trait UpObserver: Send + Sync {
    fn on_transition(&self, from: UpState, to: UpState);
}

impl<F> UpObserver for F
where
    F: Fn(UpState, UpState) + Send + Sync,
{
    fn on_transition(&self, from: UpState, to: UpState) {
        self(from, to)
    }
}

#[derive(Clone, Default)]
pub struct UpOptions {
    pub detach: bool,
    /// Where service output goes while attached.
    pub consumer: Option<Arc<dyn LogConsumer>>,
}

impl UpOptions {
    pub fn detached() -> Self {
        Self {
            detach: true,
            consumer: None,
        }
    }

    pub fn attached(consumer: Arc<dyn LogConsumer>) -> Self {
        Self {
            detach: false,
            consumer: Some(consumer),
        }
    }
}

pub struct Orchestrator<'a> {
    compose: &'a dyn ComposeService,
    observer: Option<&'a dyn UpObserver>,
    state: UpState,
    history: Vec<UpState>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(compose: &'a dyn ComposeService) -> Self {
        Self {
            compose,
            observer: None,
            state: UpState::Idle,
            history: vec![UpState::Idle],
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn UpObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> UpState {
        self.state
    }

    /// Every state visited by the last run, starting with `Idle`.
    pub fn history(&self) -> &[UpState] {
        &self.history
    }

    fn reset(&mut self) {
        self.state = UpState::Idle;
        self.history = vec![UpState::Idle];
    }

    fn apply(&mut self, event: UpEvent) -> Result<UpState> {
        let from = self.state;
        let to = from
            .on(event)
            .ok_or(ComposeError::InvalidTransition { from, event })?;

        debug!(?from, ?to, ?event, "up transition");
        if let Some(observer) = self.observer {
            observer.on_transition(from, to);
        }

        self.state = to;
        self.history.push(to);
        Ok(to)
    }

    /// Provisions the project and stops there.
    pub async fn run_create_only(&mut self, ctx: &ExecContext, project: &Project) -> Result<()> {
        self.reset();
        self.create(ctx, project).await
    }

    /// Creates and starts `project`.
    ///
    /// Detached runs return as soon as the backend confirms the start.
    /// Attached runs block while the application runs; if `ctx` is
    /// cancelled meanwhile the project is taken down with a fresh context
    /// and the teardown's result is returned.
    pub async fn run_up(
        &mut self,
        ctx: &ExecContext,
        project: &Project,
        options: UpOptions,
    ) -> Result<()> {
        self.reset();
        self.create(ctx, project).await?;

        if options.detach {
            return self.start_detached(ctx, project).await;
        }

        self.apply(UpEvent::Attached)?;

        let compose = self.compose;
        let result = tokio::select! {
            result = compose.start(ctx, project, options.consumer) => result,
            _ = ctx.cancelled() => Ok(()),
        };

        match StepOutcome::cancellation_first(ctx, result) {
            StepOutcome::Succeeded => {
                self.apply(UpEvent::StartSucceeded)?;
                Ok(())
            }
            StepOutcome::Failed(err) => {
                self.apply(UpEvent::StartFailed)?;
                Err(ComposeError::backend(Operation::Start)(err))
            }
            StepOutcome::Cancelled => {
                self.apply(UpEvent::Cancelled)?;
                self.teardown(project).await
            }
        }
    }

    /// Hands the whole sequence to a backend that only offers a combined
    /// up primitive. No state is tracked; the backend owns the lifecycle.
    pub async fn run_delegated_up(
        &mut self,
        ctx: &ExecContext,
        project: &Project,
        detach: bool,
    ) -> Result<()> {
        self.reset();
        let result = self.compose.up(ctx, project, detach).await;
        match StepOutcome::from_result(ctx, result) {
            StepOutcome::Succeeded => Ok(()),
            StepOutcome::Cancelled => Err(ComposeError::Cancelled),
            StepOutcome::Failed(err) => Err(ComposeError::backend(Operation::Up)(err)),
        }
    }

    async fn create(&mut self, ctx: &ExecContext, project: &Project) -> Result<()> {
        let result = self.compose.create(ctx, project).await;

        match StepOutcome::from_result(ctx, result) {
            StepOutcome::Succeeded => {
                self.apply(UpEvent::CreateSucceeded)?;
                Ok(())
            }
            StepOutcome::Cancelled => {
                self.apply(UpEvent::Cancelled)?;
                Err(ComposeError::Cancelled)
            }
            StepOutcome::Failed(err) => {
                self.apply(UpEvent::CreateFailed)?;
                Err(ComposeError::backend(Operation::Create)(err))
            }
        }
    }

    async fn start_detached(&mut self, ctx: &ExecContext, project: &Project) -> Result<()> {
        let result = self.compose.start(ctx, project, None).await;

        match StepOutcome::from_result(ctx, result) {
            StepOutcome::Succeeded => {
                self.apply(UpEvent::StartSucceeded)?;
                self.apply(UpEvent::Finished)?;
                Ok(())
            }
            StepOutcome::Cancelled => {
                self.apply(UpEvent::Cancelled)?;
                Err(ComposeError::Cancelled)
            }
            StepOutcome::Failed(err) => {
                self.apply(UpEvent::StartFailed)?;
                Err(ComposeError::backend(Operation::Start)(err))
            }
        }
    }

    async fn teardown(&mut self, project: &Project) -> Result<()> {
        self.apply(UpEvent::TeardownBegun)?;
        info!(project = %project.name, "interrupted, tearing down");

        // The interrupted context would abort this call immediately.
        let ctx = ExecContext::background();
        let result = self.compose.down(&ctx, &project.name).await;

        self.apply(UpEvent::Finished)?;
        result.map_err(|err| {
            warn!(project = %project.name, "teardown failed: {err:#}");
            ComposeError::backend(Operation::Down)(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_attached_path() {
        let path = [UpEvent::CreateSucceeded, UpEvent::Attached, UpEvent::StartSucceeded];
        let end = path
            .iter()
            .try_fold(UpState::Idle, |state, event| state.on(*event));
        assert_eq!(end, Some(UpState::Terminated));
    }

    #[test]
    fn cancel_path_goes_through_teardown() {
        let mut state = UpState::Idle;
        let mut visited = vec![state];
        for event in [
            UpEvent::CreateSucceeded,
            UpEvent::Attached,
            UpEvent::Cancelled,
            UpEvent::TeardownBegun,
            UpEvent::Finished,
        ] {
            state = state.on(event).unwrap();
            visited.push(state);
        }

        assert_eq!(
            visited,
            vec![
                UpState::Idle,
                UpState::Created,
                UpState::Running,
                UpState::CancelRequested,
                UpState::TearingDown,
                UpState::Terminated,
            ]
        );
    }

    #[test]
    fn detached_path_skips_running() {
        let state = UpState::Created.on(UpEvent::StartSucceeded).unwrap();
        assert_eq!(state, UpState::Started);
        assert_eq!(state.on(UpEvent::Finished), Some(UpState::Terminated));
        assert_eq!(state.on(UpEvent::Cancelled), None);
    }

    #[test]
    fn rejects_events_outside_the_table() {
        assert_eq!(UpState::Idle.on(UpEvent::TeardownBegun), None);
        assert_eq!(UpState::Created.on(UpEvent::TeardownBegun), None);
        assert_eq!(UpState::Terminated.on(UpEvent::Cancelled), None);
        assert_eq!(UpState::TearingDown.on(UpEvent::Cancelled), None);
        assert!(UpState::Terminated.is_terminal());
    }

    #[test]
    fn outcome_classification() {
        let live = ExecContext::background();
        let cancelled = ExecContext::background();
        cancelled.cancel();

        assert!(matches!(
            StepOutcome::from_result(&live, Err(anyhow::anyhow!("boom"))),
            StepOutcome::Failed(_)
        ));
        assert!(matches!(
            StepOutcome::from_result(&cancelled, Err(anyhow::anyhow!("context canceled"))),
            StepOutcome::Cancelled
        ));
        assert!(matches!(
            StepOutcome::from_result(&cancelled, Ok(())),
            StepOutcome::Succeeded
        ));
        assert!(matches!(
            StepOutcome::cancellation_first(&cancelled, Ok(())),
            StepOutcome::Cancelled
        ));
    }
}
