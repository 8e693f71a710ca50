use std::{collections::VecDeque, process::Stdio, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use stackctl_lib::{
    Backend, ComposeService, ContextType, ExecContext, ImageService,
    LogConsumer, Project, ServiceStatus, StackSummary,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
};
use tracing::{debug, trace};

use super::status::{parse_ls, parse_ps};

/// Lines of stderr kept for the error message of a failed call.
const STDERR_TAIL: usize = 5;

/// The local context: every operation is a `docker compose` invocation.
pub struct DockerCompose {
    binary: String,
}

impl DockerCompose {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, args: &[String], project: Option<&Project>) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("compose")
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // Same variables the project was assembled with, so docker
        // interpolates the files identically.
        if let Some(project) = project {
            cmd.envs(&project.environment);
        }
        cmd
    }

    /// Runs a command whose output is meant for the user.
    async fn run(
        &self,
        ctx: &ExecContext,
        args: Vec<String>,
        project: Option<&Project>,
    ) -> anyhow::Result<()> {
        debug!(binary = %self.binary, ?args, "docker compose");

        let mut child = self
            .command(&args, project)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run {}", self.binary))?;

        let (out_task, err_task) = forward_output(&mut child)?;

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = ctx.cancelled() => None,
        };
        let Some(status) = waited else {
            child.kill().await.ok();
            anyhow::bail!("docker compose interrupted");
        };
        let status = status?;

        out_task.await.ok();
        let tail = err_task.await.unwrap_or_default();

        if !status.success() {
            anyhow::bail!("docker compose exited with {status}: {tail}");
        }
        Ok(())
    }

    /// Runs a command and returns its stdout.
    async fn capture(&self, ctx: &ExecContext, args: Vec<String>) -> anyhow::Result<String> {
        debug!(binary = %self.binary, ?args, "docker compose");

        let mut cmd = self.command(&args, None);
        let output = tokio::select! {
            output = cmd.output() => output
                .with_context(|| format!("failed to run {}", self.binary))?,
            _ = ctx.cancelled() => anyhow::bail!("docker compose interrupted"),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "docker compose exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Runs a `logs` command and hands every line to `consumer` until the
    /// stream ends or `ctx` is cancelled.
    async fn stream(
        &self,
        ctx: &ExecContext,
        args: Vec<String>,
        project: Option<&Project>,
        consumer: &dyn LogConsumer,
    ) -> anyhow::Result<()> {
        debug!(binary = %self.binary, ?args, "docker compose");

        let mut child = self
            .command(&args, project)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run {}", self.binary))?;

        let stdout = child.stdout.take().context("stdout not captured")?;
        let stderr = child.stderr.take().context("stderr not captured")?;
        let err_task = tokio::spawn(collect_stderr(stderr));

        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => {
                        let (service, message) = split_log_line(&line);
                        consumer.log(service, message);
                    }
                    None => break,
                },
                _ = ctx.cancelled() => {
                    trace!("log stream interrupted");
                    child.kill().await.ok();
                    return Ok(());
                }
            }
        }

        let status = child.wait().await?;
        let tail = err_task.await.unwrap_or_default();
        if !status.success() {
            anyhow::bail!("docker compose exited with {status}: {tail}");
        }
        Ok(())
    }
}

/// `--project-name`, `--project-directory` and one `--file` per config file.
fn project_args(project: &Project) -> Vec<String> {
    let mut args = vec![
        "--project-name".to_string(),
        project.name.to_string(),
        "--project-directory".to_string(),
        project.working_dir.display().to_string(),
    ];
    for file in &project.config_files {
        args.push("--file".to_string());
        args.push(file.display().to_string());
    }
    args
}

fn scoped(project: &Project, subcommand: &[&str]) -> Vec<String> {
    let mut args = project_args(project);
    args.extend(subcommand.iter().map(|s| s.to_string()));
    args.extend(project.service_names().map(str::to_string));
    args
}

fn named(project_name: &str, subcommand: &[&str]) -> Vec<String> {
    let mut args = vec!["--project-name".to_string(), project_name.to_string()];
    args.extend(subcommand.iter().map(|s| s.to_string()));
    args
}

/// `web-1  | listening` becomes `("web-1", "listening")`.
pub fn split_log_line(line: &str) -> (&str, &str) {
    match line.split_once(" | ") {
        Some((service, message)) => (service.trim(), message),
        None => ("", line),
    }
}

fn forward_output(
    child: &mut Child,
) -> anyhow::Result<(tokio::task::JoinHandle<()>, tokio::task::JoinHandle<String>)> {
    let stdout = child.stdout.take().context("stdout not captured")?;
    let stderr = child.stderr.take().context("stderr not captured")?;

    let out_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            println!("{line}");
        }
    });

    Ok((out_task, tokio::spawn(collect_stderr(stderr))))
}

/// Echoes stderr and returns its last lines.
async fn collect_stderr(stderr: tokio::process::ChildStderr) -> String {
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);
    let mut lines = BufReader::new(stderr).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.contains("the attribute `version` is obsolete") {
            continue;
        }
        eprintln!("{line}");
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    Vec::from(tail).join("\n")
}

#[async_trait]
impl ComposeService for DockerCompose {
    async fn create(&self, ctx: &ExecContext, project: &Project) -> anyhow::Result<()> {
        self.run(ctx, scoped(project, &["create"]), Some(project))
            .await
    }

    async fn start(
        &self,
        ctx: &ExecContext,
        project: &Project,
        consumer: Option<Arc<dyn LogConsumer>>,
    ) -> anyhow::Result<()> {
        self.run(ctx, scoped(project, &["start"]), Some(project))
            .await?;

        match consumer {
            Some(consumer) => {
                let args = scoped(project, &["logs", "--follow", "--no-color"]);
                self.stream(ctx, args, Some(project), consumer.as_ref())
                    .await
            }
            None => Ok(()),
        }
    }

    async fn up(&self, ctx: &ExecContext, project: &Project, detach: bool) -> anyhow::Result<()> {
        let subcommand: &[&str] = if detach { &["up", "--detach"] } else { &["up"] };
        self.run(ctx, scoped(project, subcommand), Some(project))
            .await
    }

    async fn down(&self, ctx: &ExecContext, project_name: &str) -> anyhow::Result<()> {
        self.run(ctx, named(project_name, &["down"]), None)
            .await
    }

    async fn ps(
        &self,
        ctx: &ExecContext,
        project_name: &str,
    ) -> anyhow::Result<Vec<ServiceStatus>> {
        let json = self
            .capture(ctx, named(project_name, &["ps", "--all", "--format", "json"]))
            .await?;
        parse_ps(&json).context("unexpected docker compose ps output")
    }

    async fn list(&self, ctx: &ExecContext) -> anyhow::Result<Vec<StackSummary>> {
        let args = ["ls", "--all", "--format", "json"]
            .map(String::from)
            .to_vec();
        let json = self.capture(ctx, args).await?;
        parse_ls(&json).context("unexpected docker compose ls output")
    }

    async fn logs(
        &self,
        ctx: &ExecContext,
        project_name: &str,
        consumer: Arc<dyn LogConsumer>,
    ) -> anyhow::Result<()> {
        let args = named(project_name, &["logs", "--no-color"]);
        self.stream(ctx, args, None, consumer.as_ref()).await
    }
}

#[async_trait]
impl ImageService for DockerCompose {
    async fn build(&self, ctx: &ExecContext, project: &Project) -> anyhow::Result<()> {
        self.run(ctx, scoped(project, &["build"]), Some(project))
            .await
    }

    async fn push(&self, ctx: &ExecContext, project: &Project) -> anyhow::Result<()> {
        self.run(ctx, scoped(project, &["push"]), Some(project))
            .await
    }

    async fn pull(&self, ctx: &ExecContext, project: &Project) -> anyhow::Result<()> {
        self.run(ctx, scoped(project, &["pull"]), Some(project))
            .await
    }
}

impl Backend for DockerCompose {
    fn context_type(&self) -> ContextType {
        ContextType::Local
    }

    fn compose_service(&self) -> Option<&dyn ComposeService> {
        Some(self)
    }

    fn image_service(&self) -> Option<&dyn ImageService> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use stackctl_lib::{ProjectName, Service};

    use super::*;

    fn project() -> Project {
        let mut project = Project::new(
            ProjectName("shop".into()),
            vec![Service::new("web"), Service::new("db")],
        )
        .unwrap();
        project.working_dir = PathBuf::from("/srv/shop");
        project.config_files = vec![
            PathBuf::from("/srv/shop/compose.yaml"),
            PathBuf::from("/srv/shop/compose.override.yaml"),
        ];
        project
    }

    #[test]
    fn scoped_args_carry_project_files_and_services() {
        assert_eq!(
            scoped(&project(), &["up", "--detach"]),
            vec![
                "--project-name",
                "shop",
                "--project-directory",
                "/srv/shop",
                "--file",
                "/srv/shop/compose.yaml",
                "--file",
                "/srv/shop/compose.override.yaml",
                "up",
                "--detach",
                "web",
                "db",
            ]
        );
    }

    #[test]
    fn named_args_only_carry_the_project_name() {
        assert_eq!(
            named("shop", &["down"]),
            vec!["--project-name", "shop", "down"]
        );
    }

    #[test]
    fn splits_prefixed_log_lines() {
        assert_eq!(
            split_log_line("web-1  | GET / 200"),
            ("web-1", "GET / 200")
        );
        assert_eq!(
            split_log_line("db-1  | a | b"),
            ("db-1", "a | b")
        );
        assert_eq!(split_log_line("no prefix"), ("", "no prefix"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_backend_error() {
        let compose = DockerCompose::new("/nonexistent/stackctl-docker");
        let ctx = ExecContext::background();

        let err = compose.down(&ctx, "shop").await.unwrap_err();

        assert!(err.to_string().contains("failed to run"));
    }

    #[test]
    fn advertises_compose_and_images() {
        let compose = DockerCompose::new("docker");
        assert_eq!(compose.context_type(), ContextType::Local);
        assert!(compose.compose_service().is_some());
        assert!(compose.image_service().is_some());
    }
}
