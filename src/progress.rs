use std::{sync::Mutex, time::Duration};

use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressStyle};
use stackctl_lib::{Project, UpObserver, UpState};

pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
    {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.into());
    pb
}

/// Prints what `up` is doing as the orchestrator moves between states.
pub struct UpProgress {
    project: String,
    services: Vec<String>,
    quiet: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl UpProgress {
    pub fn new(project: &Project, quiet: bool) -> Self {
        Self {
            project: project.name.to_string(),
            services: project.service_names().map(str::to_string).collect(),
            quiet,
            spinner: Mutex::new(None),
        }
    }

    /// Shows the creation spinner; call right before running.
    pub fn begin(&self) {
        if !self.quiet {
            self.replace_spinner(Some(spinner(format!(
                "Creating {}",
                self.project.as_str().cyan()
            ))));
        }
    }

    fn replace_spinner(&self, next: Option<ProgressBar>) {
        let Ok(mut current) = self.spinner.lock() else {
            return;
        };
        if let Some(pb) = current.take() {
            pb.finish_and_clear();
        }
        *current = next;
    }

    fn done(&self, message: String) {
        self.replace_spinner(None);
        if !self.quiet {
            println!("{} {}", "✓".green(), message);
        }
    }
}

impl UpObserver for UpProgress {
    fn on_transition(&self, from: UpState, to: UpState) {
        match (from, to) {
            (UpState::Idle, UpState::Created) => self.done(format!(
                "Created {} ({})",
                self.project.as_str().cyan(),
                self.services.join(", ")
            )),
            (_, UpState::Started) => {
                self.done(format!("Started {}", self.project.as_str().cyan()))
            }
            (_, UpState::Running) => {
                if !self.quiet {
                    println!("Attaching to {}", self.services.join(", "));
                }
            }
            (_, UpState::CancelRequested) => {
                println!("{}", "Gracefully stopping... (press Ctrl+C again to force)".yellow());
            }
            (_, UpState::TearingDown) => self.replace_spinner(Some(spinner(format!(
                "Stopping {}",
                self.project.as_str().cyan()
            )))),
            (UpState::TearingDown, UpState::Terminated) => {
                self.done(format!("Stopped {}", self.project.as_str().cyan()))
            }
            (_, UpState::Terminated) => self.replace_spinner(None),
            _ => {}
        }
    }
}
