use std::sync::atomic::{AtomicUsize, Ordering};

use crossterm::style::{Color, Stylize};
use stackctl_lib::LogConsumer;

const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::Blue,
    Color::Red,
];

/// Writes service output to stdout as `service | line`, one colour per
/// service, prefixes aligned to the longest name seen so far.
#[derive(Default)]
pub struct LogPrinter {
    width: AtomicUsize,
}

impl LogPrinter {
    pub fn new<'a>(services: impl IntoIterator<Item = &'a str>) -> Self {
        let width = services
            .into_iter()
            .map(str::len)
            .max()
            .unwrap_or_default();
        Self {
            width: AtomicUsize::new(width),
        }
    }

    fn prefix(&self, service: &str) -> String {
        let width = self
            .width
            .fetch_max(service.len(), Ordering::Relaxed)
            .max(service.len());
        format!("{service:width$}")
    }
}

pub fn service_color(service: &str) -> Color {
    let hash = service
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    PALETTE[hash % PALETTE.len()]
}

impl LogConsumer for LogPrinter {
    fn log(&self, service: &str, message: &str) {
        if service.is_empty() {
            println!("{message}");
            return;
        }
        println!(
            "{} | {}",
            self.prefix(service).with(service_color(service)),
            message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_grow_with_longest_name() {
        let printer = LogPrinter::new(["web", "db"]);
        assert_eq!(printer.prefix("db"), "db ");
        assert_eq!(printer.prefix("worker"), "worker");
        assert_eq!(printer.prefix("web"), "web   ");
    }

    #[test]
    fn colour_is_stable_per_service() {
        assert_eq!(service_color("web"), service_color("web"));
    }
}
