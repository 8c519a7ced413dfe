//! Terminal rendering of deploy and delete stages.

use colored::Colorize;
use deployer::StageReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::ui;

struct ActiveStage {
    bar: Option<ProgressBar>,
    started: Instant,
}

/// Draws each stage as a spinner that resolves to a ✓ or ✗ line
pub struct TerminalReporter {
    quiet: bool,
    active: Mutex<Option<ActiveStage>>,
}

impl TerminalReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            active: Mutex::new(None),
        }
    }

    fn spinner(name: &str) -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(name.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }

    /// Take the running stage, clearing its spinner
    fn finish_active(&self) -> Option<Duration> {
        let stage = self.active.lock().ok()?.take()?;
        if let Some(bar) = stage.bar {
            bar.finish_and_clear();
        }
        Some(stage.started.elapsed())
    }

    /// Print above a running spinner without tearing it
    fn print_line(&self, print: impl FnOnce()) {
        let bar = self
            .active
            .lock()
            .ok()
            .and_then(|active| active.as_ref().and_then(|s| s.bar.clone()));
        match bar {
            Some(bar) => bar.suspend(print),
            None => print(),
        }
    }
}

fn format_elapsed(elapsed: Option<Duration>) -> String {
    match elapsed {
        Some(d) if d >= Duration::from_secs(1) => format!(" ({:.1}s)", d.as_secs_f64()),
        _ => String::new(),
    }
}

impl StageReporter for TerminalReporter {
    fn stage_started(&self, name: &str) {
        self.finish_active();
        let bar = (!self.quiet).then(|| Self::spinner(name));
        if let Ok(mut active) = self.active.lock() {
            *active = Some(ActiveStage {
                bar,
                started: Instant::now(),
            });
        }
    }

    fn stage_finished(&self, name: &str) {
        let elapsed = self.finish_active();
        if !self.quiet {
            println!(
                "{} {}{}",
                "✓".green(),
                name,
                format_elapsed(elapsed).dimmed()
            );
        }
    }

    fn stage_skipped(&self, name: &str, reason: &str) {
        if !self.quiet {
            self.print_line(|| println!("{} {} {}", "-".dimmed(), name, format!("({reason})").dimmed()));
        }
    }

    fn stage_failed(&self, name: &str, error: &str) {
        let elapsed = self.finish_active();
        self.print_line(|| {
            ui::error(&format!("{name}{}: {error}", format_elapsed(elapsed).dimmed()));
        });
    }

    fn warn(&self, message: &str) {
        self.print_line(|| ui::warn(message));
    }

    fn error(&self, _message: &str) {
        // The message itself is printed once by main when the command returns
        self.finish_active();
    }
}
