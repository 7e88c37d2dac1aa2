//! Presentation-layer implementations of `ProgressReporter`.
//!
//! Application services emit progress through the
//! `application::ports::ProgressReporter` trait; these types turn those
//! events into terminal output without the services depending on any
//! presentation type directly.

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::OutputContext;

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// - `step()` prints `"  → {message}"` (suppressed when `ctx.quiet`)
/// - `success()` prints `"  ✓ {message}"` (suppressed when `ctx.quiet`)
/// - `warn()` prints `"  ! {message}"` (suppressed when `ctx.quiet`)
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if !self.ctx.quiet {
            println!("  {} {message}", "→".cyan());
        }
    }

    fn success(&self, message: &str) {
        if !self.ctx.quiet {
            println!("  {} {message}", "✓".green());
        }
    }

    fn warn(&self, message: &str) {
        if !self.ctx.quiet {
            println!("  {} {message}", "!".yellow());
        }
    }
}

/// Progress reporter backed by an indicatif bar, for bulk fan-out. One
/// tick per finished target: `success`/`warn` print above the bar and
/// advance it; `step` only updates the bar's message.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    #[must_use]
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }

    /// Finish the bar, leaving the final message in place.
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl ProgressReporter for BarReporter {
    fn step(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn success(&self, message: &str) {
        self.bar.println(format!("  {} {message}", "✓".green()));
        self.bar.inc(1);
    }

    fn warn(&self, message: &str) {
        self.bar.println(format!("  {} {message}", "!".yellow()));
        self.bar.inc(1);
    }
}
