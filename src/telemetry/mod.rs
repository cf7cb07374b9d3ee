//! Formatting and tracing setup for reagent diagnostics.
//!
//! Provides the [`TelemetryFormatter`] abstraction used by event sinks, a
//! TTY-aware [`PlainFormatter`], and [`init`] for wiring a
//! tracing-subscriber pipeline with env-filter and span traces.

use std::io::IsTerminal;

use crate::event_bus::RunEvent;

pub const CONTEXT_COLOR: &str = "\x1b[32m"; // green
pub const LINE_COLOR: &str = "\x1b[35m"; // magenta
pub const RESET_COLOR: &str = "\x1b[0m";

/// Formatter color mode for telemetry output.
///
/// - [`FormatterMode::Auto`]: detects TTY capability via `stderr.is_terminal()`
/// - [`FormatterMode::Colored`]: always include ANSI color codes
/// - [`FormatterMode::Plain`]: never include color codes (logs/files)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatterMode {
    /// Auto-detect TTY capability.
    #[default]
    Auto,
    /// Always include ANSI color codes.
    Colored,
    /// Never include ANSI color codes.
    Plain,
}

impl FormatterMode {
    /// Auto-detect based on stderr TTY capability.
    pub fn auto_detect() -> Self {
        if std::io::stderr().is_terminal() {
            FormatterMode::Colored
        } else {
            FormatterMode::Plain
        }
    }

    /// Returns true if this mode should use colored output.
    pub fn is_colored(&self) -> bool {
        match self {
            FormatterMode::Auto => std::io::stderr().is_terminal(),
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
        }
    }
}

/// Rendered output for a telemetry item that can be consumed by sinks.
#[derive(Clone, Debug, Default)]
pub struct EventRender {
    pub context: Option<String>,
    pub lines: Vec<String>,
}

impl EventRender {
    pub fn join_lines(&self) -> String {
        self.lines.join("")
    }
}

pub trait TelemetryFormatter: Send + Sync {
    fn render_event(&self, event: &RunEvent) -> EventRender;
}

/// Plain text formatter with optional ANSI color codes.
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl PlainFormatter {
    /// Create a formatter with auto-detected color mode.
    pub fn new() -> Self {
        Self {
            mode: FormatterMode::Auto,
        }
    }

    /// Create a formatter with an explicit color mode.
    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.mode.is_colored() {
            format!("{color}{text}{RESET_COLOR}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryFormatter for PlainFormatter {
    fn render_event(&self, event: &RunEvent) -> EventRender {
        let scope = event.scope_label().unwrap_or("event");
        let header = self.paint(CONTEXT_COLOR, &format!("[{scope}]"));
        let body = self.paint(LINE_COLOR, &event.to_string());
        EventRender {
            context: Some(scope.to_string()),
            lines: vec![format!("{header} {body}\n")],
        }
    }
}

/// Install the global tracing subscriber: env-filtered fmt output plus span
/// traces for error reports. Safe to call more than once; only the first
/// call installs.
pub fn init() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(ErrorLayer::default())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_emits_no_ansi() {
        let formatter = PlainFormatter::with_mode(FormatterMode::Plain);
        let render = formatter.render_event(&RunEvent::step_message("dispatch", "done"));
        let line = render.join_lines();
        assert!(!line.contains("\x1b["));
        assert!(line.contains("[dispatch]"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn colored_mode_wraps_with_reset() {
        let formatter = PlainFormatter::with_mode(FormatterMode::Colored);
        let render = formatter.render_event(&RunEvent::step_message("dispatch", "done"));
        let line = render.join_lines();
        assert!(line.contains(CONTEXT_COLOR));
        assert!(line.contains(RESET_COLOR));
    }

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
