//! Terminal output for CLI handlers.
//!
//! Human output goes to stdout with colored markers. Under `--json` each
//! status line becomes `{"type": ..., "payload": ...}` and data commands
//! print one JSON document via [`json_output`]. Errors always go to stderr.

use std::fmt::Display;

use owo_colors::OwoColorize;
use parking_lot::{const_rwlock, RwLock};
use serde_json::{json, Value};

/// Output flags taken from the global CLI options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub json: bool,
    /// Hide informational lines. Warnings, errors and data still print.
    pub quiet: bool,
}

impl OutputConfig {
    #[must_use]
    pub const fn new(json: bool, quiet: bool) -> Self {
        Self { json, quiet }
    }
}

static CONFIG: RwLock<OutputConfig> = const_rwlock(OutputConfig {
    json: false,
    quiet: false,
});

pub fn configure(config: OutputConfig) {
    *CONFIG.write() = config;
}

#[must_use]
pub fn is_json() -> bool {
    CONFIG.read().json
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Success,
    Warning,
    Note,
}

impl Tone {
    const fn kind(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Note => "note",
        }
    }

    const fn always_shown(self) -> bool {
        matches!(self, Self::Warning)
    }
}

fn status_line(kind: &str, payload: Value) {
    println!("{}", json!({ "type": kind, "payload": payload }));
}

/// Whether a human-readable informational line should be printed.
fn informational(config: OutputConfig) -> bool {
    !config.json && !config.quiet
}

fn message(tone: Tone, text: &str) {
    let config = *CONFIG.read();
    if config.json {
        status_line(tone.kind(), json!({ "message": text }));
        return;
    }
    if config.quiet && !tone.always_shown() {
        return;
    }

    match tone {
        Tone::Success => println!("  {} {text}", "✓".green()),
        Tone::Warning => println!("  {} {text}", "⚠".yellow()),
        Tone::Note => println!("  {}", text.dimmed()),
    }
}

pub fn success(text: &str) {
    message(Tone::Success, text);
}

pub fn warning(text: &str) {
    message(Tone::Warning, text);
}

pub fn note(text: &str) {
    message(Tone::Note, text);
}

/// Print an error to stderr.
pub fn error(text: &str) {
    if is_json() {
        eprintln!("{}", json!({ "type": "error", "payload": { "message": text } }));
    } else {
        eprintln!("  {} {text}", "×".red());
    }
}

/// Print a labeled value, e.g. a run counter.
pub fn field(label: &str, value: impl Display) {
    let config = *CONFIG.read();
    if config.json {
        status_line("field", json!({ "label": label, "value": value.to_string() }));
    } else if informational(config) {
        println!("  {:<28} {value}", label.dimmed());
    }
}

pub fn section(title: &str) {
    let config = *CONFIG.read();
    if config.json {
        status_line("section", json!({ "title": title }));
    } else if informational(config) {
        println!("\n{}", title.bold());
    }
}

/// Print preformatted data (a table, a TOML document) line by line.
/// Shown under `--quiet`, replaced by [`json_output`] under `--json`.
pub fn lines(content: &str) {
    if !is_json() {
        content.lines().for_each(|line| println!("{line}"));
    }
}

/// Print the single JSON document of a data command.
pub fn json_output(value: Value) {
    println!("{value}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_hides_informational_lines_only() {
        assert!(informational(OutputConfig::new(false, false)));
        assert!(!informational(OutputConfig::new(false, true)));
        assert!(!informational(OutputConfig::new(true, false)));
        assert!(Tone::Warning.always_shown());
        assert!(!Tone::Note.always_shown());
    }

    #[test]
    fn tones_map_to_json_kinds() {
        assert_eq!(Tone::Success.kind(), "success");
        assert_eq!(Tone::Warning.kind(), "warning");
        assert_eq!(Tone::Note.kind(), "note");
    }
}
