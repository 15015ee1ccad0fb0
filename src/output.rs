//! Terminal output formatting for the cssprite CLI.
//!
//! Provides Cargo-style status output with right-aligned coloured verbs.
//! All status output goes to stderr; stdout is reserved for machine-readable output.
//!
//! Pipeline progress reaches the terminal through the [`Reporter`] trait so
//! that library callers and tests can run silently with [`Quiet`].

use std::io::{self, IsTerminal, Write};
use std::path::Path;

use crate::pipeline::RunSummary;

/// ANSI escape codes.
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

/// Width for right-aligned verb column.
const VERB_WIDTH: usize = 12;

/// Receives user-facing progress from a pipeline run.
///
/// Called from worker threads.
pub trait Reporter: Send + Sync {
    /// An output file was written.
    fn written(&self, path: &Path);

    /// A recoverable problem; the run continues.
    fn warning(&self, message: &str);

    /// The run finished successfully.
    fn finished(&self, _summary: &RunSummary) {}
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Quiet;

impl Reporter for Quiet {
    fn written(&self, _path: &Path) {}

    fn warning(&self, _message: &str) {}
}

/// Terminal-aware status printer.
///
/// Prints Cargo-style status lines to stderr with optional ANSI colours.
/// Colour is enabled when stderr is a terminal.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    color: bool,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

impl Printer {
    pub fn new() -> Self {
        Self {
            color: io::stderr().is_terminal(),
        }
    }

    /// Print a status line with a green bold verb.
    /// e.g. "     Writing css/sprite-site.css"
    pub fn status(&self, verb: &str, message: &str) {
        self.print_line(GREEN, verb, message);
    }

    /// Print a success/completion line with a green bold verb.
    pub fn success(&self, verb: &str, message: &str) {
        self.print_line(GREEN, verb, message);
    }

    /// Print an informational line with a cyan bold verb.
    pub fn info(&self, verb: &str, message: &str) {
        self.print_line(CYAN, verb, message);
    }

    /// Print a warning line with a yellow bold verb.
    pub fn warning(&self, verb: &str, message: &str) {
        self.print_line(YELLOW, verb, message);
    }

    /// Print an error line with a red bold verb.
    pub fn error(&self, verb: &str, message: &str) {
        self.print_line(RED, verb, message);
    }

    /// Format a string as dim/grey.
    pub fn dim(&self, text: &str) -> String {
        if self.color {
            format!("{DIM}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    /// Format a string as bold.
    pub fn bold(&self, text: &str) -> String {
        if self.color {
            format!("{BOLD}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    /// Format a string as cyan (for paths, info).
    pub fn cyan(&self, text: &str) -> String {
        if self.color {
            format!("{CYAN}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn print_line(&self, color: &str, verb: &str, message: &str) {
        let mut stderr = io::stderr().lock();
        if self.color {
            let _ = writeln!(
                stderr,
                "{BOLD}{color}{verb:>VERB_WIDTH$}{RESET} {message}"
            );
        } else {
            let _ = writeln!(stderr, "{verb:>VERB_WIDTH$} {message}");
        }
    }
}

impl Reporter for Printer {
    fn written(&self, path: &Path) {
        self.status("Writing", &display_path(path));
    }

    fn warning(&self, message: &str) {
        Printer::warning(self, "Warning", message);
    }

    fn finished(&self, summary: &RunSummary) {
        self.success(
            "Finished",
            &format!(
                "{} and {} from {}",
                plural(summary.sheets.len(), "sheet", "sheets"),
                plural(summary.stylesheets.len(), "stylesheet", "stylesheets"),
                plural(summary.groups, "group", "groups"),
            ),
        );
        if summary.dropped > 0 {
            Printer::warning(
                self,
                "Dropped",
                &plural(summary.dropped, "missing image", "missing images"),
            );
        }
        if summary.inlined > 0 {
            self.info("Inlined", &plural(summary.inlined, "image", "images"));
        }
    }
}

/// Pluralize a count: `plural(1, "sheet", "sheets")` → "1 sheet".
pub fn plural(n: usize, singular: &str, pluralized: &str) -> String {
    if n == 1 {
        format!("{} {}", n, singular)
    } else {
        format!("{} {}", n, pluralized)
    }
}

/// Return a relative display path when possible, absolute otherwise.
pub fn display_path(path: &Path) -> String {
    if let Ok(cwd) = std::env::current_dir() {
        if let Ok(relative) = path.strip_prefix(&cwd) {
            let s = relative.display().to_string();
            if s.is_empty() {
                return ".".to_string();
            }
            return s;
        }
    }
    path.display().to_string()
}
