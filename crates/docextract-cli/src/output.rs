use std::io::Write;
use std::path::Path;

use docextract_core::ExtractionError;
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Header printed before each document when several go to stdout.
pub fn print_file_header(w: &mut dyn Write, path: &Path) -> std::io::Result<()> {
    writeln!(w, "==> {} <==", path.display())
}

/// Report a failed extraction with its error kind.
pub fn print_failure(
    w: &mut dyn Write,
    path: &Path,
    err: &ExtractionError,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(
            w,
            "{} {} [{}]: {}",
            "FAILED".red().bold(),
            path.display(),
            err.kind(),
            err
        )
    } else {
        writeln!(w, "FAILED {} [{}]: {}", path.display(), err.kind(), err)
    }
}

/// Report a document that could not be read from disk.
pub fn print_read_failure(
    w: &mut dyn Write,
    path: &Path,
    err: &anyhow::Error,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(
            w,
            "{} {} [read_error]: {:#}",
            "FAILED".red().bold(),
            path.display(),
            err
        )
    } else {
        writeln!(w, "FAILED {} [read_error]: {:#}", path.display(), err)
    }
}

/// Report a parser context that failed to release after a successful extraction.
pub fn print_cleanup_warning(
    w: &mut dyn Write,
    path: &Path,
    warning: &str,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}: {}", "WARNING:".yellow(), path.display(), warning)
    } else {
        writeln!(w, "WARNING: {}: {}", path.display(), warning)
    }
}

/// Print the final tally when more than one file was processed.
pub fn print_summary(
    w: &mut dyn Write,
    succeeded: usize,
    failed: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    let total = succeeded + failed;
    if color.enabled() {
        writeln!(
            w,
            "{} of {} extracted, {} failed",
            succeeded.to_string().green(),
            total,
            if failed > 0 {
                failed.to_string().red().to_string()
            } else {
                failed.to_string()
            }
        )
    } else {
        writeln!(w, "{} of {} extracted, {} failed", succeeded, total, failed)
    }
}
