use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docextract_core::config_file::{self, ConfigError, ConfigFile};
use docextract_core::{CleanupPolicy, Extraction, ExtractionError, ExtractionOptions, ExtractionService};
use docextract_mupdf::MupdfBackend;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// docextract - Extract plain text from PDF documents
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the text of one or more PDF files
    Extract {
        /// PDF files to extract
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write each document to <DIR>/<stem>.txt instead of stdout
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Text placed between pages (accepts \n, \t and \f escapes)
        #[arg(long)]
        separator: Option<String>,

        /// Skip whitespace and ligature normalization
        #[arg(long)]
        raw: bool,

        /// Fail when the parser context cannot be released after extraction
        #[arg(long)]
        strict_cleanup: bool,

        /// Abort a document after this many seconds (0 disables)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Print the effective configuration
    Config {
        /// Print the platform config file path instead
        #[arg(long)]
        path: bool,
    },
}

/// Command-line overrides for [`ExtractionOptions`].
#[derive(Debug, Default)]
struct OptionFlags {
    separator: Option<String>,
    raw: bool,
    strict_cleanup: bool,
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Config { path } => {
            show_config(path, config_file::load_config, &mut std::io::stdout().lock())
        }
        Command::Extract {
            files,
            output_dir,
            separator,
            raw,
            strict_cleanup,
            timeout,
            no_color,
        } => {
            let config = config_file::load_config()?;
            let flags = OptionFlags {
                separator,
                raw,
                strict_cleanup,
                timeout,
            };
            let options = resolve_options(
                &config,
                std::env::var("DOCEXTRACT_TIMEOUT_SECS").ok(),
                std::env::var("DOCEXTRACT_CLEANUP_POLICY").ok(),
                flags,
            )?;
            let backend = MupdfBackend::from_config(&config.mupdf.clone().unwrap_or_default());
            let service = ExtractionService::new(Arc::new(backend)).with_options(options);
            extract(service, files, output_dir, ColorMode(!no_color)).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `--path` never loads the config, so it still works when the file is broken.
fn show_config(
    path_only: bool,
    load: impl FnOnce() -> Result<ConfigFile, ConfigError>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if path_only {
        let path = config_file::config_path().ok_or(ConfigError::NoConfigDir)?;
        writeln!(out, "{}", path.display())?;
        return Ok(());
    }
    let config = load()?;
    let options = config.extraction_options();
    write!(out, "{}", toml::to_string_pretty(&config)?)?;
    eprintln!(
        "# effective: normalize={} cleanup_policy={:?} timeout={:?}",
        options.normalize, options.cleanup_policy, options.timeout
    );
    Ok(())
}

/// Resolve options: CLI flags > env vars > config file > defaults.
fn resolve_options(
    config: &ConfigFile,
    env_timeout: Option<String>,
    env_policy: Option<String>,
    flags: OptionFlags,
) -> anyhow::Result<ExtractionOptions> {
    let mut options = config.extraction_options();

    if let Some(raw) = env_timeout {
        let secs: u64 = raw
            .trim()
            .parse()
            .with_context(|| format!("DOCEXTRACT_TIMEOUT_SECS is not a number: {raw:?}"))?;
        options.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if let Some(raw) = env_policy {
        options.cleanup_policy = raw
            .parse::<CleanupPolicy>()
            .map_err(anyhow::Error::msg)
            .context("invalid DOCEXTRACT_CLEANUP_POLICY")?;
    }

    if let Some(separator) = flags.separator {
        options.page_separator = unescape(&separator);
    }
    if flags.raw {
        options.normalize = false;
    }
    if flags.strict_cleanup {
        options.cleanup_policy = CleanupPolicy::Strict;
    }
    if let Some(secs) = flags.timeout {
        options.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }

    Ok(options)
}

/// Expand the `\n`, `\t`, `\f` and `\\` escapes a shell passes through literally.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('f') => out.push('\u{0C}'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

async fn extract(
    service: ExtractionService,
    files: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
    color: ColorMode,
) -> anyhow::Result<()> {
    for path in &files {
        if !path.exists() {
            anyhow::bail!("file not found: {}", path.display());
        }
    }
    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling extraction");
            ctrl_c.cancel();
        }
    });

    let jobs = files.iter().map(|path| {
        let service = service.clone();
        let cancel = cancel.clone();
        async move {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "read document");
            Ok::<_, anyhow::Error>(service.extract_with_cancel(bytes, cancel).await)
        }
    });
    let results = futures_util::future::join_all(jobs).await;

    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr().lock();
    let sink = Sink {
        stdout: &mut stdout,
        stderr: &mut stderr,
        output_dir: output_dir.as_deref(),
        multiple: files.len() > 1,
        color,
    };
    let tally = report_batch(&files, results, sink)?;

    if tally.failed > 0 {
        anyhow::bail!("{} of {} documents failed", tally.failed, files.len());
    }
    Ok(())
}

/// Where a batch's text, failures and summary go.
struct Sink<'a> {
    stdout: &'a mut dyn Write,
    stderr: &'a mut dyn Write,
    output_dir: Option<&'a Path>,
    multiple: bool,
    color: ColorMode,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    succeeded: usize,
    failed: usize,
}

/// Print every document's outcome in input order.
///
/// A file that could not be read counts as a failed document; only errors
/// writing the output stop the batch.
fn report_batch(
    files: &[PathBuf],
    results: Vec<anyhow::Result<Result<Extraction, ExtractionError>>>,
    mut sink: Sink<'_>,
) -> anyhow::Result<Tally> {
    let mut tally = Tally::default();

    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(Ok(extraction)) => {
                tally.succeeded += 1;
                if let Some(warning) = &extraction.cleanup_warning {
                    output::print_cleanup_warning(sink.stderr, path, warning, sink.color)?;
                }
                match sink.output_dir {
                    Some(dir) => write_text_file(dir, path, &extraction)?,
                    None => {
                        if sink.multiple {
                            output::print_file_header(sink.stdout, path)?;
                        }
                        writeln!(sink.stdout, "{}", extraction.text)?;
                        if sink.multiple {
                            writeln!(sink.stdout)?;
                        }
                    }
                }
            }
            Ok(Err(err)) => {
                tally.failed += 1;
                output::print_failure(sink.stderr, path, &err, sink.color)?;
                if err == ExtractionError::Cancelled {
                    tracing::debug!(path = %path.display(), "skipped after interrupt");
                }
            }
            Err(err) => {
                tally.failed += 1;
                output::print_read_failure(sink.stderr, path, &err, sink.color)?;
            }
        }
    }

    if sink.multiple {
        output::print_summary(sink.stderr, tally.succeeded, tally.failed, sink.color)?;
    }
    Ok(tally)
}

fn write_text_file(dir: &Path, source: &Path, extraction: &Extraction) -> anyhow::Result<()> {
    let target = output_path(dir, source);
    std::fs::write(&target, &extraction.text)
        .with_context(|| format!("failed to write {}", target.display()))?;
    tracing::info!(
        source = %source.display(),
        target = %target.display(),
        pages = extraction.page_count,
        "wrote extracted text"
    );
    Ok(())
}

fn output_path(dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    dir.join(format!("{stem}.txt"))
}
