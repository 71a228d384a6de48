//! packslip: sort a packing slip document into one file per primary SKU.
//!
//! `packslip sort slips.pdf` runs a job to completion and writes the
//! resulting ZIP archive. `packslip inspect slips.pdf` prints the page
//! classification as JSON lines without writing anything.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use packslip_jobs::defaults::STATUS_POLL_INTERVAL_MS;
use packslip_jobs::{
    CarryState, ClassifierConfig, DocumentLibrary, FormFeedLibrary, JobManager, JobStatus,
    LopdfLibrary, ManagerConfig, PageClassifier, ZipArchiver,
};

#[derive(Parser)]
#[command(name = "packslip")]
#[command(author, version, about = "Sort packing slips by primary SKU")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split, consolidate and archive a slip document
    Sort {
        /// Slip document to process
        input: PathBuf,

        /// Where to write the archive (default: archive name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Root of per-job working directories (overrides PACKSLIP_WORK_DIR)
        #[arg(short, long)]
        work_dir: Option<PathBuf>,

        /// Treat the input as form-feed separated text instead of PDF
        #[arg(long)]
        text: bool,
    },

    /// Print the classification of every page as JSON lines
    Inspect {
        /// Slip document to classify
        input: PathBuf,

        /// Treat the input as form-feed separated text instead of PDF
        #[arg(long)]
        text: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _file_guard = init_tracing();

    match cli.command {
        Commands::Sort {
            input,
            output,
            work_dir,
            text,
        } => {
            if text {
                cmd_sort(FormFeedLibrary::new(), &input, output, work_dir).await
            } else {
                cmd_sort(LopdfLibrary::new(), &input, output, work_dir).await
            }
        }
        Commands::Inspect { input, text } => {
            if text {
                cmd_inspect(&FormFeedLibrary::new(), &input)
            } else {
                cmd_inspect(&LopdfLibrary::new(), &input)
            }
        }
    }
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables daily-rotated file logging)
///   RUST_LOG    - standard env filter (default: "packslip=info")
///
/// Console logs go to stderr so stdout stays clean for `inspect` output.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "packslip=info,packslip_jobs=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("packslip.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stderr)"),
        "Logging initialized"
    );
    guard
}

async fn cmd_sort<L: DocumentLibrary>(
    library: L,
    input: &Path,
    output: Option<PathBuf>,
    work_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = ManagerConfig::from_env();
    if let Some(dir) = work_dir {
        config = config.with_work_dir(dir);
    }
    let manager = JobManager::new(library, ZipArchiver::new(), config)?;

    let job_id = manager
        .submit_path(input)
        .await
        .with_context(|| format!("Failed to submit {}", input.display()))?;

    let mut interval = tokio::time::interval(Duration::from_millis(STATUS_POLL_INTERVAL_MS));
    let mut last_reported: Option<(u8, String)> = None;
    let view = loop {
        interval.tick().await;
        let view = manager.status(job_id)?;
        let current = (view.progress, view.message.clone());
        if last_reported.as_ref() != Some(&current) {
            eprintln!("[{:>3}%] {}", view.progress, view.message);
            last_reported = Some(current);
        }
        if view.status.is_terminal() {
            break view;
        }
    };

    if view.status != JobStatus::Done {
        bail!(
            "Job {} failed: {}",
            job_id,
            view.error.as_deref().unwrap_or("unknown error")
        );
    }

    let bytes = manager.archive_bytes(job_id).await?;
    let dest = output.unwrap_or_else(|| {
        PathBuf::from(
            view.archive_ref
                .clone()
                .unwrap_or_else(|| format!("{}.zip", job_id)),
        )
    });
    tokio::fs::write(&dest, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    for file in &view.files {
        println!("{}", file);
    }
    eprintln!(
        "Wrote {} ({} files, {} bytes)",
        dest.display(),
        view.files.len(),
        bytes.len()
    );
    Ok(())
}

fn cmd_inspect<L: DocumentLibrary>(library: &L, input: &Path) -> anyhow::Result<()> {
    let classifier = PageClassifier::new(ClassifierConfig::from_env())?;
    let source = library
        .open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;

    let mut carry = CarryState::default();
    for page_index in 0..library.page_count(&source) {
        let text = library.extract_text(&source, page_index).unwrap_or_default();
        let (record, next) = classifier.classify(page_index, &text, &carry);
        carry = next;
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}
