//! The `tilepress process` command for editing and exporting collections.

mod manifest;
mod store;

pub use store::PatchRecord;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, ValueEnum};
use tilepress_core::{Config, EditorSession, PhotoRecord, RecordStore, SessionState};

use store::{CollectingStore, JsonlStore};

/// Supported output formats for patch records.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON array of patch records
    Json,
    /// One patch record per line (newline-delimited)
    Jsonl,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Order manifest (.json), photo file, or directory to process
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output file for patch records (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Filter id applied to every photo (see `tilepress filters`)
    #[arg(long)]
    pub filter: Option<String>,

    /// Skip print masters (pauses the deferred export queue)
    #[arg(long)]
    pub no_prints: bool,

    /// Override the workspace directory for artifacts and working copies
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(dir) = &args.work_dir {
        config.general.work_dir = dir.clone();
    }
    if let Some(filter) = &args.filter {
        if tilepress_core::filters::find(filter).is_none() {
            anyhow::bail!("Unknown filter '{filter}'. See `tilepress filters` for the catalog.");
        }
    }

    let photos = manifest::load_collection(&args.input)?;
    if photos.is_empty() {
        tracing::warn!("No photos found at {:?}", args.input);
        return Ok(());
    }
    tracing::info!("Editing {} photo(s)", photos.len());

    match args.format {
        OutputFormat::Jsonl => {
            let store = Arc::new(JsonlStore::for_output(args.output.as_deref())?);
            run_session(&args, config, photos, store.clone()).await?;
            store.flush()?;
            if let Some(path) = &args.output {
                tracing::info!("Patch records written to {:?}", path);
            }
        }
        OutputFormat::Json => {
            let store = Arc::new(CollectingStore::new());
            run_session(&args, config, photos, store.clone()).await?;
            let json = serde_json::to_string_pretty(&store.take_records())?;
            match &args.output {
                Some(path) => {
                    std::fs::write(path, json)?;
                    tracing::info!("Patch records written to {:?}", path);
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

/// Walk the session over the collection, committing each photo.
async fn run_session(
    args: &ProcessArgs,
    config: Config,
    photos: Vec<PhotoRecord>,
    store: Arc<dyn RecordStore>,
) -> anyhow::Result<()> {
    let total = photos.len() as u64;
    let mut session = EditorSession::new(config, photos, store);

    if args.no_prints {
        session.queue().pause();
        tracing::info!("Print masters disabled; deferred export queue paused");
    }
    session.start().await?;

    let progress = create_progress_bar(total);
    let start_time = Instant::now();
    let mut committed: u64 = 0;
    let mut retried: u64 = 0;

    while session.state() == SessionState::Ready {
        if let Some(filter) = &args.filter {
            session.select_filter(filter)?;
        }
        if let Err(e) = session.commit_and_advance().await {
            // The photo stays open after a failed commit; give it one more
            // try before giving up on the run.
            retried += 1;
            let index = session.current_index();
            tracing::warn!("Commit failed for photo {index}: {e}; retrying");
            session
                .commit_and_advance()
                .await
                .with_context(|| format!("Photo {index} failed twice"))?;
        }
        committed += 1;
        progress.inc(1);
        let elapsed = start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            progress.set_message(format!("{:.1} photo/sec", committed as f64 / elapsed));
        }
    }

    let pending = session.queue().pending();
    if pending > 0 {
        tracing::info!("Waiting for {pending} deferred print job(s)");
    }
    session.wait_for_exports().await;
    progress.finish_and_clear();

    print_summary(committed, retried, total, start_time.elapsed());
    Ok(())
}

/// Create a progress bar for collection processing.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap()
            .progress_chars("##-"),
    );
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary after processing.
fn print_summary(committed: u64, retried: u64, total: u64, elapsed: std::time::Duration) {
    let rate = if elapsed.as_secs_f64() > 0.0 {
        committed as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Committed:    {:>8}", committed);
    if retried > 0 {
        eprintln!("    Retried:      {:>8}", retried);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", total);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} photo/sec", rate);
    eprintln!("  ====================================");
}
