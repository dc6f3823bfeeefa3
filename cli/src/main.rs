mod logging;

use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
    thread,
    time::Duration,
};

use async_std::task;
use clap::Parser;
use core_types::DeletionSummary;
use service::{
    error::Error, file_deletion::service::FileDeletionService, settings::DeletionSettings,
};
use task_core::{CancellationToken, TaskEvent};

const EXIT_FILES_LEFT: u8 = 1;
const EXIT_FAULTED: u8 = 1;
const EXIT_CANCELLED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "batch-delete", version, about)]
struct Cli {
    /// Files to delete
    paths: Vec<PathBuf>,

    /// Text file listing more files to delete, one path per line
    #[arg(long)]
    from_file: Option<PathBuf>,

    /// Pause before each file, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Cancel the run once this many seconds have passed
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let _log_guard = logging::init_logging();
    let args = Cli::parse();
    let json = args.json;

    match task::block_on(run(args)) {
        Ok(summary) => {
            if json {
                match summary.to_json() {
                    Ok(output) => println!("{}", output),
                    Err(e) => eprintln!("Failed to serialize summary: {}", e),
                }
            } else {
                print_summary(&summary);
            }
            ExitCode::from(exit_code(&summary))
        }
        Err(e) => {
            tracing::error!(error = %e, "File deletion failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<DeletionSummary, Error> {
    let mut files = args.paths;
    if let Some(list_path) = &args.from_file {
        files.extend(read_file_list(list_path)?);
    }

    let settings = Arc::new(DeletionSettings::with_item_delay(Duration::from_millis(
        args.delay_ms,
    )));
    let service = FileDeletionService::new(settings);

    let cancel_token = CancellationToken::new();
    if let Some(secs) = args.timeout_secs {
        cancel_token.cancel_after(Duration::from_secs(secs))?;
    }
    cancel_on_enter(cancel_token.clone());

    if !args.json {
        eprintln!("Deleting {} files, press Enter to cancel.", files.len());
    }

    let (progress_tx, progress_rx) = flume::unbounded();

    // Spawn task to print progress while the deletion runs
    let printer = task::spawn(async move {
        while let Ok(event) = progress_rx.recv_async().await {
            if let TaskEvent::Progress { percent } = event {
                eprint!("\r{:>3}%", percent);
                let _ = io::stderr().flush();
            }
        }
        eprintln!();
    });

    let res = service
        .delete_files(files, Some(progress_tx), cancel_token)
        .await;
    printer.await;
    res
}

/// Cancels `token` when a line is read from stdin. A closed stdin never cancels.
fn cancel_on_enter(token: CancellationToken) {
    let spawn_res = thread::Builder::new()
        .name("stdin-cancel".to_string())
        .spawn(move || {
            let mut line = String::new();
            if let Ok(read) = io::stdin().lock().read_line(&mut line)
                && read > 0
                && token.cancel()
            {
                tracing::info!("Cancellation requested from terminal");
            }
        });
    if let Err(e) = spawn_res {
        tracing::warn!(error = %e, "Cancelling from the terminal is unavailable");
    }
}

/// Reads one path per line, ignoring blank lines and lines starting with `#`.
fn read_file_list(path: &Path) -> Result<Vec<PathBuf>, Error> {
    let content = fs::read_to_string(path).map_err(|e| {
        let message = format!("Failed to read file list {}: {}", path.display(), e);
        Error::InvalidInput(message)
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PathBuf::from)
        .collect())
}

fn print_summary(summary: &DeletionSummary) {
    if let Some(error) = &summary.error {
        println!(
            "Deletion stopped after {} of {} files: {}",
            summary.attempted, summary.total_files, error
        );
    } else if summary.cancelled {
        println!(
            "Deletion cancelled after {} of {} files.",
            summary.attempted, summary.total_files
        );
    } else {
        println!("Done deleting the files in {}ms.", summary.elapsed_ms);
    }
    println!(
        "{} deleted, {} left.",
        summary.deleted,
        summary.files_left.len()
    );
    for file in &summary.files_left {
        println!("  {} ({}: {})", file.path, file.reason, file.message);
    }
}

fn exit_code(summary: &DeletionSummary) -> u8 {
    if summary.error.is_some() {
        EXIT_FAULTED
    } else if summary.cancelled {
        EXIT_CANCELLED
    } else if !summary.files_left.is_empty() {
        EXIT_FILES_LEFT
    } else {
        0
    }
}
