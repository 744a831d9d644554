mod sources;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};

use screen_mux_core::storage::metadata::write_metadata;
use screen_mux_core::{
    mux_file_factory, CaptureError, CaptureOrchestrator, RecordingConfiguration, RecordingResult, SessionDelegate,
    WriterState,
};

use sources::{LocalPermissions, TestPatternSource, ToneMicrophone};

/// Forwards session events to the log.
struct LogDelegate;

impl SessionDelegate for LogDelegate {
    fn on_state_changed(&self, state: WriterState) {
        log::info!("Session writer is {}", state);
    }

    fn on_error(&self, error: &CaptureError) {
        log::warn!("Recording error: {}", error);
    }

    fn on_recording_finished(&self, result: &RecordingResult) {
        log::info!(
            "Recording finished: {} ({:.2}s)",
            result.file_path.display(),
            result.duration_secs
        );
    }
}

fn output_path(directory: &Path, now: DateTime<Local>) -> PathBuf {
    directory.join(format!("Recording {}.smux", now.format("%Y-%m-%d %H%M%S")))
}

fn print_summary(result: &RecordingResult) {
    println!("Saved {}", result.file_path.display());
    println!("  duration  {:.2}s", result.duration_secs);
    println!("  sha256    {}", result.checksum);
    for track in &result.metadata.tracks {
        println!(
            "  {:<17} {} written, {} dropped (not ready), {} dropped (not writing)",
            track.kind, track.stats.written, track.stats.dropped_not_ready, track.stats.dropped_not_writing
        );
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RecordingConfiguration {
        output_directory: std::env::current_dir().context("failed to resolve current directory")?,
        ..RecordingConfiguration::default()
    };
    let path = output_path(&config.output_directory, Local::now());

    let mut orchestrator = CaptureOrchestrator::new(
        TestPatternSource::new(config.clone()),
        ToneMicrophone::new(440.0),
        config,
        Box::new(LocalPermissions),
        mux_file_factory(),
    );
    orchestrator.set_delegate(Arc::new(LogDelegate));

    orchestrator
        .start(&path)
        .with_context(|| format!("failed to start recording to {}", path.display()))?;

    println!("Hit Return to end recording");
    io::stdin()
        .lock()
        .read_line(&mut String::new())
        .context("failed to read from stdin")?;

    let rejected = orchestrator.router().map(|r| r.rejected_frames()).unwrap_or(0);
    let Some(result) = orchestrator.stop() else {
        bail!("recording failed, no file was written");
    };

    write_metadata(&result.metadata, &result.file_path).context("failed to write metadata sidecar")?;
    print_summary(&result);
    log::debug!("{} screen samples were not complete frames", rejected);
    Ok(())
}
