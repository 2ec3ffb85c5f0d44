//! # Watch Mode
//!
//! Polling continuo di una directory: passata di conversione + archiviazione,
//! poi attesa di `poll_interval`, finché non arriva il segnale di stop.
//! Nessuna notifica di filesystem, nessun debounce: solo polling.

use crate::{
    error::NormalizeError,
    optimizer::{normalizer::ImageNormalizer, stop_signal::StopSignal},
    progress::BatchSummary,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// Totals across all passes of a watch session
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchReport {
    pub passes: usize,
    pub converted: usize,
    pub archived: usize,
    pub errors: usize,
}

impl WatchReport {
    fn absorb(&mut self, summary: &BatchSummary) {
        self.passes += 1;
        self.converted += summary.converted;
        self.archived += summary.archived;
        self.errors += summary.error_count();
    }
}

/// Polls a directory and normalizes new images
pub struct Watcher {
    normalizer: ImageNormalizer,
    root: PathBuf,
    interval: Duration,
}

impl Watcher {
    pub fn new(normalizer: ImageNormalizer, root: &Path) -> Self {
        let interval = normalizer.config().poll_interval();
        Self {
            normalizer,
            root: root.to_path_buf(),
            interval,
        }
    }

    /// Override the sleep between passes
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Poll until a stop signal is received
    pub async fn run(&self, stop_receiver: broadcast::Receiver<()>) -> Result<WatchReport, NormalizeError> {
        info!("👀 Watching '{}' for new images...", self.root.display());
        info!("Press CTRL+C to stop.");
        self.run_loop(&mut StopSignal::new(stop_receiver), None).await
    }

    /// Run exactly `passes` passes (fewer if stopped)
    pub async fn run_passes(&self, passes: usize) -> Result<WatchReport, NormalizeError> {
        self.run_loop(&mut StopSignal::never(), Some(passes)).await
    }

    async fn run_loop(&self, stop: &mut StopSignal, max_passes: Option<usize>) -> Result<WatchReport, NormalizeError> {
        let mut report = WatchReport::default();

        loop {
            if max_passes.is_some_and(|max| report.passes >= max) || stop.should_stop() {
                break;
            }

            let summary = self.normalizer.convert_pass(&self.root, stop).await?;
            if summary.converted > 0 {
                info!("🎉 {}", summary.format_summary());
            }
            report.absorb(&summary);

            if max_passes.is_some_and(|max| report.passes >= max) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = stop.stopped() => break,
            }
        }

        info!("Watcher stopped after {} passes ({} images converted)", report.passes, report.converted);
        Ok(report)
    }
}
