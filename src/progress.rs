//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e il riepilogo di ogni passata.
//!
//! ## Responsabilità:
//! - Progress bar visuale con `indicatif` per le modalità batch
//! - Esito per singolo file (`FileOutcome`) invece di sole stampe su console
//! - Aggregazione degli esiti in un `BatchSummary`
//!
//! ## Stati di un file:
//! - `Unseen`: non ancora convertito (es. decode fallito)
//! - `Converted`: WebP scritto, originale ancora al suo posto
//! - `Archived`: originale spostato nella directory di backup
//! - `Deleted`: originale cancellato (cleanup)
//! - `Kept`: originale mantenuto perché manca il WebP (cleanup)
//!
//! ## Esempio:
//! ```rust,ignore
//! let mut summary = BatchSummary::new(&root);
//! summary.record(&outcome);
//! info!("{}", summary.format_summary());
//! ```

use crate::error::{FailureKind, NormalizeError};
use crate::file_manager::FileManager;
use crate::image_processor::ConvertedImage;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Manages progress reporting for batch passes
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Progress manager that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Step of the per-file workflow where a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Convert,
    Relocate,
    Delete,
}

/// Where a file ended up after a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStage {
    Unseen,
    Converted,
    Archived,
    Deleted,
    Kept,
}

/// A logged, non-fatal failure for one file
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
}

impl FileFailure {
    pub fn new(stage: Stage, err: &NormalizeError) -> Self {
        Self {
            stage,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of processing one source file
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub stage: FileStage,
    pub converted: Option<ConvertedImage>,
    pub backup: Option<PathBuf>,
    pub failure: Option<FileFailure>,
}

impl FileOutcome {
    pub fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            stage: FileStage::Unseen,
            converted: None,
            backup: None,
            failure: None,
        }
    }

    /// Short status line for the progress bar
    pub fn status_line(&self) -> String {
        let name = self
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match (&self.failure, self.stage) {
            (Some(failure), _) => format!("[ERROR] {}: {} failed", name, failure.kind),
            (None, FileStage::Archived) => format!("[OK] {}: converted and archived", name),
            (None, FileStage::Converted) => format!("[OK] {}: converted", name),
            (None, FileStage::Deleted) => format!("[OK] {}: deleted", name),
            (None, FileStage::Kept) => format!("[SKIP] {}: no converted file", name),
            (None, FileStage::Unseen) => format!("[SKIP] {}", name),
        }
    }
}

/// Aggregated result of one pass over a root
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub root: PathBuf,
    pub scanned: usize,
    pub converted: usize,
    pub archived: usize,
    pub deleted: usize,
    pub kept: usize,
    pub failures: Vec<(PathBuf, FileFailure)>,
    pub bytes_before: u64,
    pub bytes_after: u64,
    started: Instant,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            scanned: 0,
            converted: 0,
            archived: 0,
            deleted: 0,
            kept: 0,
            failures: Vec::new(),
            bytes_before: 0,
            bytes_after: 0,
            started: Instant::now(),
            elapsed: Duration::ZERO,
        }
    }

    /// Fold one file outcome into the summary
    pub fn record(&mut self, outcome: &FileOutcome) {
        self.scanned += 1;

        if let Some(ref converted) = outcome.converted {
            self.converted += 1;
            self.bytes_before += converted.source_size;
            self.bytes_after += converted.converted_size;
        }

        match outcome.stage {
            FileStage::Archived => self.archived += 1,
            FileStage::Deleted => self.deleted += 1,
            FileStage::Kept => self.kept += 1,
            FileStage::Unseen | FileStage::Converted => {}
        }

        if let Some(ref failure) = outcome.failure {
            self.failures.push((outcome.source.clone(), failure.clone()));
        }
    }

    pub fn finish(&mut self) {
        self.elapsed = self.started.elapsed();
    }

    pub fn error_count(&self) -> usize {
        self.failures.len()
    }

    pub fn reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.bytes_before, self.bytes_after)
    }

    /// One-line summary of a conversion pass
    pub fn format_summary(&self) -> String {
        let mut line = format!("{} images processed", self.converted);
        if self.archived > 0 {
            line.push_str(&format!(" | archived: {}", self.archived));
        }
        line.push_str(&format!(" | errors: {}", self.error_count()));
        if self.converted > 0 {
            line.push_str(&format!(
                " | {} -> {} ({:.1}% smaller)",
                FileManager::format_size(self.bytes_before),
                FileManager::format_size(self.bytes_after),
                self.reduction_percent()
            ));
        }
        line
    }

    /// One-line summary of a cleanup pass
    pub fn format_cleanup_summary(&self) -> String {
        format!(
            "Total removed in {}: {} | kept: {} | errors: {}",
            self.root.display(),
            self.deleted,
            self.kept,
            self.error_count()
        )
    }
}
