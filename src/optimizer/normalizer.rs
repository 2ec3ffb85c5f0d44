//! # Image Normalizer Orchestrator
//!
//! Orchestratore di una singola passata su una directory root.
//!
//! ## Flusso conversione (watch / optimize):
//! 1. Verifica che la root esista
//! 2. Crea la directory di backup se l'archiviazione è attiva
//! 3. Scansiona le immagini candidate (backup escluso)
//! 4. Per ogni file, in sequenza: converte → archivia l'originale
//! 5. Raccoglie gli esiti in un `BatchSummary`
//!
//! ## Flusso cleanup:
//! 1. Scansione ricorsiva delle immagini sorgente
//! 2. Cancella l'originale solo se esiste il WebP con lo stesso nome
//!
//! ## Error handling:
//! - Errori sul singolo file non bloccano la passata
//! - Solo root mancante o backup non creabile interrompono l'esecuzione

use crate::{
    config::Config,
    error::NormalizeError,
    file_manager::FileManager,
    image_processor::ImageProcessor,
    json_output::JsonMessage,
    optimizer::{path_resolver::PathResolver, stop_signal::StopSignal},
    progress::{BatchSummary, FileFailure, FileOutcome, FileStage, ProgressManager, Stage},
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Runs conversion and cleanup passes over a root directory
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    config: Config,
    processor: ImageProcessor,
    show_progress: bool,
}

impl ImageNormalizer {
    /// Validate the config and resolve the WebP encoder
    pub fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;
        let processor = ImageProcessor::new(config.encoder)?;
        Ok(Self::with_processor(config, processor))
    }

    pub fn with_processor(config: Config, processor: ImageProcessor) -> Self {
        Self {
            config,
            processor,
            show_progress: false,
        }
    }

    /// Draw a progress bar during passes
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress && !self.config.json_output;
        self
    }

    /// Same normalizer with a different width limit
    pub fn with_max_width(&self, max_width: Option<u32>) -> Self {
        let mut normalizer = self.clone();
        normalizer.config.max_width = max_width;
        normalizer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn processor(&self) -> &ImageProcessor {
        &self.processor
    }

    fn ensure_root(root: &Path) -> Result<(), NormalizeError> {
        if root.is_dir() {
            Ok(())
        } else {
            Err(NormalizeError::MissingRoot(root.to_path_buf()))
        }
    }

    fn candidates(&self, root: &Path, recursive: bool) -> Vec<PathBuf> {
        let backup_dir = self.config.backup_dir_for(root);
        let files: Vec<PathBuf> = FileManager::scan(root, recursive, &backup_dir, &self.config.extensions).collect();

        for (earlier, later, target) in FileManager::shared_targets(&files, &self.config.target_extension) {
            warn!(
                "⚠️ {} and {} both map to {}; the later file wins",
                earlier.display(),
                later.display(),
                target.display()
            );
        }

        files
    }

    fn progress_for(&self, total: usize) -> ProgressManager {
        if self.show_progress {
            ProgressManager::new(total as u64)
        } else {
            ProgressManager::hidden()
        }
    }

    /// One conversion pass over `root` without a stop signal
    pub async fn convert_root(&self, root: &Path) -> Result<BatchSummary, NormalizeError> {
        self.convert_pass(root, &mut StopSignal::never()).await
    }

    /// Scan `root`, convert every candidate and archive originals when configured.
    ///
    /// `stop` is checked between files.
    pub async fn convert_pass(&self, root: &Path, stop: &mut StopSignal) -> Result<BatchSummary, NormalizeError> {
        Self::ensure_root(root)?;

        let backup_dir = self.config.backup_dir_for(root);
        if self.config.archive_originals {
            tokio::fs::create_dir_all(&backup_dir).await?;
        }

        let files = self.candidates(root, self.config.recursive);
        let mut summary = BatchSummary::new(root);

        if self.config.json_output {
            let mode = if self.config.archive_originals { "convert_and_archive" } else { "convert" };
            JsonMessage::start(root.to_path_buf(), mode, files.len()).emit();
        }

        let progress = self.progress_for(files.len());

        for source in files {
            if stop.should_stop() {
                warn!("Stop requested, leaving remaining files for the next run");
                break;
            }

            let outcome = self.process_file(root, &source, &backup_dir).await;
            progress.update(&outcome.status_line());
            if self.config.json_output {
                JsonMessage::file_complete(&outcome).emit();
            }
            summary.record(&outcome);
        }

        summary.finish();
        progress.finish(&summary.format_summary());
        if self.config.json_output {
            JsonMessage::complete(&summary).emit();
        }

        Ok(summary)
    }

    /// Convert one file, then archive the original if configured.
    ///
    /// Never fails: errors are captured in the returned outcome.
    pub async fn process_file(&self, root: &Path, source: &Path, backup_dir: &Path) -> FileOutcome {
        let mut outcome = FileOutcome::new(source);
        let name = source.file_name().unwrap_or_default().to_string_lossy().into_owned();

        let target = match PathResolver::get_output_path(source, root, &self.config) {
            Ok(target) => target,
            Err(e) => {
                error!("❌ Error converting {}: {}", name, e);
                outcome.failure = Some(FileFailure::new(Stage::Convert, &e));
                return outcome;
            }
        };

        info!("🔄 Converting: {}...", name);
        match self
            .processor
            .convert(source, &target, self.config.max_width, self.config.quality)
            .await
        {
            Ok(converted) => {
                info!("✅ Success: {}", converted.converted.display());
                outcome.converted = Some(converted);
                outcome.stage = FileStage::Converted;
            }
            Err(e) => {
                error!("❌ Error converting {}: {}", name, e);
                outcome.failure = Some(FileFailure::new(Stage::Convert, &e));
                return outcome;
            }
        }

        if !self.config.archive_originals {
            return outcome;
        }

        match FileManager::relocate(source, backup_dir).await {
            Ok(backup) => {
                info!("📦 Archived: {} -> {}", name, backup.display());
                outcome.backup = Some(backup);
                outcome.stage = FileStage::Archived;
            }
            Err(e) => {
                error!("❌ Error archiving {}: {} (original left in place)", name, e);
                outcome.failure = Some(FileFailure::new(Stage::Relocate, &e));
            }
        }

        outcome
    }

    /// Delete originals under `root` whose converted counterpart exists.
    ///
    /// `stop` is checked between files.
    pub async fn cleanup_pass(&self, root: &Path, stop: &mut StopSignal) -> Result<BatchSummary, NormalizeError> {
        Self::ensure_root(root)?;
        info!("Cleaning up original images in: {}", root.display());

        let files = self.candidates(root, true);
        let mut summary = BatchSummary::new(root);

        if self.config.json_output {
            JsonMessage::start(root.to_path_buf(), "cleanup", files.len()).emit();
        }

        let progress = self.progress_for(files.len());

        for source in files {
            if stop.should_stop() {
                warn!("Stop requested, remaining originals left untouched");
                break;
            }

            let outcome = self.cleanup_file(&source).await;
            progress.update(&outcome.status_line());
            if self.config.json_output {
                JsonMessage::file_complete(&outcome).emit();
            }
            summary.record(&outcome);
        }

        summary.finish();
        progress.finish(&summary.format_cleanup_summary());
        if self.config.json_output {
            JsonMessage::complete(&summary).emit();
        }

        Ok(summary)
    }

    /// Delete one original if its converted sibling exists
    pub async fn cleanup_file(&self, source: &Path) -> FileOutcome {
        let mut outcome = FileOutcome::new(source);
        let name = source.file_name().unwrap_or_default().to_string_lossy().into_owned();

        match FileManager::cleanup(source, &self.config.target_extension).await {
            Ok(true) => {
                info!("🗑️ Deleted: {}", name);
                outcome.stage = FileStage::Deleted;
            }
            Ok(false) => {
                outcome.stage = FileStage::Kept;
            }
            Err(e) => {
                error!("❌ Error deleting {}: {}", name, e);
                outcome.failure = Some(FileFailure::new(Stage::Delete, &e));
            }
        }

        outcome
    }
}
