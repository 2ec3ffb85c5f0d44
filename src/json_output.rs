//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON (`--json`).
//!
//! ## Responsabilità:
//! - Emette un messaggio JSON per riga su stdout
//! - Riusa `FileOutcome` e `BatchSummary` come sorgente dei dati
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio di una passata su una root
//! - `file_complete`: Fine elaborazione di un file
//! - `complete`: Fine passata con statistiche
//! - `error`: Errore fatale

use crate::progress::{BatchSummary, FileFailure, FileOutcome, FileStage};
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio di una passata
    Start {
        root: PathBuf,
        mode: String,
        total_files: usize,
    },

    /// Fine elaborazione di un file specifico
    FileComplete {
        path: PathBuf,
        stage: FileStage,
        converted: Option<PathBuf>,
        backup: Option<PathBuf>,
        width: Option<u32>,
        height: Option<u32>,
        error: Option<FileFailure>,
    },

    /// Passata completata
    Complete {
        root: PathBuf,
        files_scanned: usize,
        files_converted: usize,
        files_archived: usize,
        files_deleted: usize,
        files_kept: usize,
        errors: usize,
        bytes_before: u64,
        bytes_after: u64,
        duration_seconds: f64,
    },

    /// Errore fatale
    Error { message: String },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(root: PathBuf, mode: &str, total_files: usize) -> Self {
        Self::Start {
            root,
            mode: mode.to_string(),
            total_files,
        }
    }

    pub fn file_complete(outcome: &FileOutcome) -> Self {
        let converted = outcome.converted.as_ref();
        Self::FileComplete {
            path: outcome.source.clone(),
            stage: outcome.stage,
            converted: converted.map(|c| c.converted.clone()),
            backup: outcome.backup.clone(),
            width: converted.map(|c| c.output.0),
            height: converted.map(|c| c.output.1),
            error: outcome.failure.clone(),
        }
    }

    pub fn complete(summary: &BatchSummary) -> Self {
        Self::Complete {
            root: summary.root.clone(),
            files_scanned: summary.scanned,
            files_converted: summary.converted,
            files_archived: summary.archived,
            files_deleted: summary.deleted,
            files_kept: summary.kept,
            errors: summary.error_count(),
            bytes_before: summary.bytes_before,
            bytes_after: summary.bytes_after,
            duration_seconds: summary.elapsed.as_secs_f64(),
        }
    }

    pub fn error(message: String) -> Self {
        Self::Error { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_messages_are_tagged() {
        let start = serde_json::to_value(JsonMessage::start(PathBuf::from("img"), "optimize", 4)).unwrap();
        assert_eq!(start["type"], "start");
        assert_eq!(start["total_files"], 4);

        let mut outcome = FileOutcome::new(Path::new("img/a.jpg"));
        outcome.stage = FileStage::Kept;
        let file = serde_json::to_value(JsonMessage::file_complete(&outcome)).unwrap();
        assert_eq!(file["type"], "file_complete");
        assert_eq!(file["stage"], "kept");
        assert!(file["error"].is_null());

        let mut summary = BatchSummary::new(Path::new("img"));
        summary.record(&outcome);
        let complete = serde_json::to_value(JsonMessage::complete(&summary)).unwrap();
        assert_eq!(complete["type"], "complete");
        assert_eq!(complete["files_kept"], 1);
    }
}
