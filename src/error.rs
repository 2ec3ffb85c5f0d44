//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `NormalizeError` per tutti gli errori di conversione e archiviazione
//! - Classifica ogni errore in una `FailureKind` per il riepilogo del batch
//! - Integra con `thiserror` per la conversione automatica da `io` e `image`
//!
//! ## Errori fatali vs errori per file:
//! - `MissingRoot`, `MissingTool`: interrompono l'intera esecuzione
//! - Tutti gli altri: vengono registrati sul singolo file e il batch continua
//!
//! ## Esempio:
//! ```rust,ignore
//! if !root.is_dir() {
//!     return Err(NormalizeError::MissingRoot(root.to_path_buf()));
//! }
//! ```

use serde::Serialize;
use std::path::PathBuf;

/// Errors raised while scanning, converting, archiving or cleaning images
#[derive(thiserror::Error, Debug)]
pub enum NormalizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Invalid file path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Root directory does not exist or is not a directory: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("Required tool missing: {0}")]
    MissingTool(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl NormalizeError {
    /// Category used in per-file failure reports
    pub fn kind(&self) -> FailureKind {
        match self {
            NormalizeError::Io(_) => FailureKind::Io,
            NormalizeError::Image(image::ImageError::IoError(_)) => FailureKind::Io,
            NormalizeError::Image(image::ImageError::Encoding(_)) => FailureKind::Encode,
            NormalizeError::Image(_) => FailureKind::Decode,
            NormalizeError::Encoder(_) | NormalizeError::MissingTool(_) => FailureKind::Encode,
            NormalizeError::InvalidPath(_) => FailureKind::InvalidPath,
            NormalizeError::Task(_) => FailureKind::Task,
            NormalizeError::MissingRoot(_) => FailureKind::Io,
        }
    }
}

impl From<tokio::task::JoinError> for NormalizeError {
    fn from(err: tokio::task::JoinError) -> Self {
        NormalizeError::Task(err.to_string())
    }
}

/// Broad category of a per-file failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Decode,
    Encode,
    Io,
    InvalidPath,
    Task,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureKind::Decode => "decode",
            FailureKind::Encode => "encode",
            FailureKind::Io => "io",
            FailureKind::InvalidPath => "invalid path",
            FailureKind::Task => "task",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let io = NormalizeError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.kind(), FailureKind::Io);

        let encoder = NormalizeError::Encoder("cwebp exited with 1".to_string());
        assert_eq!(encoder.kind(), FailureKind::Encode);

        let path = NormalizeError::InvalidPath(PathBuf::from("/"));
        assert_eq!(path.kind(), FailureKind::InvalidPath);
    }

    #[test]
    fn test_decode_error_kind() {
        let err = image::load_from_memory(b"definitely not an image").unwrap_err();
        assert_eq!(NormalizeError::from(err).kind(), FailureKind::Decode);
    }
}
