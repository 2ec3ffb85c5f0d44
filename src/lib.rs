//! # Image Normalizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione esplicita e validazione parametri
//! - `error`: Tipi di errore e categorie di fallimento per file
//! - `file_manager`: Scansione, archiviazione e cleanup dei file
//! - `image_processor`: Decode, resize e encoding WebP
//! - `tool_resolver`: Ricerca di `cwebp`
//! - `optimizer`: Orchestratore delle passate e watch mode
//! - `progress`: Esiti per file, riepiloghi e progress bar
//! - `json_output`: Eventi JSON per uso programmatico
//! - `prompt`: Conferma interattiva prima del cleanup
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use image_normalizer::{Config, ImageNormalizer};
//!
//! let normalizer = ImageNormalizer::new(Config::default())?;
//! let summary = normalizer.convert_root(Path::new("Posters")).await?;
//! println!("{}", summary.format_summary());
//! ```

pub mod config;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod optimizer;
pub mod progress;
pub mod prompt;
pub mod tool_resolver;

pub use config::{Config, EncoderChoice, RootSpec};
pub use error::{FailureKind, NormalizeError};
pub use image_processor::{ConvertedImage, ImageProcessor};
pub use optimizer::{ImageNormalizer, StopSignal, Watcher};
pub use progress::{BatchSummary, FileOutcome, FileStage};
