//! # Optimizer Module
//!
//! Separa le responsabilità in sottomoduli:
//! - `normalizer`: Passata di conversione / archiviazione / cleanup su una root
//! - `watcher`: Polling continuo con segnale di stop
//! - `stop_signal`: Cancellazione cooperativa
//! - `path_resolver`: Calcolo centralizzato del path convertito

pub mod normalizer;
pub mod path_resolver;
pub mod stop_signal;
pub mod watcher;

pub use normalizer::ImageNormalizer;
pub use path_resolver::PathResolver;
pub use stop_signal::StopSignal;
pub use watcher::{WatchReport, Watcher};
