//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` passata esplicitamente a ogni operazione
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce i valori di default della watch mode
//!
//! ## Parametri di configurazione:
//! - `watch_root`: Directory osservata (default: "Posters")
//! - `output_dir`: Directory di output (default: None = accanto all'originale)
//! - `backup_dir`: Directory di backup degli originali (default: "originais", relativa alla root)
//! - `extensions`: Estensioni sorgente (default: jpg, jpeg, png)
//! - `target_extension`: Estensione convertita (default: webp)
//! - `max_width`: Larghezza massima (default: None = nessun resize)
//! - `quality`: Qualità WebP (1-100, default: 85)
//! - `poll_interval_secs`: Intervallo di polling in watch mode (default: 3)
//! - `recursive`: Scansione ricorsiva (default: false)
//! - `archive_originals`: Sposta gli originali nel backup (default: true)
//! - `encoder`: Encoder WebP (auto, cwebp, builtin)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     max_width: Some(800),
//!     quality: 80,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Which WebP encoder to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EncoderChoice {
    /// cwebp when installed, built-in libwebp otherwise
    #[default]
    Auto,
    /// Always cwebp
    Cwebp,
    /// Always the built-in libwebp encoder
    Builtin,
}

/// Configuration for image normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory watched in watch mode
    pub watch_root: PathBuf,
    /// Output directory for converted files (None = alongside the source)
    pub output_dir: Option<PathBuf>,
    /// Backup directory for originals, relative paths are resolved against the root
    pub backup_dir: PathBuf,
    /// Source extensions, lowercase and without the dot
    pub extensions: Vec<String>,
    /// Extension of converted files
    pub target_extension: String,
    /// Downscale images wider than this
    pub max_width: Option<u32>,
    /// WebP quality (1-100)
    pub quality: u8,
    /// Sleep between passes in watch mode
    pub poll_interval_secs: u64,
    /// Walk the whole subtree instead of the root only
    pub recursive: bool,
    /// Move originals into the backup directory after conversion
    pub archive_originals: bool,
    /// WebP encoder selection
    pub encoder: EncoderChoice,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_root: PathBuf::from("Posters"),
            output_dir: None,
            backup_dir: PathBuf::from("originais"),
            extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            target_extension: "webp".to_string(),
            max_width: None,
            quality: 85,
            poll_interval_secs: 3,
            recursive: false,
            archive_originals: true,
            encoder: EncoderChoice::Auto,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(anyhow::anyhow!("Quality must be between 1 and 100"));
        }

        if self.max_width == Some(0) {
            return Err(anyhow::anyhow!("Max width must be greater than 0"));
        }

        if self.poll_interval_secs == 0 {
            return Err(anyhow::anyhow!("Poll interval must be at least 1 second"));
        }

        if self.extensions.is_empty() {
            return Err(anyhow::anyhow!("At least one source extension is required"));
        }

        let target = self.target_extension.to_lowercase();
        if target.is_empty() {
            return Err(anyhow::anyhow!("Target extension must not be empty"));
        }
        if self.extensions.iter().any(|ext| ext.to_lowercase() == target) {
            return Err(anyhow::anyhow!(
                "Target extension '{}' cannot also be a source extension",
                self.target_extension
            ));
        }

        if self.backup_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Backup directory must not be empty"));
        }

        Ok(())
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Backup directory for a given root
    pub fn backup_dir_for(&self, root: &Path) -> PathBuf {
        if self.backup_dir.is_absolute() {
            self.backup_dir.clone()
        } else {
            root.join(&self.backup_dir)
        }
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// A root directory with an optional width limit, written `img` or `img=800`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSpec {
    pub path: PathBuf,
    pub max_width: Option<u32>,
}

impl FromStr for RootSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("root directory must not be empty".to_string());
        }

        if let Some((path, width)) = s.rsplit_once('=') {
            if let Ok(width) = width.parse::<u32>() {
                if width == 0 {
                    return Err(format!("max width for '{}' must be greater than 0", path));
                }
                return Ok(Self {
                    path: PathBuf::from(path),
                    max_width: Some(width),
                });
            }
        }

        Ok(Self {
            path: PathBuf::from(s),
            max_width: None,
        })
    }
}
