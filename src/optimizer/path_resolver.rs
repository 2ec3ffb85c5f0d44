//! # Path Resolution Module
//!
//! Centralizza il calcolo del path del file convertito.
//! Senza `output_dir` il WebP va accanto all'originale, altrimenti nella
//! stessa posizione relativa sotto `output_dir`.

use crate::{config::Config, error::NormalizeError, file_manager::FileManager};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Path of the converted file for `input_path` found under `root`
    pub fn get_output_path(input_path: &Path, root: &Path, config: &Config) -> Result<PathBuf, NormalizeError> {
        let beside = FileManager::sibling_with_extension(input_path, &config.target_extension)?;

        let Some(ref output_dir) = config.output_dir else {
            return Ok(beside);
        };

        let file_name = beside
            .file_name()
            .ok_or_else(|| NormalizeError::InvalidPath(input_path.to_path_buf()))?;

        let relative_dir = match input_path.strip_prefix(root) {
            Ok(rel) => rel.parent().unwrap_or(Path::new("")),
            Err(e) => {
                debug!("[ERROR] Strip prefix failed: {} - writing to output root", e);
                Path::new("")
            }
        };

        let result = output_dir.join(relative_dir).join(file_name);
        debug!("Resolved output path: {} -> {}", input_path.display(), result.display());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_place_output() {
        let config = Config::default();
        let out = PathResolver::get_output_path(Path::new("img/series/poster.JPG"), Path::new("img"), &config).unwrap();
        assert_eq!(out, PathBuf::from("img/series/poster.webp"));
    }

    #[test]
    fn test_mirrored_output_dir() {
        let config = Config {
            output_dir: Some(PathBuf::from("web")),
            ..Default::default()
        };
        let out = PathResolver::get_output_path(Path::new("img/series/poster.png"), Path::new("img"), &config).unwrap();
        assert_eq!(out, PathBuf::from("web/series/poster.webp"));

        let flat = PathResolver::get_output_path(Path::new("img/poster.png"), Path::new("img"), &config).unwrap();
        assert_eq!(flat, PathBuf::from("web/poster.webp"));
    }

    #[test]
    fn test_outside_root_goes_to_output_root() {
        let config = Config {
            output_dir: Some(PathBuf::from("web")),
            ..Default::default()
        };
        let out = PathResolver::get_output_path(Path::new("elsewhere/a.jpg"), Path::new("img"), &config).unwrap();
        assert_eq!(out, PathBuf::from("web/a.webp"));
    }
}
