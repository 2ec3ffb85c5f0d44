//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file e la discovery delle immagini.
//!
//! ## Responsabilità:
//! - Discovery (piatta o ricorsiva) delle immagini sorgente in una directory
//! - Esclusione della directory di backup dalla scansione
//! - Archiviazione degli originali con nome univoco in caso di collisione
//! - Cancellazione protetta degli originali già convertiti
//! - Formattazione human-readable delle dimensioni
//!
//! ## Operazioni sui file:
//! - `scan()`: Iteratore lazy sulle immagini candidate
//! - `relocate()`: Sposta l'originale nel backup (`foto.jpg` → `foto_1700000000.jpg` se esiste)
//! - `cleanup()`: Cancella l'originale solo se il file convertito esiste
//!
//! ## Esempio:
//! ```rust,ignore
//! for file in FileManager::scan(&root, true, &backup_dir, &config.extensions) {
//!     // convert file
//! }
//! ```

use crate::error::NormalizeError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Iterate over candidate images under `root`.
    ///
    /// Flat mode lists only the direct children of `root`. The backup directory
    /// is never entered. The iterator is lazy and each call walks the tree again.
    pub fn scan<'a>(
        root: &Path,
        recursive: bool,
        backup_dir: &'a Path,
        extensions: &'a [String],
    ) -> impl Iterator<Item = PathBuf> + 'a {
        let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }

        // Root and backup dir may be spelled differently (relative vs absolute)
        let canonical_backup = std::fs::canonicalize(backup_dir).ok();

        walker
            .into_iter()
            .filter_entry(move |entry| {
                let is_backup = entry.file_type().is_dir()
                    && Self::is_same_dir(entry.path(), backup_dir, canonical_backup.as_deref());
                !is_backup
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(move |path| Self::has_extension(path, extensions))
    }

    fn is_same_dir(path: &Path, other: &Path, canonical_other: Option<&Path>) -> bool {
        if path == other {
            return true;
        }
        match canonical_other {
            Some(canonical) => std::fs::canonicalize(path).map(|p| p == canonical).unwrap_or(false),
            None => false,
        }
    }

    /// Source files that convert to the same target as an earlier file.
    ///
    /// Returns `(earlier, later, target)` for each clash, e.g. `a.jpg` and
    /// `a.png` in one directory both producing `a.webp`.
    pub fn shared_targets(files: &[PathBuf], extension: &str) -> Vec<(PathBuf, PathBuf, PathBuf)> {
        let mut seen: HashMap<PathBuf, &PathBuf> = HashMap::new();
        let mut clashes = Vec::new();

        for file in files {
            let Ok(target) = Self::sibling_with_extension(file, extension) else {
                continue;
            };
            match seen.get(&target) {
                Some(earlier) => clashes.push(((*earlier).clone(), file.clone(), target)),
                None => {
                    seen.insert(target, file);
                }
            }
        }

        clashes
    }

    /// Check whether `path` has one of `extensions` (case-insensitive)
    pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
        match path.extension() {
            Some(ext) => {
                let ext = ext.to_string_lossy();
                extensions
                    .iter()
                    .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(&ext))
            }
            None => false,
        }
    }

    /// Path of the converted counterpart next to `path`
    pub fn sibling_with_extension(path: &Path, extension: &str) -> Result<PathBuf, NormalizeError> {
        let stem = path
            .file_stem()
            .ok_or_else(|| NormalizeError::InvalidPath(path.to_path_buf()))?;
        let mut name = stem.to_os_string();
        name.push(".");
        name.push(extension);
        Ok(path.with_file_name(name))
    }

    /// Move `path` into `backup_dir`, returning the backup path.
    ///
    /// The backup directory is created on first use. An existing file with the
    /// same name is never overwritten.
    pub async fn relocate(path: &Path, backup_dir: &Path) -> Result<PathBuf, NormalizeError> {
        fs::create_dir_all(backup_dir).await?;

        let file_name = path
            .file_name()
            .ok_or_else(|| NormalizeError::InvalidPath(path.to_path_buf()))?;
        let target = Self::unique_backup_path(&backup_dir.join(file_name), unix_now());

        debug!("Moving {} -> {}", path.display(), target.display());
        match fs::rename(path, &target).await {
            Ok(()) => Ok(target),
            Err(e) if is_cross_device(&e) => {
                fs::copy(path, &target).await?;
                if let Err(e) = fs::remove_file(path).await {
                    let _ = fs::remove_file(&target).await;
                    return Err(e.into());
                }
                Ok(target)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// First free name for `candidate`: as is, then `<stem>_<stamp>.<ext>`,
    /// then `<stem>_<stamp>_<n>.<ext>`
    pub fn unique_backup_path(candidate: &Path, stamp: u64) -> PathBuf {
        if !candidate.exists() {
            return candidate.to_path_buf();
        }

        let stem = candidate
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = candidate
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let stamped = candidate.with_file_name(format!("{}_{}{}", stem, stamp, ext));
        if !stamped.exists() {
            return stamped;
        }

        (1u64..)
            .map(|n| candidate.with_file_name(format!("{}_{}_{}{}", stem, stamp, n, ext)))
            .find(|path| !path.exists())
            .unwrap_or(stamped)
    }

    /// Delete `path` only if its converted sibling exists.
    ///
    /// Returns `Ok(false)` and leaves the file untouched when there is no
    /// converted counterpart.
    pub async fn cleanup(path: &Path, converted_extension: &str) -> Result<bool, NormalizeError> {
        let converted = Self::sibling_with_extension(path, converted_extension)?;

        if !fs::metadata(&converted).await.map(|m| m.is_file()).unwrap_or(false) {
            warn!(
                "⚠️ {} not found for {}. File kept.",
                converted.display(),
                path.display()
            );
            return Ok(false);
        }

        fs::remove_file(path).await?;
        Ok(true)
    }

    /// Size of a file, 0 if it cannot be read
    pub async fn file_size(path: &Path) -> u64 {
        fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn is_cross_device(err: &std::io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    #[cfg(windows)]
    const CROSS_DEVICE: i32 = 17;
    // EXDEV
    #[cfg(not(windows))]
    const CROSS_DEVICE: i32 = 18;

    err.raw_os_error() == Some(CROSS_DEVICE)
}
