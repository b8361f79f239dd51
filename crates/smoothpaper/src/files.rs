//! Wallpaper discovery: expand the configured sources and scan directories
//! recursively for files with an accepted image extension.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use paperconfig::WallpaperSource;

use crate::paths::expand_tilde;

/// Extensions the decoder is expected to handle, matched case-insensitively.
const ACCEPTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

fn has_accepted_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lowered = ext.to_ascii_lowercase();
            ACCEPTED_EXTENSIONS.contains(&lowered.as_str())
        })
        .unwrap_or(false)
}

fn scan_directory(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read wallpaper directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            scan_directory(&path, found)?;
        } else if has_accepted_extension(&path) {
            found.push(path);
        }
    }
    Ok(())
}

/// Resolves the configured wallpaper sources into a concrete file list.
///
/// Directories are scanned recursively; plain files are taken as-is when
/// their extension is accepted. The result is sorted so the pre-shuffle
/// order is stable across runs.
pub fn collect_wallpapers(source: &WallpaperSource, home: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for raw in source.paths() {
        let path = expand_tilde(&raw, home);
        if path.is_dir() {
            scan_directory(&path, &mut found)?;
        } else if has_accepted_extension(&path) {
            found.push(path);
        } else {
            tracing::warn!(path = %path.display(), "ignoring wallpaper source without an accepted extension");
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}
