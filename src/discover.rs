//! One-shot folder discovery.
//!
//! Scans a directory for encrypted audio files and produces the
//! (name, path, size) tuples the queue consumes. Extension filtering
//! happens here, at the boundary; the queue never inspects extensions
//! itself.

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::DiscoveredFile;

/// True when the path carries one of the admitted extensions
/// (case-insensitive)
pub(crate) fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Build a discovery record for one on-disk file
pub(crate) fn discovered_file(path: &Path, size: u64) -> DiscoveredFile {
    DiscoveredFile {
        name: path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned(),
        path: path.to_path_buf(),
        size,
    }
}

/// Scan a directory (non-recursive) for files carrying the admitted
/// extensions. Results are sorted by name so the queue order is stable.
pub async fn scan_folder(path: &Path, extensions: &[String]) -> Result<Vec<DiscoveredFile>> {
    let mut found = Vec::new();

    let mut entries = tokio::fs::read_dir(path)
        .await
        .with_context(|| format!("Failed to read folder: {}", path.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let entry_path = entry.path();

        if !matches_extension(&entry_path, extensions) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(_) => continue,
        };

        if !metadata.is_file() {
            continue;
        }

        found.push(discovered_file(&entry_path, metadata.len()));
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(found)
}
