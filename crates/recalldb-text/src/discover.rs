use std::path::{Path, PathBuf};

use tracing::debug;

use crate::registry::ExtractorRegistry;

/// All files under `root` that `registry` can extract, sorted by path.
pub fn list_documents(root: &Path, registry: &ExtractorRegistry) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if registry.supports(path) {
            files.push(path.to_path_buf());
        } else {
            debug!(path = %path.display(), "skipping unsupported file");
        }
    }
    files.sort();
    files
}
