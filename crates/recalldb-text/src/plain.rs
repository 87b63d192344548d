use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use recalldb_core::traits::TextExtractor;

/// Reads the file as UTF-8, falling back to lossy decoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(_) => {
                let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
                Ok(String::from_utf8_lossy(&bytes).to_string())
            }
        }
    }
}
