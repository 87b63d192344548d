use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use recalldb_core::traits::TextExtractor;

const PATH_PLACEHOLDER: &str = "{path}";

/// Runs an external tool (OCR, speech-to-text) and takes its stdout as the text.
///
/// The command line is split on whitespace; `{path}` is replaced by the file
/// path, or the path is appended when no placeholder is present.
/// e.g. `tesseract {path} stdout -l pol+eng`
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
}

impl CommandExtractor {
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else { bail!("empty extractor command") };
        let mut args: Vec<String> = parts.collect();
        if !args.iter().any(|a| a.contains(PATH_PLACEHOLDER)) {
            args.push(PATH_PLACEHOLDER.to_string());
        }
        Ok(Self { program, args })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn args_for(&self, path: &Path) -> Vec<String> {
        let p = path.to_string_lossy();
        self.args.iter().map(|a| a.replace(PATH_PLACEHOLDER, &p)).collect()
    }
}

impl TextExtractor for CommandExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let output = Command::new(&self.program)
            .args(self.args_for(path))
            .output()
            .with_context(|| format!("failed to run {}", self.program))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} exited with {}: {}", self.program, output.status, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_path_without_placeholder() {
        let cmd = CommandExtractor::parse("whisper --language pl").unwrap();
        assert_eq!(cmd.program(), "whisper");
        assert_eq!(cmd.args_for(Path::new("/a/b.mp3")), vec!["--language", "pl", "/a/b.mp3"]);
    }

    #[test]
    fn substitutes_placeholder() {
        let cmd = CommandExtractor::parse("tesseract {path} stdout").unwrap();
        assert_eq!(cmd.args_for(Path::new("x.png")), vec!["x.png", "stdout"]);
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandExtractor::parse("   ").is_err());
    }
}
