use std::path::Path;

use anyhow::Result;
use recalldb_core::config::ExtractSettings;
use recalldb_core::traits::TextExtractor;

use crate::command::CommandExtractor;
use crate::plain::PlainTextExtractor;

/// The kinds of source file we know how to turn into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    PlainText,
    Image,
    Audio,
}

const EXTENSIONS: &[(ExtractorKind, &[&str])] = &[
    (ExtractorKind::PlainText, &["txt", "md"]),
    (ExtractorKind::Image, &["png", "jpg", "jpeg"]),
    (ExtractorKind::Audio, &["mp3", "wav", "m4a"]),
];

impl ExtractorKind {
    /// Kind for a path by (case-insensitive) extension.
    pub fn for_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(_, exts)| exts.contains(&ext.as_str()))
            .map(|(kind, _)| *kind)
    }

    pub fn extensions(self) -> &'static [&'static str] {
        EXTENSIONS
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, exts)| *exts)
            .unwrap_or(&[])
    }
}

/// Dispatch table from extractor kind to implementation, built once at startup.
/// Image and audio are only available when a command is configured for them.
pub struct ExtractorRegistry {
    plain: PlainTextExtractor,
    image: Option<CommandExtractor>,
    audio: Option<CommandExtractor>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self { plain: PlainTextExtractor, image: None, audio: None }
    }
}

impl ExtractorRegistry {
    /// Plain text only.
    pub fn text_only() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &ExtractSettings) -> Result<Self> {
        let image = settings.image_command.as_deref().map(CommandExtractor::parse).transpose()?;
        let audio = settings.audio_command.as_deref().map(CommandExtractor::parse).transpose()?;
        Ok(Self { plain: PlainTextExtractor, image, audio })
    }

    pub fn get(&self, kind: ExtractorKind) -> Option<&dyn TextExtractor> {
        match kind {
            ExtractorKind::PlainText => Some(&self.plain),
            ExtractorKind::Image => self.image.as_ref().map(|e| e as &dyn TextExtractor),
            ExtractorKind::Audio => self.audio.as_ref().map(|e| e as &dyn TextExtractor),
        }
    }

    /// Extractor for a path, `None` for unsupported or unconfigured kinds.
    pub fn for_path(&self, path: &Path) -> Option<&dyn TextExtractor> {
        self.get(ExtractorKind::for_path(path)?)
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }

    /// Extensions this registry can currently handle, sorted.
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = EXTENSIONS
            .iter()
            .filter(|(kind, _)| self.get(*kind).is_some())
            .flat_map(|(_, exts)| exts.iter().copied())
            .collect();
        out.sort_unstable();
        out
    }
}
