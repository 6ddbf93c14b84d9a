pub mod letter;
pub mod xlsx;

use std::path::{Path, PathBuf};

use crate::config::{AssetsConfig, LetterTemplate, OutputFormat};
use crate::error::RenderError;
use crate::parser::ParsedRecord;
use crate::secrets::expand_home;

pub use letter::LetterRenderer;
pub use xlsx::TabularRenderer;

/// A rendered document on disk, next to its source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentArtifact {
    pub path: PathBuf,
    pub format: OutputFormat,
}

/// Optional images used by the letter layout. A slot whose path is unset or
/// does not point at an existing file renders blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateAssets {
    pub left_logo: Option<PathBuf>,
    pub right_logo: Option<PathBuf>,
    pub footer: Option<PathBuf>,
}

impl TemplateAssets {
    pub fn from_config(assets: &AssetsConfig) -> Self {
        fn to_path(value: &Option<String>) -> Option<PathBuf> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| PathBuf::from(expand_home(v)))
        }

        Self {
            left_logo: to_path(&assets.left_logo),
            right_logo: to_path(&assets.right_logo),
            footer: to_path(&assets.footer),
        }
    }

    /// Returns the path only if it resolves to an existing regular file.
    pub fn resolve(slot: Option<&Path>) -> Option<&Path> {
        slot.filter(|p| p.is_file())
    }
}

pub trait DocumentRenderer: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// Renders `record` into a new file derived from `source`, replacing any
    /// file already at that path.
    fn render(
        &self,
        record: &ParsedRecord,
        assets: Option<&TemplateAssets>,
        source: &Path,
    ) -> Result<DocumentArtifact, RenderError>;
}

/// Picks the renderer for the configured format.
pub fn renderer_for(format: OutputFormat, template: &LetterTemplate) -> Box<dyn DocumentRenderer> {
    match format {
        OutputFormat::Tabular => Box::new(TabularRenderer::new()),
        OutputFormat::Letter => Box::new(LetterRenderer::new(template.clone())),
    }
}

/// Same directory and base name as `source`, with the format's extension.
pub fn artifact_path(source: &Path, format: OutputFormat) -> Result<PathBuf, RenderError> {
    if source.file_name().is_none() {
        return Err(RenderError::InvalidSourcePath(source.to_path_buf()));
    }
    Ok(source.with_extension(format.extension()))
}

pub(crate) fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), RenderError> {
    std::fs::write(path, bytes).map_err(|e| RenderError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}
