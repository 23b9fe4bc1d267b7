//! KCrawl Parser - Roster and corpus document loading
//!
//! Supports reading entity rosters from:
//! - Microsoft Excel (XLSX, XLS): first column of the first sheet
//! - CSV: first field of each line
//! - Plain text: one name per line
//!
//! and reading plain-text/Markdown documents for local corpus retrieval.

use std::path::{Path, PathBuf};

use kcrawl_core::{KcError, Roster, RosterSource};
use thiserror::Error;

pub mod corpus;
pub mod excel;
pub mod text;

pub use corpus::{read_corpus, CorpusDocument};
pub use excel::ExcelRosterReader;
pub use text::TextRosterReader;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading rosters and documents
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Excel parsing error
    #[error("Excel parsing error: {0}")]
    ExcelError(String),

    /// Workbook has no readable sheet
    #[error("Workbook has no sheets: {0}")]
    EmptyWorkbook(String),
}

pub type Result<T> = std::result::Result<T, ParserError>;

impl From<ParserError> for KcError {
    fn from(err: ParserError) -> Self {
        KcError::RosterError(err.to_string())
    }
}

// ============================================================================
// Roster formats
// ============================================================================

/// Supported roster file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterFormat {
    Xlsx,
    Xls,
    Csv,
    PlainText,
    Unknown,
}

impl RosterFormat {
    /// Detect format from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "xlsx" | "xlsm" => Self::Xlsx,
            "xls" => Self::Xls,
            "csv" => Self::Csv,
            "txt" | "lst" => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Detect format from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }
}

impl std::fmt::Display for RosterFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xlsx => write!(f, "xlsx"),
            Self::Xls => write!(f, "xls"),
            Self::Csv => write!(f, "csv"),
            Self::PlainText => write!(f, "txt"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Trait for format-specific roster readers
pub trait RosterReader: Send + Sync {
    /// Read entity names in source order
    fn read_names(&self, path: &Path) -> Result<Vec<String>>;

    /// Formats this reader handles
    fn supported_formats(&self) -> &[RosterFormat];

    fn can_read(&self, format: RosterFormat) -> bool {
        self.supported_formats().contains(&format)
    }
}

// ============================================================================
// Roster loader
// ============================================================================

/// Roster source backed by a file on disk, dispatching on its extension
pub struct FileRosterSource {
    path: PathBuf,
    readers: Vec<Box<dyn RosterReader>>,
}

impl FileRosterSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            readers: vec![
                Box::new(ExcelRosterReader::new()),
                Box::new(TextRosterReader::new()),
            ],
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name recorded as `source_file` on every record
    pub fn source_file(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Load the roster, reporting parser errors directly
    pub fn load(&self) -> Result<Roster> {
        let format = RosterFormat::from_path(&self.path);
        let reader = self
            .readers
            .iter()
            .find(|r| r.can_read(format))
            .ok_or_else(|| ParserError::UnsupportedFormat(self.path.display().to_string()))?;

        tracing::info!(path = %self.path.display(), %format, "Loading entity roster");
        let names = reader.read_names(&self.path)?;
        tracing::info!(count = names.len(), "Loaded entity roster");

        Ok(Roster::new(self.source_file(), names))
    }
}

impl RosterSource for FileRosterSource {
    fn load_roster(&self) -> kcrawl_core::Result<Roster> {
        Ok(self.load()?)
    }
}

/// Normalize a raw cell/line into a roster name; blank entries are dropped
pub(crate) fn normalize_name(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches('\u{feff}').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_detection() {
        assert_eq!(RosterFormat::from_extension("XLSX"), RosterFormat::Xlsx);
        assert_eq!(RosterFormat::from_extension("xls"), RosterFormat::Xls);
        assert_eq!(RosterFormat::from_extension("csv"), RosterFormat::Csv);
        assert_eq!(
            RosterFormat::from_path(Path::new("/data/大渡河知识实体.txt")),
            RosterFormat::PlainText
        );
        assert_eq!(
            RosterFormat::from_path(Path::new("roster")),
            RosterFormat::Unknown
        );
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  水库调度 \r"), Some("水库调度".to_string()));
        assert_eq!(normalize_name("\u{feff}重力坝"), Some("重力坝".to_string()));
        assert_eq!(normalize_name("   "), None);
    }

    #[test]
    fn test_file_roster_source_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "重力坝\n\n水库调度").unwrap();

        let source = FileRosterSource::new(&path);
        let roster = source.load_roster().unwrap();

        assert_eq!(roster.source_file, "entities.txt");
        assert_eq!(roster.names, vec!["重力坝", "水库调度"]);
    }

    #[test]
    fn test_unsupported_format() {
        let source = FileRosterSource::new("entities.json");
        let err = source.load().unwrap_err();
        assert!(matches!(err, ParserError::UnsupportedFormat(_)));

        let err: KcError = err.into();
        assert!(matches!(err, KcError::RosterError(_)));
    }

    #[test]
    fn test_missing_file_is_error() {
        let source = FileRosterSource::new("/nonexistent/entities.txt");
        assert!(matches!(
            source.load().unwrap_err(),
            ParserError::IoError { .. }
        ));
    }
}
