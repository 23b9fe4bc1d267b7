//! Plain text and CSV roster reader

use std::path::Path;

use crate::{normalize_name, ParserError, Result, RosterFormat, RosterReader};

/// Reads one entity name per line; for CSV the first field is used.
///
/// Lines starting with `#` are comments.
#[derive(Debug, Clone, Default)]
pub struct TextRosterReader;

impl TextRosterReader {
    pub fn new() -> Self {
        Self
    }

    /// Extract names from file content
    pub fn parse_content(&self, content: &str, format: RosterFormat) -> Vec<String> {
        content
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .filter_map(|line| match format {
                RosterFormat::Csv => normalize_name(first_csv_field(line)),
                _ => normalize_name(line),
            })
            .collect()
    }
}

/// First CSV field, with surrounding double quotes removed
fn first_csv_field(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('"') {
        return rest.split('"').next().unwrap_or("");
    }
    line.split(',').next().unwrap_or("")
}

impl RosterReader for TextRosterReader {
    fn read_names(&self, path: &Path) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(self.parse_content(&content, RosterFormat::from_path(path)))
    }

    fn supported_formats(&self) -> &[RosterFormat] {
        &[RosterFormat::Csv, RosterFormat::PlainText]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_lines() {
        let reader = TextRosterReader::new();
        let names = reader.parse_content(
            "# 大渡河知识实体\n重力坝\n\n  水库调度  \n重力坝\n",
            RosterFormat::PlainText,
        );
        // Duplicates are kept in order
        assert_eq!(names, vec!["重力坝", "水库调度", "重力坝"]);
    }

    #[test]
    fn test_csv_first_field() {
        let reader = TextRosterReader::new();
        let names = reader.parse_content(
            "重力坝,dam\n\"水库调度, 联合\",process\n,empty\n",
            RosterFormat::Csv,
        );
        assert_eq!(names, vec!["重力坝", "水库调度, 联合"]);
    }

    #[test]
    fn test_empty_file() {
        let reader = TextRosterReader::new();
        assert!(reader.parse_content("", RosterFormat::PlainText).is_empty());
        assert!(reader
            .parse_content("# only a comment\n\n", RosterFormat::PlainText)
            .is_empty());
    }
}
