//! Excel roster reader using calamine
//!
//! Reads entity names from the first column of a worksheet (XLSX, XLS).

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::{normalize_name, ParserError, Result, RosterFormat, RosterReader};

/// Excel roster reader
pub struct ExcelRosterReader {
    /// Sheet to read (None = first sheet)
    sheet: Option<String>,
    /// Column index holding entity names
    column: usize,
    /// Whether to skip the first row as a header
    skip_header: bool,
}

impl ExcelRosterReader {
    /// First column of the first sheet, no header row
    pub fn new() -> Self {
        Self {
            sheet: None,
            column: 0,
            skip_header: false,
        }
    }

    /// Convert a Data cell to string
    fn cell_to_string(cell: &Data) -> String {
        match cell {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            Data::Float(f) => {
                // Integral floats read back without the decimal part
                if f.fract() == 0.0 {
                    format!("{}", *f as i64)
                } else {
                    format!("{f}")
                }
            }
            Data::Int(i) => format!("{i}"),
            Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            // Error cells carry no name
            Data::Error(_) => String::new(),
            Data::DateTime(dt) => format!("{dt}"),
            Data::DateTimeIso(s) => s.clone(),
            Data::DurationIso(s) => s.clone(),
        }
    }

    /// Collect names from worksheet rows
    fn names_from_rows<'a, I>(&self, rows: I) -> Vec<String>
    where
        I: Iterator<Item = &'a [Data]>,
    {
        rows.skip(usize::from(self.skip_header))
            .filter_map(|row| row.get(self.column))
            .filter_map(|cell| normalize_name(&Self::cell_to_string(cell)))
            .collect()
    }
}

impl Default for ExcelRosterReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterReader for ExcelRosterReader {
    fn read_names(&self, path: &Path) -> Result<Vec<String>> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| ParserError::ExcelError(e.to_string()))?;

        let sheet_name = match &self.sheet {
            Some(name) => name.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| ParserError::EmptyWorkbook(path.display().to_string()))?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ParserError::ExcelError(format!("{sheet_name}: {e}")))?;

        Ok(self.names_from_rows(range.rows()))
    }

    fn supported_formats(&self) -> &[RosterFormat] {
        &[RosterFormat::Xlsx, RosterFormat::Xls]
    }
}
