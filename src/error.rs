use std::path::PathBuf;
use thiserror::Error;

/// Structural failures of the ingestion boundary.
///
/// Per-row and per-cell problems never show up here: they degrade to
/// `None`, a fallback enumeration value, or a dropped row.
#[derive(Error, Debug)]
pub enum ReportError {
    /// A workbook file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV sheet could not be parsed.
    #[error("Failed to parse CSV: {0}")]
    CsvParse(#[from] csv::Error),

    /// A JSON workbook could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// An Excel workbook could not be opened or decoded.
    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(calamine::Error),

    /// The input path is neither a directory of sheets nor a spreadsheet,
    /// `.csv` or `.json` file.
    #[error("Unsupported workbook source: {0}")]
    UnsupportedSource(PathBuf),

    /// No sheet label carried a month and year, or no row passed acceptance.
    #[error("No valid data found in {sheets} sheet(s); sheet names must look like 'Jan 2025' and column A must hold IDs")]
    NoValidData { sheets: usize },

    /// Pass-through for raw I/O errors that do not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReportError>;
