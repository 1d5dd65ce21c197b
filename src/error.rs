//! Error types for tablestream

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Main error type for all export operations
#[derive(Error, Debug)]
pub enum ExportError {
    /// The output target could not be opened
    #[error("Failed to open output '{}': {source}", path.display())]
    SinkUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A data operation was called before the schema was declared
    #[error("Workbook is not initialized; declare the schema first")]
    WorkbookNotInitialized,

    /// The row offset is past the sheet's row ceiling.
    ///
    /// The exporter recovers from this by rotating to a new sheet.
    #[error("Sheet '{sheet}' is full: row offset {offset} exceeds the {max_rows} row limit")]
    SheetCapacityExceeded {
        sheet: String,
        offset: u32,
        max_rows: u32,
    },

    /// Row was already created or already flushed to disk
    #[error("Row {offset} of sheet '{sheet}' is not writable (already created or flushed)")]
    RowNotWritable { sheet: String, offset: u32 },

    /// Sheet name rejected by the document format
    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    /// Sheet name already used in this document
    #[error("Sheet '{0}' already exists")]
    DuplicateSheet(String),

    /// Column index past the format's column limit
    #[error("Column {0} is out of range (max {max})", max = crate::document::MAX_COLUMNS - 1)]
    ColumnOutOfRange(usize),

    /// Sheet handle does not belong to this document
    #[error("Unknown sheet id {0}")]
    UnknownSheet(usize),

    /// The sink was already released by a previous close
    #[error("Output sink is already closed")]
    SinkClosed,

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error occurred while writing the document container
    #[error("Failed to write document: {0}")]
    WriteError(String),
}

impl ExportError {
    /// True for the capacity signal that triggers sheet rotation
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, ExportError::SheetCapacityExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ExportError::SheetCapacityExceeded {
            sheet: "Sheet_1".to_string(),
            offset: 10,
            max_rows: 10,
        };
        assert!(err.is_capacity_exceeded());
        assert!(err.to_string().contains("Sheet_1"));

        let err = ExportError::SinkUnavailable {
            path: PathBuf::from("/nope/out.xlsx"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(!err.is_capacity_exceeded());
        assert!(err.to_string().contains("/nope/out.xlsx"));
    }
}
