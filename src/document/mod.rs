//! Document writers the exporter streams rows into
//!
//! [`DocumentWriter`] is the seam between the exporter (cursor, rotation, coercion) and a
//! concrete container format. [`XlsxWorkbook`] is the XLSX implementation:
//! - each sheet keeps at most `flush_threshold` rows in memory
//! - older rows are rendered to an anonymous temp file per sheet
//! - the package is compressed straight into the caller's sink at serialization time

pub mod memory;
pub mod streaming_zip_writer;
pub mod workbook;
pub mod worksheet;
pub mod xml_writer;

#[cfg(test)]
pub(crate) mod recording;

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::types::{CellStyle, CellValue};
use std::io::Write;
use std::ops::RangeInclusive;

pub use memory::MemoryProfile;
pub use streaming_zip_writer::StreamingZipWriter;
pub use workbook::XlsxWorkbook;
pub use worksheet::SpillWorksheet;

/// Column count limit of an XLSX worksheet
pub const MAX_COLUMNS: usize = 16_384;

/// Handle to a sheet inside one document (creation index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SheetId(pub usize);

/// Handle to a created row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowRef {
    pub sheet: SheetId,
    pub offset: u32,
}

/// Capability the exporter needs from a spreadsheet container.
///
/// Rows are created at explicit offsets; creating a row at or past the sheet's capacity
/// fails with [`ExportError::SheetCapacityExceeded`], which the exporter treats as the
/// signal to rotate.
pub trait DocumentWriter: Sized {
    /// Create an empty document
    fn create(config: &ExportConfig) -> Result<Self>;

    /// Append a sheet
    fn create_sheet(&mut self, name: &str) -> Result<SheetId>;

    /// Create a row at `offset` (0-based) in `sheet`
    fn create_row(&mut self, sheet: SheetId, offset: u32) -> Result<RowRef>;

    /// Apply a default style to the whole row
    fn set_row_style(&mut self, row: RowRef, style: CellStyle) -> Result<()>;

    /// Create the cell at `column`, set its style and value
    fn write_cell(
        &mut self,
        row: RowRef,
        column: u16,
        value: &CellValue,
        style: CellStyle,
    ) -> Result<()>;

    /// Merge a rectangular region of a sheet
    fn merge_region(
        &mut self,
        sheet: SheetId,
        rows: RangeInclusive<u32>,
        columns: RangeInclusive<u16>,
    ) -> Result<()>;

    /// Sheet names in creation order
    fn sheet_names(&self) -> Vec<String>;

    /// Write the whole document (all sheets, in creation order) to `sink`
    fn serialize<W: Write>(self, sink: W) -> Result<()>;
}

/// Convert a 0-based column position to the writer's column index
pub fn column_index(position: usize) -> Result<u16> {
    if position >= MAX_COLUMNS {
        return Err(ExportError::ColumnOutOfRange(position));
    }
    // MAX_COLUMNS fits in u16
    Ok(position as u16)
}
