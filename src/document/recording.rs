//! In-memory document writer used to test exporter logic without a container format

use super::{DocumentWriter, RowRef, SheetId};
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::types::{CellStyle, CellValue};
use std::io::Write;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedRow {
    pub offset: u32,
    pub style: Option<CellStyle>,
    pub cells: Vec<(u16, CellValue, CellStyle)>,
}

impl RecordedRow {
    pub fn values(&self) -> Vec<CellValue> {
        self.cells.iter().map(|(_, v, _)| v.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedSheet {
    pub name: String,
    pub rows: Vec<RecordedRow>,
    pub merges: Vec<(RangeInclusive<u32>, RangeInclusive<u16>)>,
}

/// Keeps every call in memory; serializes as one tab-separated line per row
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordingDocument {
    pub sheets: Vec<RecordedSheet>,
    pub max_rows: u32,
}

impl RecordingDocument {
    fn row_mut(&mut self, row: RowRef) -> Result<&mut RecordedRow> {
        let sheet = self
            .sheets
            .get_mut(row.sheet.0)
            .ok_or(ExportError::UnknownSheet(row.sheet.0))?;
        let name = sheet.name.clone();
        sheet
            .rows
            .iter_mut()
            .find(|r| r.offset == row.offset)
            .ok_or(ExportError::RowNotWritable {
                sheet: name,
                offset: row.offset,
            })
    }

    /// Data rows across all sheets, i.e. rows without a row style
    pub fn data_rows(&self) -> Vec<&RecordedRow> {
        self.sheets
            .iter()
            .flat_map(|s| s.rows.iter())
            .filter(|r| r.style.is_none())
            .collect()
    }
}

impl DocumentWriter for RecordingDocument {
    fn create(config: &ExportConfig) -> Result<Self> {
        Ok(RecordingDocument {
            sheets: Vec::new(),
            max_rows: config.clone().normalized().max_rows,
        })
    }

    fn create_sheet(&mut self, name: &str) -> Result<SheetId> {
        if self.sheets.iter().any(|s| s.name == name) {
            return Err(ExportError::DuplicateSheet(name.to_string()));
        }
        self.sheets.push(RecordedSheet {
            name: name.to_string(),
            rows: Vec::new(),
            merges: Vec::new(),
        });
        Ok(SheetId(self.sheets.len() - 1))
    }

    fn create_row(&mut self, sheet: SheetId, offset: u32) -> Result<RowRef> {
        let max_rows = self.max_rows;
        let recorded = self
            .sheets
            .get_mut(sheet.0)
            .ok_or(ExportError::UnknownSheet(sheet.0))?;
        if offset >= max_rows {
            return Err(ExportError::SheetCapacityExceeded {
                sheet: recorded.name.clone(),
                offset,
                max_rows,
            });
        }
        recorded.rows.push(RecordedRow {
            offset,
            style: None,
            cells: Vec::new(),
        });
        Ok(RowRef { sheet, offset })
    }

    fn set_row_style(&mut self, row: RowRef, style: CellStyle) -> Result<()> {
        self.row_mut(row)?.style = Some(style);
        Ok(())
    }

    fn write_cell(
        &mut self,
        row: RowRef,
        column: u16,
        value: &CellValue,
        style: CellStyle,
    ) -> Result<()> {
        self.row_mut(row)?.cells.push((column, value.clone(), style));
        Ok(())
    }

    fn merge_region(
        &mut self,
        sheet: SheetId,
        rows: RangeInclusive<u32>,
        columns: RangeInclusive<u16>,
    ) -> Result<()> {
        self.sheets
            .get_mut(sheet.0)
            .ok_or(ExportError::UnknownSheet(sheet.0))?
            .merges
            .push((rows, columns));
        Ok(())
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn serialize<W: Write>(self, mut sink: W) -> Result<()> {
        for sheet in &self.sheets {
            writeln!(sink, "[{}]", sheet.name)?;
            for row in &sheet.rows {
                let values: Vec<String> = row.values().iter().map(|v| v.to_string()).collect();
                writeln!(sink, "{}\t{}", row.offset, values.join("\t"))?;
            }
        }
        Ok(())
    }
}
