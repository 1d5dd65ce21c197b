//! Worksheet with a bounded in-memory row window that spills to disk

use super::xml_writer::XmlWriter;
use crate::error::{ExportError, Result};
use crate::types::{push_column_letter, CellStyle, CellValue};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::ops::RangeInclusive;

const WORKSHEET_START: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#;

/// Row kept in memory until it is spilled or serialized
#[derive(Debug)]
struct BufferedRow {
    offset: u32,
    style: Option<CellStyle>,
    cells: Vec<(u16, CellValue, CellStyle)>,
}

impl BufferedRow {
    fn new(offset: u32) -> Self {
        BufferedRow {
            offset,
            style: None,
            cells: Vec::new(),
        }
    }

    fn set_cell(&mut self, column: u16, value: &CellValue, style: CellStyle) {
        match self.cells.binary_search_by_key(&column, |(c, _, _)| *c) {
            Ok(i) => self.cells[i] = (column, value.clone(), style),
            Err(i) => self.cells.insert(i, (column, value.clone(), style)),
        }
    }
}

/// Worksheet that streams rows through a window of at most `flush_threshold` rows.
///
/// Rows must be created in increasing offset order. Once a row leaves the window it is
/// rendered as XML into a temp file and can no longer be modified.
pub struct SpillWorksheet {
    name: String,
    window: VecDeque<BufferedRow>,
    spill: Option<XmlWriter<File>>,
    flush_threshold: usize,
    max_rows: u32,
    last_offset: Option<u32>,
    row_count: u32,
    spilled_rows: u32,
    merges: Vec<(RangeInclusive<u32>, RangeInclusive<u16>)>,
}

impl SpillWorksheet {
    pub fn new(name: &str, flush_threshold: usize, max_rows: u32) -> Self {
        SpillWorksheet {
            name: name.to_string(),
            window: VecDeque::with_capacity(flush_threshold.clamp(1, 4096)),
            spill: None,
            flush_threshold: flush_threshold.max(1),
            max_rows,
            last_offset: None,
            row_count: 0,
            spilled_rows: 0,
            merges: Vec::new(),
        }
    }

    /// Rows created in this sheet
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Rows currently held in memory
    pub fn buffered_rows(&self) -> usize {
        self.window.len()
    }

    /// Rows already rendered to the spill file
    pub fn spilled_rows(&self) -> u32 {
        self.spilled_rows
    }

    pub fn create_row(&mut self, offset: u32) -> Result<()> {
        if offset >= self.max_rows {
            return Err(ExportError::SheetCapacityExceeded {
                sheet: self.name.clone(),
                offset,
                max_rows: self.max_rows,
            });
        }
        if matches!(self.last_offset, Some(last) if offset <= last) {
            return Err(self.not_writable(offset));
        }

        while self.window.len() >= self.flush_threshold {
            self.spill_oldest()?;
        }

        self.window.push_back(BufferedRow::new(offset));
        self.last_offset = Some(offset);
        self.row_count += 1;
        Ok(())
    }

    pub fn set_row_style(&mut self, offset: u32, style: CellStyle) -> Result<()> {
        self.row_mut(offset)?.style = Some(style);
        Ok(())
    }

    pub fn write_cell(
        &mut self,
        offset: u32,
        column: u16,
        value: &CellValue,
        style: CellStyle,
    ) -> Result<()> {
        self.row_mut(offset)?.set_cell(column, value, style);
        Ok(())
    }

    pub fn merge(&mut self, rows: RangeInclusive<u32>, columns: RangeInclusive<u16>) -> Result<()> {
        if rows.is_empty() || columns.is_empty() || *rows.end() >= self.max_rows {
            return Err(ExportError::WriteError(format!(
                "invalid merge region rows {:?}, columns {:?} in sheet '{}'",
                rows, columns, self.name
            )));
        }
        self.merges.push((rows, columns));
        Ok(())
    }

    fn row_mut(&mut self, offset: u32) -> Result<&mut BufferedRow> {
        match self.window.binary_search_by_key(&offset, |row| row.offset) {
            Ok(i) => Ok(&mut self.window[i]),
            Err(_) => Err(self.not_writable(offset)),
        }
    }

    fn not_writable(&self, offset: u32) -> ExportError {
        ExportError::RowNotWritable {
            sheet: self.name.clone(),
            offset,
        }
    }

    fn spill_oldest(&mut self) -> Result<()> {
        let Some(row) = self.window.pop_front() else {
            return Ok(());
        };

        if self.spill.is_none() {
            log::debug!(
                "sheet '{}' exceeded {} buffered rows, spilling to disk",
                self.name,
                self.flush_threshold
            );
            self.spill = Some(XmlWriter::new(tempfile::tempfile()?));
        }
        if let Some(spill) = self.spill.as_mut() {
            write_row(spill, &row)?;
        }
        self.spilled_rows += 1;
        Ok(())
    }

    /// Render the complete worksheet part: spilled rows first, then the in-memory window
    pub fn write_xml<W: Write>(self, xml: &mut XmlWriter<W>) -> Result<()> {
        xml.write_str(WORKSHEET_START)?;

        if self.row_count == 0 {
            xml.write_str("<sheetData/>")?;
        } else {
            xml.write_str("<sheetData>")?;
            if let Some(spill) = self.spill {
                let mut file = spill.into_inner()?;
                file.seek(SeekFrom::Start(0))?;
                xml.copy_from(&mut file)?;
            }
            for row in &self.window {
                write_row(xml, row)?;
            }
            xml.write_str("</sheetData>")?;
        }

        if !self.merges.is_empty() {
            xml.start_element("mergeCells")?;
            xml.attribute_int("count", self.merges.len())?;
            xml.close_start_tag()?;
            for (rows, columns) in &self.merges {
                xml.start_element("mergeCell")?;
                xml.write_raw(b" ref=\"")?;
                write_reference(xml, *rows.start(), *columns.start())?;
                xml.write_raw(b":")?;
                write_reference(xml, *rows.end(), *columns.end())?;
                xml.write_raw(b"\"")?;
                xml.close_empty_element()?;
            }
            xml.end_element("mergeCells")?;
        }

        xml.end_element("worksheet")
    }
}

fn write_reference<W: Write>(xml: &mut XmlWriter<W>, offset: u32, column: u16) -> Result<()> {
    let mut letters = Vec::with_capacity(3);
    push_column_letter(&mut letters, column);
    xml.write_raw(&letters)?;
    xml.write_int(u64::from(offset) + 1)
}

fn write_row<W: Write>(xml: &mut XmlWriter<W>, row: &BufferedRow) -> Result<()> {
    xml.start_element("row")?;
    xml.attribute_int("r", u64::from(row.offset) + 1)?;
    if let Some(style) = row.style.filter(|s| s.index() > 0) {
        xml.attribute_int("s", style.index())?;
        xml.attribute("customFormat", "1")?;
    }
    xml.close_start_tag()?;

    for (column, value, style) in &row.cells {
        xml.write_raw(b"<c r=\"")?;
        write_reference(xml, row.offset, *column)?;
        xml.write_raw(b"\"")?;
        if style.index() > 0 {
            xml.attribute_int("s", style.index())?;
        }

        match value {
            CellValue::Empty => xml.close_empty_element()?,
            CellValue::Number(n) => {
                xml.write_raw(b"><v>")?;
                xml.write_int(*n)?;
                xml.write_raw(b"</v></c>")?;
            }
            CellValue::Text(s) => {
                xml.write_raw(b" t=\"inlineStr\"><is>")?;
                if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
                    xml.write_raw(b"<t xml:space=\"preserve\">")?;
                } else {
                    xml.write_raw(b"<t>")?;
                }
                xml.write_escaped(s)?;
                xml.write_raw(b"</t></is></c>")?;
            }
        }
    }

    xml.end_element("row")
}
