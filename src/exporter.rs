//! Streaming table export with automatic sheet rotation
//!
//! The exporter owns the write cursor and the sheet sequence; the document writer owns
//! the rows. When a sheet is full the writer refuses the row, the exporter opens
//! `<base>_<n+1>` and retries the same row there, so one `write_rows` call can span any
//! number of sheets without losing or duplicating rows.

use crate::config::ExportConfig;
use crate::document::{column_index, DocumentWriter, MemoryProfile, SheetId, XlsxWorkbook};
use crate::error::{ExportError, Result};
use crate::types::{CellStyle, CellValue};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Style shared by the title, header and data cells
const SHARED_STYLE: CellStyle = CellStyle::CenteredWrap;

/// Mutable state of one declared document
struct WriterState<D: DocumentWriter> {
    document: D,
    sheet: SheetId,
    sequence: u32,
    row_offset: u32,
    column_count: usize,
    rows_written: u64,
}

impl<D: DocumentWriter> WriterState<D> {
    fn rotate(&mut self, config: &ExportConfig) -> Result<()> {
        let filled = self.row_offset;
        self.sequence += 1;
        let name = config.sheet_name(self.sequence);
        self.sheet = self.document.create_sheet(&name)?;
        self.row_offset = 0;
        log::info!("sheet full after {} rows, continuing on '{}'", filled, name);
        Ok(())
    }
}

/// Streams a table (optional title, header row, data rows) into size-bounded sheets.
///
/// Usage order: [`declare_schema`](Self::declare_schema), any number of
/// [`write_rows`](Self::write_rows), then [`close`](Self::close). Nothing reaches the sink
/// before `close`; rows beyond the flush threshold wait in per-sheet spill files.
///
/// # Examples
///
/// ```no_run
/// use tablestream::{CellValue, StreamingTableExporter};
///
/// let mut exporter = StreamingTableExporter::create("report.xlsx")?;
/// exporter.declare_schema(Some("Monthly report"), ["Id", "Name", "Amount"])?;
/// exporter.write_rows(&[
///     vec![CellValue::from(1), CellValue::from("Alice"), CellValue::from(12.9)],
///     vec![CellValue::from(2), CellValue::from("Bob"), CellValue::from(None::<i64>)],
/// ])?;
/// exporter.close()?;
/// # Ok::<(), tablestream::ExportError>(())
/// ```
pub struct StreamingTableExporter<W: Write, D: DocumentWriter = XlsxWorkbook> {
    sink: Option<W>,
    config: ExportConfig,
    state: Option<WriterState<D>>,
}

impl<W: Write> StreamingTableExporter<W> {
    /// Bind an XLSX exporter to `sink` with the default flush threshold (1000 rows)
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, ExportConfig::default())
    }

    /// Bind an XLSX exporter to `sink`, keeping at most `flush_threshold` rows per sheet in
    /// memory
    pub fn with_flush_threshold(sink: W, flush_threshold: usize) -> Self {
        Self::with_config(
            sink,
            ExportConfig {
                flush_threshold,
                ..ExportConfig::default()
            },
        )
    }

    /// Bind an XLSX exporter with a full configuration
    pub fn with_config(sink: W, config: ExportConfig) -> Self {
        Self::with_document_writer(sink, config)
    }
}

impl StreamingTableExporter<BufWriter<File>> {
    /// Create (or truncate) the file at `path` and export into it
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        ExporterBuilder::new().create(path)
    }
}

impl<W: Write, D: DocumentWriter> StreamingTableExporter<W, D> {
    /// Bind an exporter using a custom document writer
    pub fn with_document_writer(sink: W, config: ExportConfig) -> Self {
        StreamingTableExporter {
            sink: Some(sink),
            config: config.normalized(),
            state: None,
        }
    }

    /// Change the flush threshold; takes effect for the next declared document
    pub fn set_flush_threshold(&mut self, flush_threshold: usize) {
        self.config.flush_threshold = flush_threshold.max(1);
    }

    /// Create the document, its first sheet, the optional title row and the header row.
    ///
    /// The title (when present and non-empty) goes to row 0, column 0, and is merged
    /// across all header columns. Headers use their `Display` form.
    ///
    /// Declaring again replaces the current document with a fresh one starting at
    /// `<base>_1`; rows written to the old document are discarded.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tablestream::StreamingTableExporter;
    ///
    /// let mut exporter = StreamingTableExporter::new(Vec::new());
    /// exporter.declare_schema(None, [2023, 2024, 2025]).unwrap();
    /// assert_eq!(exporter.current_row(), 1);
    /// ```
    pub fn declare_schema<I, S>(&mut self, title: Option<&str>, headers: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Display,
    {
        if self.sink.is_none() {
            return Err(ExportError::SinkClosed);
        }
        if self.state.is_some() {
            log::warn!("schema declared again, discarding the current document");
        }

        let headers: Vec<String> = headers.into_iter().map(|h| h.to_string()).collect();
        let column_count = headers.len();

        let mut document = D::create(&self.config)?;
        let sheet = document.create_sheet(&self.config.sheet_name(1))?;
        let mut row_offset = 0;

        if let Some(title) = title.filter(|t| !t.is_empty()) {
            let row = document.create_row(sheet, row_offset)?;
            document.write_cell(row, 0, &CellValue::from(title), SHARED_STYLE)?;
            if column_count > 1 {
                let last_column = column_index(column_count - 1)?;
                document.merge_region(sheet, row_offset..=row_offset, 0..=last_column)?;
            }
            row_offset += 1;
        }

        let row = document.create_row(sheet, row_offset)?;
        document.set_row_style(row, SHARED_STYLE)?;
        for (position, header) in headers.into_iter().enumerate() {
            document.write_cell(
                row,
                column_index(position)?,
                &CellValue::Text(header),
                SHARED_STYLE,
            )?;
        }
        row_offset += 1;

        log::debug!(
            "declared schema with {} columns on '{}'",
            column_count,
            self.config.sheet_name(1)
        );

        self.state = Some(WriterState {
            document,
            sheet,
            sequence: 1,
            row_offset,
            column_count,
            rows_written: 0,
        });
        Ok(())
    }

    /// Write rows in order, rotating to a new sheet whenever the current one is full.
    ///
    /// Each row gets exactly as many cells as it has values, whatever the declared column
    /// count. Sheets opened during this call stay in the document even if a later row
    /// fails.
    pub fn write_rows<R>(&mut self, rows: &[R]) -> Result<()>
    where
        R: AsRef<[CellValue]>,
    {
        let state = self
            .state
            .as_mut()
            .ok_or(ExportError::WorkbookNotInitialized)?;

        let mut index = 0;
        while index < rows.len() {
            let row = match state.document.create_row(state.sheet, state.row_offset) {
                Ok(row) => row,
                // a fresh sheet that refuses row 0 would rotate forever
                Err(err) if err.is_capacity_exceeded() && state.row_offset > 0 => {
                    state.rotate(&self.config)?;
                    continue;
                }
                Err(err) => return Err(err),
            };
            // the row exists now even if a cell below fails
            state.row_offset += 1;

            for (position, value) in rows[index].as_ref().iter().enumerate() {
                state
                    .document
                    .write_cell(row, column_index(position)?, value, SHARED_STYLE)?;
            }

            state.rows_written += 1;
            index += 1;
        }
        Ok(())
    }

    /// Write a single row
    pub fn write_row(&mut self, values: &[CellValue]) -> Result<()> {
        self.write_rows(&[values])
    }

    /// Serialize the document into the sink, then release the sink.
    ///
    /// The sink is flushed and dropped even when serialization fails; the serialization
    /// error wins over a flush error. A second call fails with
    /// [`ExportError::SinkClosed`].
    pub fn close(&mut self) -> Result<()> {
        let mut sink = self.sink.take().ok_or(ExportError::SinkClosed)?;

        let Some(state) = self.state.take() else {
            drop(sink);
            return Err(ExportError::WorkbookNotInitialized);
        };

        let sheets = state.sequence;
        let rows = state.rows_written;

        let written = state.document.serialize(&mut sink);
        let flushed = sink.flush();
        drop(sink);

        written?;
        flushed?;

        log::info!("export closed: {} rows across {} sheet(s)", rows, sheets);
        Ok(())
    }

    /// Next row offset in the current sheet (0 before the schema is declared)
    pub fn current_row(&self) -> u32 {
        self.state.as_ref().map_or(0, |s| s.row_offset)
    }

    /// Number of sheets in the current document
    pub fn sheet_count(&self) -> u32 {
        self.state.as_ref().map_or(0, |s| s.sequence)
    }

    /// Sheet names in creation order
    pub fn sheet_names(&self) -> Vec<String> {
        self.state
            .as_ref()
            .map(|s| s.document.sheet_names())
            .unwrap_or_default()
    }

    /// Number of declared header columns
    pub fn column_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.column_count)
    }

    /// Data rows written since the schema was declared
    pub fn rows_written(&self) -> u64 {
        self.state.as_ref().map_or(0, |s| s.rows_written)
    }

    pub fn flush_threshold(&self) -> usize {
        self.config.flush_threshold
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// The document being built, if the schema was declared and not yet closed
    pub fn document(&self) -> Option<&D> {
        self.state.as_ref().map(|s| &s.document)
    }

    /// True once [`close`](Self::close) has released the sink
    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }
}

/// Builder for configured exporters
#[derive(Debug, Clone, Default)]
pub struct ExporterBuilder {
    config: ExportConfig,
}

impl ExporterBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Base name for sheets (`<name>_1`, `<name>_2`, ...)
    pub fn with_sheet_name(mut self, name: &str) -> Self {
        self.config.sheet_base_name = name.to_string();
        self
    }

    /// Rows kept in memory per sheet before spilling to disk
    pub fn with_flush_threshold(mut self, flush_threshold: usize) -> Self {
        self.config.flush_threshold = flush_threshold;
        self
    }

    /// Row capacity per sheet (capped at the XLSX limit)
    pub fn with_max_rows(mut self, max_rows: u32) -> Self {
        self.config.max_rows = max_rows;
        self
    }

    /// DEFLATE level 0-9
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.config.compression_level = level;
        self
    }

    /// Take the flush threshold from a memory profile
    pub fn with_memory_profile(mut self, profile: MemoryProfile) -> Self {
        self.config = self.config.with_memory_profile(profile);
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Build an XLSX exporter bound to `sink`
    pub fn build<W: Write>(self, sink: W) -> StreamingTableExporter<W> {
        StreamingTableExporter::with_config(sink, self.config)
    }

    /// Build an exporter with a custom document writer
    pub fn build_with<W: Write, D: DocumentWriter>(self, sink: W) -> StreamingTableExporter<W, D> {
        StreamingTableExporter::with_document_writer(sink, self.config)
    }

    /// Create the file at `path` and build an XLSX exporter writing to it
    pub fn create<P: AsRef<Path>>(self, path: P) -> Result<StreamingTableExporter<BufWriter<File>>> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| ExportError::SinkUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.build(BufWriter::with_capacity(64 * 1024, file)))
    }
}
