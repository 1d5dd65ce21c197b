//! # tablestream
//!
//! Streaming export of large tables into XLSX workbooks.
//!
//! ## Features
//!
//! - **Bounded memory**: each sheet keeps at most `flush_threshold` rows in memory, older
//!   rows are rendered to a temp file
//! - **Automatic sheet rotation**: when a sheet reaches the 1,048,576-row ceiling the
//!   export continues on `Sheet_2`, `Sheet_3`, ... without losing a row
//! - **Any sink**: the workbook is compressed into any `std::io::Write`, no `Seek` needed
//! - **Typed cells**: integers, truncated floats, text and empty cells
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tablestream::{CellValue, StreamingTableExporter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = StreamingTableExporter::create("report.xlsx")?;
//!
//! // Title row (merged over all columns) and header row
//! exporter.declare_schema(Some("Report"), ["A", "B"])?;
//!
//! exporter.write_rows(&[
//!     vec![CellValue::from(1), CellValue::from("x")],
//!     vec![CellValue::from(2.7), CellValue::from(None::<&str>)],
//! ])?;
//!
//! exporter.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Custom sheet names and memory limits
//!
//! ```rust,no_run
//! use tablestream::{ExporterBuilder, MemoryProfile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = ExporterBuilder::new()
//!     .with_sheet_name("Orders")
//!     .with_memory_profile(MemoryProfile::from_env())
//!     .create("orders.xlsx")?;
//! exporter.declare_schema(None, ["Id", "Total"])?;
//! exporter.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod exporter;
pub mod types;

pub use config::ExportConfig;
pub use document::{DocumentWriter, MemoryProfile, XlsxWorkbook};
pub use error::{ExportError, Result};
pub use exporter::{ExporterBuilder, StreamingTableExporter};
pub use types::{CellStyle, CellValue};
