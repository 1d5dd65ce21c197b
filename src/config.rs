//! Export configuration

use crate::document::MemoryProfile;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Row ceiling of an XLSX worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Default number of rows each sheet keeps in memory
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1000;

/// Default base name for generated sheets (`Sheet_1`, `Sheet_2`, ...)
pub const DEFAULT_SHEET_BASE_NAME: &str = "Sheet";

/// Settings shared by the exporter and its document writer
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExportConfig {
    /// Sheets are named `<sheet_base_name>_<sequence>`
    pub sheet_base_name: String,
    /// Rows buffered in memory per sheet before spilling to disk (>= 1)
    pub flush_threshold: usize,
    /// Row capacity of a sheet, at most [`MAX_ROWS`]
    pub max_rows: u32,
    /// DEFLATE level, 0-9
    pub compression_level: u32,
}

impl ExportConfig {
    /// Clamp every field into its valid range
    pub fn normalized(mut self) -> Self {
        self.flush_threshold = self.flush_threshold.max(1);
        self.max_rows = self.max_rows.clamp(1, MAX_ROWS);
        self.compression_level = self.compression_level.min(9);
        self
    }

    /// Config with the flush threshold taken from a memory profile
    pub fn with_memory_profile(mut self, profile: MemoryProfile) -> Self {
        self.flush_threshold = profile.flush_threshold();
        self
    }

    /// Name of the sheet with the given 1-based sequence number
    pub fn sheet_name(&self, sequence: u32) -> String {
        format!("{}_{}", self.sheet_base_name, sequence)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            sheet_base_name: DEFAULT_SHEET_BASE_NAME.to_string(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            max_rows: MAX_ROWS,
            compression_level: 6,
        }
    }
}
