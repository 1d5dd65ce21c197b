//! Type definitions for exported table data

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cell style presets shared by every cell of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CellStyle {
    /// No formatting
    #[default]
    Default = 0,
    /// Centered horizontally and vertically, text wrapped
    CenteredWrap = 1,
}

impl CellStyle {
    /// Get the style index for XML (`cellXfs` position)
    pub fn index(&self) -> u32 {
        *self as u32
    }
}

/// A single cell value.
///
/// The kind is decided when the value is built, so writers never inspect types at
/// runtime. Floats are truncated toward zero on conversion, not rounded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CellValue {
    /// Empty cell
    #[default]
    Empty,
    /// Whole number
    Number(i64),
    /// Text, stored verbatim
    Text(String),
}

impl CellValue {
    /// Check if cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Numeric value, if this is a number
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text value, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for CellValue {
                fn from(n: $t) -> Self {
                    CellValue::Number(i64::from(n))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for CellValue {
    /// Truncates toward zero. NaN becomes 0, out-of-range values saturate.
    fn from(f: f64) -> Self {
        CellValue::Number(f.trunc() as i64)
    }
}

impl From<f32> for CellValue {
    fn from(f: f32) -> Self {
        CellValue::from(f64::from(f))
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<&String> for CellValue {
    fn from(s: &String) -> Self {
        CellValue::Text(s.clone())
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Empty, Into::into)
    }
}

/// Append the letter of a 0-based column index to a byte buffer
pub(crate) fn push_column_letter(buffer: &mut Vec<u8>, col: u16) {
    let mut n = u32::from(col) + 1;
    let mut tmp = [0u8; 4];
    let mut len = 0;
    while n > 0 {
        let rem = (n - 1) % 26;
        tmp[len] = b'A' + rem as u8;
        len += 1;
        n = (n - 1) / 26;
    }
    for i in (0..len).rev() {
        buffer.push(tmp[i]);
    }
}
