use serde::{Deserialize, Serialize};

/// A cell value as written back into a worksheet.
///
/// Strings are always emitted as inline strings; the fill pipeline never
/// appends to `sharedStrings.xml`, so untouched cells keep their original
/// shared-string indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<u64> for CellValue {
    fn from(n: u64) -> Self {
        Self::Number(n as f64)
    }
}
