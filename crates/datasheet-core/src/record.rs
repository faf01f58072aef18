//! Records (rows) and raw cell data

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One row of a datasheet, keyed by field id
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Record {
    pub id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub data: HashMap<String, CellData>,
}

impl Record {
    /// Create an empty record
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: HashMap::new(),
        }
    }

    /// Builder-style cell assignment
    pub fn with_cell(mut self, field_id: impl Into<String>, data: impl Into<CellData>) -> Self {
        self.data.insert(field_id.into(), data.into());
        self
    }

    /// Raw cell data for a field (`None` when the cell was never written)
    pub fn get(&self, field_id: &str) -> Option<&CellData> {
        self.data.get(field_id)
    }

    /// Set the raw cell data for a field
    pub fn set(&mut self, field_id: impl Into<String>, data: impl Into<CellData>) {
        self.data.insert(field_id.into(), data.into());
    }
}

/// Raw stored cell value; its shape depends on the owning field's type
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum CellData {
    #[default]
    Null,
    Bool(bool),
    /// Numbers, and DateTime cells as epoch milliseconds
    Number(f64),
    /// Plain text, ISO date strings, single-select option ids
    Text(String),
    /// Rich text as stored in transform mode
    Segments(Vec<TextSegment>),
    /// Multi-select option ids
    Options(Vec<String>),
}

impl CellData {
    pub fn is_null(&self) -> bool {
        matches!(self, CellData::Null)
    }

    /// Shape name, for diagnostics
    pub fn shape(&self) -> &'static str {
        match self {
            CellData::Null => "null",
            CellData::Bool(_) => "boolean",
            CellData::Number(_) => "number",
            CellData::Text(_) => "text",
            CellData::Segments(_) => "rich text",
            CellData::Options(_) => "option list",
        }
    }

    /// Wrap plain text as a single rich-text segment
    pub fn rich_text(text: impl Into<String>) -> Self {
        CellData::Segments(vec![TextSegment::text(text)])
    }
}

impl From<f64> for CellData {
    fn from(n: f64) -> Self {
        CellData::Number(n)
    }
}

impl From<i32> for CellData {
    fn from(n: i32) -> Self {
        CellData::Number(n as f64)
    }
}

impl From<bool> for CellData {
    fn from(b: bool) -> Self {
        CellData::Bool(b)
    }
}

impl From<&str> for CellData {
    fn from(s: &str) -> Self {
        CellData::Text(s.to_string())
    }
}

impl From<String> for CellData {
    fn from(s: String) -> Self {
        CellData::Text(s)
    }
}

impl From<Vec<TextSegment>> for CellData {
    fn from(segments: Vec<TextSegment>) -> Self {
        CellData::Segments(segments)
    }
}

/// One segment of rich text
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TextSegment {
    /// Segment type code (1 = plain text, 2 = url, 3 = email, ...)
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: u8,
    pub text: String,
}

impl TextSegment {
    /// Plain text segment
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: 1,
            text: text.into(),
        }
    }
}

/// Concatenate segment text in order
pub fn flatten_segments(segments: &[TextSegment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}
