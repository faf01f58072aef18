//! # datasheet-core
//!
//! Core data structures for the datasheet formula engine.
//!
//! This crate provides the fundamental types the engine reads:
//! - [`Field`] and [`FieldKind`] - Typed column definitions
//! - [`FieldMap`] - Ordered field id → field mapping for one datasheet
//! - [`Record`] and [`CellData`] - Rows and their raw stored cell values
//! - [`Datasheet`] - A field map together with its records
//!
//! ## Example
//!
//! ```rust
//! use datasheet_core::{Datasheet, Field, FieldKind, NumberProperty, Record};
//!
//! let mut sheet = Datasheet::new("dst1", "Orders");
//! sheet
//!     .add_field(Field::new("fldQty", "Qty", FieldKind::Number(NumberProperty::default())))
//!     .unwrap();
//! sheet.add_record(Record::new("rec1").with_cell("fldQty", 3.0));
//! ```

pub mod datasheet;
pub mod error;
pub mod field;
pub mod field_map;
pub mod record;

// Re-exports for convenience
pub use datasheet::Datasheet;
pub use error::{Error, Result};
pub use field::{
    CheckboxProperty, CurrencyProperty, DateFormat, DateTimeProperty, Field, FieldKind,
    FieldType, FormulaProperty, Formatting, NumberProperty, SelectOption, SelectProperty,
    TimeFormat,
};
pub use field_map::FieldMap;
pub use record::{flatten_segments, CellData, Record, TextSegment};
