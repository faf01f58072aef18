//! Field (column) definitions
//!
//! A field's kind and its type-specific property travel together in
//! [`FieldKind`], so a field can never carry a property that does not match
//! its type.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::record::CellData;

/// A typed column definition within a datasheet
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Field {
    /// Unique id within the owning field map (e.g. `fld11111`)
    pub id: String,
    /// Display name. Not guaranteed unique, may contain `{`, `}` or `"`.
    pub name: String,
    /// Type and type-specific property
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: FieldKind,
}

impl Field {
    /// Create a new field
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }

    /// Synthetic stand-in for a field map entry that has no definition.
    ///
    /// Reads as a Number field with precision 0, named after its id.
    pub fn placeholder(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind: FieldKind::Number(NumberProperty::default()),
        }
    }

    /// The field's type tag
    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    /// Formula property, if this is a Formula field
    pub fn formula(&self) -> Option<&FormulaProperty> {
        match &self.kind {
            FieldKind::Formula(prop) => Some(prop),
            _ => None,
        }
    }

    /// Check if this is a Formula field
    pub fn is_formula(&self) -> bool {
        matches!(self.kind, FieldKind::Formula(_))
    }

    /// Option list for select fields
    pub fn options(&self) -> Option<&[SelectOption]> {
        match &self.kind {
            FieldKind::SingleSelect(prop) | FieldKind::MultiSelect(prop) => Some(&prop.options),
            _ => None,
        }
    }

    /// Check whether raw cell data has a shape this field can store.
    ///
    /// `Null` is accepted by every field.
    pub fn accepts(&self, data: &CellData) -> bool {
        if data.is_null() {
            return true;
        }
        match &self.kind {
            FieldKind::Text | FieldKind::SingleText => {
                matches!(data, CellData::Text(_) | CellData::Segments(_))
            }
            FieldKind::Number(_) | FieldKind::Currency(_) | FieldKind::Percent(_) => {
                matches!(data, CellData::Number(_))
            }
            FieldKind::DateTime(_) => matches!(data, CellData::Number(_) | CellData::Text(_)),
            FieldKind::Checkbox(_) => matches!(data, CellData::Bool(_)),
            FieldKind::SingleSelect(_) => matches!(data, CellData::Text(_)),
            FieldKind::MultiSelect(_) => matches!(data, CellData::Options(_)),
            // Computed, never stored
            FieldKind::Formula(_) => false,
        }
    }
}

/// Field kind with its type-specific property
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(tag = "type", content = "property")
)]
pub enum FieldKind {
    /// Multi-line rich text
    Text,
    /// Single-line text
    SingleText,
    Number(NumberProperty),
    Currency(CurrencyProperty),
    Percent(NumberProperty),
    DateTime(DateTimeProperty),
    Checkbox(CheckboxProperty),
    SingleSelect(SelectProperty),
    MultiSelect(SelectProperty),
    Formula(FormulaProperty),
}

impl FieldKind {
    /// The type tag of this kind
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldKind::Text => FieldType::Text,
            FieldKind::SingleText => FieldType::SingleText,
            FieldKind::Number(_) => FieldType::Number,
            FieldKind::Currency(_) => FieldType::Currency,
            FieldKind::Percent(_) => FieldType::Percent,
            FieldKind::DateTime(_) => FieldType::DateTime,
            FieldKind::Checkbox(_) => FieldType::Checkbox,
            FieldKind::SingleSelect(_) => FieldType::SingleSelect,
            FieldKind::MultiSelect(_) => FieldType::MultiSelect,
            FieldKind::Formula(_) => FieldType::Formula,
        }
    }
}

/// Field type tag (no property)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    SingleText,
    Number,
    Currency,
    Percent,
    DateTime,
    Checkbox,
    SingleSelect,
    MultiSelect,
    Formula,
}

impl FieldType {
    /// Type name as shown to users
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "Text",
            FieldType::SingleText => "SingleText",
            FieldType::Number => "Number",
            FieldType::Currency => "Currency",
            FieldType::Percent => "Percent",
            FieldType::DateTime => "DateTime",
            FieldType::Checkbox => "Checkbox",
            FieldType::SingleSelect => "SingleSelect",
            FieldType::MultiSelect => "MultiSelect",
            FieldType::Formula => "Formula",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number / Percent property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NumberProperty {
    /// Decimal places used for display
    #[cfg_attr(feature = "serde", serde(default))]
    pub precision: u8,
}

impl NumberProperty {
    pub fn with_precision(precision: u8) -> Self {
        Self { precision }
    }
}

/// Currency property
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CurrencyProperty {
    #[cfg_attr(feature = "serde", serde(default))]
    pub precision: u8,
    pub symbol: String,
}

/// DateTime property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct DateTimeProperty {
    #[cfg_attr(feature = "serde", serde(default))]
    pub date_format: DateFormat,
    #[cfg_attr(feature = "serde", serde(default))]
    pub time_format: TimeFormat,
    #[cfg_attr(feature = "serde", serde(default))]
    pub include_time: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub auto_fill: bool,
}

impl DateTimeProperty {
    /// Display pattern (date, then time when `include_time` is set)
    pub fn pattern(&self) -> String {
        if self.include_time {
            format!("{} {}", self.date_format.pattern(), self.time_format.pattern())
        } else {
            self.date_format.pattern().to_string()
        }
    }
}

/// Date display format, stored as a small integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "u8", into = "u8")
)]
pub enum DateFormat {
    #[default]
    YearMonthDaySlash,
    YearMonthDayDash,
    DayMonthYear,
    MonthDayYear,
    YearMonth,
    MonthDay,
    Year,
    Month,
    Day,
}

impl DateFormat {
    /// Pattern in the `DATETIME_FORMAT` token syntax
    pub fn pattern(&self) -> &'static str {
        match self {
            DateFormat::YearMonthDaySlash => "YYYY/MM/DD",
            DateFormat::YearMonthDayDash => "YYYY-MM-DD",
            DateFormat::DayMonthYear => "DD/MM/YYYY",
            DateFormat::MonthDayYear => "MM/DD/YYYY",
            DateFormat::YearMonth => "YYYY-MM",
            DateFormat::MonthDay => "MM-DD",
            DateFormat::Year => "YYYY",
            DateFormat::Month => "MM",
            DateFormat::Day => "DD",
        }
    }
}

impl TryFrom<u8> for DateFormat {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match code {
            0 => DateFormat::YearMonthDaySlash,
            1 => DateFormat::YearMonthDayDash,
            2 => DateFormat::DayMonthYear,
            3 => DateFormat::MonthDayYear,
            4 => DateFormat::YearMonth,
            5 => DateFormat::MonthDay,
            6 => DateFormat::Year,
            7 => DateFormat::Month,
            8 => DateFormat::Day,
            other => return Err(format!("unknown date format code {}", other)),
        })
    }
}

impl From<DateFormat> for u8 {
    fn from(format: DateFormat) -> u8 {
        format as u8
    }
}

/// Time display format, stored as a small integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "u8", into = "u8")
)]
pub enum TimeFormat {
    /// `HH:mm`
    #[default]
    Hour24,
    /// `hh:mm A`
    Hour12,
}

impl TimeFormat {
    pub fn pattern(&self) -> &'static str {
        match self {
            TimeFormat::Hour24 => "HH:mm",
            TimeFormat::Hour12 => "hh:mm A",
        }
    }
}

impl TryFrom<u8> for TimeFormat {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            0 => Ok(TimeFormat::Hour24),
            1 => Ok(TimeFormat::Hour12),
            other => Err(format!("unknown time format code {}", other)),
        }
    }
}

impl From<TimeFormat> for u8 {
    fn from(format: TimeFormat) -> u8 {
        format as u8
    }
}

/// Checkbox property
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CheckboxProperty {
    #[cfg_attr(feature = "serde", serde(default))]
    pub icon: String,
}

/// Single/multi select property
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SelectProperty {
    /// Ordered option list
    pub options: Vec<SelectOption>,
}

impl SelectProperty {
    /// Look up an option by id
    pub fn option(&self, id: &str) -> Option<&SelectOption> {
        self.options.iter().find(|opt| opt.id == id)
    }
}

/// One option of a select field
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SelectOption {
    pub id: String,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub color: u32,
}

impl SelectOption {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color,
        }
    }
}

/// Formula property
///
/// `datasheet_id` names the datasheet whose schema the expression is written
/// against, which may differ from the datasheet holding the record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct FormulaProperty {
    pub expression: String,
    pub datasheet_id: String,
    /// Display hints for the computed value
    #[cfg_attr(feature = "serde", serde(default))]
    pub formatting: Option<Formatting>,
}

impl FormulaProperty {
    pub fn new(expression: impl Into<String>, datasheet_id: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            datasheet_id: datasheet_id.into(),
            formatting: None,
        }
    }
}

/// Result formatting carried by a Formula field
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(tag = "formatType", rename_all = "camelCase")
)]
pub enum Formatting {
    Number { precision: u8 },
    Currency { precision: u8, symbol: String },
    Percent { precision: u8 },
    DateTime(DateTimeProperty),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_number_precision_zero() {
        let field = Field::placeholder("fldMissing");
        assert_eq!(field.name, "fldMissing");
        assert_eq!(field.field_type(), FieldType::Number);
        assert_eq!(field.kind, FieldKind::Number(NumberProperty { precision: 0 }));
    }

    #[test]
    fn test_accepts_cell_shapes() {
        let number = Field::new("a", "a", FieldKind::Number(NumberProperty::default()));
        assert!(number.accepts(&CellData::Number(1.0)));
        assert!(number.accepts(&CellData::Null));
        assert!(!number.accepts(&CellData::Text("1".into())));

        let multi = Field::new("d", "d", FieldKind::MultiSelect(SelectProperty::default()));
        assert!(multi.accepts(&CellData::Options(vec!["opt1".into()])));
        assert!(!multi.accepts(&CellData::Bool(true)));
    }

    #[test]
    fn test_datetime_pattern() {
        let prop = DateTimeProperty {
            date_format: DateFormat::YearMonthDayDash,
            time_format: TimeFormat::Hour12,
            include_time: true,
            auto_fill: false,
        };
        assert_eq!(prop.pattern(), "YYYY-MM-DD hh:mm A");
        assert_eq!(DateTimeProperty::default().pattern(), "YYYY/MM/DD");
    }

    #[test]
    fn test_format_codes() {
        assert_eq!(DateFormat::try_from(3), Ok(DateFormat::MonthDayYear));
        assert!(DateFormat::try_from(42).is_err());
        assert_eq!(u8::from(TimeFormat::Hour12), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_field_json_shape() {
        let json = r#"{"id":"c","name":"c","type":"DateTime",
            "property":{"dateFormat":0,"timeFormat":0,"includeTime":false,"autoFill":false}}"#;
        let field: Field = serde_json::from_str(json).unwrap();
        assert_eq!(field.field_type(), FieldType::DateTime);

        let json = r#"{"id":"x","name":"x","type":"Formula",
            "property":{"datasheetId":"dst123","expression":"{a} + 1"}}"#;
        let field: Field = serde_json::from_str(json).unwrap();
        assert_eq!(field.formula().unwrap().datasheet_id, "dst123");
    }
}
