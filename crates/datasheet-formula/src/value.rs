//! Typed runtime values and coercion rules

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use datasheet_core::{Field, FieldKind, Formatting};

use crate::error::{EvalError, EvalResult};
use crate::format::{format_datetime, format_precision, number_to_text, DEFAULT_DATETIME_PATTERN};

/// Evaluation value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Empty cell / `BLANK()`
    Blank,
    Number(f64),
    String(String),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    /// Multi-select options, multi-argument aggregation input
    Array(Vec<Value>),
    Error(EvalError),
}

/// Kind tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Blank,
    Number,
    Text,
    Boolean,
    DateTime,
    Array,
    Error,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Blank => "blank",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
            ValueKind::Boolean => "boolean",
            ValueKind::DateTime => "date",
            ValueKind::Array => "array",
            ValueKind::Error => "error",
        };
        f.write_str(s)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Blank => ValueKind::Blank,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::Text,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Array(_) => ValueKind::Array,
            Value::Error(_) => ValueKind::Error,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Blank)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Numeric value with the implicit conversions used by operators
    ///
    /// - Boolean: 1 / 0
    /// - DateTime: epoch milliseconds
    /// - String: parsed decimal, blank text is 0, otherwise `NotANumber`
    /// - Array: only a single element converts
    pub fn to_number(&self) -> EvalResult<f64> {
        match self {
            Value::Blank => Ok(0.0),
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::DateTime(dt) => Ok(dt.timestamp_millis() as f64),
            Value::String(s) => parse_number(s).ok_or_else(|| EvalError::not_a_number(s)),
            Value::Array(items) => match items.as_slice() {
                [] => Ok(0.0),
                [single] => single.to_number(),
                _ => Err(EvalError::type_mismatch(
                    "cannot convert a list of values to a number",
                )),
            },
            Value::Error(e) => Err(e.clone()),
        }
    }

    /// Numeric value for parameters that require a pure number
    ///
    /// Same as [`Value::to_number`] except DateTime has no numeric fallback.
    pub fn to_strict_number(&self) -> EvalResult<f64> {
        match self {
            Value::DateTime(_) => Err(EvalError::type_mismatch(
                "expected a number, got a date",
            )),
            Value::Array(items) if items.len() == 1 => items[0].to_strict_number(),
            other => other.to_number(),
        }
    }

    /// Text value
    pub fn to_text(&self) -> String {
        match self {
            Value::Blank => String::new(),
            Value::Number(n) => number_to_text(*n),
            Value::String(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            Value::Array(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(", "),
            Value::Error(e) => e.kind.badge().to_string(),
        }
    }

    /// Truthiness used by `IF`, `AND`, `!` and friends
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Blank => false,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
            Value::DateTime(_) => true,
            Value::Array(items) => !items.is_empty(),
            Value::Error(_) => false,
        }
    }

    /// Date-time value from epoch milliseconds or a date string
    pub fn to_datetime(&self) -> EvalResult<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Ok(*dt),
            Value::Number(ms) => from_millis(*ms),
            Value::String(s) => parse_datetime(s)
                .ok_or_else(|| EvalError::invalid_date(format!("cannot read \"{}\" as a date", s))),
            Value::Array(items) if items.len() == 1 => items[0].to_datetime(),
            Value::Error(e) => Err(e.clone()),
            other => Err(EvalError::invalid_date(format!(
                "expected a date, got {}",
                other.kind()
            ))),
        }
    }

    /// Flatten nested arrays into their scalar items
    pub fn flatten(values: &[Value]) -> Vec<&Value> {
        let mut out = Vec::with_capacity(values.len());
        for v in values {
            match v {
                Value::Array(items) => out.extend(Value::flatten(items)),
                other => out.push(other),
            }
        }
        out
    }

    fn is_numeric_like(&self) -> bool {
        matches!(
            self,
            Value::Blank | Value::Number(_) | Value::Boolean(_) | Value::DateTime(_)
        )
    }

    /// Ordering used by the comparison operators
    ///
    /// Compares numerically when both sides are numeric (numeric text counts),
    /// otherwise compares text case-sensitively.
    pub fn compare(&self, other: &Value) -> EvalResult<Ordering> {
        if let Value::Error(e) = self {
            return Err(e.clone());
        }
        if let Value::Error(e) = other {
            return Err(e.clone());
        }

        let numeric = |v: &Value| -> Option<f64> {
            if v.is_numeric_like() {
                v.to_number().ok()
            } else if let Value::String(s) = v {
                parse_number(s).filter(|_| !s.trim().is_empty())
            } else {
                None
            }
        };

        let either_numeric = self.is_numeric_like() || other.is_numeric_like();
        if either_numeric {
            if let (Some(a), Some(b)) = (numeric(self), numeric(other)) {
                return Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal));
            }
        }

        Ok(self.to_text().cmp(&other.to_text()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<EvalError> for Value {
    fn from(e: EvalError) -> Self {
        Value::Error(e)
    }
}

/// Strict decimal parse: surrounding whitespace allowed, blank is 0,
/// `inf`/`NaN` spellings rejected.
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub(crate) fn from_millis(ms: f64) -> EvalResult<DateTime<Utc>> {
    if !ms.is_finite() {
        return Err(EvalError::invalid_date("timestamp is not a finite number"));
    }
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .ok_or_else(|| EvalError::invalid_date(format!("timestamp {} is out of range", ms)))
}

/// Parse the date string shapes cells and literals use
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}

/// Display hints for a computed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueFormat {
    Number { precision: u8 },
    Currency { precision: u8, symbol: String },
    Percent { precision: u8 },
    DateTime { pattern: String },
}

impl ValueFormat {
    /// Hints carried by a field: a Formula field's `formatting`, or the
    /// property of a plain Number/Currency/Percent/DateTime field.
    pub fn for_field(field: &Field) -> Option<ValueFormat> {
        match &field.kind {
            FieldKind::Formula(prop) => prop.formatting.as_ref().map(|f| match f {
                Formatting::Number { precision } => ValueFormat::Number {
                    precision: *precision,
                },
                Formatting::Currency { precision, symbol } => ValueFormat::Currency {
                    precision: *precision,
                    symbol: symbol.clone(),
                },
                Formatting::Percent { precision } => ValueFormat::Percent {
                    precision: *precision,
                },
                Formatting::DateTime(prop) => ValueFormat::DateTime {
                    pattern: prop.pattern(),
                },
            }),
            FieldKind::Number(prop) => Some(ValueFormat::Number {
                precision: prop.precision,
            }),
            FieldKind::Currency(prop) => Some(ValueFormat::Currency {
                precision: prop.precision,
                symbol: prop.symbol.clone(),
            }),
            FieldKind::Percent(prop) => Some(ValueFormat::Percent {
                precision: prop.precision,
            }),
            FieldKind::DateTime(prop) => Some(ValueFormat::DateTime {
                pattern: prop.pattern(),
            }),
            FieldKind::Text
            | FieldKind::SingleText
            | FieldKind::Checkbox(_)
            | FieldKind::SingleSelect(_)
            | FieldKind::MultiSelect(_) => None,
        }
    }
}

/// The result of evaluating a formula: a value plus the display hints of the
/// field it was computed for
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub value: Value,
    pub format: Option<ValueFormat>,
}

impl TypedValue {
    pub fn new(value: Value, format: Option<ValueFormat>) -> Self {
        Self { value, format }
    }

    /// Inferred result kind
    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    pub fn is_error(&self) -> bool {
        self.value.is_error()
    }

    /// The error payload, when the result is an error value
    pub fn error(&self) -> Option<&EvalError> {
        match &self.value {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Render for display, applying the format hints
    pub fn display(&self) -> String {
        display_value(&self.value, self.format.as_ref())
    }
}

fn display_value(value: &Value, format: Option<&ValueFormat>) -> String {
    match (value, format) {
        (Value::Number(n), Some(ValueFormat::Number { precision })) => {
            format_precision(*n, *precision)
        }
        (Value::Number(n), Some(ValueFormat::Currency { precision, symbol })) => {
            let text = format_precision(n.abs(), *precision);
            if *n < 0.0 && text.chars().any(|c| c.is_ascii_digit() && c != '0') {
                format!("-{}{}", symbol, text)
            } else {
                format!("{}{}", symbol, text)
            }
        }
        (Value::Number(n), Some(ValueFormat::Percent { precision })) => {
            format!("{}%", format_precision(n * 100.0, *precision))
        }
        (Value::DateTime(dt), Some(ValueFormat::DateTime { pattern })) => {
            format_datetime(dt, pattern)
        }
        (Value::DateTime(dt), _) => format_datetime(dt, DEFAULT_DATETIME_PATTERN),
        (Value::Array(items), format) => items
            .iter()
            .map(|item| display_value(item, format))
            .collect::<Vec<_>>()
            .join(", "),
        (other, _) => other.to_text(),
    }
}
