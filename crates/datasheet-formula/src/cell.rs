//! Raw cell data to [`Value`] coercion, one arm per field kind

use datasheet_core::{flatten_segments, CellData, Field, FieldKind, SelectProperty};

use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::value::{from_millis, parse_datetime, parse_number, Value};

/// Read a record's raw cell for `field` as a typed value.
///
/// `transform` selects how rich text is read: flattened into one string
/// (`true`) or kept as a list of segment texts (`false`).
///
/// Formula fields are computed by the evaluator and never read here; their
/// stored data (if any) is ignored and reads as blank.
pub fn read_cell(field: &Field, data: Option<&CellData>, transform: bool) -> EvalResult<Value> {
    let data = match data {
        None | Some(CellData::Null) => return Ok(empty_value(field)),
        Some(data) => data,
    };

    match &field.kind {
        FieldKind::Text | FieldKind::SingleText => Ok(match data {
            CellData::Segments(segments) if transform => {
                Value::String(flatten_segments(segments))
            }
            CellData::Segments(segments) => Value::Array(
                segments
                    .iter()
                    .map(|s| Value::String(s.text.clone()))
                    .collect(),
            ),
            CellData::Text(s) => Value::String(s.clone()),
            CellData::Number(n) => Value::Number(*n),
            CellData::Bool(b) => Value::String(b.to_string()),
            CellData::Options(items) => Value::String(items.join(", ")),
            CellData::Null => Value::Blank,
        }),

        FieldKind::Number(_) | FieldKind::Currency(_) | FieldKind::Percent(_) => match data {
            CellData::Number(n) => Ok(Value::Number(*n)),
            CellData::Text(s) => parse_number(s)
                .map(Value::Number)
                .ok_or_else(|| mismatch(field, data)),
            CellData::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
            _ => Err(mismatch(field, data)),
        },

        FieldKind::DateTime(_) => match data {
            CellData::Number(ms) => from_millis(*ms).map(Value::DateTime),
            CellData::Text(s) => parse_datetime(s).map(Value::DateTime).ok_or_else(|| {
                EvalError::invalid_date(format!(
                    "field \"{}\" holds an unreadable date \"{}\"",
                    field.name, s
                ))
            }),
            _ => Err(mismatch(field, data)),
        },

        FieldKind::Checkbox(_) => match data {
            CellData::Bool(b) => Ok(Value::Boolean(*b)),
            CellData::Number(n) => Ok(Value::Boolean(*n != 0.0)),
            _ => Err(mismatch(field, data)),
        },

        FieldKind::SingleSelect(prop) => match data {
            CellData::Text(id) => Ok(Value::String(option_name(prop, id))),
            CellData::Options(ids) => Ok(Value::String(
                ids.first().map(|id| option_name(prop, id)).unwrap_or_default(),
            )),
            _ => Err(options_error(field, data)),
        },

        FieldKind::MultiSelect(prop) => match data {
            CellData::Options(ids) => Ok(Value::Array(
                ids.iter()
                    .map(|id| Value::String(option_name(prop, id)))
                    .collect(),
            )),
            CellData::Text(id) => Ok(Value::Array(vec![Value::String(option_name(prop, id))])),
            _ => Err(options_error(field, data)),
        },

        FieldKind::Formula(_) => Ok(Value::Blank),
    }
}

/// Value of a field whose cell was never written
fn empty_value(field: &Field) -> Value {
    match &field.kind {
        FieldKind::Checkbox(_) => Value::Boolean(false),
        FieldKind::MultiSelect(_) => Value::Array(Vec::new()),
        FieldKind::Text
        | FieldKind::SingleText
        | FieldKind::Number(_)
        | FieldKind::Currency(_)
        | FieldKind::Percent(_)
        | FieldKind::DateTime(_)
        | FieldKind::SingleSelect(_)
        | FieldKind::Formula(_) => Value::Blank,
    }
}

/// Unresolved option ids render as empty text
fn option_name(prop: &SelectProperty, id: &str) -> String {
    match prop.option(id) {
        Some(opt) => opt.name.clone(),
        None => {
            tracing::debug!(option = id, "option id not in field options");
            String::new()
        }
    }
}

fn mismatch(field: &Field, data: &CellData) -> EvalError {
    EvalError::type_mismatch(format!(
        "{} field \"{}\" holds {} data",
        field.field_type(),
        field.name,
        data.shape()
    ))
}

fn options_error(field: &Field, data: &CellData) -> EvalError {
    EvalError::new(
        ErrorKind::OptionNotFound,
        format!(
            "{} field \"{}\" holds {} data instead of option ids",
            field.field_type(),
            field.name,
            data.shape()
        ),
    )
}
