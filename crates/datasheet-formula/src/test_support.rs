//! Shared fixtures for unit tests

use chrono::{DateTime, TimeZone, Utc};
use datasheet_core::{
    CheckboxProperty, DateTimeProperty, Field, FieldKind, FieldMap, FormulaProperty,
    NumberProperty, Record, SelectOption, SelectProperty,
};

use crate::context::EvaluationContext;
use crate::evaluator::evaluate;
use crate::value::Value;

/// Fixed clock: 2024-03-05 09:30:00 UTC (a Tuesday)
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0)
        .single()
        .expect("valid fixture time")
}

fn number(id: &str, name: &str, precision: u8) -> Field {
    Field::new(id, name, FieldKind::Number(NumberProperty::with_precision(precision)))
}

/// Field map with one field of each kind, plus names that need escaping.
///
/// Names `a`, `b` and `c` are deliberately duplicated by the `fld...` fields;
/// lookups by name resolve to the first.
pub fn fixture() -> FieldMap {
    let options = SelectProperty {
        options: vec![
            SelectOption::new("opt1", "智", 0),
            SelectOption::new("opt2", "维格", 1),
            SelectOption::new("opt3", "维他", 2),
            SelectOption::new("opt4", "第一", 3),
            SelectOption::new("opt5", "第二", 4),
            SelectOption::new("x", "x", 5),
            SelectOption::new("y", "y", 6),
        ],
    };

    FieldMap::from_fields([
        number("a", "a", 0),
        Field::new("b", "b", FieldKind::Text),
        Field::new("c", "c", FieldKind::DateTime(DateTimeProperty::default())),
        Field::new("d", "d", FieldKind::MultiSelect(options)),
        Field::new("e", "e", FieldKind::DateTime(DateTimeProperty::default())),
        Field::new("f", "f", FieldKind::Checkbox(CheckboxProperty::default())),
        Field::new("x", "x", FieldKind::Formula(FormulaProperty::new("", "dst123"))),
        number("fld11111", "a", 0),
        Field::new("fld22222", "b", FieldKind::Text),
        number("fld33333", "c", 1),
        number("fld44444", "d{", 1),
        number("fld55555", "{e", 1),
        number("fld66666", "f\" {}", 1),
    ])
    .expect("fixture ids are unique")
}

/// Evaluate as field `x` of the fixture against an empty record
pub fn eval(text: &str) -> Value {
    eval_record(text, &Record::new("rec1"))
}

/// Evaluate as field `x` of the fixture against `record`
pub fn eval_record(text: &str, record: &Record) -> Value {
    let map = fixture();
    let ctx = EvaluationContext::new(&map, record, now());
    let x = map.get("x").expect("fixture has x");
    evaluate(text, &ctx, x)
        .unwrap_or_else(|e| panic!("{:?} failed to parse: {}", text, e))
        .value
}
