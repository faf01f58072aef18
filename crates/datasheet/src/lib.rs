//! # datasheet
//!
//! A typed formula engine for datasheet Formula fields.
//!
//! A Formula field stores an expression such as `IF({Done}, {Price} * {Qty}, 0)`.
//! This crate parses that expression, binds field references against the
//! datasheet's field map and evaluates it for a record, producing a typed value
//! that carries the field's display format.
//!
//! ## Features
//!
//! - Field references by display name or id, including names with `{`, `}` or `"`
//! - Formula fields that reference other Formula fields, across datasheets, with
//!   cycle detection
//! - Math, text, date, logical, info and array functions
//! - Errors as values: a bad reference yields an error badge, not a panic
//! - Column calculation with a shared, thread-safe expression cache
//!
//! ## Example
//!
//! ```rust
//! use datasheet::prelude::*;
//! use chrono::Utc;
//!
//! let fields = FieldMap::from_fields([
//!     Field::new("fldPrice", "Price", FieldKind::Number(NumberProperty::with_precision(2))),
//!     Field::new("fldQty", "Qty", FieldKind::Number(NumberProperty::default())),
//!     Field::new(
//!         "fldTotal",
//!         "Total",
//!         FieldKind::Formula(FormulaProperty::new("{Price} * {Qty}", "dst1")),
//!     ),
//! ])
//! .unwrap();
//! let record = Record::new("rec1")
//!     .with_cell("fldPrice", 2.5)
//!     .with_cell("fldQty", 4);
//!
//! let ctx = EvaluationContext::new(&fields, &record, Utc::now());
//! let total = fields.get("fldTotal").unwrap();
//! let result = evaluate("{Price} * {Qty}", &ctx, total).unwrap();
//! assert_eq!(result.value, Value::Number(10.0));
//! ```

pub mod calculation;
pub mod prelude;

// Re-export calculation types
pub use calculation::{
    CalculationError, CalculationOptions, CalculationOutput, CalculationStats,
    DatasheetCalculationExt, ExpressionCache, RecordValue,
};

// Re-export core types
pub use datasheet_core::{
    flatten_segments, CellData, CheckboxProperty, CurrencyProperty, DateFormat, DateTimeProperty,
    Datasheet, Error, Field, FieldKind, FieldMap, FieldType, FormulaProperty, Formatting,
    NumberProperty, Record, Result, SelectOption, SelectProperty, TextSegment, TimeFormat,
};

// Re-export formula types
pub use datasheet_formula::{
    bind, evaluate, evaluate_parsed, get_function_registry, parse_expression, tokenize,
    BoundExpression, ErrorKind, EvalError, EvalResult, EvalState, Evaluation, EvaluationContext,
    EvaluationOptions, Evaluator, FieldMapSource, FormulaError, FormulaResult, LexError,
    LintWarning, NoSources, ParseError, ParsedExpression, ResolveError, TypedValue, Value,
    ValueFormat, ValueKind,
};
