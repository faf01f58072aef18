//! Prelude module - common imports for datasheet users
//!
//! ```rust
//! use datasheet::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculationOptions,
    CalculationStats,
    // Data model
    CellData,
    Datasheet,
    // Extension traits
    DatasheetCalculationExt,
    // Error types
    Error,
    ErrorKind,
    EvalError,
    EvaluationContext,
    EvaluationOptions,
    ExpressionCache,
    Field,
    FieldKind,
    FieldMap,
    FieldMapSource,
    FormulaError,
    FormulaProperty,
    NoSources,
    NumberProperty,
    ParsedExpression,
    Record,
    Result,
    TypedValue,
    // Formula entry points
    evaluate,
    parse_expression,
    Value,
};
