//! # datasheet-formula
//!
//! Formula engine for datasheet Formula fields.
//!
//! This crate provides:
//! - Tokenizing and parsing (text → AST), with lint warnings
//! - Field reference binding against a [`datasheet_core::FieldMap`], with cycle detection
//! - Evaluation of a bound expression against one record (AST → typed value)
//! - The built-in function library (math, text, date, logical, info, array)
//!
//! ## Example
//!
//! ```rust
//! use datasheet_formula::parse_expression;
//!
//! let parsed = parse_expression("ROUND({Price} * {Qty}, 2)").unwrap();
//! assert_eq!(parsed.field_references(), vec!["Price", "Qty"]);
//! ```

pub mod ast;
pub mod cell;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod format;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod value;

#[cfg(test)]
mod test_support;

pub use ast::{BinaryOperator, Expr, ExprKind, FieldRef, Literal, UnaryOperator};
pub use context::{EvaluationContext, EvaluationOptions, FieldMapSource, NoSources};
pub use error::{
    ErrorKind, EvalError, EvalResult, FormulaError, FormulaResult, LexError, LexErrorKind,
    ParseError, ParseErrorKind, ResolveError,
};
pub use evaluator::{evaluate, evaluate_parsed, EvalState, Evaluation, Evaluator};
pub use functions::{get_function_registry, FunctionDef, FunctionRegistry};
pub use lexer::{tokenize, LintWarning, Token, Tokens};
pub use parser::{parse_expression, ParsedExpression};
pub use resolver::{bind, BoundExpression};
pub use value::{TypedValue, Value, ValueFormat, ValueKind};
