//! Column calculation
//!
//! Evaluates one Formula field for every record of a datasheet. The field's
//! expression is parsed once (through an [`ExpressionCache`]) and bound once;
//! only evaluation is repeated per record.
//!
//! # Example
//!
//! ```rust
//! use datasheet::prelude::*;
//!
//! let mut sheet = Datasheet::new("dst1", "Orders");
//! sheet
//!     .add_field(Field::new("qty", "Qty", FieldKind::Number(NumberProperty::default())))
//!     .unwrap();
//! sheet
//!     .add_field(Field::new(
//!         "double",
//!         "Double",
//!         FieldKind::Formula(FormulaProperty::new("{Qty} * 2", "dst1")),
//!     ))
//!     .unwrap();
//! sheet.add_record(Record::new("rec1").with_cell("qty", 21));
//!
//! let output = sheet
//!     .calculate_field("double", &CalculationOptions::default(), &NoSources)
//!     .unwrap();
//! assert_eq!(output.values[0].value.value, Value::Number(42.0));
//! assert_eq!(output.stats.records, 1);
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    bind, Datasheet, EvalError, EvaluationContext, EvaluationOptions, Evaluator, FieldMapSource,
    FormulaError, FormulaResult, ParsedExpression, TypedValue, Value, ValueFormat,
};
use datasheet_formula::parse_expression;

/// Options for calculating a Formula column
#[derive(Debug, Clone, Default)]
pub struct CalculationOptions {
    /// Options passed to every record's evaluation
    pub evaluation: EvaluationOptions,
    /// Clock for `TODAY()`/`NOW()`. `None` reads the system clock once per run.
    pub now: Option<DateTime<Utc>>,
    /// Abort on the first record whose value is an error
    pub stop_on_error: bool,
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Number of records evaluated
    pub records: usize,
    /// Number of records whose value is an error
    pub errors: usize,
    /// Expression lookups served from the cache
    pub cache_hits: usize,
}

/// Value computed for one record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub record_id: String,
    pub value: TypedValue,
}

/// Result of calculating one Formula column
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationOutput {
    /// One entry per record, in record order
    pub values: Vec<RecordValue>,
    pub stats: CalculationStats,
}

/// Errors that prevent a column from being calculated at all
#[derive(Debug, Error)]
pub enum CalculationError {
    #[error(transparent)]
    Data(#[from] datasheet_core::Error),

    #[error("Field {0} is not a Formula field")]
    NotAFormula(String),

    /// The field's own expression does not lex or parse
    #[error("Invalid formula in field {field}: {source}")]
    InvalidExpression {
        field: String,
        #[source]
        source: FormulaError,
    },

    /// A record failed and `stop_on_error` was set
    #[error("Record {record_id} failed: {error}")]
    RecordFailed { record_id: String, error: EvalError },
}

/// Thread-safe cache of parsed expressions keyed by expression text.
///
/// Parsing does not depend on any field map, so one cache can serve every
/// datasheet. Entries are never evicted; call [`ExpressionCache::clear`] when
/// that matters.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    entries: RwLock<AHashMap<String, Arc<ParsedExpression>>>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a parsed expression, parsing and storing it on a miss.
    ///
    /// The flag is `true` when the entry came from the cache. Failed parses
    /// are not cached.
    pub fn get_or_parse(&self, expression: &str) -> FormulaResult<(Arc<ParsedExpression>, bool)> {
        if let Some(parsed) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(expression)
        {
            return Ok((Arc::clone(parsed), true));
        }

        let parsed = Arc::new(parse_expression(expression)?);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have parsed the same text meanwhile
        let entry = entries
            .entry(expression.to_string())
            .or_insert_with(|| Arc::clone(&parsed));
        Ok((Arc::clone(entry), false))
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Extension trait for Datasheet to calculate Formula columns
pub trait DatasheetCalculationExt {
    /// Calculate a Formula field for every record with a private cache
    fn calculate_field(
        &self,
        field_id: &str,
        options: &CalculationOptions,
        sources: &dyn FieldMapSource,
    ) -> Result<CalculationOutput, CalculationError>;

    /// Calculate a Formula field for every record, sharing `cache` across calls
    fn calculate_field_cached(
        &self,
        field_id: &str,
        options: &CalculationOptions,
        sources: &dyn FieldMapSource,
        cache: &ExpressionCache,
    ) -> Result<CalculationOutput, CalculationError>;
}

impl DatasheetCalculationExt for Datasheet {
    fn calculate_field(
        &self,
        field_id: &str,
        options: &CalculationOptions,
        sources: &dyn FieldMapSource,
    ) -> Result<CalculationOutput, CalculationError> {
        self.calculate_field_cached(field_id, options, sources, &ExpressionCache::new())
    }

    fn calculate_field_cached(
        &self,
        field_id: &str,
        options: &CalculationOptions,
        sources: &dyn FieldMapSource,
        cache: &ExpressionCache,
    ) -> Result<CalculationOutput, CalculationError> {
        let field = self.fields.require(field_id)?;
        let property = field
            .formula()
            .ok_or_else(|| CalculationError::NotAFormula(field.id.clone()))?;

        let mut stats = CalculationStats::default();
        let (parsed, hit) = cache.get_or_parse(&property.expression).map_err(|source| {
            CalculationError::InvalidExpression {
                field: field.id.clone(),
                source,
            }
        })?;
        if hit {
            stats.cache_hits += 1;
        }

        let now = options.now.unwrap_or_else(Utc::now);
        let format = ValueFormat::for_field(field);
        let empty = datasheet_core::Record::default();
        let base = EvaluationContext::new(&self.fields, &empty, now)
            .with_options(options.evaluation)
            .with_sources(sources);

        // Binding reads only the field maps, so one binding serves every record
        let bound = bind(&parsed, &base, field).map_err(EvalError::from);
        debug!(
            datasheet = %self.id,
            field = %field.id,
            records = self.records.len(),
            cache_hit = hit,
            "calculating formula column"
        );

        let mut values = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let value = match &bound {
                Ok(bound) => {
                    let ctx = EvaluationContext { record, ..base };
                    Evaluator::new(ctx)
                        .eval(bound.root())
                        .unwrap_or_else(Value::Error)
                }
                Err(err) => Value::Error(err.clone()),
            };
            trace!(record = %record.id, kind = %value.kind(), "calculated record");

            stats.records += 1;
            if let Value::Error(err) = &value {
                stats.errors += 1;
                if options.stop_on_error {
                    return Err(CalculationError::RecordFailed {
                        record_id: record.id.clone(),
                        error: err.clone(),
                    });
                }
            }
            values.push(RecordValue {
                record_id: record.id.clone(),
                value: TypedValue::new(value, format.clone()),
            });
        }

        Ok(CalculationOutput { values, stats })
    }
}
