//! Aggregates over array values (multi-select cells, argument lists)

use crate::context::EvaluationContext;
use crate::error::EvalResult;
use crate::value::Value;

/// Default `ARRAYJOIN` separator
const DEFAULT_SEPARATOR: &str = ", ";

fn is_empty_item(v: &Value) -> bool {
    match v {
        Value::Blank => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn items(args: &[Value]) -> Vec<Value> {
    match args.first() {
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
        None => Vec::new(),
    }
}

/// COUNT(value, ...): number of numeric items
pub fn fn_count(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let count = Value::flatten(args)
        .into_iter()
        .filter(|v| matches!(v, Value::Number(_)))
        .count();
    Ok(Value::Number(count as f64))
}

/// COUNTA(value, ...): number of non-empty items
pub fn fn_counta(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let count = Value::flatten(args)
        .into_iter()
        .filter(|v| !is_empty_item(v))
        .count();
    Ok(Value::Number(count as f64))
}

/// COUNTALL(value, ...): number of items, empty ones included
pub fn fn_countall(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(Value::flatten(args).len() as f64))
}

/// ARRAYJOIN(array, [separator])
pub fn fn_arrayjoin(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let separator = match args.get(1) {
        Some(Value::String(s)) => s.as_str(),
        _ => DEFAULT_SEPARATOR,
    };
    let joined = Value::flatten(&items(args))
        .into_iter()
        .map(Value::to_text)
        .collect::<Vec<_>>()
        .join(separator);
    Ok(Value::String(joined))
}

/// ARRAYUNIQUE(array): first occurrence of each item, by text
pub fn fn_arrayunique(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let mut seen = ahash::AHashSet::new();
    let unique = items(args)
        .into_iter()
        .filter(|v| seen.insert(v.to_text()))
        .collect();
    Ok(Value::Array(unique))
}

/// ARRAYCOMPACT(array): drops blank and empty-text items
pub fn fn_arraycompact(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let compact = items(args)
        .into_iter()
        .filter(|v| !is_empty_item(v))
        .collect();
    Ok(Value::Array(compact))
}
