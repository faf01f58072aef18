//! Text functions
//!
//! Positions and lengths count characters, not bytes. Positions are 1-based.

use crate::context::EvaluationContext;
use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::value::Value;

/// Largest text, in bytes, a function may build
pub const MAX_TEXT_LEN: usize = 1 << 20;

fn text_arg(args: &[Value], index: usize) -> &str {
    match args.get(index) {
        Some(Value::String(s)) => s,
        _ => "",
    }
}

/// Optional count argument; negative counts are rejected.
///
/// Fractions truncate and counts beyond `usize` saturate.
fn count_arg(args: &[Value], index: usize, default: usize, func: &str) -> EvalResult<usize> {
    match args.get(index) {
        Some(Value::Number(n)) if *n < 0.0 => Err(EvalError::type_mismatch(format!(
            "{} does not accept a negative count",
            func
        ))),
        Some(Value::Number(n)) => Ok(n.trunc() as usize),
        _ => Ok(default),
    }
}

fn take_left(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn take_right(s: &str, n: usize) -> String {
    let len = s.chars().count();
    if n >= len {
        return s.to_string();
    }
    s.chars().skip(len - n).collect()
}

fn take_mid(s: &str, start_1based: usize, n: usize) -> String {
    if start_1based == 0 {
        return String::new();
    }
    s.chars().skip(start_1based - 1).take(n).collect()
}

/// 1-based character position of `needle` in `haystack` at or after `start`, 0 if absent
fn position(haystack: &str, needle: &str, start_1based: usize) -> usize {
    let skip = start_1based.saturating_sub(1);
    let byte_start = match haystack.char_indices().nth(skip) {
        Some((i, _)) => i,
        None if skip == haystack.chars().count() && needle.is_empty() => haystack.len(),
        None => return 0,
    };
    match haystack[byte_start..].find(needle) {
        Some(byte_pos) => haystack[..byte_start + byte_pos].chars().count() + 1,
        None => 0,
    }
}

/// CONCATENATE(text, ...)
pub fn fn_concatenate(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::String(args.iter().map(text_of).collect()))
}

fn text_of(v: &Value) -> &str {
    match v {
        Value::String(s) => s,
        _ => "",
    }
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let n = count_arg(args, 1, 1, "LEFT")?;
    Ok(Value::String(take_left(text_arg(args, 0), n)))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let n = count_arg(args, 1, 1, "RIGHT")?;
    Ok(Value::String(take_right(text_arg(args, 0), n)))
}

/// MID(text, start_num, num_chars)
pub fn fn_mid(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let start = count_arg(args, 1, 1, "MID")?;
    let n = count_arg(args, 2, 0, "MID")?;
    Ok(Value::String(take_mid(text_arg(args, 0), start, n)))
}

/// LEN(text)
pub fn fn_len(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(text_arg(args, 0).chars().count() as f64))
}

/// FIND(find_text, within_text, [start_num]), case-sensitive, 0 when not found
pub fn fn_find(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let start = count_arg(args, 2, 1, "FIND")?;
    Ok(Value::Number(
        position(text_arg(args, 1), text_arg(args, 0), start) as f64,
    ))
}

/// SEARCH(find_text, within_text, [start_num]), case-insensitive, 0 when not found
pub fn fn_search(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let start = count_arg(args, 2, 1, "SEARCH")?;
    let haystack = text_arg(args, 1).to_lowercase();
    let needle = text_arg(args, 0).to_lowercase();
    Ok(Value::Number(position(&haystack, &needle, start) as f64))
}

/// TRIM(text): strips both ends and collapses inner runs of spaces
pub fn fn_trim(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let trimmed = text_arg(args, 0)
        .split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Value::String(trimmed))
}

/// UPPER(text)
pub fn fn_upper(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::String(text_arg(args, 0).to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::String(text_arg(args, 0).to_lowercase()))
}

/// REPLACE(old_text, start_num, num_chars, new_text)
pub fn fn_replace(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let text = text_arg(args, 0);
    let keep = count_arg(args, 1, 1, "REPLACE")?.saturating_sub(1);
    let n = count_arg(args, 2, 0, "REPLACE")?;
    let new_text = text_arg(args, 3);

    let mut out: String = text.chars().take(keep).collect();
    out.push_str(new_text);
    out.extend(text.chars().skip(keep.saturating_add(n)));
    Ok(Value::String(out))
}

/// SUBSTITUTE(text, old_text, new_text, [instance_num])
pub fn fn_substitute(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let text = text_arg(args, 0);
    let old = text_arg(args, 1);
    let new = text_arg(args, 2);

    if old.is_empty() {
        return Ok(Value::String(text.to_string()));
    }

    let instance = count_arg(args, 3, 0, "SUBSTITUTE")?;
    if instance == 0 {
        return Ok(Value::String(text.replace(old, new)));
    }

    match text.match_indices(old).nth(instance - 1) {
        Some((i, _)) => Ok(Value::String(format!(
            "{}{}{}",
            &text[..i],
            new,
            &text[i + old.len()..]
        ))),
        None => Ok(Value::String(text.to_string())),
    }
}

/// REPT(text, times)
pub fn fn_rept(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let text = text_arg(args, 0);
    let times = count_arg(args, 1, 0, "REPT")?;
    match text.len().checked_mul(times) {
        Some(len) if len <= MAX_TEXT_LEN => Ok(Value::String(text.repeat(times))),
        _ => Err(EvalError::new(
            ErrorKind::LimitExceeded,
            format!("REPT result is longer than {} bytes", MAX_TEXT_LEN),
        )),
    }
}

/// T(value): the value if it is text, otherwise empty text
pub fn fn_t(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    match args.first() {
        Some(Value::String(s)) => Ok(Value::String(s.clone())),
        _ => Ok(Value::String(String::new())),
    }
}
