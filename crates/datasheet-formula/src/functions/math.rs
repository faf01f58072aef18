//! Math functions

use rust_decimal::RoundingStrategy;

use crate::context::EvaluationContext;
use crate::error::{EvalError, EvalResult};
use crate::format::round_with;
use crate::value::{parse_number, Value};

/// Numbers among the (flattened) arguments; blanks are skipped
fn numbers(args: &[Value]) -> EvalResult<Vec<f64>> {
    Value::flatten(args)
        .into_iter()
        .filter(|v| !v.is_blank())
        .map(Value::to_number)
        .collect()
}

fn number_arg(args: &[Value], index: usize) -> f64 {
    match args.get(index) {
        Some(Value::Number(n)) => *n,
        _ => 0.0,
    }
}

fn finite(n: f64) -> EvalResult<Value> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(EvalError::not_a_number(&n.to_string()))
    }
}

/// SUM(number, ...)
pub fn fn_sum(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    finite(numbers(args)?.iter().sum())
}

/// AVERAGE(number, ...)
pub fn fn_average(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let values = numbers(args)?;
    if values.is_empty() {
        return Err(EvalError::division_by_zero());
    }
    finite(values.iter().sum::<f64>() / values.len() as f64)
}

/// MAX(number, ...), 0 when there is nothing to compare
pub fn fn_max(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let max = numbers(args)?.into_iter().reduce(f64::max).unwrap_or(0.0);
    Ok(Value::Number(max))
}

/// MIN(number, ...), 0 when there is nothing to compare
pub fn fn_min(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let min = numbers(args)?.into_iter().reduce(f64::min).unwrap_or(0.0);
    Ok(Value::Number(min))
}

/// ROUND(number, [digits])
///
/// Uses "round half away from zero"
pub fn fn_round(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let digits = number_arg(args, 1).trunc() as i32;
    Ok(Value::Number(round_with(
        number_arg(args, 0),
        digits,
        RoundingStrategy::MidpointAwayFromZero,
    )))
}

/// ROUNDUP(number, [digits]), away from zero
pub fn fn_roundup(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let digits = number_arg(args, 1).trunc() as i32;
    Ok(Value::Number(round_with(
        number_arg(args, 0),
        digits,
        RoundingStrategy::AwayFromZero,
    )))
}

/// ROUNDDOWN(number, [digits]), toward zero
pub fn fn_rounddown(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let digits = number_arg(args, 1).trunc() as i32;
    Ok(Value::Number(round_with(
        number_arg(args, 0),
        digits,
        RoundingStrategy::ToZero,
    )))
}

/// ABS(number)
pub fn fn_abs(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(number_arg(args, 0).abs()))
}

/// MOD(number, divisor)
///
/// The result takes the sign of the divisor.
pub fn fn_mod(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let number = number_arg(args, 0);
    let divisor = number_arg(args, 1);
    if divisor == 0.0 {
        return Err(EvalError::division_by_zero());
    }
    finite(number - divisor * (number / divisor).floor())
}

/// POWER(base, exponent)
pub fn fn_power(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    finite(number_arg(args, 0).powf(number_arg(args, 1)))
}

/// INT(number), rounds toward negative infinity
pub fn fn_int(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(number_arg(args, 0).floor()))
}

/// SQRT(number)
pub fn fn_sqrt(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let n = number_arg(args, 0);
    if n < 0.0 {
        return Err(EvalError::not_a_number(&format!("SQRT({})", n)));
    }
    Ok(Value::Number(n.sqrt()))
}

/// VALUE(text)
pub fn fn_value(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let text = args.first().map(Value::to_text).unwrap_or_default();
    parse_number(&text)
        .map(Value::Number)
        .ok_or_else(|| EvalError::not_a_number(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::eval;

    #[test]
    fn test_sum_and_average() {
        assert_eq!(eval("SUM(1, 2, 3)"), Value::Number(6.0));
        assert_eq!(eval("SUM(\"4\", TRUE)"), Value::Number(5.0));
        assert_eq!(eval("AVERAGE(2, 4)"), Value::Number(3.0));
        assert!(matches!(eval("SUM(\"x\")"), Value::Error(e) if e.kind == ErrorKind::NotANumber));
    }

    #[test]
    fn test_max_min() {
        assert_eq!(eval("MAX(3, 9, -1)"), Value::Number(9.0));
        assert_eq!(eval("MIN(3, 9, -1)"), Value::Number(-1.0));
        assert_eq!(eval("MAX(BLANK())"), Value::Number(0.0));
    }

    #[test]
    fn test_round_family() {
        assert_eq!(eval("ROUND(2.5)"), Value::Number(3.0));
        assert_eq!(eval("ROUND(-2.5)"), Value::Number(-3.0));
        assert_eq!(eval("ROUND(3.14159, 2)"), Value::Number(3.14));
        assert_eq!(eval("ROUND(1234, -2)"), Value::Number(1200.0));
        assert_eq!(eval("ROUNDUP(1.21, 1)"), Value::Number(1.3));
        assert_eq!(eval("ROUNDDOWN(1.29, 1)"), Value::Number(1.2));
        assert_eq!(eval("ROUND(1.5, 1e20)"), Value::Number(1.5));
        assert_eq!(eval("ROUND(1.5, -1e20)"), Value::Number(0.0));
    }

    #[test]
    fn test_mod_sign_follows_divisor() {
        assert_eq!(eval("MOD(10, 3)"), Value::Number(1.0));
        assert_eq!(eval("MOD(-10, 3)"), Value::Number(2.0));
        assert!(matches!(eval("MOD(1, 0)"), Value::Error(e) if e.kind == ErrorKind::DivisionByZero));
    }

    #[test]
    fn test_misc() {
        assert_eq!(eval("ABS(-4)"), Value::Number(4.0));
        assert_eq!(eval("POWER(2, 10)"), Value::Number(1024.0));
        assert_eq!(eval("INT(-1.5)"), Value::Number(-2.0));
        assert_eq!(eval("SQRT(16)"), Value::Number(4.0));
        assert_eq!(eval("VALUE(\" 12.5 \")"), Value::Number(12.5));
        assert!(matches!(eval("SQRT(-1)"), Value::Error(e) if e.kind == ErrorKind::NotANumber));
    }

    #[test]
    fn test_date_is_not_a_pure_number() {
        assert!(matches!(
            eval("ABS(TODAY())"),
            Value::Error(e) if e.kind == ErrorKind::TypeMismatch
        ));
    }
}
