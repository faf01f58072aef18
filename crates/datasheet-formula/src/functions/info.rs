//! Information functions

use crate::context::EvaluationContext;
use crate::error::EvalResult;
use crate::value::Value;

/// ISERROR(value)
///
/// Registered as error-tolerant: a failed argument arrives as an error value.
pub fn fn_iserror(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(args.first().map_or(false, Value::is_error)))
}

/// BLANK()
pub fn fn_blank(_args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Blank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::eval;

    #[test]
    fn test_iserror() {
        assert_eq!(eval("ISERROR(1 / 0)"), Value::Boolean(true));
        assert_eq!(eval("ISERROR({nope})"), Value::Boolean(true));
        assert_eq!(eval("ISERROR(\"abc\" * 1)"), Value::Boolean(true));
        assert_eq!(eval("ISERROR(1)"), Value::Boolean(false));
    }

    #[test]
    fn test_blank() {
        assert_eq!(eval("BLANK()"), Value::Blank);
        assert_eq!(eval("BLANK() = \"\""), Value::Boolean(true));
        assert_eq!(eval("BLANK() & \"x\""), Value::String("x".into()));
    }
}
