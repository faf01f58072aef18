//! Logical functions
//!
//! `IF`, `SWITCH` and `IFERROR` receive unevaluated argument nodes and only
//! evaluate the branch they take.

use crate::context::EvaluationContext;
use crate::error::EvalResult;
use crate::evaluator::Evaluator;
use crate::resolver::BoundNode;
use crate::value::Value;

/// IF(condition, then, [else])
pub fn fn_if(ev: &mut Evaluator<'_>, args: &[BoundNode<'_>]) -> EvalResult<Value> {
    let condition = ev.eval(&args[0])?;
    if condition.to_bool() {
        ev.eval(&args[1])
    } else {
        match args.get(2) {
            Some(otherwise) => ev.eval(otherwise),
            None => Ok(Value::Blank),
        }
    }
}

/// SWITCH(expression, pattern, result, [pattern, result]..., [default])
pub fn fn_switch(ev: &mut Evaluator<'_>, args: &[BoundNode<'_>]) -> EvalResult<Value> {
    let subject = ev.eval(&args[0])?;
    let rest = &args[1..];

    let mut pairs = rest.chunks_exact(2);
    for pair in pairs.by_ref() {
        let pattern = ev.eval(&pair[0])?;
        if subject.compare(&pattern)?.is_eq() {
            return ev.eval(&pair[1]);
        }
    }

    match pairs.remainder() {
        [default] => ev.eval(default),
        _ => Ok(Value::Blank),
    }
}

/// IFERROR(value, fallback)
pub fn fn_iferror(ev: &mut Evaluator<'_>, args: &[BoundNode<'_>]) -> EvalResult<Value> {
    match ev.try_eval(&args[0])? {
        Value::Error(_) => ev.eval(&args[1]),
        value => Ok(value),
    }
}

/// AND(value, ...): true when every argument is truthy
pub fn fn_and(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(args.iter().all(Value::to_bool)))
}

/// OR(value, ...): true when any argument is truthy
pub fn fn_or(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(args.iter().any(Value::to_bool)))
}

/// XOR(value, ...): true when an odd number of arguments are truthy
pub fn fn_xor(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    let truthy = args.iter().filter(|v| v.to_bool()).count();
    Ok(Value::Boolean(truthy % 2 == 1))
}

/// NOT(value)
pub fn fn_not(args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(!args.first().map_or(false, Value::to_bool)))
}

/// TRUE()
pub fn fn_true(_args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(true))
}

/// FALSE()
pub fn fn_false(_args: &[Value], _ctx: &EvaluationContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(false))
}
