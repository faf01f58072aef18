//! Formula evaluator
//!
//! Evaluation is a depth-first, post-order walk of the bound expression. The
//! first error wins and aborts the ancestor chain; only error-tolerant
//! functions (`ISERROR`, `IFERROR`) see a failed subtree as a value.

use std::cmp::Ordering;

use datasheet_core::Field;
use tracing::trace;

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::cell::read_cell;
use crate::context::EvaluationContext;
use crate::error::{ErrorKind, EvalError, EvalResult, FormulaResult};
use crate::functions::Implementation;
use crate::parser::{parse_expression, ParsedExpression};
use crate::resolver::{bind, BoundKind, BoundNode};
use crate::value::{TypedValue, Value, ValueFormat};

/// Evaluate expression text for one record.
///
/// Lex and parse failures are returned as errors with their source offset.
/// Binding and evaluation failures are captured in the returned value, so the
/// host can render them in place.
///
/// # Example
/// ```rust
/// use chrono::Utc;
/// use datasheet_core::{Field, FieldKind, FieldMap, FormulaProperty, NumberProperty, Record};
/// use datasheet_formula::{evaluate, EvaluationContext, Value};
///
/// let fields = FieldMap::from_fields([
///     Field::new("a", "a", FieldKind::Number(NumberProperty::default())),
///     Field::new("x", "x", FieldKind::Formula(FormulaProperty::new("{a} * 2", "dst1"))),
/// ])
/// .unwrap();
/// let record = Record::new("rec1").with_cell("a", 5);
/// let ctx = EvaluationContext::new(&fields, &record, Utc::now());
///
/// let result = evaluate("{a} * 2", &ctx, fields.get("x").unwrap()).unwrap();
/// assert_eq!(result.value, Value::Number(10.0));
/// ```
pub fn evaluate(
    expression: &str,
    ctx: &EvaluationContext<'_>,
    self_field: &Field,
) -> FormulaResult<TypedValue> {
    let parsed = parse_expression(expression)?;
    Ok(evaluate_parsed(&parsed, ctx, self_field))
}

/// Evaluate an already parsed (e.g. cached) expression for one record
pub fn evaluate_parsed(
    parsed: &ParsedExpression,
    ctx: &EvaluationContext<'_>,
    self_field: &Field,
) -> TypedValue {
    let mut evaluation = Evaluation::new(parsed, *ctx, self_field);
    evaluation.run();
    evaluation.into_typed_value()
}

/// Lifecycle of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum EvalState {
    Unresolved,
    Resolving,
    Evaluating,
    Done(Value),
    Failed(EvalError),
}

impl EvalState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EvalState::Done(_) | EvalState::Failed(_))
    }
}

/// One evaluation of a parsed expression against one record
pub struct Evaluation<'p, 'a> {
    parsed: &'p ParsedExpression,
    ctx: EvaluationContext<'a>,
    self_field: &'p Field,
    state: EvalState,
}

impl<'p, 'a> Evaluation<'p, 'a> {
    pub fn new(
        parsed: &'p ParsedExpression,
        ctx: EvaluationContext<'a>,
        self_field: &'p Field,
    ) -> Self {
        Self {
            parsed,
            ctx,
            self_field,
            state: EvalState::Unresolved,
        }
    }

    pub fn state(&self) -> &EvalState {
        &self.state
    }

    fn transition(&mut self, next: EvalState) {
        trace!(from = ?self.state, to = ?next, "evaluation state");
        self.state = next;
    }

    /// Run to a terminal state. Running a finished evaluation is a no-op.
    pub fn run(&mut self) -> &EvalState {
        if self.state.is_terminal() {
            return &self.state;
        }

        self.transition(EvalState::Resolving);
        let bound = match bind(self.parsed, &self.ctx, self.self_field) {
            Ok(bound) => bound,
            Err(err) => {
                self.transition(EvalState::Failed(err.into()));
                return &self.state;
            }
        };

        self.transition(EvalState::Evaluating);
        let mut evaluator = Evaluator::new(self.ctx);
        let next = match evaluator.eval(bound.root()) {
            Ok(value) => EvalState::Done(value),
            Err(err) => EvalState::Failed(err),
        };
        self.transition(next);
        &self.state
    }

    /// Final value with the self field's format hints
    pub fn into_typed_value(mut self) -> TypedValue {
        self.run();
        let format = ValueFormat::for_field(self.self_field);
        let value = match self.state {
            EvalState::Done(value) => value,
            EvalState::Failed(err) => Value::Error(err),
            // run() always ends in a terminal state
            _ => Value::Blank,
        };
        TypedValue::new(value, format)
    }
}

/// Walks bound nodes for one evaluation context, enforcing depth and node budgets
pub struct Evaluator<'a> {
    ctx: EvaluationContext<'a>,
    nodes: usize,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: EvaluationContext<'a>) -> Self {
        Self {
            ctx,
            nodes: 0,
            depth: 0,
        }
    }

    pub fn context(&self) -> &EvaluationContext<'a> {
        &self.ctx
    }

    /// Number of nodes evaluated so far
    pub fn nodes_evaluated(&self) -> usize {
        self.nodes
    }

    fn charge(&mut self, offset: usize) -> EvalResult<()> {
        self.nodes += 1;
        if self.nodes > self.ctx.options.max_nodes {
            return Err(EvalError::new(
                ErrorKind::LimitExceeded,
                format!("evaluation exceeded {} nodes", self.ctx.options.max_nodes),
            )
            .at(offset));
        }
        Ok(())
    }

    /// Evaluate a node; the first error propagates
    pub fn eval(&mut self, node: &BoundNode<'_>) -> EvalResult<Value> {
        self.charge(node.offset)?;
        if self.depth >= self.ctx.options.max_depth {
            return Err(EvalError::new(
                ErrorKind::LimitExceeded,
                format!("evaluation nested deeper than {}", self.ctx.options.max_depth),
            )
            .at(node.offset));
        }

        self.depth += 1;
        let result = self.eval_node(node);
        self.depth -= 1;
        result.map_err(|e| e.at(node.offset))
    }

    /// Evaluate a node, capturing a failure as an error value.
    ///
    /// Budget exhaustion still propagates.
    pub fn try_eval(&mut self, node: &BoundNode<'_>) -> EvalResult<Value> {
        match self.eval(node) {
            Ok(value) => Ok(value),
            Err(err) if err.kind == ErrorKind::LimitExceeded => Err(err),
            Err(err) => Ok(Value::Error(err)),
        }
    }

    fn eval_node(&mut self, node: &BoundNode<'_>) -> EvalResult<Value> {
        match &node.kind {
            BoundKind::Literal(value) => Ok(value.clone()),

            BoundKind::Field(field) => read_cell(
                field,
                self.ctx.record.get(&field.id),
                self.ctx.transform(),
            ),

            BoundKind::Formula { field, body } => {
                trace!(field = %field.id, "evaluating referenced formula");
                // Offsets inside the body belong to another expression
                self.eval(body).map_err(|mut e| {
                    e.offset = Some(node.offset);
                    e
                })
            }

            BoundKind::Deferred(err) => Err(err.clone()),

            BoundKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                apply_unary(*op, &value)
            }

            BoundKind::Binary { .. } => self.eval_chain(node),

            BoundKind::Call { def, args } => {
                def.check_arity(args.len())?;
                match def.implementation {
                    Implementation::Lazy(f) => f(self, args),
                    Implementation::Eager(f) => {
                        let mut values = Vec::with_capacity(args.len());
                        for (i, arg) in args.iter().enumerate() {
                            let value = if def.error_tolerant {
                                self.try_eval(arg)?
                            } else {
                                self.eval(arg)?
                            };
                            values.push(def.coerce(i, value).map_err(|e| e.at(arg.offset))?);
                        }
                        f(&values, &self.ctx)
                    }
                }
            }
        }
    }
}

impl Evaluator<'_> {
    /// Fold a run of binary operators left to right.
    ///
    /// The left spine is walked in a loop, so `a + b + c + ...` costs one
    /// level of depth however long it is.
    fn eval_chain(&mut self, node: &BoundNode<'_>) -> EvalResult<Value> {
        let mut spine = Vec::new();
        let mut first = node;
        while let BoundKind::Binary { op, left, right } = &first.kind {
            if !std::ptr::eq(first, node) {
                self.charge(first.offset)?;
            }
            spine.push((*op, right.as_ref(), first.offset));
            first = left.as_ref();
        }

        let mut acc = self.eval(first)?;
        for (op, right, offset) in spine.into_iter().rev() {
            let right = self.eval(right)?;
            acc = apply_binary(op, &acc, &right).map_err(|e| e.at(offset))?;
        }
        Ok(acc)
    }
}

fn apply_unary(op: UnaryOperator, value: &Value) -> EvalResult<Value> {
    match op {
        UnaryOperator::Negate => Ok(Value::Number(-value.to_number()?)),
        UnaryOperator::Not => Ok(Value::Boolean(!value.to_bool())),
    }
}

fn arithmetic(result: f64) -> EvalResult<Value> {
    if result.is_finite() {
        Ok(Value::Number(result))
    } else {
        Err(EvalError::new(
            ErrorKind::NotANumber,
            "result is not a finite number",
        ))
    }
}

fn apply_binary(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<Value> {
    match op {
        BinaryOperator::Add => arithmetic(left.to_number()? + right.to_number()?),
        BinaryOperator::Subtract => arithmetic(left.to_number()? - right.to_number()?),
        BinaryOperator::Multiply => arithmetic(left.to_number()? * right.to_number()?),
        BinaryOperator::Divide => {
            let (l, r) = (left.to_number()?, right.to_number()?);
            if r == 0.0 {
                return Err(EvalError::division_by_zero());
            }
            arithmetic(l / r)
        }
        BinaryOperator::Modulo => {
            let (l, r) = (left.to_number()?, right.to_number()?);
            if r == 0.0 {
                return Err(EvalError::division_by_zero());
            }
            arithmetic(l % r)
        }
        BinaryOperator::Power => arithmetic(left.to_number()?.powf(right.to_number()?)),

        BinaryOperator::Concat => Ok(Value::String(format!(
            "{}{}",
            left.to_text(),
            right.to_text()
        ))),

        BinaryOperator::Equal => Ok(Value::Boolean(left.compare(right)? == Ordering::Equal)),
        BinaryOperator::NotEqual => Ok(Value::Boolean(left.compare(right)? != Ordering::Equal)),
        BinaryOperator::LessThan => Ok(Value::Boolean(left.compare(right)? == Ordering::Less)),
        BinaryOperator::LessEqual => Ok(Value::Boolean(left.compare(right)? != Ordering::Greater)),
        BinaryOperator::GreaterThan => {
            Ok(Value::Boolean(left.compare(right)? == Ordering::Greater))
        }
        BinaryOperator::GreaterEqual => Ok(Value::Boolean(left.compare(right)? != Ordering::Less)),

        BinaryOperator::And => Ok(Value::Boolean(left.to_bool() && right.to_bool())),
        BinaryOperator::Or => Ok(Value::Boolean(left.to_bool() || right.to_bool())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EvaluationOptions;
    use crate::error::FormulaError;
    use crate::test_support::{eval, eval_record, fixture, now};
    use datasheet_core::{CellData, FieldKind, FieldMap, FormulaProperty, NumberProperty, Record};
    use pretty_assertions::assert_eq;

    fn error_kind(value: Value) -> ErrorKind {
        match value {
            Value::Error(e) => e.kind,
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 1"), Value::Number(2.0));
        assert_eq!(eval("2 + 3 * 4"), Value::Number(14.0));
        assert_eq!(eval("(2 + 3) * 4"), Value::Number(20.0));
        assert_eq!(eval("2 ^ 3 ^ 2"), Value::Number(512.0));
        assert_eq!(eval("-2 ^ 2"), Value::Number(-4.0));
        assert_eq!(eval("7 % 3"), Value::Number(1.0));
        assert_eq!(eval("10 / 4"), Value::Number(2.5));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(error_kind(eval("1 / 0")), ErrorKind::DivisionByZero);
        assert_eq!(error_kind(eval("1 % 0")), ErrorKind::DivisionByZero);
    }

    #[test]
    fn test_comparison_and_logic() {
        assert_eq!(eval("1 < 2"), Value::Boolean(true));
        assert_eq!(eval("2 >= 2"), Value::Boolean(true));
        assert_eq!(eval("\"a\" = \"a\""), Value::Boolean(true));
        assert_eq!(eval("\"a\" <> \"A\""), Value::Boolean(true));
        assert_eq!(eval("\"a\" != \"b\""), Value::Boolean(true));
        assert_eq!(eval("1 = 1 && 2 > 3"), Value::Boolean(false));
        assert_eq!(eval("1 = 1 || 2 > 3"), Value::Boolean(true));
        assert_eq!(eval("!0"), Value::Boolean(true));
    }

    #[test]
    fn test_field_arithmetic() {
        let record = Record::new("rec1").with_cell("a", 5);
        assert_eq!(eval_record("{a} * 2", &record), Value::Number(10.0));
        assert_eq!(eval_record("a * 2", &record), Value::Number(10.0));
    }

    #[test]
    fn test_text_field_is_not_a_number() {
        let record = Record::new("rec1").with_cell("b", CellData::rich_text("abc"));
        assert_eq!(error_kind(eval_record("{b} + 1", &record)), ErrorKind::NotANumber);
    }

    #[test]
    fn test_unknown_field_is_an_error_not_a_zero() {
        assert_eq!(error_kind(eval("{nope} + 1")), ErrorKind::UnknownField);
        assert_eq!(error_kind(eval("NOPE(1)")), ErrorKind::UnknownFunction);
    }

    #[test]
    fn test_error_offset_points_at_failing_node() {
        let map = fixture();
        let record = Record::new("rec1");
        let ctx = EvaluationContext::new(&map, &record, now());
        let result = evaluate("1 + {nope}", &ctx, map.get("x").unwrap()).unwrap();
        assert_eq!(result.error().and_then(|e| e.offset), Some(4));
    }

    #[test]
    fn test_arity_checked_before_arguments() {
        assert_eq!(error_kind(eval("ROUND(1 / 0, 1, 2)")), ErrorKind::ArityMismatch);
        assert_eq!(error_kind(eval("TODAY(1)")), ErrorKind::ArityMismatch);
    }

    #[test]
    fn test_lex_and_parse_errors_are_returned() {
        let map = fixture();
        let record = Record::new("rec1");
        let ctx = EvaluationContext::new(&map, &record, now());
        let x = map.get("x").unwrap();

        assert!(matches!(evaluate("\"open", &ctx, x), Err(FormulaError::Lex(_))));
        assert!(matches!(evaluate("1 +", &ctx, x), Err(FormulaError::Parse(_))));
    }

    #[test]
    fn test_nested_formula_fields() {
        let map = FieldMap::from_fields([
            Field::new("a", "a", FieldKind::Number(NumberProperty::default())),
            Field::new("p", "p", FieldKind::Formula(FormulaProperty::new("{a} + 1", "dst1"))),
            Field::new("q", "q", FieldKind::Formula(FormulaProperty::new("{p} * 10", "dst1"))),
            Field::new("x", "x", FieldKind::Formula(FormulaProperty::new("", "dst1"))),
        ])
        .unwrap();
        let record = Record::new("rec1").with_cell("a", 2);
        let ctx = EvaluationContext::new(&map, &record, now());

        let result = evaluate("{q} + {p}", &ctx, map.get("x").unwrap()).unwrap();
        assert_eq!(result.value, Value::Number(33.0));
    }

    #[test]
    fn test_cycle_becomes_error_value() {
        let map = FieldMap::from_fields([
            Field::new("x", "x", FieldKind::Formula(FormulaProperty::new("{y}", "dst1"))),
            Field::new("y", "y", FieldKind::Formula(FormulaProperty::new("{x}", "dst1"))),
        ])
        .unwrap();
        let record = Record::new("rec1");
        let ctx = EvaluationContext::new(&map, &record, now());

        let result = evaluate("{y}", &ctx, map.get("x").unwrap()).unwrap();
        let err = result.error().unwrap();
        assert_eq!(err.kind, ErrorKind::CircularReference);
        assert_eq!(err.message, "Circular reference: x -> y -> x");
    }

    #[test]
    fn test_state_machine() {
        let map = fixture();
        let record = Record::new("rec1");
        let ctx = EvaluationContext::new(&map, &record, now());
        let parsed = parse_expression("1 + 1").unwrap();
        let x = map.get("x").unwrap();

        let mut evaluation = Evaluation::new(&parsed, ctx, x);
        assert_eq!(evaluation.state(), &EvalState::Unresolved);
        assert_eq!(evaluation.run(), &EvalState::Done(Value::Number(2.0)));
        // Terminal states are sticky
        assert_eq!(evaluation.run(), &EvalState::Done(Value::Number(2.0)));

        let parsed = parse_expression("1 / 0").unwrap();
        let mut evaluation = Evaluation::new(&parsed, ctx, x);
        assert!(matches!(evaluation.run(), EvalState::Failed(e) if e.kind == ErrorKind::DivisionByZero));
    }

    #[test]
    fn test_node_budget() {
        let map = fixture();
        let record = Record::new("rec1");
        let options = EvaluationOptions {
            max_nodes: 5,
            ..EvaluationOptions::default()
        };
        let ctx = EvaluationContext::new(&map, &record, now()).with_options(options);
        let x = map.get("x").unwrap();

        let result = evaluate("1 + 2 + 3 + 4 + 5", &ctx, x).unwrap();
        assert_eq!(result.error().map(|e| e.kind), Some(ErrorKind::LimitExceeded));
        // The budget is not swallowed by ISERROR
        let result = evaluate("ISERROR(1 + 2 + 3 + 4 + 5)", &ctx, x).unwrap();
        assert_eq!(result.error().map(|e| e.kind), Some(ErrorKind::LimitExceeded));
    }

    #[test]
    fn test_long_flat_sum_evaluates() {
        let record = Record::new("rec1").with_cell("a", 1);
        let sum = vec!["{a}"; 300].join(" + ");
        assert_eq!(eval_record(&sum, &record), Value::Number(300.0));

        let mixed = vec!["{a} * 2 - 1"; 300].join(" + ");
        assert_eq!(eval_record(&mixed, &record), Value::Number(300.0));
    }

    #[test]
    fn test_accepted_nesting_fits_depth_budget() {
        let map = fixture();
        let record = Record::new("rec1");
        let ctx = EvaluationContext::new(&map, &record, now());
        let x = map.get("x").unwrap();

        // Deepest unary chain the parser accepts
        let text = format!("{}1", "-".repeat(crate::parser::MAX_NESTING - 1));
        let parsed = parse_expression(&text).unwrap();
        assert_eq!(parsed.ast().nesting(), crate::parser::MAX_NESTING);
        assert_eq!(evaluate_parsed(&parsed, &ctx, x).value, Value::Number(-1.0));
    }

    #[test]
    fn test_diamond_formula_graph_hits_node_budget_quickly() {
        let mut fields = vec![Field::new(
            "f0",
            "f0",
            FieldKind::Number(NumberProperty::default()),
        )];
        for k in 1..=30 {
            let expression = format!("{{f{}}} + {{f{}}}", k - 1, k - 1);
            fields.push(Field::new(
                format!("f{}", k),
                format!("f{}", k),
                FieldKind::Formula(FormulaProperty::new(expression, "dst1")),
            ));
        }
        fields.push(Field::new("x", "x", FieldKind::Formula(FormulaProperty::new("", "dst1"))));
        let map = FieldMap::from_fields(fields).unwrap();
        let record = Record::new("rec1").with_cell("f0", 1);
        let ctx = EvaluationContext::new(&map, &record, now());
        let x = map.get("x").unwrap();

        let started = std::time::Instant::now();
        let result = evaluate("{f30}", &ctx, x).unwrap();
        assert_eq!(result.error().map(|e| e.kind), Some(ErrorKind::LimitExceeded));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));

        // A shallow diamond still evaluates every path
        let result = evaluate("{f5}", &ctx, x).unwrap();
        assert_eq!(result.value, Value::Number(32.0));
    }

    #[test]
    fn test_result_carries_self_field_format() {
        let mut prop = FormulaProperty::new("", "dst1");
        prop.formatting = Some(datasheet_core::Formatting::Number { precision: 2 });
        let x = Field::new("x", "x", FieldKind::Formula(prop));
        let map = FieldMap::from_fields([x.clone()]).unwrap();
        let record = Record::new("rec1");
        let ctx = EvaluationContext::new(&map, &record, now());

        let result = evaluate("10 / 3", &ctx, &x).unwrap();
        assert_eq!(result.format, Some(ValueFormat::Number { precision: 2 }));
        assert_eq!(result.display(), "3.33");
    }
}
