//! Field reference resolution (binding)
//!
//! Binding connects the textual references in a parsed expression to field
//! metadata and function definitions, producing a [`BoundExpression`].
//!
//! - Unknown fields and functions, and referenced Formula fields whose own
//!   expression does not parse, bind to deferred error nodes. They only fail
//!   if evaluation reaches them.
//! - Formula-typed references are bound recursively against the field map of
//!   the formula's datasheet. A reference chain that returns to a formula
//!   already being bound fails the whole bind with
//!   [`ResolveError::CircularReference`]. Formulas are told apart by field
//!   map and id, since ids are only unique within one map.
//! - Each referenced formula is bound once per [`bind`] call; further
//!   references share the bound body.

use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use datasheet_core::{Field, FieldKind, FieldMap};
use tracing::{debug, warn};

use crate::ast::{BinaryOperator, Expr, ExprKind, Literal, UnaryOperator};
use crate::context::EvaluationContext;
use crate::error::{ErrorKind, EvalError, ResolveError};
use crate::functions::{get_function_registry, FunctionDef};
use crate::parser::{parse_expression, ParsedExpression};
use crate::value::Value;

/// Prefix of self-documenting field ids
const FIELD_ID_PREFIX: &str = "fld";

/// Whether reference text looks like a field id rather than a display name
pub fn looks_like_id(text: &str) -> bool {
    text.len() > FIELD_ID_PREFIX.len()
        && text.starts_with(FIELD_ID_PREFIX)
        && text.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Name → field index over one field map, built once per map
#[derive(Debug)]
pub struct NameIndex<'m> {
    map: &'m FieldMap,
    by_name: AHashMap<&'m str, &'m Field>,
}

impl<'m> NameIndex<'m> {
    pub fn new(map: &'m FieldMap) -> Self {
        let mut by_name: AHashMap<&'m str, &'m Field> = AHashMap::with_capacity(map.len());
        for field in map.iter() {
            if let Some(first) = by_name.get(field.name.as_str()) {
                warn!(
                    name = %field.name,
                    kept = %first.id,
                    ignored = %field.id,
                    "duplicate field name, references resolve to the first field"
                );
                continue;
            }
            by_name.insert(field.name.as_str(), field);
        }
        Self { map, by_name }
    }

    /// Resolve reference text to a field
    ///
    /// Id-looking text prefers an exact id match; otherwise the display name
    /// is tried first, then the id.
    pub fn resolve(&self, text: &str) -> Option<&'m Field> {
        if looks_like_id(text) {
            if let Some(field) = self.map.get(text) {
                return Some(field);
            }
        }
        self.by_name
            .get(text)
            .copied()
            .or_else(|| self.map.get(text))
    }
}

/// A bound expression node
#[derive(Debug, Clone)]
pub struct BoundNode<'a> {
    pub kind: BoundKind<'a>,
    /// Byte offset of the source node
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub enum BoundKind<'a> {
    Literal(Value),
    /// A stored (non-formula) field, read from the record
    Field(&'a Field),
    /// A Formula field, computed from its own bound expression
    Formula {
        field: &'a Field,
        body: Rc<BoundNode<'a>>,
    },
    /// Binding failed; evaluating this node yields the error
    Deferred(EvalError),
    Unary {
        op: UnaryOperator,
        operand: Box<BoundNode<'a>>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<BoundNode<'a>>,
        right: Box<BoundNode<'a>>,
    },
    Call {
        def: &'static FunctionDef,
        args: Vec<BoundNode<'a>>,
    },
}

/// An expression whose references have been bound for one evaluation context
#[derive(Debug, Clone)]
pub struct BoundExpression<'a> {
    root: BoundNode<'a>,
}

impl<'a> BoundExpression<'a> {
    pub fn root(&self) -> &BoundNode<'a> {
        &self.root
    }

    /// Errors deferred to evaluation (unknown names, broken formulas).
    ///
    /// A formula referenced several times reports its errors once.
    pub fn deferred_errors(&self) -> Vec<&EvalError> {
        let mut out = Vec::new();
        let mut seen = AHashSet::new();
        collect_deferred(&self.root, &mut out, &mut seen);
        out
    }
}

fn collect_deferred<'n>(
    node: &'n BoundNode<'_>,
    out: &mut Vec<&'n EvalError>,
    seen: &mut AHashSet<*const ()>,
) {
    match &node.kind {
        BoundKind::Deferred(e) => out.push(e),
        BoundKind::Literal(_) | BoundKind::Field(_) => {}
        BoundKind::Formula { body, .. } => {
            if seen.insert(Rc::as_ptr(body).cast()) {
                collect_deferred(body, out, seen);
            }
        }
        BoundKind::Unary { operand, .. } => collect_deferred(operand, out, seen),
        BoundKind::Binary { left, right, .. } => {
            collect_deferred(left, out, seen);
            collect_deferred(right, out, seen);
        }
        BoundKind::Call { args, .. } => {
            for arg in args {
                collect_deferred(arg, out, seen);
            }
        }
    }
}

/// Bind a parsed expression against the context's field map.
///
/// `self_field` is the Formula field being computed; it seeds cycle detection.
pub fn bind<'a>(
    parsed: &ParsedExpression,
    ctx: &EvaluationContext<'a>,
    self_field: &Field,
) -> Result<BoundExpression<'a>, ResolveError> {
    debug!(
        expression = parsed.source(),
        field = %self_field.id,
        "binding expression"
    );
    let mut binder = Binder::new(ctx);
    binder.stack.push(Frame {
        map: ctx.field_map,
        id: self_field.id.clone(),
        name: self_field.name.clone(),
    });
    let root = binder.bind_expr(parsed.ast(), ctx.field_map, 0)?;
    Ok(BoundExpression { root })
}

/// A Formula field currently being bound
struct Frame<'a> {
    map: &'a FieldMap,
    id: String,
    name: String,
}

impl Frame<'_> {
    fn is(&self, map: &FieldMap, id: &str) -> bool {
        std::ptr::eq(self.map, map) && self.id == id
    }
}

/// Identifies a field across maps: map address and field id
type FieldKey = (usize, String);

fn field_key(map: &FieldMap, field: &Field) -> FieldKey {
    (map as *const FieldMap as usize, field.id.clone())
}

struct Binder<'c, 'a> {
    ctx: &'c EvaluationContext<'a>,
    indexes: Vec<NameIndex<'a>>,
    stack: Vec<Frame<'a>>,
    bodies: AHashMap<FieldKey, Rc<BoundNode<'a>>>,
}

impl<'c, 'a> Binder<'c, 'a> {
    fn new(ctx: &'c EvaluationContext<'a>) -> Self {
        Self {
            ctx,
            indexes: Vec::new(),
            stack: Vec::new(),
            bodies: AHashMap::new(),
        }
    }

    fn lookup(&mut self, map: &'a FieldMap, text: &str) -> Option<&'a Field> {
        let position = self
            .indexes
            .iter()
            .position(|index| std::ptr::eq(index.map, map));
        let index = match position {
            Some(i) => &self.indexes[i],
            None => {
                self.indexes.push(NameIndex::new(map));
                &self.indexes[self.indexes.len() - 1]
            }
        };
        index.resolve(text)
    }

    fn bind_expr(
        &mut self,
        expr: &Expr,
        map: &'a FieldMap,
        depth: usize,
    ) -> Result<BoundNode<'a>, ResolveError> {
        let offset = expr.offset;
        if depth >= self.ctx.options.max_depth {
            return Ok(deferred(
                EvalError::new(
                    ErrorKind::LimitExceeded,
                    format!("expression nests deeper than {}", self.ctx.options.max_depth),
                ),
                offset,
            ));
        }

        let kind = match &expr.kind {
            ExprKind::Literal(lit) => BoundKind::Literal(match lit {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
                Literal::Boolean(b) => Value::Boolean(*b),
            }),

            ExprKind::FieldRef(reference) => match self.lookup(map, &reference.text) {
                Some(field) => return self.bind_field(field, map, offset, depth),
                None => BoundKind::Deferred(ResolveError::UnknownField(reference.text.clone()).into()),
            },

            ExprKind::Unary { op, operand } => BoundKind::Unary {
                op: *op,
                operand: Box::new(self.bind_expr(operand, map, depth + 1)?),
            },

            ExprKind::Binary { .. } => return self.bind_chain(expr, map, depth),

            ExprKind::Call { name, args } => match get_function_registry().get(name) {
                Some(def) => BoundKind::Call {
                    def,
                    args: args
                        .iter()
                        .map(|arg| self.bind_expr(arg, map, depth + 1))
                        .collect::<Result<_, _>>()?,
                },
                None => BoundKind::Deferred(ResolveError::UnknownFunction(name.clone()).into()),
            },
        };

        Ok(BoundNode { kind, offset })
    }

    /// Bind a run of binary operators, looping down the left spine the same
    /// way the evaluator folds it
    fn bind_chain(
        &mut self,
        expr: &Expr,
        map: &'a FieldMap,
        depth: usize,
    ) -> Result<BoundNode<'a>, ResolveError> {
        let mut spine = Vec::new();
        let mut first = expr;
        while let ExprKind::Binary { op, left, right } = &first.kind {
            spine.push((*op, right.as_ref(), first.offset));
            first = left.as_ref();
        }

        let mut bound = self.bind_expr(first, map, depth + 1)?;
        for (op, right, offset) in spine.into_iter().rev() {
            let right = self.bind_expr(right, map, depth + 1)?;
            bound = BoundNode {
                kind: BoundKind::Binary {
                    op,
                    left: Box::new(bound),
                    right: Box::new(right),
                },
                offset,
            };
        }
        Ok(bound)
    }

    fn bind_field(
        &mut self,
        field: &'a Field,
        map: &'a FieldMap,
        offset: usize,
        depth: usize,
    ) -> Result<BoundNode<'a>, ResolveError> {
        let prop = match &field.kind {
            FieldKind::Formula(prop) => prop,
            _ => {
                return Ok(BoundNode {
                    kind: BoundKind::Field(field),
                    offset,
                })
            }
        };

        if let Some(start) = self.stack.iter().position(|frame| frame.is(map, &field.id)) {
            let mut path: Vec<String> = self.stack[start..]
                .iter()
                .map(|frame| frame.name.clone())
                .collect();
            path.push(field.name.clone());
            debug!(path = %path.join(" -> "), "circular formula reference");
            return Err(ResolveError::CircularReference(path));
        }

        let key = field_key(map, field);
        if let Some(body) = self.bodies.get(&key) {
            return Ok(BoundNode {
                kind: BoundKind::Formula {
                    field,
                    body: Rc::clone(body),
                },
                offset,
            });
        }

        let parsed = match parse_expression(&prop.expression) {
            Ok(parsed) => parsed,
            Err(err) => {
                return Ok(deferred(
                    EvalError::new(
                        ErrorKind::InvalidFormula,
                        format!("formula field \"{}\" is invalid: {}", field.name, err),
                    ),
                    offset,
                ))
            }
        };

        // The formula is written against its own datasheet's schema
        let sources = self.ctx.sources;
        let nested_map = sources.field_map(&prop.datasheet_id).unwrap_or(map);

        self.stack.push(Frame {
            map,
            id: field.id.clone(),
            name: field.name.clone(),
        });
        let body = self.bind_expr(parsed.ast(), nested_map, depth + 1);
        self.stack.pop();

        let body = Rc::new(body?);
        self.bodies.insert(key, Rc::clone(&body));
        Ok(BoundNode {
            kind: BoundKind::Formula { field, body },
            offset,
        })
    }
}

fn deferred<'a>(error: EvalError, offset: usize) -> BoundNode<'a> {
    BoundNode {
        kind: BoundKind::Deferred(error),
        offset,
    }
}
