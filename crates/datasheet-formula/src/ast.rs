//! Formula Abstract Syntax Tree types

/// An expression node and the byte offset of the token that starts it
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub offset: usize,
    height: usize,
    nesting: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, offset: usize) -> Self {
        let (height, nesting) = match &kind {
            ExprKind::Literal(_) | ExprKind::FieldRef(_) => (1, 1),
            ExprKind::Unary { operand, .. } => (operand.height + 1, operand.nesting + 1),
            ExprKind::Binary { left, right, .. } => {
                let height = left.height.max(right.height) + 1;
                // A left operand that is itself binary continues the same chain
                let nesting = match left.kind {
                    ExprKind::Binary { .. } => left.nesting.max(right.nesting + 1),
                    _ => left.nesting.max(right.nesting) + 1,
                };
                (height, nesting)
            }
            ExprKind::Call { args, .. } => (
                args.iter().map(|a| a.height).max().unwrap_or(0) + 1,
                args.iter().map(|a| a.nesting).max().unwrap_or(0) + 1,
            ),
        };
        Self {
            kind,
            offset,
            height,
            nesting,
        }
    }

    /// Visit every field reference in source order
    pub fn visit_field_refs<'e, F: FnMut(&'e FieldRef, usize)>(&'e self, f: &mut F) {
        match &self.kind {
            ExprKind::Literal(_) => {}
            ExprKind::FieldRef(r) => f(r, self.offset),
            ExprKind::Unary { operand, .. } => operand.visit_field_refs(f),
            ExprKind::Binary { left, right, .. } => {
                left.visit_field_refs(f);
                right.visit_field_refs(f);
            }
            ExprKind::Call { args, .. } => {
                for arg in args {
                    arg.visit_field_refs(f);
                }
            }
        }
    }

    /// Height of the tree
    pub fn height(&self) -> usize {
        self.height
    }

    /// Evaluation nesting: like [`Expr::height`], except that a run of binary
    /// operators folded left to right (`a + b - c`) counts as one level.
    pub fn nesting(&self) -> usize {
        self.nesting
    }
}

/// Formula expression variants
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // === Literals ===
    Literal(Literal),

    // === References ===
    FieldRef(FieldRef),

    // === Operators ===
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    // === Function call ===
    /// Name is stored uppercase
    Call { name: String, args: Vec<Expr> },
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
}

/// A reference to a field by name or id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// Reference text with escapes removed
    pub text: String,
    /// Written as `{...}` rather than a bare identifier
    pub braced: bool,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,

    // Text
    Concat,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Logical
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Power => "^",
            BinaryOperator::Concat => "&",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}
