//! Formula parser
//!
//! A recursive descent parser over the token list produced by
//! [`crate::lexer::tokenize`], with one function per precedence level.
//! The parser only establishes shape: no type checking, and unknown function
//! names are accepted here and rejected when binding.

use crate::ast::{BinaryOperator, Expr, ExprKind, FieldRef, Literal, UnaryOperator};
use crate::error::{FormulaResult, ParseError, ParseErrorKind};
use crate::lexer::{tokenize, LintWarning, Spanned, Token};

/// Maximum nesting of parenthesized expressions, calls, unary operators and
/// operands, matching the default evaluation depth budget.
///
/// See [`Expr::nesting`] for how operator chains are counted.
pub const MAX_NESTING: usize = 256;

/// Maximum height of a parsed tree, bounding long flat operator chains
pub const MAX_HEIGHT: usize = 1024;

/// A syntactically valid expression, independent of any field map.
///
/// This is what callers cache by expression text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExpression {
    source: String,
    ast: Expr,
    warnings: Vec<LintWarning>,
}

impl ParsedExpression {
    /// Original expression text
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Lint findings (e.g. unescaped `{` inside a field reference)
    pub fn warnings(&self) -> &[LintWarning] {
        &self.warnings
    }

    /// Referenced field names/ids in source order, without duplicates
    pub fn field_references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = Vec::new();
        self.ast.visit_field_refs(&mut |r, _| {
            if !refs.contains(&r.text.as_str()) {
                refs.push(r.text.as_str());
            }
        });
        refs
    }
}

/// Parse expression text into a [`ParsedExpression`]
///
/// # Example
/// ```rust
/// use datasheet_formula::parse_expression;
///
/// let parsed = parse_expression("IF({Done}, \"yes\", \"no\")").unwrap();
/// assert_eq!(parsed.field_references(), vec!["Done"]);
/// ```
pub fn parse_expression(expression: &str) -> FormulaResult<ParsedExpression> {
    let tokens = tokenize(expression)?;
    let ast = parse(&tokens.tokens)?;
    for warning in &tokens.warnings {
        tracing::warn!(offset = warning.offset, "{}", warning.message);
    }
    tracing::debug!(
        expression,
        warnings = tokens.warnings.len(),
        "parsed expression"
    );
    Ok(ParsedExpression {
        source: expression.to_string(),
        ast,
        warnings: tokens.warnings,
    })
}

/// Parse a token list (as produced by the lexer, ending in `Eof`)
pub fn parse(tokens: &[Spanned]) -> Result<Expr, ParseError> {
    let mut parser = FormulaParser::new(tokens);
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    let current = parser.current();
    match current.token {
        Token::Eof => Ok(expr),
        Token::RightParen => Err(parser.error(ParseErrorKind::UnbalancedParens)),
        Token::Pipe => Err(parser.error(ParseErrorKind::UnknownOperator)),
        _ => Err(parser.error(ParseErrorKind::UnexpectedToken)),
    }
}

static EOF: Spanned = Spanned {
    token: Token::Eof,
    offset: 0,
};

struct FormulaParser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
    depth: usize,
}

impl<'t> FormulaParser<'t> {
    fn new(tokens: &'t [Spanned]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // === Token cursor ===

    fn current(&self) -> &'t Spanned {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .unwrap_or(&EOF)
    }

    fn current_token(&self) -> &'t Token {
        &self.current().token
    }

    fn consume(&mut self) -> &'t Spanned {
        let token = self.current();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        let current = self.current();
        ParseError::new(kind, current.token.to_string(), current.offset)
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(ParseErrorKind::NestingTooDeep));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Build a node, rejecting trees too deep to evaluate
    fn node(&self, kind: ExprKind, offset: usize) -> Result<Expr, ParseError> {
        let expr = Expr::new(kind, offset);
        if expr.nesting() > MAX_NESTING || expr.height() > MAX_HEIGHT {
            return Err(self.error(ParseErrorKind::NestingTooDeep));
        }
        Ok(expr)
    }

    /// Expect a closing parenthesis; running out of input means it was never closed
    fn expect_close(&mut self) -> Result<(), ParseError> {
        match self.current_token() {
            Token::RightParen => {
                self.consume();
                Ok(())
            }
            Token::Eof => Err(self.error(ParseErrorKind::UnbalancedParens)),
            Token::Pipe => Err(self.error(ParseErrorKind::UnknownOperator)),
            _ => Err(self.error(ParseErrorKind::UnexpectedToken)),
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Logical or: ||
    // 2. Logical and: &&
    // 3. Equality: =, <>
    // 4. Relational: <, <=, >, >=
    // 5. Additive: +, -, & (concatenation)
    // 6. Multiplicative: *, /, %
    // 7. Unary: -, !, +
    // 8. Power: ^ (right associative)
    // 9. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn binary(&self, op: BinaryOperator, left: Expr, right: Expr) -> Result<Expr, ParseError> {
        let offset = left.offset;
        self.node(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            offset,
        )
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;

        while matches!(self.current_token(), Token::OrOr) {
            self.consume();
            let right = self.parse_and()?;
            left = self.binary(BinaryOperator::Or, left, right)?;
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;

        while matches!(self.current_token(), Token::AndAnd) {
            self.consume();
            let right = self.parse_equality()?;
            left = self.binary(BinaryOperator::And, left, right)?;
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_relational()?;
            left = self.binary(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.current_token() {
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_additive()?;
            left = self.binary(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                Token::Ampersand => BinaryOperator::Concat,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = self.binary(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.consume();
            let right = self.parse_unary()?;
            left = self.binary(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current_token() {
            Token::Minus => Some(UnaryOperator::Negate),
            Token::Bang => Some(UnaryOperator::Not),
            Token::Plus => None,
            _ => return self.parse_power(),
        };

        let offset = self.consume().offset;
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        let operand = operand?;

        match op {
            Some(op) => self.node(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                offset,
            ),
            // Prefix plus (no-op)
            None => Ok(operand),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_primary()?;

        if matches!(self.current_token(), Token::Caret) {
            self.consume();
            // Right associative; the exponent may carry its own sign
            self.enter()?;
            let right = self.parse_unary();
            self.leave();
            return self.binary(BinaryOperator::Power, left, right?);
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let current = self.current();
        let offset = current.offset;

        match &current.token {
            Token::Number(n) => {
                self.consume();
                Ok(Expr::new(ExprKind::Literal(Literal::Number(*n)), offset))
            }

            Token::String(s) => {
                self.consume();
                Ok(Expr::new(
                    ExprKind::Literal(Literal::String(s.clone())),
                    offset,
                ))
            }

            Token::Boolean(b) => {
                self.consume();
                Ok(Expr::new(ExprKind::Literal(Literal::Boolean(*b)), offset))
            }

            Token::FieldRef(text) => {
                self.consume();
                Ok(Expr::new(
                    ExprKind::FieldRef(FieldRef {
                        text: text.clone(),
                        braced: true,
                    }),
                    offset,
                ))
            }

            Token::Identifier(name) => {
                self.consume();
                // Check if it's a function call
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name, offset)
                } else {
                    Ok(Expr::new(
                        ExprKind::FieldRef(FieldRef {
                            text: name.clone(),
                            braced: false,
                        }),
                        offset,
                    ))
                }
            }

            Token::LeftParen => {
                self.consume();
                self.enter()?;
                let expr = self.parse_expression();
                self.leave();
                let expr = expr?;
                self.expect_close()?;
                Ok(expr)
            }

            Token::Eof => Err(self.error(ParseErrorKind::UnexpectedEnd)),
            Token::Pipe => Err(self.error(ParseErrorKind::UnknownOperator)),
            _ => Err(self.error(ParseErrorKind::UnexpectedToken)),
        }
    }

    fn parse_function_call(&mut self, name: &str, offset: usize) -> Result<Expr, ParseError> {
        self.consume(); // '('
        self.enter()?;
        let args = self.parse_arguments();
        self.leave();
        let args = args?;

        self.node(
            ExprKind::Call {
                name: name.to_uppercase(),
                args,
            },
            offset,
        )
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();

        if matches!(self.current_token(), Token::RightParen) {
            self.consume();
            return Ok(args);
        }

        args.push(self.parse_expression()?);
        while matches!(self.current_token(), Token::Comma) {
            self.consume();
            args.push(self.parse_expression()?);
        }

        self.expect_close()?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormulaError;

    fn parse_str(text: &str) -> Expr {
        parse_expression(text).unwrap().ast
    }

    fn parse_err(text: &str) -> ParseError {
        match parse_expression(text) {
            Err(FormulaError::Parse(e)) => e,
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_str("42").kind, ExprKind::Literal(Literal::Number(42.0)));
        assert_eq!(
            parse_str("\"Hello\"").kind,
            ExprKind::Literal(Literal::String("Hello".into()))
        );
        assert_eq!(parse_str("TRUE").kind, ExprKind::Literal(Literal::Boolean(true)));
    }

    #[test]
    fn test_parse_precedence() {
        // 1 + 2 * 3 => 1 + (2 * 3)
        let ast = parse_str("1 + 2 * 3");
        if let ExprKind::Binary { op, left, right } = ast.kind {
            assert_eq!(op, BinaryOperator::Add);
            assert_eq!(left.kind, ExprKind::Literal(Literal::Number(1.0)));
            assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOperator::Multiply,
                    ..
                }
            ));
        } else {
            panic!("Expected Binary");
        }

        // a || b && c => a || (b && c)
        let ast = parse_str("a || b && c");
        assert!(matches!(
            ast.kind,
            ExprKind::Binary {
                op: BinaryOperator::Or,
                ..
            }
        ));

        // 1 < 2 = TRUE => (1 < 2) = TRUE
        let ast = parse_str("1 < 2 = TRUE");
        if let ExprKind::Binary { op, left, .. } = ast.kind {
            assert_eq!(op, BinaryOperator::Equal);
            assert!(matches!(
                left.kind,
                ExprKind::Binary {
                    op: BinaryOperator::LessThan,
                    ..
                }
            ));
        } else {
            panic!("Expected Binary");
        }
    }

    #[test]
    fn test_concat_is_additive() {
        // "a" & 1 + 2 => ("a" & 1) + 2, left associative at one level
        let ast = parse_str("\"a\" & 1 + 2");
        if let ExprKind::Binary { op, left, .. } = ast.kind {
            assert_eq!(op, BinaryOperator::Add);
            assert!(matches!(
                left.kind,
                ExprKind::Binary {
                    op: BinaryOperator::Concat,
                    ..
                }
            ));
        } else {
            panic!("Expected Binary");
        }
    }

    #[test]
    fn test_power_right_associative_and_above_unary() {
        // 2 ^ 3 ^ 2 => 2 ^ (3 ^ 2)
        let ast = parse_str("2 ^ 3 ^ 2");
        if let ExprKind::Binary { op, right, .. } = ast.kind {
            assert_eq!(op, BinaryOperator::Power);
            assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOperator::Power,
                    ..
                }
            ));
        } else {
            panic!("Expected Binary");
        }

        // -2 ^ 2 => -(2 ^ 2)
        let ast = parse_str("-2 ^ 2");
        if let ExprKind::Unary { op, operand } = ast.kind {
            assert_eq!(op, UnaryOperator::Negate);
            assert!(matches!(
                operand.kind,
                ExprKind::Binary {
                    op: BinaryOperator::Power,
                    ..
                }
            ));
        } else {
            panic!("Expected Unary");
        }
    }

    #[test]
    fn test_parse_function_call() {
        let ast = parse_str("concatenate({b}, \"!\")");
        if let ExprKind::Call { name, args } = ast.kind {
            assert_eq!(name, "CONCATENATE");
            assert_eq!(args.len(), 2);
            assert!(matches!(&args[0].kind, ExprKind::FieldRef(r) if r.text == "b" && r.braced));
        } else {
            panic!("Expected Call");
        }

        let ast = parse_str("TODAY()");
        assert!(matches!(ast.kind, ExprKind::Call { ref args, .. } if args.is_empty()));

        // Unknown names are accepted syntactically
        assert!(parse_expression("NO_SUCH_FN(1)").is_ok());
    }

    #[test]
    fn test_bare_identifier_is_field_ref() {
        let ast = parse_str("fld11111 + 1");
        if let ExprKind::Binary { left, .. } = ast.kind {
            assert_eq!(
                left.kind,
                ExprKind::FieldRef(FieldRef {
                    text: "fld11111".into(),
                    braced: false
                })
            );
        } else {
            panic!("Expected Binary");
        }
    }

    #[test]
    fn test_offsets() {
        let ast = parse_str("1 + {abc}");
        if let ExprKind::Binary { right, .. } = ast.kind {
            assert_eq!(right.offset, 4);
        } else {
            panic!("Expected Binary");
        }
    }

    #[test]
    fn test_field_references_listed_once() {
        let parsed = parse_expression("{a} + {b} * {a} + c").unwrap();
        assert_eq!(parsed.field_references(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_err("1 +");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEnd);
        assert_eq!(err.offset, 3);

        assert_eq!(parse_err("").kind, ParseErrorKind::UnexpectedEnd);
        assert_eq!(parse_err("(1 + 2").kind, ParseErrorKind::UnbalancedParens);
        assert_eq!(parse_err("SUM(1, 2").kind, ParseErrorKind::UnbalancedParens);
        assert_eq!(parse_err("1 + 2)").kind, ParseErrorKind::UnbalancedParens);
        assert_eq!(parse_err("1 | 2").kind, ParseErrorKind::UnknownOperator);
        assert_eq!(parse_err("1 2").kind, ParseErrorKind::UnexpectedToken);
        assert_eq!(parse_err("SUM(1,)").kind, ParseErrorKind::UnexpectedToken);

        let err = parse_err("1 * , 2");
        assert_eq!(err.token, ",");
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert_eq!(parse_err(&deep).kind, ParseErrorKind::NestingTooDeep);

        let ok = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(parse_expression(&ok).is_ok());
    }

    #[test]
    fn test_power_chain_is_nesting() {
        let chain = vec!["2"; MAX_NESTING * 4].join("^");
        assert_eq!(parse_err(&chain).kind, ParseErrorKind::NestingTooDeep);

        let ok = vec!["1"; 100].join("^");
        assert!(parse_expression(&ok).is_ok());
    }

    #[test]
    fn test_flat_chain_counts_as_one_level() {
        let sum = vec!["{a}"; 300].join(" + ");
        let parsed = parse_expression(&sum).unwrap();
        assert_eq!(parsed.ast().height(), 300);
        assert_eq!(parsed.ast().nesting(), 2);

        // Mixed precedence still folds per level
        assert_eq!(parse_str("1 + 2 * 3 - 4").nesting(), 3);
        assert_eq!(parse_str("-(1 + 2)").nesting(), 3);
    }

    #[test]
    fn test_long_chains_are_rejected_not_overflowed() {
        let chain = vec!["1"; 20_000].join("+");
        assert_eq!(parse_err(&chain).kind, ParseErrorKind::NestingTooDeep);

        let chain = vec!["1"; MAX_HEIGHT].join("*");
        assert!(parse_expression(&chain).is_ok());
    }

    #[test]
    fn test_lex_error_surfaces() {
        assert!(matches!(
            parse_expression("{unterminated"),
            Err(FormulaError::Lex(_))
        ));
    }
}
