//! Formula lexer
//!
//! Turns expression text into a fully realized token list. Offsets are byte
//! offsets into the original text.

use std::fmt;

use crate::error::{LexError, LexErrorKind};

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),

    // Names
    Identifier(String),
    /// `{...}` body with escapes removed
    FieldRef(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Ampersand,
    AndAnd,
    OrOr,
    /// A lone `|`; lexes so the parser can report it as an unknown operator
    Pipe,
    Bang,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Token::Identifier(name) => f.write_str(name),
            Token::FieldRef(name) => write!(f, "{{{}}}", name),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Percent => f.write_str("%"),
            Token::Caret => f.write_str("^"),
            Token::Ampersand => f.write_str("&"),
            Token::AndAnd => f.write_str("&&"),
            Token::OrOr => f.write_str("||"),
            Token::Pipe => f.write_str("|"),
            Token::Bang => f.write_str("!"),
            Token::Equal => f.write_str("="),
            Token::NotEqual => f.write_str("<>"),
            Token::LessThan => f.write_str("<"),
            Token::LessEqual => f.write_str("<="),
            Token::GreaterThan => f.write_str(">"),
            Token::GreaterEqual => f.write_str(">="),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

/// A token and the byte offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Non-fatal finding about the expression text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintWarning {
    pub offset: usize,
    pub message: String,
}

/// Output of [`tokenize`]: tokens (always ending in [`Token::Eof`]) and lint warnings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tokens {
    pub tokens: Vec<Spanned>,
    pub warnings: Vec<LintWarning>,
}

/// Tokenize an expression
///
/// # Example
/// ```rust
/// use datasheet_formula::lexer::{tokenize, Token};
///
/// let tokens = tokenize("{a} * 2").unwrap();
/// assert_eq!(tokens.tokens[0].token, Token::FieldRef("a".into()));
/// ```
pub fn tokenize(input: &str) -> Result<Tokens, LexError> {
    let mut lexer = Lexer::new(input);
    let mut out = Tokens::default();

    loop {
        lexer.skip_whitespace();
        let offset = lexer.pos;
        let token = lexer.scan_token(&mut out.warnings)?;
        let done = token == Token::Eof;
        out.tokens.push(Spanned { token, offset });
        if done {
            return Ok(out);
        }
    }
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn scan_token(&mut self, warnings: &mut Vec<LintWarning>) -> Result<Token, LexError> {
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        // Single-character tokens
        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            '^' => Some(Token::Caret),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            ',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        // One- or two-character operators
        match c {
            '&' => return Ok(self.pair('&', Token::AndAnd, Token::Ampersand)),
            '|' => return Ok(self.pair('|', Token::OrOr, Token::Pipe)),
            '!' => return Ok(self.pair('=', Token::NotEqual, Token::Bang)),
            '=' => return Ok(self.pair('=', Token::Equal, Token::Equal)),
            '>' => return Ok(self.pair('=', Token::GreaterEqual, Token::GreaterThan)),
            '<' => {
                self.advance();
                return Ok(match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token::LessEqual
                    }
                    Some('>') => {
                        self.advance();
                        Token::NotEqual
                    }
                    _ => Token::LessThan,
                });
            }
            _ => {}
        }

        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        if c == '{' {
            return self.scan_field_ref(warnings);
        }

        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c.is_alphabetic() || c == '_' {
            return Ok(self.scan_identifier());
        }

        Err(LexError::new(LexErrorKind::InvalidCharacter(c), self.pos))
    }

    /// Consume the current char, then `second` if it follows
    fn pair(&mut self, second: char, double: Token, single: Token) -> Token {
        self.advance();
        if self.peek_char() == Some(second) {
            self.advance();
            double
        } else {
            single
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<Token, LexError> {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => return Err(LexError::new(LexErrorKind::UnterminatedString, start)),
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        None => {
                            return Err(LexError::new(LexErrorKind::UnterminatedString, start))
                        }
                        Some(escaped) => {
                            s.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                other => other,
                            });
                            self.advance();
                        }
                    }
                }
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(Token::String(s));
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    /// `{...}`: everything up to the first unescaped `}`.
    ///
    /// `\{`, `\}` and `\\` are escapes. A raw `{` in the body is accepted but
    /// reported, since the author most likely meant to escape it.
    fn scan_field_ref(&mut self, warnings: &mut Vec<LintWarning>) -> Result<Token, LexError> {
        let start = self.pos;
        self.advance(); // Skip '{'

        let mut name = String::new();
        loop {
            match self.peek_char() {
                None => return Err(LexError::new(LexErrorKind::UnterminatedReference, start)),
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        None => {
                            return Err(LexError::new(
                                LexErrorKind::UnterminatedReference,
                                start,
                            ))
                        }
                        Some(escaped) => {
                            name.push(escaped);
                            self.advance();
                        }
                    }
                }
                Some('}') => {
                    self.advance();
                    return Ok(Token::FieldRef(name));
                }
                Some('{') => {
                    warnings.push(LintWarning {
                        offset: self.pos,
                        message: "unescaped '{' inside field reference; write '\\{'".into(),
                    });
                    name.push('{');
                    self.advance();
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
            }
        }
    }

    fn scan_number(&mut self) -> Result<Token, LexError> {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part, only when digits actually follow
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let sign = self.peek_char_at(1).map_or(false, |c| c == '+' || c == '-');
            let digit_at = if sign { 2 } else { 1 };
            if self
                .peek_char_at(digit_at)
                .map_or(false, |c| c.is_ascii_digit())
            {
                for _ in 0..digit_at {
                    self.advance();
                }
                while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| LexError::new(LexErrorKind::InvalidCharacter('.'), start))
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        // Boolean literals, unless called as functions: TRUE()
        if self.peek_char() != Some('(') {
            if text.eq_ignore_ascii_case("TRUE") {
                return Token::Boolean(true);
            }
            if text.eq_ignore_ascii_case("FALSE") {
                return Token::Boolean(false);
            }
        }

        Token::Identifier(text.to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .tokens
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("42"), vec![Token::Number(42.0), Token::Eof]);
        assert_eq!(kinds("3.14"), vec![Token::Number(3.14), Token::Eof]);
        assert_eq!(kinds(".5"), vec![Token::Number(0.5), Token::Eof]);
        assert_eq!(kinds("1e3"), vec![Token::Number(1000.0), Token::Eof]);
        assert_eq!(kinds("2.5E-1"), vec![Token::Number(0.25), Token::Eof]);
    }

    #[test]
    fn test_exponent_needs_digits() {
        assert_eq!(
            kinds("1east"),
            vec![
                Token::Number(1.0),
                Token::Identifier("east".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#""say \"hi\"""#),
            vec![Token::String("say \"hi\"".into()), Token::Eof]
        );
        assert_eq!(kinds("'it\\'s'"), vec![Token::String("it's".into()), Token::Eof]);
        assert_eq!(kinds(r#""a\nb""#), vec![Token::String("a\nb".into()), Token::Eof]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("& && || ! != == = <> <= < >= >"),
            vec![
                Token::Ampersand,
                Token::AndAnd,
                Token::OrOr,
                Token::Bang,
                Token::NotEqual,
                Token::Equal,
                Token::Equal,
                Token::NotEqual,
                Token::LessEqual,
                Token::LessThan,
                Token::GreaterEqual,
                Token::GreaterThan,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_booleans_and_identifiers() {
        assert_eq!(
            kinds("true FALSE TRUE() fld11111"),
            vec![
                Token::Boolean(true),
                Token::Boolean(false),
                Token::Identifier("TRUE".into()),
                Token::LeftParen,
                Token::RightParen,
                Token::Identifier("fld11111".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_field_refs_with_special_characters() {
        // `d{`: raw brace inside the body, flagged but accepted
        let out = tokenize("{d{} + 1").unwrap();
        assert_eq!(out.tokens[0].token, Token::FieldRef("d{".into()));
        assert_eq!(out.tokens[1].token, Token::Plus);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].offset, 2);

        // `{e` escaped: no warning
        let out = tokenize(r"{\{e}").unwrap();
        assert_eq!(out.tokens[0].token, Token::FieldRef("{e".into()));
        assert!(out.warnings.is_empty());

        // `f" {}`: quote and escaped closing brace
        let out = tokenize(r#"{f" \{\}} * 2"#).unwrap();
        assert_eq!(out.tokens[0].token, Token::FieldRef("f\" {}".into()));
        assert_eq!(out.tokens[1].token, Token::Star);
        assert_eq!(out.tokens[2].token, Token::Number(2.0));
    }

    #[test]
    fn test_offsets_are_bytes() {
        let out = tokenize("{维格} + 1").unwrap();
        assert_eq!(out.tokens[0].offset, 0);
        assert_eq!(out.tokens[1].offset, "{维格} ".len());
        assert_eq!(out.tokens.last().unwrap().offset, "{维格} + 1".len());
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            tokenize("1 + \"abc").unwrap_err(),
            LexError::new(LexErrorKind::UnterminatedString, 4)
        );
        assert_eq!(
            tokenize("{abc + 1").unwrap_err(),
            LexError::new(LexErrorKind::UnterminatedReference, 0)
        );
        assert_eq!(
            tokenize("1 # 2").unwrap_err(),
            LexError::new(LexErrorKind::InvalidCharacter('#'), 2)
        );
    }
}
