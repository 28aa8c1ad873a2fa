//! Pratt parser for FHIRPath expressions
//!
//! Precedence climbing over the token stream produced by the tokenizer.
//! All binary operator precedence lives in one table; invocation chains
//! (`.member`, `.method(args)`, `[index]`) bind tightest and are handled as
//! postfix operations outside the table. The output is a thin tree: no
//! semantic analysis, no type resolution.

use smallvec::SmallVec;

use super::error::{ParseError, ParseResult};
use super::tokenizer::{SpannedToken, Token, Tokenizer};
use crate::ast::{BinaryOperator, ExpressionNode, LiteralValue, TypeSpecifier, UnaryOperator};

/// Operator precedence levels, weakest binding first
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// `implies` (right associative)
    Implies = 1,
    /// `or`, `xor`
    Or = 2,
    /// `and`
    And = 3,
    /// `in`, `contains`
    Membership = 4,
    /// `=`, `!=`, `~`, `!~`
    Equality = 5,
    /// `<`, `>`, `<=`, `>=`
    Inequality = 6,
    /// `is`, `as` (right operand is a type specifier)
    Type = 7,
    /// `|`
    Union = 8,
    /// `+`, `-`, `&`
    Additive = 9,
    /// `*`, `/`, `div`, `mod`
    Multiplicative = 10,
    /// unary `+`, `-`
    Unary = 11,
}

impl Precedence {
    #[inline(always)]
    const fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline(always)]
    const fn is_right_associative(self) -> bool {
        matches!(self, Precedence::Implies)
    }
}

/// Binding strength of a binary operator token, `None` for non-operators
#[inline(always)]
fn get_precedence(token: &Token<'_>) -> Option<Precedence> {
    match token {
        Token::Equal | Token::NotEqual | Token::Equivalent | Token::NotEquivalent => {
            Some(Precedence::Equality)
        }
        Token::Plus | Token::Minus | Token::Ampersand => Some(Precedence::Additive),
        Token::And => Some(Precedence::And),
        Token::Or | Token::Xor => Some(Precedence::Or),
        Token::Multiply | Token::Divide | Token::Div | Token::Mod => {
            Some(Precedence::Multiplicative)
        }
        Token::LessThan
        | Token::LessThanOrEqual
        | Token::GreaterThan
        | Token::GreaterThanOrEqual => Some(Precedence::Inequality),
        Token::In | Token::Contains => Some(Precedence::Membership),
        Token::Is | Token::As => Some(Precedence::Type),
        Token::Union => Some(Precedence::Union),
        Token::Implies => Some(Precedence::Implies),
        _ => None,
    }
}

#[inline(always)]
fn token_to_binary_op(token: &Token<'_>) -> Option<BinaryOperator> {
    match token {
        Token::Equal => Some(BinaryOperator::Equal),
        Token::NotEqual => Some(BinaryOperator::NotEqual),
        Token::Equivalent => Some(BinaryOperator::Equivalent),
        Token::NotEquivalent => Some(BinaryOperator::NotEquivalent),
        Token::LessThan => Some(BinaryOperator::LessThan),
        Token::LessThanOrEqual => Some(BinaryOperator::LessThanOrEqual),
        Token::GreaterThan => Some(BinaryOperator::GreaterThan),
        Token::GreaterThanOrEqual => Some(BinaryOperator::GreaterThanOrEqual),
        Token::Plus => Some(BinaryOperator::Add),
        Token::Minus => Some(BinaryOperator::Subtract),
        Token::Multiply => Some(BinaryOperator::Multiply),
        Token::Divide => Some(BinaryOperator::Divide),
        Token::Div => Some(BinaryOperator::IntegerDivide),
        Token::Mod => Some(BinaryOperator::Modulo),
        Token::And => Some(BinaryOperator::And),
        Token::Or => Some(BinaryOperator::Or),
        Token::Xor => Some(BinaryOperator::Xor),
        Token::Implies => Some(BinaryOperator::Implies),
        Token::Union => Some(BinaryOperator::Union),
        Token::In => Some(BinaryOperator::In),
        Token::Contains => Some(BinaryOperator::Contains),
        Token::Ampersand => Some(BinaryOperator::Concatenate),
        _ => None,
    }
}

/// Recursive-descent / precedence-climbing parser
pub struct Parser<'input> {
    tokens: Vec<SpannedToken<'input>>,
    pos: usize,
    end_line: u32,
    end_column: u32,
}

impl<'input> Parser<'input> {
    /// Tokenize the input and set up the parser
    pub fn new(input: &'input str) -> ParseResult<Self> {
        let mut tokenizer = Tokenizer::new(input);
        let tokens = tokenizer.tokenize_all()?;
        let (end_line, end_column) = tokenizer.position();
        Ok(Self {
            tokens,
            pos: 0,
            end_line,
            end_column,
        })
    }

    /// Parse the whole input as a single expression
    pub fn parse(mut self) -> ParseResult<ExpressionNode> {
        let expr = self.parse_expression(Precedence::Implies.as_u8())?;
        match self.peek() {
            None => Ok(expr),
            Some(tok) => Err(self.unexpected(tok)),
        }
    }

    fn peek(&self) -> Option<&SpannedToken<'input>> {
        self.tokens.get(self.pos)
    }

    fn peek_ahead(&self, offset: usize) -> Option<&SpannedToken<'input>> {
        self.tokens.get(self.pos + offset)
    }

    fn eof(&self) -> ParseError {
        ParseError::UnexpectedEof {
            line: self.end_line,
            column: self.end_column,
        }
    }

    fn unexpected(&self, tok: &SpannedToken<'input>) -> ParseError {
        ParseError::UnexpectedToken {
            token: tok.value.describe(),
            line: tok.line,
            column: tok.column,
        }
    }

    fn expect(&mut self, expected: &Token<'static>, description: &str) -> ParseResult<()> {
        match self.peek() {
            Some(tok) if tok.value == *expected => {
                self.pos += 1;
                Ok(())
            }
            Some(tok) => Err(ParseError::ExpectedToken {
                expected: description.to_string(),
                found: tok.value.describe(),
                line: tok.line,
                column: tok.column,
            }),
            None => Err(self.eof()),
        }
    }

    fn parse_expression(&mut self, min_prec: u8) -> ParseResult<ExpressionNode> {
        let mut left = self.parse_unary()?;

        loop {
            let Some(tok) = self.peek() else {
                break;
            };
            let Some(prec) = get_precedence(&tok.value) else {
                break;
            };
            if prec.as_u8() < min_prec {
                break;
            }
            let op_token = tok.value.clone();
            let (line, column) = (tok.line, tok.column);
            self.pos += 1;

            match op_token {
                Token::Is => {
                    let type_specifier = self.parse_type_specifier()?;
                    left = ExpressionNode::type_check(left, type_specifier);
                }
                Token::As => {
                    let type_specifier = self.parse_type_specifier()?;
                    left = ExpressionNode::type_cast(left, type_specifier);
                }
                other => {
                    // get_precedence and token_to_binary_op cover the same set
                    let op =
                        token_to_binary_op(&other).ok_or_else(|| ParseError::UnexpectedToken {
                            token: other.describe(),
                            line,
                            column,
                        })?;
                    let next_min = if prec.is_right_associative() {
                        prec.as_u8()
                    } else {
                        prec.as_u8() + 1
                    };
                    let right = self.parse_expression(next_min)?;
                    left = ExpressionNode::binary_op(op, left, right);
                }
            }
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<ExpressionNode> {
        match self.peek().map(|t| &t.value) {
            Some(Token::Plus) => {
                self.pos += 1;
                let operand = self.parse_unary()?;
                Ok(ExpressionNode::unary_op(UnaryOperator::Plus, operand))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                let operand = self.parse_unary()?;
                Ok(ExpressionNode::unary_op(UnaryOperator::Minus, operand))
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    /// Invocation chain: `.member`, `.method(args)`, `[index]`
    fn parse_postfix(&mut self, mut expr: ExpressionNode) -> ParseResult<ExpressionNode> {
        loop {
            match self.peek().map(|t| &t.value) {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = self.parse_invocation_name()?;
                    if matches!(self.peek().map(|t| &t.value), Some(Token::LeftParen)) {
                        let args = self.parse_args()?;
                        expr = ExpressionNode::method_call(expr, name, args);
                    } else {
                        expr = ExpressionNode::path(expr, name);
                    }
                }
                Some(Token::LeftBracket) => {
                    self.pos += 1;
                    let index = self.parse_expression(Precedence::Implies.as_u8())?;
                    self.expect(&Token::RightBracket, "']'")?;
                    expr = ExpressionNode::index(expr, index);
                }
                _ => return Ok(expr),
            }
        }
    }

    /// A member or method name after `.`: a plain identifier, or any keyword
    /// re-read as a name (`x.contains('a')`, `value.as(uri)`)
    fn parse_invocation_name(&mut self) -> ParseResult<String> {
        let Some(tok) = self.peek() else {
            return Err(self.eof());
        };
        let name = match &tok.value {
            Token::Identifier(name) => name.to_string(),
            other => match other.keyword_name() {
                Some(kw) => kw.to_string(),
                None => {
                    return Err(ParseError::ExpectedToken {
                        expected: "identifier".to_string(),
                        found: tok.value.describe(),
                        line: tok.line,
                        column: tok.column,
                    });
                }
            },
        };
        self.pos += 1;
        Ok(name)
    }

    fn parse_args(&mut self) -> ParseResult<SmallVec<[ExpressionNode; 2]>> {
        self.expect(&Token::LeftParen, "'('")?;
        let mut args = SmallVec::new();
        if matches!(self.peek().map(|t| &t.value), Some(Token::RightParen)) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression(Precedence::Implies.as_u8())?);
            match self.peek().map(|t| &t.value) {
                Some(Token::Comma) => {
                    self.pos += 1;
                }
                Some(Token::RightParen) => {
                    self.pos += 1;
                    return Ok(args);
                }
                Some(_) => {
                    let tok = self.peek().ok_or_else(|| self.eof())?;
                    return Err(ParseError::ExpectedToken {
                        expected: "',' or ')'".to_string(),
                        found: tok.value.describe(),
                        line: tok.line,
                        column: tok.column,
                    });
                }
                None => return Err(self.eof()),
            }
        }
    }

    /// `Name` or `Namespace.Name` after `is` / `as`
    fn parse_type_specifier(&mut self) -> ParseResult<TypeSpecifier> {
        let first = self.parse_type_name()?;
        if matches!(self.peek().map(|t| &t.value), Some(Token::Dot)) {
            // Only commit to the qualified form when a name actually follows
            if let Some(next) = self.peek_ahead(1) {
                if matches!(next.value, Token::Identifier(_)) {
                    self.pos += 1;
                    let name = self.parse_type_name()?;
                    return Ok(TypeSpecifier::qualified(first, name));
                }
            }
        }
        Ok(TypeSpecifier::new(first))
    }

    fn parse_type_name(&mut self) -> ParseResult<String> {
        let Some(tok) = self.peek() else {
            return Err(self.eof());
        };
        match &tok.value {
            Token::Identifier(name) => {
                let name = name.to_string();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(ParseError::ExpectedToken {
                expected: "type name".to_string(),
                found: tok.value.describe(),
                line: tok.line,
                column: tok.column,
            }),
        }
    }

    fn parse_primary(&mut self) -> ParseResult<ExpressionNode> {
        let Some(tok) = self.peek() else {
            return Err(self.eof());
        };

        let node = match &tok.value {
            Token::Integer(n) => {
                let n = *n;
                self.pos += 1;
                ExpressionNode::literal(LiteralValue::Integer(n))
            }
            Token::Decimal(s) => {
                let s = s.to_string();
                self.pos += 1;
                ExpressionNode::literal(LiteralValue::Decimal(s))
            }
            Token::String(s) => {
                let s = s.to_string();
                self.pos += 1;
                ExpressionNode::literal(LiteralValue::String(s))
            }
            Token::Date(s) => {
                let s = s.to_string();
                self.pos += 1;
                ExpressionNode::literal(LiteralValue::Date(s))
            }
            Token::DateTime(s) => {
                let s = s.to_string();
                self.pos += 1;
                ExpressionNode::literal(LiteralValue::DateTime(s))
            }
            Token::Time(s) => {
                let s = s.to_string();
                self.pos += 1;
                ExpressionNode::literal(LiteralValue::Time(s))
            }
            Token::Quantity { value, unit } => {
                let (value, unit) = (value.to_string(), unit.to_string());
                self.pos += 1;
                ExpressionNode::literal(LiteralValue::Quantity { value, unit })
            }
            Token::True => {
                self.pos += 1;
                ExpressionNode::literal(LiteralValue::Boolean(true))
            }
            Token::False => {
                self.pos += 1;
                ExpressionNode::literal(LiteralValue::Boolean(false))
            }
            Token::LeftParen => {
                self.pos += 1;
                let inner = self.parse_expression(Precedence::Implies.as_u8())?;
                self.expect(&Token::RightParen, "')'")?;
                ExpressionNode::Paren(Box::new(inner))
            }
            Token::LeftBrace => {
                self.pos += 1;
                self.expect(&Token::RightBrace, "'}'")?;
                ExpressionNode::EmptyCollection
            }
            Token::DollarThis => {
                self.pos += 1;
                ExpressionNode::variable("this")
            }
            Token::DollarIndex => {
                self.pos += 1;
                ExpressionNode::variable("index")
            }
            Token::DollarTotal => {
                self.pos += 1;
                ExpressionNode::variable("total")
            }
            Token::EnvIdentifier(name) => {
                let name = name.to_string();
                self.pos += 1;
                ExpressionNode::environment_variable(name)
            }
            Token::Identifier(name) => {
                let name = name.to_string();
                self.pos += 1;
                if matches!(self.peek().map(|t| &t.value), Some(Token::LeftParen)) {
                    let args = self.parse_args()?;
                    ExpressionNode::function_call(name, args)
                } else {
                    ExpressionNode::identifier(name)
                }
            }
            // Keyword-as-identifier rule: a keyword directly followed by '('
            // is a function name (`contains('x')`, `is(Patient)`)
            other if other.keyword_name().is_some() => {
                let is_call = matches!(
                    self.peek_ahead(1).map(|t| &t.value),
                    Some(Token::LeftParen)
                );
                if is_call {
                    let name = other.keyword_name().unwrap_or_default().to_string();
                    self.pos += 1;
                    let args = self.parse_args()?;
                    ExpressionNode::function_call(name, args)
                } else {
                    return Err(self.unexpected(tok));
                }
            }
            _ => return Err(self.unexpected(tok)),
        };

        Ok(node)
    }
}

/// Parse an FHIRPath expression string into an AST
pub fn parse_expression(input: &str) -> ParseResult<ExpressionNode> {
    Parser::new(input)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOperator;

    fn parse(input: &str) -> ExpressionNode {
        parse_expression(input).unwrap()
    }

    #[test]
    fn test_simple_path() {
        let ast = parse("Patient.name.given");
        match ast {
            ExpressionNode::Path { base, path } => {
                assert_eq!(path, "given");
                assert!(matches!(*base, ExpressionNode::Path { .. }));
            }
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence_arithmetic() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let ast = parse("1 + 2 * 3");
        match ast {
            ExpressionNode::BinaryOp(data) => {
                assert_eq!(data.op, BinaryOperator::Add);
                match &data.right {
                    ExpressionNode::BinaryOp(inner) => {
                        assert_eq!(inner.op, BinaryOperator::Multiply)
                    }
                    other => panic!("expected Multiply, got {other:?}"),
                }
            }
            other => panic!("expected BinaryOp, got {other:?}"),
        }
    }

    #[test]
    fn test_implies_right_associative() {
        // a implies b implies c parses as a implies (b implies c)
        let ast = parse("a implies b implies c");
        match ast {
            ExpressionNode::BinaryOp(data) => {
                assert_eq!(data.op, BinaryOperator::Implies);
                assert!(matches!(data.left, ExpressionNode::Identifier(_)));
                assert!(matches!(&data.right, ExpressionNode::BinaryOp(inner)
                    if inner.op == BinaryOperator::Implies));
            }
            other => panic!("expected BinaryOp, got {other:?}"),
        }
    }

    #[test]
    fn test_union_binds_tighter_than_type_ops() {
        // a | b is X parses as (a | b) is X
        let ast = parse("a | b is X");
        assert!(matches!(ast, ExpressionNode::TypeCheck { .. }));
    }

    #[test]
    fn test_method_call_chain() {
        let ast = parse("name.where(use = 'official').given.first()");
        assert!(matches!(ast, ExpressionNode::MethodCall(_)));
    }

    #[test]
    fn test_keyword_as_method_name() {
        let ast = parse("name.contains('x')");
        match ast {
            ExpressionNode::MethodCall(data) => assert_eq!(data.method, "contains"),
            other => panic!("expected MethodCall, got {other:?}"),
        }

        let ast = parse("value.as(uri)");
        match ast {
            ExpressionNode::MethodCall(data) => {
                assert_eq!(data.method, "as");
                assert_eq!(data.args.len(), 1);
            }
            other => panic!("expected MethodCall, got {other:?}"),
        }
    }

    #[test]
    fn test_keyword_as_function_name() {
        let ast = parse("contains('x')");
        match ast {
            ExpressionNode::FunctionCall(data) => assert_eq!(data.name, "contains"),
            other => panic!("expected FunctionCall, got {other:?}"),
        }
    }

    #[test]
    fn test_type_operators() {
        let ast = parse("value is System.Boolean");
        match ast {
            ExpressionNode::TypeCheck { type_specifier, .. } => {
                assert_eq!(type_specifier.namespace.as_deref(), Some("System"));
                assert_eq!(type_specifier.name, "Boolean");
            }
            other => panic!("expected TypeCheck, got {other:?}"),
        }

        let ast = parse("value as Quantity");
        assert!(matches!(ast, ExpressionNode::TypeCast { .. }));
    }

    #[test]
    fn test_indexer() {
        let ast = parse("name[0]");
        match ast {
            ExpressionNode::Index { index, .. } => {
                assert!(matches!(
                    *index,
                    ExpressionNode::Literal(LiteralValue::Integer(0))
                ));
            }
            other => panic!("expected Index, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_collection_and_paren() {
        assert!(matches!(parse("{}"), ExpressionNode::EmptyCollection));
        assert!(matches!(parse("(1)"), ExpressionNode::Paren(_)));
    }

    #[test]
    fn test_variables() {
        assert!(matches!(parse("$this"), ExpressionNode::Variable(v) if v == "this"));
        assert!(
            matches!(parse("%resource"), ExpressionNode::EnvironmentVariable(v) if v == "resource")
        );
    }

    #[test]
    fn test_unary_minus() {
        let ast = parse("-5 + 3");
        match ast {
            ExpressionNode::BinaryOp(data) => {
                assert_eq!(data.op, BinaryOperator::Add);
                assert!(matches!(
                    data.left,
                    ExpressionNode::UnaryOp {
                        op: UnaryOperator::Minus,
                        ..
                    }
                ));
            }
            other => panic!("expected BinaryOp, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_is_deterministic() {
        let a = parse("name.where(use = 'official').given.first()");
        let b = parse("name.where(use = 'official').given.first()");
        assert_eq!(a, b);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_expression("name.where(use = 'official'"),
            Err(ParseError::UnexpectedEof { .. })
        ));
        assert!(matches!(
            parse_expression("1 + + "),
            Err(ParseError::UnexpectedEof { .. })
        ));
        assert!(parse_expression("1 2").is_err());
    }
}
