//! Precedence-climbing parser from tokens to an [`Expr`] tree.
//!
//! Precedence, loosest first: `?:`, `||`, `&&`, `|`, `^`, `&`, equality,
//! relational, shifts, additive, multiplicative, unary, `**`.

use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::function::{constant, Function};
use crate::token::{Symbol, Token, TokenKind};
use crate::{FormulaError, FormulaErrorKind, Number};

/// Deepest expression tree the parser builds. Brackets, unary operators,
/// conditionals, and each chained binary operator add one level.
const MAX_NESTING: usize = 256;

#[derive(Clone, Copy)]
enum Combine {
    Binary(BinaryOp),
    And,
    Or,
}

const LEVELS: [&[(Symbol, Combine)]; 10] = [
    &[(Symbol::Or, Combine::Or)],
    &[(Symbol::And, Combine::And)],
    &[(Symbol::BitOr, Combine::Binary(BinaryOp::BitOr))],
    &[(Symbol::BitXor, Combine::Binary(BinaryOp::BitXor))],
    &[(Symbol::BitAnd, Combine::Binary(BinaryOp::BitAnd))],
    &[
        (Symbol::Equal, Combine::Binary(BinaryOp::Equal)),
        (Symbol::NotEqual, Combine::Binary(BinaryOp::NotEqual)),
    ],
    &[
        (Symbol::Less, Combine::Binary(BinaryOp::Less)),
        (Symbol::LessEqual, Combine::Binary(BinaryOp::LessEqual)),
        (Symbol::Greater, Combine::Binary(BinaryOp::Greater)),
        (Symbol::GreaterEqual, Combine::Binary(BinaryOp::GreaterEqual)),
    ],
    &[
        (Symbol::ShiftLeft, Combine::Binary(BinaryOp::ShiftLeft)),
        (Symbol::ShiftRight, Combine::Binary(BinaryOp::ShiftRight)),
    ],
    &[
        (Symbol::Plus, Combine::Binary(BinaryOp::Add)),
        (Symbol::Minus, Combine::Binary(BinaryOp::Sub)),
    ],
    &[
        (Symbol::Star, Combine::Binary(BinaryOp::Mul)),
        (Symbol::Slash, Combine::Binary(BinaryOp::Div)),
        (Symbol::Percent, Combine::Binary(BinaryOp::Rem)),
    ],
];

/// Parses a token stream into an expression tree.
///
/// `variables` lists the operand names bound to the formula; an identifier
/// resolves to an operand first, then to a named constant.
///
/// # Errors
///
/// Returns a syntax error for mismatched brackets or a malformed token
/// stream, and an unknown-reference error for unresolved identifiers.
pub fn parse(
    tokens: &[Token],
    variables: &[String],
    text_len: usize,
) -> Result<Expr, FormulaError> {
    check_brackets(tokens, text_len)?;
    if tokens.is_empty() {
        return Err(FormulaError::syntax("empty formula", 1));
    }

    let mut parser = Parser {
        tokens,
        position: 0,
        variables,
        end_column: text_len + 1,
        depth: 0,
    };
    let expr = parser.parse_ternary()?;
    if let Some(token) = parser.peek() {
        return Err(FormulaError::syntax("unexpected token", token.column));
    }
    Ok(expr)
}

fn check_brackets(tokens: &[Token], text_len: usize) -> Result<(), FormulaError> {
    let mut depth = 0_usize;
    for token in tokens {
        match token.kind {
            TokenKind::OpenBracket => depth += 1,
            TokenKind::CloseBracket => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| FormulaError::syntax("Brackets do not match", token.column))?;
            }
            _ => {}
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err(FormulaError::syntax("Brackets do not match", text_len + 1))
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    variables: &'a [String],
    end_column: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_symbol(&self) -> Option<Symbol> {
        match self.peek()?.kind {
            TokenKind::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }

    fn next(&mut self) -> Result<&Token, FormulaError> {
        let token = self
            .tokens
            .get(self.position)
            .ok_or_else(|| FormulaError::syntax("unexpected end of formula", self.end_column))?;
        self.position += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &TokenKind, what: &str) -> Result<(), FormulaError> {
        let token = self.next()?;
        if &token.kind == expected {
            Ok(())
        } else {
            Err(FormulaError::syntax(format!("expected {what}"), token.column))
        }
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        if self.depth >= MAX_NESTING {
            let column = self.peek().map_or(self.end_column, |token| token.column);
            return Err(FormulaError::syntax("formula nests too deeply", column));
        }
        self.depth += 1;
        Ok(())
    }

    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Expr, FormulaError>,
    ) -> Result<Expr, FormulaError> {
        self.descend()?;
        let expr = parse(self)?;
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_ternary(&mut self) -> Result<Expr, FormulaError> {
        let condition = self.parse_level(0)?;
        if self.peek_symbol() != Some(Symbol::Question) {
            return Ok(condition);
        }
        self.position += 1;
        let then = self.nested(Self::parse_ternary)?;
        self.expect(&TokenKind::Symbol(Symbol::Colon), "':' in conditional")?;
        let otherwise = self.nested(Self::parse_ternary)?;
        Ok(Expr::Ternary(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn parse_level(&mut self, level: usize) -> Result<Expr, FormulaError> {
        let Some(operators) = LEVELS.get(level) else {
            return self.parse_unary();
        };

        let mut lhs = self.parse_level(level + 1)?;
        let mut chained = 0;
        while let Some(symbol) = self.peek_symbol() {
            let Some((_, combine)) = operators.iter().find(|(s, _)| *s == symbol) else {
                break;
            };
            self.descend()?;
            chained += 1;
            self.position += 1;
            let rhs = self.parse_level(level + 1)?;
            lhs = match *combine {
                Combine::Binary(op) => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
                Combine::And => Expr::And(Box::new(lhs), Box::new(rhs)),
                Combine::Or => Expr::Or(Box::new(lhs), Box::new(rhs)),
            };
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        self.nested(Self::parse_prefixed)
    }

    fn parse_prefixed(&mut self) -> Result<Expr, FormulaError> {
        let op = match self.peek_symbol() {
            Some(Symbol::Minus) => Some(UnaryOp::Negate),
            Some(Symbol::Not) => Some(UnaryOp::Not),
            Some(Symbol::BitNot) => Some(UnaryOp::BitNot),
            Some(Symbol::Plus) => {
                self.position += 1;
                return self.parse_unary();
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.position += 1;
                Ok(Expr::Unary(op, Box::new(self.parse_unary()?)))
            }
            None => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.parse_primary()?;
        if self.peek_symbol() == Some(Symbol::Power) {
            self.position += 1;
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(
                BinaryOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        let token = self.next()?.clone();
        match token.kind {
            TokenKind::Number(number) => Ok(Expr::Literal(number)),
            TokenKind::OpenBracket => {
                let inner = self.parse_ternary()?;
                self.expect(&TokenKind::CloseBracket, "')'")?;
                Ok(inner)
            }
            TokenKind::Identifier(name) => {
                if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::OpenBracket)) {
                    self.parse_call(&name, token.column)
                } else {
                    self.resolve_identifier(&name, token.column)
                }
            }
            TokenKind::Symbol(_) | TokenKind::CloseBracket | TokenKind::Comma => {
                Err(FormulaError::syntax("unexpected token", token.column))
            }
        }
    }

    fn resolve_identifier(&self, name: &str, column: usize) -> Result<Expr, FormulaError> {
        if let Some(index) = self.variables.iter().position(|v| v == name) {
            return Ok(Expr::Variable(index));
        }
        constant(name)
            .map(|value| Expr::Literal(Number::Float(value)))
            .ok_or_else(|| {
                FormulaError::at(FormulaErrorKind::UnknownReference(name.to_string()), column)
            })
    }

    fn parse_call(&mut self, name: &str, column: usize) -> Result<Expr, FormulaError> {
        let function = Function::from_name(name).ok_or_else(|| {
            FormulaError::at(FormulaErrorKind::UnknownReference(name.to_string()), column)
        })?;
        self.position += 1;

        let mut args = Vec::new();
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::CloseBracket)) {
            self.position += 1;
        } else {
            loop {
                args.push(self.parse_ternary()?);
                let token = self.next()?;
                match token.kind {
                    TokenKind::Comma => {}
                    TokenKind::CloseBracket => break,
                    _ => {
                        return Err(FormulaError::syntax("expected ',' or ')'", token.column));
                    }
                }
            }
        }

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(FormulaError::syntax(
                format!("{name} takes {min}..={max} arguments, got {}", args.len()),
                column,
            ));
        }
        Ok(Expr::Call(function, args))
    }
}

#[cfg(test)]
mod tests {
    use super::parse;
    use crate::expr::{BinaryOp, Expr};
    use crate::token::tokenize;
    use crate::{FormulaErrorKind, Number};

    fn parse_text(text: &str, variables: &[&str]) -> Result<Expr, crate::FormulaError> {
        let variables: Vec<String> = variables.iter().map(ToString::to_string).collect();
        parse(&tokenize(text)?, &variables, text.len())
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse_text("A + B * 2", &["A", "B"]).expect("parse");
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Variable(0)),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Variable(1)),
                    Box::new(Expr::Literal(Number::Integer(2))),
                )),
            )
        );
    }

    #[test]
    fn unbalanced_open_bracket_reports_brackets_do_not_match() {
        let error = parse_text("(A + B", &["A", "B"]).unwrap_err();
        assert_eq!(
            error.kind,
            FormulaErrorKind::Syntax("Brackets do not match".into())
        );
    }

    #[test]
    fn unbalanced_close_bracket_reports_column() {
        let error = parse_text("A + B)", &["A", "B"]).unwrap_err();
        assert_eq!(error.column, Some(6));
    }

    #[test]
    fn unknown_identifier_is_unknown_reference() {
        let error = parse_text("Gain * 2", &["A"]).unwrap_err();
        assert_eq!(
            error.kind,
            FormulaErrorKind::UnknownReference("Gain".into())
        );
    }

    #[test]
    fn unknown_function_is_unknown_reference() {
        let error = parse_text("FOO(A)", &["A"]).unwrap_err();
        assert_eq!(error.kind, FormulaErrorKind::UnknownReference("FOO".into()));
    }

    #[test]
    fn dangling_operator_is_syntax_error() {
        let error = parse_text("A +", &["A"]).unwrap_err();
        assert!(matches!(error.kind, FormulaErrorKind::Syntax(_)));
    }

    #[test]
    fn wrong_arity_is_syntax_error() {
        let error = parse_text("MIN(A)", &["A"]).unwrap_err();
        assert!(matches!(error.kind, FormulaErrorKind::Syntax(_)));
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let brackets = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let negations = format!("{}1", "-".repeat(100_000));
        let chain = vec!["A"; 100_000].join(" + ");
        let powers = vec!["2"; 100_000].join(" ** ");
        for text in [brackets, negations, chain, powers] {
            let error = parse_text(&text, &["A"]).unwrap_err();
            assert_eq!(
                error.kind,
                FormulaErrorKind::Syntax("formula nests too deeply".into())
            );
        }
    }

    #[test]
    fn moderate_nesting_parses() {
        let text = format!("{}A{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(parse_text(&text, &["A"]), Ok(Expr::Variable(0)));
        let sum = vec!["A"; 200].join(" + ");
        assert!(parse_text(&sum, &["A"]).is_ok());
    }

    #[test]
    fn ternary_is_right_associative() {
        let expr = parse_text("A ? 1 : B ? 2 : 3", &["A", "B"]).expect("parse");
        match expr {
            Expr::Ternary(_, _, otherwise) => assert!(matches!(*otherwise, Expr::Ternary(..))),
            other => panic!("expected ternary, got {other:?}"),
        }
    }
}
