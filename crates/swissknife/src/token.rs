//! Formula tokenizer.
//!
//! Splits formula text into numbers, identifiers, operators, and
//! punctuation, each tagged with its 1-indexed source column.

use crate::{FormulaError, Number};

/// Binary and unary operator symbols recognised by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `**`
    Power,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `~`
    BitNot,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `=` or `==`
    Equal,
    /// `<>` or `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `!`
    Not,
    /// `?`
    Question,
    /// `:`
    Colon,
}

/// Token classification.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Numeric literal.
    Number(Number),
    /// Operand, constant, or function name.
    Identifier(String),
    /// Operator or ternary punctuation.
    Symbol(Symbol),
    /// `(`
    OpenBracket,
    /// `)`
    CloseBracket,
    /// `,`
    Comma,
}

/// A token with its 1-indexed source column.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token classification.
    pub kind: TokenKind,
    /// 1-indexed column of the first character.
    pub column: usize,
}

/// Splits `text` into tokens.
///
/// # Errors
///
/// Returns a syntax error for characters outside the formula alphabet and for
/// malformed numeric literals.
pub fn tokenize(text: &str) -> Result<Vec<Token>, FormulaError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        let column = index + 1;

        if ch.is_whitespace() {
            index += 1;
            continue;
        }

        let starts_fraction =
            ch == '.' && chars.get(index + 1).is_some_and(char::is_ascii_digit);
        if ch.is_ascii_digit() || starts_fraction {
            let (number, consumed) = scan_number(&chars[index..], column)?;
            tokens.push(Token {
                kind: TokenKind::Number(number),
                column,
            });
            index += consumed;
            continue;
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            let start = index;
            while index < chars.len()
                && (chars[index].is_ascii_alphanumeric() || chars[index] == '_')
            {
                index += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Identifier(chars[start..index].iter().collect()),
                column,
            });
            continue;
        }

        let next = chars.get(index + 1).copied();
        let (kind, width) = match (ch, next) {
            ('(', _) => (TokenKind::OpenBracket, 1),
            (')', _) => (TokenKind::CloseBracket, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('*', Some('*')) => (TokenKind::Symbol(Symbol::Power), 2),
            ('*', _) => (TokenKind::Symbol(Symbol::Star), 1),
            ('+', _) => (TokenKind::Symbol(Symbol::Plus), 1),
            ('-', _) => (TokenKind::Symbol(Symbol::Minus), 1),
            ('/', _) => (TokenKind::Symbol(Symbol::Slash), 1),
            ('%', _) => (TokenKind::Symbol(Symbol::Percent), 1),
            ('&', Some('&')) => (TokenKind::Symbol(Symbol::And), 2),
            ('&', _) => (TokenKind::Symbol(Symbol::BitAnd), 1),
            ('|', Some('|')) => (TokenKind::Symbol(Symbol::Or), 2),
            ('|', _) => (TokenKind::Symbol(Symbol::BitOr), 1),
            ('^', _) => (TokenKind::Symbol(Symbol::BitXor), 1),
            ('~', _) => (TokenKind::Symbol(Symbol::BitNot), 1),
            ('<', Some('<')) => (TokenKind::Symbol(Symbol::ShiftLeft), 2),
            ('<', Some('=')) => (TokenKind::Symbol(Symbol::LessEqual), 2),
            ('<', Some('>')) => (TokenKind::Symbol(Symbol::NotEqual), 2),
            ('<', _) => (TokenKind::Symbol(Symbol::Less), 1),
            ('>', Some('>')) => (TokenKind::Symbol(Symbol::ShiftRight), 2),
            ('>', Some('=')) => (TokenKind::Symbol(Symbol::GreaterEqual), 2),
            ('>', _) => (TokenKind::Symbol(Symbol::Greater), 1),
            ('=', Some('=')) => (TokenKind::Symbol(Symbol::Equal), 2),
            ('=', _) => (TokenKind::Symbol(Symbol::Equal), 1),
            ('!', Some('=')) => (TokenKind::Symbol(Symbol::NotEqual), 2),
            ('!', _) => (TokenKind::Symbol(Symbol::Not), 1),
            ('?', _) => (TokenKind::Symbol(Symbol::Question), 1),
            (':', _) => (TokenKind::Symbol(Symbol::Colon), 1),
            _ => {
                return Err(FormulaError::syntax(
                    format!("unexpected character '{ch}'"),
                    column,
                ));
            }
        };
        tokens.push(Token { kind, column });
        index += width;
    }

    Ok(tokens)
}

fn scan_number(chars: &[char], column: usize) -> Result<(Number, usize), FormulaError> {
    let prefix: String = chars.iter().take(2).collect::<String>().to_ascii_lowercase();
    if prefix == "0x" || prefix == "0b" {
        let radix = if prefix == "0x" { 16 } else { 2 };
        let digits: String = chars[2..]
            .iter()
            .take_while(|c| c.is_digit(radix))
            .collect();
        let consumed = 2 + digits.len();
        let value = u64::from_str_radix(&digits, radix).map_err(|_| {
            let literal: String = chars[..consumed].iter().collect();
            FormulaError::syntax(format!("invalid numeric literal '{literal}'"), column)
        })?;
        // Hex literals name register bit patterns; keep the full 64-bit pattern.
        #[allow(clippy::cast_possible_wrap)]
        return Ok((Number::Integer(value as i64), consumed));
    }

    let mut end = 0;
    let mut is_float = false;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    if end < chars.len() && chars[end] == '.' {
        is_float = true;
        end += 1;
        while end < chars.len() && chars[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end < chars.len() && (chars[end] == 'e' || chars[end] == 'E') {
        let mut exponent_end = end + 1;
        if exponent_end < chars.len() && matches!(chars[exponent_end], '+' | '-') {
            exponent_end += 1;
        }
        let digits_start = exponent_end;
        while exponent_end < chars.len() && chars[exponent_end].is_ascii_digit() {
            exponent_end += 1;
        }
        if exponent_end > digits_start {
            is_float = true;
            end = exponent_end;
        }
    }

    let literal: String = chars[..end].iter().collect();
    let invalid = || FormulaError::syntax(format!("invalid numeric literal '{literal}'"), column);
    let number = if is_float {
        Number::Float(literal.parse::<f64>().map_err(|_| invalid())?)
    } else {
        Number::Integer(literal.parse::<i64>().map_err(|_| invalid())?)
    };
    Ok((number, end))
}

#[cfg(test)]
mod tests {
    use super::{tokenize, Symbol, TokenKind};
    use crate::{FormulaErrorKind, Number};

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text)
            .expect("tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn splits_operands_and_operators() {
        assert_eq!(
            kinds("A + B * 2"),
            vec![
                TokenKind::Identifier("A".into()),
                TokenKind::Symbol(Symbol::Plus),
                TokenKind::Identifier("B".into()),
                TokenKind::Symbol(Symbol::Star),
                TokenKind::Number(Number::Integer(2)),
            ]
        );
    }

    #[test]
    fn two_character_operators_take_precedence() {
        assert_eq!(
            kinds("a<<2<>b**c&&d"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Symbol(Symbol::ShiftLeft),
                TokenKind::Number(Number::Integer(2)),
                TokenKind::Symbol(Symbol::NotEqual),
                TokenKind::Identifier("b".into()),
                TokenKind::Symbol(Symbol::Power),
                TokenKind::Identifier("c".into()),
                TokenKind::Symbol(Symbol::And),
                TokenKind::Identifier("d".into()),
            ]
        );
    }

    #[test]
    fn numeric_literal_forms() {
        assert_eq!(kinds("0x1F"), vec![TokenKind::Number(Number::Integer(31))]);
        assert_eq!(kinds("0b101"), vec![TokenKind::Number(Number::Integer(5))]);
        assert_eq!(kinds("2.5"), vec![TokenKind::Number(Number::Float(2.5))]);
        assert_eq!(kinds(".5"), vec![TokenKind::Number(Number::Float(0.5))]);
        assert_eq!(kinds("1e3"), vec![TokenKind::Number(Number::Float(1000.0))]);
    }

    #[test]
    fn columns_are_one_indexed() {
        let tokens = tokenize("  X  ").expect("tokenize");
        assert_eq!(tokens[0].column, 3);
    }

    #[test]
    fn stray_character_is_syntax_error() {
        let error = tokenize("A # B").unwrap_err();
        assert_eq!(error.column, Some(3));
        assert!(matches!(error.kind, FormulaErrorKind::Syntax(_)));
    }

    #[test]
    fn empty_hex_literal_is_rejected() {
        assert!(tokenize("0x").is_err());
    }
}
