//! GL-004: Step guard expressions.
//!
//! Grammar: `<identifier> (== | !=) "<literal>"`. Literals take single or
//! double quotes and support `\\`, `\"`, `\'`, `\n`, `\t` escapes.
//! Identifiers may contain dots to reach into JSON context values.
//! There is no general evaluator: the tokenizer accepts exactly these tokens.

use super::error::{Error, Result};

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

/// A parsed guard expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub variable: String,
    pub op: CompareOp,
    pub literal: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Op(CompareOp),
    Literal(String),
}

impl Condition {
    /// Parse an expression, rejecting anything outside the grammar.
    pub fn parse(expr: &str) -> Result<Self> {
        let fail = |reason: &str| Error::Condition {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let tokens = tokenize(expr).map_err(|reason| fail(&reason))?;
        match tokens.as_slice() {
            [Token::Ident(variable), Token::Op(op), Token::Literal(literal)] => Ok(Self {
                variable: variable.clone(),
                op: *op,
                literal: literal.clone(),
            }),
            [] => Err(fail("empty expression")),
            [Token::Ident(_)] => Err(fail("missing comparison operator")),
            [Token::Ident(_), Token::Op(_)] => Err(fail("missing quoted literal")),
            [Token::Ident(_), Token::Op(_), Token::Ident(name)] => Err(fail(&format!(
                "right-hand side '{}' must be a quoted literal",
                name
            ))),
            [Token::Ident(_), Token::Op(_), Token::Literal(_), ..] => {
                Err(fail("unexpected tokens after literal"))
            }
            _ => Err(fail("expected <identifier> == \"literal\" or <identifier> != \"literal\"")),
        }
    }

    /// Evaluate against a variable lookup. A missing variable makes `==`
    /// false and `!=` true.
    pub fn evaluate<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        match (lookup(&self.variable), self.op) {
            (None, CompareOp::Eq) => false,
            (None, CompareOp::Ne) => true,
            (Some(value), CompareOp::Eq) => value == self.literal,
            (Some(value), CompareOp::Ne) => value != self.literal,
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn tokenize(expr: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '=' || c == '!' {
            chars.next();
            match chars.next() {
                Some((_, '=')) => tokens.push(Token::Op(if c == '=' {
                    CompareOp::Eq
                } else {
                    CompareOp::Ne
                })),
                _ => return Err(format!("expected '==' or '!=' at position {}", pos)),
            }
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            chars.next();
            let mut literal = String::new();
            let mut closed = false;
            while let Some((_, ch)) = chars.next() {
                match ch {
                    '\\' => match chars.next() {
                        Some((_, 'n')) => literal.push('\n'),
                        Some((_, 't')) => literal.push('\t'),
                        Some((_, other)) => literal.push(other),
                        None => break,
                    },
                    ch if ch == quote => {
                        closed = true;
                        break;
                    }
                    ch => literal.push(ch),
                }
            }
            if !closed {
                return Err(format!("unterminated string literal at position {}", pos));
            }
            tokens.push(Token::Literal(literal));
            continue;
        }

        if is_ident_start(c) {
            let mut ident = String::new();
            while let Some(&(_, ch)) = chars.peek() {
                if !is_ident_char(ch) {
                    break;
                }
                ident.push(ch);
                chars.next();
            }
            tokens.push(Token::Ident(ident));
            continue;
        }

        return Err(format!("unexpected character '{}' at position {}", c, pos));
    }

    Ok(tokens)
}
