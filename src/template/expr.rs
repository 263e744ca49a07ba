//! Integer arithmetic over context variables
//!
//! Processor counts in interface metadata are written as small formulas such as
//! `6*npx_proc*npy_proc`. This evaluator accepts integers, identifiers bound to
//! integer context values, `+ - * /`, unary minus and parentheses. Division must be
//! exact; anything else is an error rather than a silently truncated count.

use super::context::TemplateContext;
use super::document::{Node, Scalar};
use crate::error::RenderError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Ident(String),
    Op(char),
    Open,
    Close,
}

fn tokenize(text: &str) -> Result<Vec<Token>, RenderError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal.parse().map_err(|_| {
                RenderError::Expression(format!("integer literal '{}' out of range", literal))
            })?;
            tokens.push(Token::Int(value));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            tokens.push(match c {
                '+' | '-' | '*' | '/' => Token::Op(c),
                '(' => Token::Open,
                ')' => Token::Close,
                other => {
                    return Err(RenderError::Expression(format!(
                        "unexpected character '{}' in '{}'",
                        other, text
                    )))
                }
            });
            i += 1;
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    context: &'a TemplateContext,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, message: &str) -> RenderError {
        RenderError::Expression(format!("{} in '{}'", message, self.source))
    }

    fn expr(&mut self) -> Result<i64, RenderError> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            value = match op {
                '+' => value.checked_add(rhs),
                _ => value.checked_sub(rhs),
            }
            .ok_or_else(|| self.error("overflow"))?;
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<i64, RenderError> {
        let mut value = self.factor()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.factor()?;
            value = if op == '*' {
                value.checked_mul(rhs).ok_or_else(|| self.error("overflow"))?
            } else {
                if rhs == 0 {
                    return Err(self.error("division by zero"));
                }
                let remainder = value.checked_rem(rhs).ok_or_else(|| self.error("overflow"))?;
                if remainder != 0 {
                    return Err(self.error("inexact division"));
                }
                value.checked_div(rhs).ok_or_else(|| self.error("overflow"))?
            };
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<i64, RenderError> {
        match self.next() {
            Some(Token::Int(v)) => Ok(v),
            Some(Token::Ident(name)) => match self.context.get(&name) {
                Some(value) => value.as_int().ok_or_else(|| {
                    RenderError::Expression(format!(
                        "'{}' is a {}, not an integer",
                        name,
                        value.kind()
                    ))
                }),
                None => Err(RenderError::UnresolvedKey {
                    template: self.source.to_string(),
                    key: name,
                }),
            },
            Some(Token::Op('-')) => self
                .factor()?
                .checked_neg()
                .ok_or_else(|| self.error("overflow")),
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err(self.error("missing ')'")),
                }
            }
            _ => Err(self.error("expected a number, name or '('")),
        }
    }
}

/// Evaluate an integer expression against the context
pub fn evaluate(text: &str, context: &TemplateContext) -> Result<i64, RenderError> {
    let mut parser = Parser {
        source: text,
        tokens: tokenize(text)?,
        pos: 0,
        context,
    };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("trailing input"));
    }
    Ok(value)
}

/// Evaluate a document leaf that holds either an integer or an expression string
pub fn evaluate_node(node: &Node, context: &TemplateContext) -> Result<i64, RenderError> {
    match node.as_scalar() {
        Some(Scalar::Int(i)) => Ok(*i),
        Some(Scalar::Str(s)) => evaluate(s, context),
        _ => Err(RenderError::Expression(format!(
            "expected an integer or expression, got {:?}",
            node
        ))),
    }
}
