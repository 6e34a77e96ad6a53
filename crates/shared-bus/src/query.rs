//! # Event Query Language
//!
//! The query grammar shared by bus subscriptions and the transaction
//! indexer's search:
//!
//! ```text
//! query     := condition ( AND condition )*
//! condition := tag op operand | tag EXISTS
//! op        := = | < | <= | > | >= | CONTAINS
//! operand   := 'single quoted string' | number
//! ```
//!
//! Tags are composite keys (`<event type>.<attribute key>`), e.g.
//! `tm.event = 'Tx' AND transfer.sender = 'alice' AND tx.height >= 5`.
//! Keywords are case-insensitive.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A malformed query string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid query at offset {position}: {message}")]
pub struct QueryParseError {
    /// Byte offset where parsing failed.
    pub position: usize,
    pub message: String,
}

impl QueryParseError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    Exists,
}

impl Operator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Contains => "CONTAINS",
            Operator::Exists => "EXISTS",
        }
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Str(String),
    Number(f64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Str(s) => write!(f, "'{}'", s),
            Operand::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A single `tag op operand` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub tag: String,
    pub op: Operator,
    /// `None` only for `EXISTS`.
    pub operand: Option<Operand>,
}

impl Condition {
    /// Whether one tag value satisfies this condition.
    #[must_use]
    pub fn matches_value(&self, value: &str) -> bool {
        match (&self.op, &self.operand) {
            (Operator::Exists, _) => true,
            (Operator::Eq, Some(Operand::Str(s))) => value == s,
            (Operator::Contains, Some(Operand::Str(s))) => value.contains(s.as_str()),
            (op, Some(Operand::Number(n))) => {
                let Ok(v) = value.parse::<f64>() else {
                    return false;
                };
                match op {
                    Operator::Eq => v == *n,
                    Operator::Lt => v < *n,
                    Operator::Le => v <= *n,
                    Operator::Gt => v > *n,
                    Operator::Ge => v >= *n,
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Whether any value recorded under this condition's tag matches.
    #[must_use]
    pub fn matches(&self, tags: &BTreeMap<String, Vec<String>>) -> bool {
        tags.get(&self.tag)
            .is_some_and(|values| values.iter().any(|v| self.matches_value(v)))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {} {}", self.tag, self.op.as_str(), operand),
            None => write!(f, "{} {}", self.tag, self.op.as_str()),
        }
    }
}

/// A parsed conjunctive query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    conditions: Vec<Condition>,
}

impl Query {
    /// Parse a query string.
    pub fn parse(input: &str) -> Result<Self, QueryParseError> {
        Parser::new(input).parse()
    }

    /// Query matching `tm.event = '<event_type>'`.
    #[must_use]
    pub fn event_type(event_type: &str) -> Self {
        Self {
            conditions: vec![Condition {
                tag: crate::events::EVENT_TYPE_KEY.to_string(),
                op: Operator::Eq,
                operand: Some(Operand::Str(event_type.to_string())),
            }],
        }
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// All conditions must hold.
    #[must_use]
    pub fn matches(&self, tags: &BTreeMap<String, Vec<String>>) -> bool {
        self.conditions.iter().all(|c| c.matches(tags))
    }
}

impl FromStr for Query {
    type Err = QueryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{}", condition)?;
        }
        Ok(())
    }
}

// =============================================================================
// LEXER / PARSER
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Tag(String),
    Op(Operator),
    Str(String),
    Number(f64),
    And,
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(mut self) -> Result<Query, QueryParseError> {
        let mut conditions = Vec::new();
        loop {
            conditions.push(self.condition()?);
            match self.next_token()? {
                None => break,
                Some((_, Token::And)) => continue,
                Some((at, other)) => {
                    return Err(QueryParseError::new(
                        at,
                        format!("expected AND or end of query, found {:?}", other),
                    ))
                }
            }
        }
        Ok(Query { conditions })
    }

    fn condition(&mut self) -> Result<Condition, QueryParseError> {
        let tag = match self.next_token()? {
            Some((_, Token::Tag(tag))) => tag,
            Some((at, other)) => {
                return Err(QueryParseError::new(at, format!("expected tag, found {:?}", other)))
            }
            None => return Err(QueryParseError::new(self.pos, "expected condition")),
        };

        let (op_at, op) = match self.next_token()? {
            Some((at, Token::Op(op))) => (at, op),
            Some((at, other)) => {
                return Err(QueryParseError::new(
                    at,
                    format!("expected operator after {}, found {:?}", tag, other),
                ))
            }
            None => {
                return Err(QueryParseError::new(
                    self.pos,
                    format!("expected operator after {}", tag),
                ))
            }
        };

        if op == Operator::Exists {
            return Ok(Condition {
                tag,
                op,
                operand: None,
            });
        }

        let operand = match self.next_token()? {
            Some((_, Token::Str(s))) => Operand::Str(s),
            Some((_, Token::Number(n))) => Operand::Number(n),
            Some((at, other)) => {
                return Err(QueryParseError::new(
                    at,
                    format!("expected operand, found {:?}", other),
                ))
            }
            None => return Err(QueryParseError::new(self.pos, "expected operand")),
        };

        match (op, &operand) {
            (Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge, Operand::Str(_)) => {
                Err(QueryParseError::new(
                    op_at,
                    format!("operator {} requires a numeric operand", op.as_str()),
                ))
            }
            (Operator::Contains, Operand::Number(_)) => Err(QueryParseError::new(
                op_at,
                "CONTAINS requires a string operand",
            )),
            _ => Ok(Condition {
                tag,
                op,
                operand: Some(operand),
            }),
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.input[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn next_token(&mut self) -> Result<Option<(usize, Token)>, QueryParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let rest = &self.input[start..];
        let Some(c) = rest.chars().next() else {
            return Ok(None);
        };

        let token = match c {
            '=' => {
                self.pos += 1;
                Token::Op(Operator::Eq)
            }
            '<' | '>' => {
                let with_eq = rest[1..].starts_with('=');
                self.pos += if with_eq { 2 } else { 1 };
                Token::Op(match (c, with_eq) {
                    ('<', false) => Operator::Lt,
                    ('<', true) => Operator::Le,
                    ('>', false) => Operator::Gt,
                    _ => Operator::Ge,
                })
            }
            '\'' => {
                let Some(end) = rest[1..].find('\'') else {
                    return Err(QueryParseError::new(start, "unterminated string literal"));
                };
                self.pos += end + 2;
                Token::Str(rest[1..=end].to_string())
            }
            c if c.is_ascii_digit() || c == '-' => {
                let len = rest
                    .char_indices()
                    .skip(1)
                    .find(|(_, ch)| !(ch.is_ascii_digit() || *ch == '.'))
                    .map_or(rest.len(), |(i, _)| i);
                let text = &rest[..len];
                let n = text.parse::<f64>().map_err(|_| {
                    QueryParseError::new(start, format!("invalid number {:?}", text))
                })?;
                self.pos += len;
                Token::Number(n)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let len = rest
                    .char_indices()
                    .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-')))
                    .map_or(rest.len(), |(i, _)| i);
                let word = &rest[..len];
                self.pos += len;
                if word.eq_ignore_ascii_case("AND") {
                    Token::And
                } else if word.eq_ignore_ascii_case("CONTAINS") {
                    Token::Op(Operator::Contains)
                } else if word.eq_ignore_ascii_case("EXISTS") {
                    Token::Op(Operator::Exists)
                } else {
                    Token::Tag(word.to_string())
                }
            }
            other => {
                return Err(QueryParseError::new(
                    start,
                    format!("unexpected character {:?}", other),
                ))
            }
        };
        Ok(Some((start, token)))
    }
}
