//! Literals with polarity.
//!
//! A [`Predicate`] is written as an s-expression: `(at p A)` for an asserted
//! fact and `(not (at p A))` for its negation. [`Predicate::from_str`]
//! accepts exactly that form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::term::Term;

/// A named relation over ordered terms, asserted (`sign == true`) or negated.
///
/// Derived equality includes the sign, so `(at p A)` and `(not (at p A))`
/// are different literals. Use [`Predicate::same_fact`] to compare the
/// underlying fact only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Predicate {
    pub name: String,
    #[serde(default)]
    pub terms: Vec<Term>,
    #[serde(default = "default_sign")]
    pub sign: bool,
}

fn default_sign() -> bool {
    true
}

impl Predicate {
    /// Build an asserted literal.
    pub fn new<T: Into<Term>>(name: impl Into<String>, terms: impl IntoIterator<Item = T>) -> Self {
        Self {
            name: name.into(),
            terms: terms.into_iter().map(Into::into).collect(),
            sign: true,
        }
    }

    /// Build a negated literal.
    pub fn negative<T: Into<Term>>(
        name: impl Into<String>,
        terms: impl IntoIterator<Item = T>,
    ) -> Self {
        Self::new(name, terms).negate()
    }

    /// The same fact with the opposite polarity.
    pub fn negate(&self) -> Self {
        Self {
            name: self.name.clone(),
            terms: self.terms.clone(),
            sign: !self.sign,
        }
    }

    /// True when both literals talk about the same fact (name and arguments),
    /// regardless of polarity.
    pub fn same_fact(&self, other: &Predicate) -> bool {
        self.name == other.name && self.terms == other.terms
    }

    /// True when `other` asserts the opposite of `self`.
    pub fn contradicts(&self, other: &Predicate) -> bool {
        self.same_fact(other) && self.sign != other.sign
    }

    pub fn is_ground(&self) -> bool {
        !self.terms.iter().any(Term::is_variable)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.sign {
            f.write_str("(not ")?;
        }
        write!(f, "({}", self.name)?;
        for term in &self.terms {
            write!(f, " {term}")?;
        }
        f.write_str(")")?;
        if !self.sign {
            f.write_str(")")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Error returned when parsing an invalid [`Predicate`] string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateParseError {
    pub input: String,
    pub reason: &'static str,
}

impl fmt::Display for PredicateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid predicate {:?}: {}", self.input, self.reason)
    }
}

impl std::error::Error for PredicateParseError {}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Open,
    Close,
    Atom(&'a str),
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in input.char_indices() {
        if c == '(' || c == ')' || c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(Token::Atom(&input[s..i]));
            }
            match c {
                '(' => tokens.push(Token::Open),
                ')' => tokens.push(Token::Close),
                _ => {}
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(Token::Atom(&input[s..]));
    }
    tokens
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn fail(&self, reason: &'static str) -> PredicateParseError {
        PredicateParseError {
            input: self.input.to_owned(),
            reason,
        }
    }

    fn next(&mut self) -> Option<&Token<'a>> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn literal(&mut self) -> Result<Predicate, PredicateParseError> {
        match self.next() {
            Some(Token::Open) => {}
            Some(_) => return Err(self.fail("expected '('")),
            None => return Err(self.fail("empty input")),
        }

        let name = match self.next() {
            Some(Token::Atom(name)) => *name,
            Some(_) => return Err(self.fail("expected a predicate name")),
            None => return Err(self.fail("unbalanced parentheses")),
        };

        if name == "not" && self.tokens.get(self.pos) == Some(&Token::Open) {
            let inner = self.literal()?;
            return match self.next() {
                Some(Token::Close) => Ok(inner.negate()),
                _ => Err(self.fail("negation takes exactly one literal")),
            };
        }

        let mut terms = Vec::new();
        loop {
            match self.next() {
                Some(Token::Atom(term)) => terms.push(Term::new(*term)),
                Some(Token::Close) => break,
                Some(Token::Open) => return Err(self.fail("nested literal in argument list")),
                None => return Err(self.fail("unbalanced parentheses")),
            }
        }

        Ok(Predicate {
            name: name.to_owned(),
            terms,
            sign: true,
        })
    }
}

impl FromStr for Predicate {
    type Err = PredicateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser {
            input: s,
            tokens: tokenize(s),
            pos: 0,
        };
        let predicate = parser.literal()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.fail("trailing input after literal"));
        }
        Ok(predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negate_flips_only_the_sign() {
        let at = Predicate::new("at", ["p", "A"]);
        let not_at = at.negate();
        assert!(!not_at.sign);
        assert!(at.same_fact(&not_at));
        assert!(at.contradicts(&not_at));
        assert_ne!(at, not_at);
        assert_eq!(not_at.negate(), at);
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for text in ["(at p A)", "(not (at p A))", "(handempty)"] {
            let parsed: Predicate = text.parse().expect("should parse");
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn parse_tolerates_extra_whitespace() {
        let parsed: Predicate = "  ( in  ?person ?car )".parse().expect("should parse");
        assert_eq!(parsed, Predicate::new("in", ["?person", "?car"]));
        assert!(!parsed.is_ground());
    }

    #[test]
    fn rejects_malformed_input() {
        for text in ["", "at p A", "(at p A", "(at p A))", "(not (at p) (at q))", "(at (p) A)"] {
            let err = text.parse::<Predicate>().unwrap_err();
            assert_eq!(err.input, text);
        }
    }

    #[test]
    fn serde_defaults_sign_to_true() {
        let p: Predicate =
            serde_json::from_str(r#"{"name":"at","terms":[{"name":"p"}]}"#).expect("should parse");
        assert!(p.sign);
    }
}
