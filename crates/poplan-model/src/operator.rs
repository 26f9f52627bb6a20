use std::fmt;

use serde::{Deserialize, Serialize};

use crate::predicate::Predicate;
use crate::term::Term;

/// An action schema (or a ground instance of one): name, parameters,
/// preconditions, effects, and pairwise inequality constraints.
///
/// Use [`Operator::new`] for the head, then chain the builder-style setters.
/// Operators are compared by value; a plan step's identity for structural
/// comparison is its operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operator {
    pub name: String,
    #[serde(default)]
    pub terms: Vec<Term>,
    #[serde(default)]
    pub preconditions: Vec<Predicate>,
    #[serde(default)]
    pub effects: Vec<Predicate>,
    /// Pairs of terms that must not denote the same object.
    #[serde(default)]
    pub nonequalities: Vec<(Term, Term)>,
}

impl Operator {
    pub fn new<T: Into<Term>>(name: impl Into<String>, terms: impl IntoIterator<Item = T>) -> Self {
        Self {
            name: name.into(),
            terms: terms.into_iter().map(Into::into).collect(),
            preconditions: Vec::new(),
            effects: Vec::new(),
            nonequalities: Vec::new(),
        }
    }

    /// Build an operator from its head literal, e.g. `(move p A B)`.
    pub fn from_signature(signature: &Predicate) -> Self {
        Self::new(signature.name.clone(), signature.terms.iter().cloned())
    }

    pub fn with_preconditions(mut self, preconditions: impl IntoIterator<Item = Predicate>) -> Self {
        self.preconditions = preconditions.into_iter().collect();
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Predicate>) -> Self {
        self.effects = effects.into_iter().collect();
        self
    }

    pub fn with_nonequality(mut self, a: impl Into<Term>, b: impl Into<Term>) -> Self {
        self.nonequalities.push((a.into(), b.into()));
        self
    }

    /// The operator head as an asserted literal.
    pub fn signature(&self) -> Predicate {
        Predicate {
            name: self.name.clone(),
            terms: self.terms.clone(),
            sign: true,
        }
    }

    /// Whether every inequality constraint holds. Only meaningful for ground
    /// operators: two distinct variables are never considered equal.
    pub fn satisfies_nonequalities(&self) -> bool {
        self.nonequalities
            .iter()
            .all(|(a, b)| a.is_variable() || b.is_variable() || a.name != b.name)
    }

    /// Whether applying this operator can falsify `predicate`.
    pub fn deletes(&self, predicate: &Predicate) -> bool {
        self.effects.iter().any(|effect| effect.contradicts(predicate))
    }

    /// Whether applying this operator establishes `predicate`.
    pub fn achieves(&self, predicate: &Predicate) -> bool {
        self.effects.contains(predicate)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.signature().fmt(f)
    }
}
