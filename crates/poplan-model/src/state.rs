use serde::{Deserialize, Serialize};

use crate::predicate::Predicate;

/// A set of literals describing the world, used for the initial state and the
/// goal of a planning problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    predicates: Vec<Predicate>,
}

impl State {
    pub fn new(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let mut state = Self::default();
        for predicate in predicates {
            state.insert(predicate);
        }
        state
    }

    /// Add a literal unless it is already present.
    pub fn insert(&mut self, predicate: Predicate) {
        if !self.predicates.contains(&predicate) {
            self.predicates.push(predicate);
        }
    }

    pub fn contains(&self, predicate: &Predicate) -> bool {
        self.predicates.contains(predicate)
    }

    /// Closed-world truth of a literal: a positive literal holds when it is
    /// listed, a negative one holds when its positive form is not.
    pub fn holds(&self, predicate: &Predicate) -> bool {
        if predicate.sign {
            self.contains(predicate)
        } else {
            !self.contains(&predicate.negate())
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl FromIterator<Predicate> for State {
    fn from_iter<I: IntoIterator<Item = Predicate>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_deduplicates() {
        let at = Predicate::new("at", ["p", "A"]);
        let state = State::new([at.clone(), at.clone()]);
        assert_eq!(state.len(), 1);
        assert!(state.contains(&at));
    }

    #[test]
    fn negative_literals_use_closed_world() {
        let at_a = Predicate::new("at", ["p", "A"]);
        let at_b = Predicate::new("at", ["p", "B"]);
        let state = State::new([at_a.clone()]);
        assert!(state.holds(&at_a));
        assert!(!state.holds(&at_a.negate()));
        assert!(state.holds(&at_b.negate()));
    }
}
