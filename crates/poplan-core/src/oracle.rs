//! The threat oracle: decides whether a step can falsify a predicate.
//!
//! The plan consults a [`ThreatOracle`] before running its ordering checks.
//! [`ThreatCache`] is the default implementation, precomputed from the ground
//! operators of a problem.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use poplan_model::{Operator, Predicate};

use crate::step::PlanStep;

/// Answers "can `step` falsify `predicate`?".
///
/// The trait is object-safe so plans can share one oracle as
/// `Arc<dyn ThreatOracle>` across every branch of a search.
pub trait ThreatOracle: Send + Sync {
    fn is_threat(&self, predicate: &Predicate, step: &PlanStep) -> bool;
}

// Compile-time assertion: ThreatOracle must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ThreatOracle) {}
};

/// Threat adjacency over a fixed set of operators.
///
/// For every effect `e` of a registered operator `o`, `o` threatens the
/// negation of `e`. Steps are looked up by their underlying operator, so
/// decomposition brackets and unregistered operators never threaten.
#[derive(Debug, Clone, Default)]
pub struct ThreatCache {
    threats: HashMap<Predicate, HashSet<Arc<Operator>>>,
}

impl ThreatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_operators<'a>(operators: impl IntoIterator<Item = &'a Operator>) -> Self {
        let mut cache = Self::new();
        for op in operators {
            cache.register(op);
        }
        cache
    }

    /// Add an operator (primitive or composite) to the cache.
    pub fn register(&mut self, op: &Operator) {
        let shared = Arc::new(op.clone());
        for effect in &op.effects {
            self.threats
                .entry(effect.negate())
                .or_default()
                .insert(Arc::clone(&shared));
        }
    }

    /// Operators able to falsify `predicate`.
    pub fn threats_to(&self, predicate: &Predicate) -> impl Iterator<Item = &Operator> {
        self.threats
            .get(predicate)
            .into_iter()
            .flatten()
            .map(|op| op.as_ref())
    }

    pub fn len(&self) -> usize {
        self.threats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threats.is_empty()
    }
}

impl ThreatOracle for ThreatCache {
    fn is_threat(&self, predicate: &Predicate, step: &PlanStep) -> bool {
        self.threats
            .get(predicate)
            .is_some_and(|ops| ops.contains(&step.action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StepId;
    use crate::step::BracketSide;

    fn unmove() -> Operator {
        Operator::new("unmove", ["p", "B", "A"])
            .with_preconditions([Predicate::new("at", ["p", "B"])])
            .with_effects([
                Predicate::new("at", ["p", "A"]),
                Predicate::negative("at", ["p", "B"]),
            ])
    }

    #[test]
    fn registered_operator_threatens_negated_effects() {
        let cache = ThreatCache::from_operators([&unmove()]);
        let step = PlanStep::primitive(StepId(1), unmove());

        assert!(cache.is_threat(&Predicate::new("at", ["p", "B"]), &step));
        assert!(cache.is_threat(&Predicate::negative("at", ["p", "A"]), &step));
        assert!(!cache.is_threat(&Predicate::new("at", ["p", "A"]), &step));
        assert_eq!(cache.threats_to(&Predicate::new("at", ["p", "B"])).count(), 1);
    }

    #[test]
    fn unregistered_steps_never_threaten() {
        let cache = ThreatCache::from_operators([&unmove()]);
        let bracket = PlanStep::bracket(
            StepId(2),
            Operator::new("dummy-init:travel", ["p"])
                .with_effects([Predicate::negative("at", ["p", "B"])]),
            BracketSide::Init,
        );
        assert!(!cache.is_threat(&Predicate::new("at", ["p", "B"]), &bracket));
    }

    #[test]
    fn oracle_is_usable_as_trait_object() {
        let oracle: Arc<dyn ThreatOracle> = Arc::new(ThreatCache::new());
        let step = PlanStep::primitive(StepId(1), unmove());
        assert!(!oracle.is_threat(&Predicate::new("at", ["p", "B"]), &step));
    }
}
