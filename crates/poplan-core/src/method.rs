//! Decomposition methods: the sub-plan templates composite steps expand into.

use std::collections::HashSet;
use std::sync::Arc;

use poplan_model::{Operator, Predicate};

use crate::error::PlanError;
use crate::ids::{IdAllocator, StepId};
use crate::links::CausalLink;
use crate::step::{BracketSide, PlanStep};

/// A method for an abstract task.
///
/// Sub-orderings and sub-links are expressed over the template ids of
/// `sub_steps`, `dummy_init` and `dummy_goal`; expansion clones every step
/// under a fresh id and remaps them.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    /// Effects are the task's preconditions.
    pub dummy_init: PlanStep,
    /// Preconditions are the task's effects.
    pub dummy_goal: PlanStep,
    pub sub_steps: Vec<PlanStep>,
    pub sub_orderings: Vec<(StepId, StepId)>,
    pub sub_links: Vec<CausalLink>,
}

impl Method {
    /// Start a method for `task`, allocating bracket template ids from `ids`.
    pub fn builder<'a>(
        name: impl Into<String>,
        task: &Operator,
        ids: &'a IdAllocator,
    ) -> MethodBuilder<'a> {
        let init_op = Operator::new(format!("dummy-init:{}", task.name), task.terms.iter().cloned())
            .with_effects(task.preconditions.iter().cloned());
        let goal_op = Operator::new(format!("dummy-goal:{}", task.name), task.terms.iter().cloned())
            .with_preconditions(task.effects.iter().cloned());

        MethodBuilder {
            ids,
            method: Method {
                name: name.into(),
                dummy_init: PlanStep::bracket(ids.next_step(), init_op, BracketSide::Init),
                dummy_goal: PlanStep::bracket(ids.next_step(), goal_op, BracketSide::Goal),
                sub_steps: Vec::new(),
                sub_orderings: Vec::new(),
                sub_links: Vec::new(),
            },
        }
    }

    pub fn is_bracket(&self, id: StepId) -> bool {
        id == self.dummy_init.id || id == self.dummy_goal.id
    }

    pub fn sub_step(&self, id: StepId) -> Option<&PlanStep> {
        self.sub_steps.iter().find(|s| s.id == id)
    }
}

/// Incrementally assembles a [`Method`].
#[derive(Debug)]
pub struct MethodBuilder<'a> {
    ids: &'a IdAllocator,
    method: Method,
}

impl MethodBuilder<'_> {
    pub fn init_id(&self) -> StepId {
        self.method.dummy_init.id
    }

    pub fn goal_id(&self) -> StepId {
        self.method.dummy_goal.id
    }

    /// Add a primitive sub-step and return its template id.
    pub fn primitive(&mut self, action: impl Into<Arc<Operator>>) -> StepId {
        let step = PlanStep::primitive(self.ids.next_step(), action);
        self.step(step)
    }

    /// Add a pre-built sub-step (typically a nested composite).
    pub fn step(&mut self, step: PlanStep) -> StepId {
        let id = step.id;
        self.method.sub_steps.push(step);
        id
    }

    pub fn ordering(&mut self, before: StepId, after: StepId) -> &mut Self {
        self.method.sub_orderings.push((before, after));
        self
    }

    pub fn link(&mut self, predicate: Predicate, head: StepId, tail: StepId) -> &mut Self {
        self.method
            .sub_links
            .push(CausalLink::new(predicate, head, tail));
        self
    }

    /// Finish the method, checking that every ordering and link endpoint is a
    /// step the method owns.
    pub fn build(self) -> Result<Arc<Method>, PlanError> {
        let method = self.method;
        let known: HashSet<StepId> = method
            .sub_steps
            .iter()
            .map(|s| s.id)
            .chain([method.dummy_init.id, method.dummy_goal.id])
            .collect();

        let endpoints = method
            .sub_orderings
            .iter()
            .flat_map(|(a, b)| [*a, *b])
            .chain(method.sub_links.iter().flat_map(|l| [l.head, l.tail]));
        for id in endpoints {
            if !known.contains(&id) {
                return Err(PlanError::UnknownMethodStep {
                    method: method.name.clone(),
                    step: id,
                });
            }
        }

        Ok(Arc::new(method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn travel() -> Operator {
        Operator::new("travel", ["p", "A", "B"])
            .with_preconditions([Predicate::new("at", ["p", "A"])])
            .with_effects([
                Predicate::new("at", ["p", "B"]),
                Predicate::negative("at", ["p", "A"]),
            ])
    }

    #[test]
    fn brackets_mirror_task_interface() {
        let ids = IdAllocator::new();
        let task = travel();
        let method = Method::builder("walk", &task, &ids)
            .build()
            .expect("empty method is valid");

        assert_eq!(method.dummy_init.bracket_side(), Some(BracketSide::Init));
        assert_eq!(method.dummy_init.effects, task.preconditions);
        assert!(method.dummy_init.preconditions.is_empty());
        assert_eq!(method.dummy_goal.bracket_side(), Some(BracketSide::Goal));
        assert_eq!(method.dummy_goal.preconditions, task.effects);
        assert!(method.is_bracket(method.dummy_goal.id));
    }

    #[test]
    fn build_rejects_foreign_endpoints() {
        let ids = IdAllocator::new();
        let mut builder = Method::builder("walk", &travel(), &ids);
        let step = builder.primitive(Operator::new("walk", ["p", "A", "B"]));
        builder.ordering(step, StepId(999));

        let err = builder.build().unwrap_err();
        assert_eq!(
            err,
            PlanError::UnknownMethodStep {
                method: "walk".into(),
                step: StepId(999)
            }
        );
    }

    #[test]
    fn sub_steps_are_addressable() {
        let ids = IdAllocator::new();
        let mut builder = Method::builder("walk", &travel(), &ids);
        let walk = builder.primitive(Operator::new("walk", ["p", "A", "B"]));
        let (init, goal) = (builder.init_id(), builder.goal_id());
        builder.ordering(init, walk).ordering(walk, goal);
        let method = builder.build().expect("valid method");

        assert_eq!(method.sub_step(walk).map(|s| s.name()), Some("walk"));
        assert_eq!(method.sub_orderings.len(), 2);
    }
}
