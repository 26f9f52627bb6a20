//! Plan steps: primitive actions, decomposition brackets, and composite tasks.

use std::sync::Arc;

use poplan_model::{Operator, Predicate};

use crate::ids::StepId;
use crate::method::Method;

/// Which end of a decomposition a bracket step sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BracketSide {
    Init,
    Goal,
}

/// Brackets and sub-steps of a composite step once its method is expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub initial: StepId,
    pub goal: StepId,
    /// Fresh sub-step ids, in method order.
    pub sub_steps: Vec<StepId>,
}

/// An abstract task together with the method that refines it.
#[derive(Debug, Clone)]
pub struct CompositeStep {
    pub method: Arc<Method>,
    pub expansion: Option<Expansion>,
}

#[derive(Debug, Clone)]
pub enum StepKind {
    Primitive,
    Bracket(BracketSide),
    Composite(CompositeStep),
}

/// An operator instance placed in a plan.
///
/// `preconditions` and `effects` start as copies of the operator's and can be
/// cleared (an expanded composite hands them over to its brackets); `action`
/// never changes and is what structural plan comparison looks at.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub id: StepId,
    pub action: Arc<Operator>,
    pub preconditions: Vec<Predicate>,
    pub effects: Vec<Predicate>,
    /// 0 for primitive actions, nesting depth of the task hierarchy otherwise.
    pub height: u32,
    /// Distance from the top-level decomposition root.
    pub depth: u32,
    /// Dummy-init bracket of the innermost decomposition containing this step.
    pub init_cndt: Option<StepId>,
    /// Dummy-goal bracket of the innermost decomposition containing this step.
    pub goal_cndt: Option<StepId>,
    pub kind: StepKind,
    open_conditions: Vec<Predicate>,
    fulfilled: Vec<Predicate>,
}

impl PlanStep {
    fn with_kind(id: StepId, action: Arc<Operator>, height: u32, kind: StepKind) -> Self {
        Self {
            id,
            preconditions: action.preconditions.clone(),
            effects: action.effects.clone(),
            open_conditions: action.preconditions.clone(),
            fulfilled: Vec::new(),
            action,
            height,
            depth: 0,
            init_cndt: None,
            goal_cndt: None,
            kind,
        }
    }

    pub fn primitive(id: StepId, action: impl Into<Arc<Operator>>) -> Self {
        Self::with_kind(id, action.into(), 0, StepKind::Primitive)
    }

    pub fn bracket(id: StepId, action: impl Into<Arc<Operator>>, side: BracketSide) -> Self {
        Self::with_kind(id, action.into(), 0, StepKind::Bracket(side))
    }

    /// An unexpanded composite step. Height is clamped to at least 1.
    pub fn composite(
        id: StepId,
        action: impl Into<Arc<Operator>>,
        height: u32,
        method: Arc<Method>,
    ) -> Self {
        Self::with_kind(
            id,
            action.into(),
            height.max(1),
            StepKind::Composite(CompositeStep {
                method,
                expansion: None,
            }),
        )
    }

    /// A copy of this step under a new id, keeping kind, conditions and
    /// scope references.
    pub fn duplicate(&self, id: StepId) -> Self {
        Self { id, ..self.clone() }
    }

    pub fn name(&self) -> &str {
        &self.action.name
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, StepKind::Composite(_))
    }

    pub fn is_primitive(&self) -> bool {
        !self.is_composite()
    }

    pub fn bracket_side(&self) -> Option<BracketSide> {
        match self.kind {
            StepKind::Bracket(side) => Some(side),
            _ => None,
        }
    }

    pub fn is_bracket(&self) -> bool {
        self.bracket_side().is_some()
    }

    pub fn composite_step(&self) -> Option<&CompositeStep> {
        match &self.kind {
            StepKind::Composite(composite) => Some(composite),
            _ => None,
        }
    }

    pub fn expansion(&self) -> Option<&Expansion> {
        self.composite_step().and_then(|c| c.expansion.as_ref())
    }

    /// Preconditions that have no causal support yet.
    pub fn open_conditions(&self) -> &[Predicate] {
        &self.open_conditions
    }

    pub fn fulfilled(&self) -> &[Predicate] {
        &self.fulfilled
    }

    pub fn has_open_condition(&self, precondition: &Predicate) -> bool {
        self.open_conditions.contains(precondition)
    }

    /// Move `precondition` from the open set to the fulfilled set. Returns
    /// `false` if it was not open.
    pub fn fulfill(&mut self, precondition: &Predicate) -> bool {
        let before = self.open_conditions.len();
        self.open_conditions.retain(|p| p != precondition);
        if self.open_conditions.len() == before {
            return false;
        }
        self.fulfilled.push(precondition.clone());
        true
    }

    /// Drop all preconditions and effects, open or not.
    pub(crate) fn clear_conditions(&mut self) -> Vec<Predicate> {
        self.preconditions.clear();
        self.effects.clear();
        std::mem::take(&mut self.open_conditions)
    }
}
