//! Causal links and the decomposition forest.

use std::collections::HashMap;
use std::fmt;

use poplan_model::Predicate;
use serde::{Deserialize, Serialize};

use crate::ids::StepId;

/// `head` establishes `predicate`, which `tail` consumes.
///
/// Whenever a link exists the plan also orders `head` before `tail`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CausalLink {
    pub predicate: Predicate,
    pub head: StepId,
    pub tail: StepId,
}

impl CausalLink {
    pub fn new(predicate: Predicate, head: StepId, tail: StepId) -> Self {
        Self {
            predicate,
            head,
            tail,
        }
    }
}

impl fmt::Display for CausalLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}-> {}", self.head, self.predicate, self.tail)
    }
}

/// Forest recording which steps each expanded composite produced.
///
/// Every child has exactly one parent: the composite whose expansion created
/// it (a bracket, a primitive sub-step, or a nested composite).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecompositionLinks {
    parent: HashMap<StepId, StepId>,
    children: HashMap<StepId, Vec<StepId>>,
}

impl DecompositionLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, parent: StepId, child: StepId) {
        if self.parent.insert(child, parent).is_none() {
            self.children.entry(parent).or_default().push(child);
        }
    }

    pub fn parent(&self, step: StepId) -> Option<StepId> {
        self.parent.get(&step).copied()
    }

    pub fn children(&self, parent: StepId) -> &[StepId] {
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `step` is `root` or lies anywhere in the subtree under it.
    pub fn on_decomp_path(&self, step: StepId, root: StepId) -> bool {
        let mut current = Some(step);
        while let Some(id) = current {
            if id == root {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// The top-most composite whose subtree contains `step`, or `step` itself
    /// when nothing contains it.
    pub fn root(&self, step: StepId) -> StepId {
        let mut current = step;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }
}
