//! Flaws and the worklist that holds them.

use std::fmt;

use poplan_model::Predicate;
use serde::{Deserialize, Serialize};

use crate::ids::StepId;
use crate::links::CausalLink;

/// A precondition of `step` that has no causal support yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenCondition {
    pub precondition: Predicate,
    pub step: StepId,
    /// The condition belongs to a decomposition's dummy-goal bracket.
    #[serde(default)]
    pub is_dummy_goal: bool,
    /// The condition is queued at a dummy-init bracket, as when an expanded
    /// composite's unmet task preconditions move onto its dummy-init.
    #[serde(default)]
    pub has_dummy_init: bool,
}

impl OpenCondition {
    pub fn new(precondition: Predicate, step: StepId) -> Self {
        Self {
            precondition,
            step,
            is_dummy_goal: false,
            has_dummy_init: false,
        }
    }

    /// Whether both refer to the same precondition of the same step.
    pub fn same_need(&self, other: &OpenCondition) -> bool {
        self.step == other.step && self.precondition == other.precondition
    }
}

impl PartialEq for OpenCondition {
    fn eq(&self, other: &Self) -> bool {
        self.same_need(other)
    }
}

impl Eq for OpenCondition {}

impl fmt::Display for OpenCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "open {} at {}", self.precondition, self.step)
    }
}

/// `threat` may falsify the predicate of `link` and is not yet ordered
/// outside the link's span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatenedLinkFlaw {
    pub link: CausalLink,
    pub threat: StepId,
}

impl ThreatenedLinkFlaw {
    pub fn new(link: CausalLink, threat: StepId) -> Self {
        Self { link, threat }
    }
}

impl fmt::Display for ThreatenedLinkFlaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} threatens {}", self.threat, self.link)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flaw {
    OpenCondition(OpenCondition),
    ThreatenedLink(ThreatenedLinkFlaw),
}

impl fmt::Display for Flaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenCondition(oc) => oc.fmt(f),
            Self::ThreatenedLink(tl) => tl.fmt(f),
        }
    }
}

/// Outstanding defects of a plan. Unordered; selection policy belongs to the
/// search driver.
///
/// Flaws reference steps by id, and a cloned plan keeps its ids, so cloning
/// the queue is enough to give a branch its own independent worklist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlawQueue {
    open_conditions: Vec<OpenCondition>,
    threats: Vec<ThreatenedLinkFlaw>,
}

impl FlawQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an open condition. Returns `false` if the same need is already
    /// queued.
    pub fn add_open_condition(&mut self, oc: OpenCondition) -> bool {
        if self.open_conditions.contains(&oc) {
            return false;
        }
        self.open_conditions.push(oc);
        true
    }

    /// Queue a threat. Returns `false` if it is already queued.
    pub fn add_threat(&mut self, threat: ThreatenedLinkFlaw) -> bool {
        if self.threats.contains(&threat) {
            return false;
        }
        self.threats.push(threat);
        true
    }

    /// Remove an open condition that has been supported.
    pub fn discharge(&mut self, oc: &OpenCondition) -> bool {
        let before = self.open_conditions.len();
        self.open_conditions.retain(|queued| !queued.same_need(oc));
        self.open_conditions.len() != before
    }

    pub fn remove_threat(&mut self, threat: &ThreatenedLinkFlaw) -> bool {
        let before = self.threats.len();
        self.threats.retain(|queued| queued != threat);
        self.threats.len() != before
    }

    pub fn open_conditions(&self) -> &[OpenCondition] {
        &self.open_conditions
    }

    pub fn threats(&self) -> &[ThreatenedLinkFlaw] {
        &self.threats
    }

    /// Threats first, then open conditions, each in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Flaw> + '_ {
        self.threats
            .iter()
            .cloned()
            .map(Flaw::ThreatenedLink)
            .chain(self.open_conditions.iter().cloned().map(Flaw::OpenCondition))
    }

    pub fn len(&self) -> usize {
        self.open_conditions.len() + self.threats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
