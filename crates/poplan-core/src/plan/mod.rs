//! The partial plan and its refinement operators.
//!
//! A [`Plan`] owns its steps in an arena keyed by [`StepId`]. Orderings,
//! causal links, decomposition links, flaws, and bracket back-references all
//! refer to steps by id, so cloning a plan duplicates the arena and the id
//! containers without any remapping.
//!
//! Refinements:
//! - [`Plan::insert`] adds a primitive step or expands a composite one.
//! - [`Plan::repair`] supports an open condition with a causal link.
//! - [`Plan::detect_threats`] re-checks one step against every causal link.

mod insert;
mod repair;

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use poplan_model::{Operator, Predicate, State};

use crate::context::PlanContext;
use crate::error::PlanError;
use crate::flaw::{FlawQueue, OpenCondition};
use crate::graph::OrderingGraph;
use crate::ids::StepId;
use crate::links::{CausalLink, DecompositionLinks};
use crate::step::{BracketSide, Expansion, PlanStep};

/// An ordering added while containing a threat inside a composite's borders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuckedOrdering {
    /// The link whose tail was tucked.
    pub link: CausalLink,
    /// The composite whose span now covers the tail.
    pub container: StepId,
    pub before: StepId,
    pub after: StepId,
}

/// A partial plan: steps, orderings, causal links, decomposition links, and
/// the flaws still to resolve.
#[derive(Debug)]
pub struct Plan {
    id: String,
    initial: State,
    goal: State,
    initial_step: PlanStep,
    goal_step: PlanStep,
    steps: Vec<PlanStep>,
    index: HashMap<StepId, usize>,
    orderings: OrderingGraph,
    causal_links: Vec<CausalLink>,
    decomp_links: DecompositionLinks,
    flaws: FlawQueue,
    tucks: Vec<TuckedOrdering>,
    decomps: usize,
    hdepth: usize,
    ctx: PlanContext,
}

impl Plan {
    /// An empty plan bracketed by an initial step asserting `initial` and a
    /// goal step requiring `goal`.
    pub fn new(initial: State, goal: State, ctx: PlanContext) -> Self {
        let initial_op = Operator::new("initial", Vec::<&str>::new())
            .with_effects(initial.predicates().iter().cloned());
        let goal_op = Operator::new("goal", Vec::<&str>::new())
            .with_preconditions(goal.predicates().iter().cloned());
        Self::assemble(initial, goal, initial_op, goal_op, ctx)
    }

    /// An empty plan bracketed by explicit initial and goal operators.
    pub fn from_operators(initial_op: Operator, goal_op: Operator, ctx: PlanContext) -> Self {
        let initial = State::new(initial_op.effects.iter().cloned());
        let goal = State::new(goal_op.preconditions.iter().cloned());
        Self::assemble(initial, goal, initial_op, goal_op, ctx)
    }

    fn assemble(
        initial: State,
        goal: State,
        initial_op: Operator,
        goal_op: Operator,
        ctx: PlanContext,
    ) -> Self {
        let initial_step = ctx.primitive(initial_op);
        let goal_step = ctx.primitive(goal_op);
        let id = ctx.ids().next_plan_serial().to_string();

        let orderings = OrderingGraph::with_edge(initial_step.id, goal_step.id);

        tracing::debug!(plan = %id, "created plan");

        Self {
            id,
            initial,
            goal,
            initial_step,
            goal_step,
            steps: Vec::new(),
            index: HashMap::new(),
            orderings,
            causal_links: Vec::new(),
            decomp_links: DecompositionLinks::new(),
            flaws: FlawQueue::new(),
            tucks: Vec::new(),
            decomps: 0,
            hdepth: 0,
            ctx,
        }
    }

    /// Queue an open condition for every goal precondition.
    pub fn open_goal_conditions(&mut self) {
        let goal = self.goal_step.id;
        for pre in self.goal_step.open_conditions().to_vec() {
            self.flaws.add_open_condition(OpenCondition::new(pre, goal));
        }
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// Lineage id: the parent's id followed by this plan's serial.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn initial(&self) -> &State {
        &self.initial
    }

    pub fn goal(&self) -> &State {
        &self.goal
    }

    pub fn initial_step(&self) -> &PlanStep {
        &self.initial_step
    }

    pub fn goal_step(&self) -> &PlanStep {
        &self.goal_step
    }

    /// Every inserted step (primitives, brackets, expanded composites), not
    /// including the global initial and goal steps.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn orderings(&self) -> &OrderingGraph {
        &self.orderings
    }

    pub fn causal_links(&self) -> &[CausalLink] {
        &self.causal_links
    }

    pub fn decomposition_links(&self) -> &DecompositionLinks {
        &self.decomp_links
    }

    pub fn flaws(&self) -> &FlawQueue {
        &self.flaws
    }

    pub fn flaws_mut(&mut self) -> &mut FlawQueue {
        &mut self.flaws
    }

    /// Orderings added to contain threats inside composite borders.
    pub fn tucks(&self) -> &[TuckedOrdering] {
        &self.tucks
    }

    /// Number of composite expansions performed.
    pub fn decomps(&self) -> usize {
        self.decomps
    }

    /// Total sub-steps introduced by expansions.
    pub fn hdepth(&self) -> usize {
        self.hdepth
    }

    pub fn context(&self) -> &PlanContext {
        &self.ctx
    }

    /// A plan without flaws is a solution.
    pub fn is_solution(&self) -> bool {
        self.flaws.is_empty()
    }

    pub fn contains(&self, id: StepId) -> bool {
        id == self.initial_step.id || id == self.goal_step.id || self.index.contains_key(&id)
    }

    /// Look up any step of this plan, including the global brackets.
    pub fn step(&self, id: StepId) -> Result<&PlanStep, PlanError> {
        if id == self.initial_step.id {
            return Ok(&self.initial_step);
        }
        if id == self.goal_step.id {
            return Ok(&self.goal_step);
        }
        self.index
            .get(&id)
            .map(|&i| &self.steps[i])
            .ok_or(PlanError::StepNotFound(id))
    }

    pub(crate) fn step_mut(&mut self, id: StepId) -> Result<&mut PlanStep, PlanError> {
        if id == self.initial_step.id {
            return Ok(&mut self.initial_step);
        }
        if id == self.goal_step.id {
            return Ok(&mut self.goal_step);
        }
        match self.index.get(&id) {
            Some(&i) => Ok(&mut self.steps[i]),
            None => Err(PlanError::StepNotFound(id)),
        }
    }

    /// The current instance of a step referenced by a flaw. Failing to find
    /// it means the flaw came from a different plan.
    pub fn find(&self, id: StepId) -> Result<&PlanStep, PlanError> {
        self.step(id)
    }

    /// Brackets and sub-steps of an expanded composite.
    pub fn expansion(&self, id: StepId) -> Result<&Expansion, PlanError> {
        let step = self.step(id)?;
        let composite = step.composite_step().ok_or(PlanError::NotComposite(id))?;
        composite.expansion.as_ref().ok_or(PlanError::NotExpanded(id))
    }

    /// `(dummy-init, dummy-goal)` of an expanded composite.
    pub(crate) fn brackets(&self, id: StepId) -> Result<(StepId, StepId), PlanError> {
        let expansion = self.expansion(id)?;
        Ok((expansion.initial, expansion.goal))
    }

    /// Whether `to` is ordered after `from`.
    pub fn is_path(&self, from: StepId, to: StepId) -> bool {
        self.orderings.is_path(from, to)
    }

    /// The executable order: a linearization of the ordering graph without the
    /// global initial and goal steps.
    pub fn topo_sort(&self) -> Vec<&PlanStep> {
        self.orderings
            .topo_sort()
            .into_iter()
            .filter(|&id| id != self.initial_step.id && id != self.goal_step.id)
            .filter_map(|id| self.step(id).ok())
            .collect()
    }

    // -------------------------------------------------------------------
    // Internal bookkeeping shared by the refinement operators
    // -------------------------------------------------------------------

    fn push_step(&mut self, step: PlanStep) -> Result<StepId, PlanError> {
        let id = step.id;
        if self.contains(id) {
            return Err(PlanError::DuplicateStep(id));
        }
        self.index.insert(id, self.steps.len());
        self.steps.push(step);
        Ok(id)
    }

    fn order(&mut self, before: StepId, after: StepId) -> Result<(), PlanError> {
        self.orderings.insert(before, after).map(|_| ())
    }

    fn add_causal_link(&mut self, link: CausalLink) -> Result<(), PlanError> {
        self.order(link.head, link.tail)?;
        self.causal_links.push(link);
        Ok(())
    }

    /// Queue an open condition, tagging it when it is anchored at a bracket.
    fn add_open_condition(&mut self, precondition: Predicate, step: StepId) {
        let side = self.step(step).ok().and_then(PlanStep::bracket_side);
        let mut oc = OpenCondition::new(precondition, step);
        oc.is_dummy_goal = side == Some(BracketSide::Goal);
        oc.has_dummy_init = side == Some(BracketSide::Init);
        self.flaws.add_open_condition(oc);
    }

    // -------------------------------------------------------------------
    // Structural identity
    // -------------------------------------------------------------------

    fn action_of(&self, id: StepId) -> Option<&Arc<Operator>> {
        self.step(id).ok().map(|s| &s.action)
    }

    fn step_actions(&self) -> Vec<&Arc<Operator>> {
        self.steps.iter().map(|s| &s.action).collect()
    }

    fn ordering_actions(&self) -> Vec<(Option<&Arc<Operator>>, Option<&Arc<Operator>>)> {
        self.orderings
            .edges()
            .map(|(a, b)| (self.action_of(a), self.action_of(b)))
            .collect()
    }

    fn link_actions(&self) -> Vec<(&Predicate, Option<&Arc<Operator>>, Option<&Arc<Operator>>)> {
        self.causal_links
            .iter()
            .map(|l| (&l.predicate, self.action_of(l.head), self.action_of(l.tail)))
            .collect()
    }

    /// Additive hash over steps, orderings and causal links, insensitive to
    /// container order and step ids. Meant for duplicate detection only.
    pub fn structural_hash(&self) -> u64 {
        fn scaled<T: Hash>(value: T) -> u64 {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish().wrapping_mul(23)
        }

        let steps = self.step_actions().into_iter().map(scaled);
        let orderings = self.ordering_actions().into_iter().map(scaled);
        let links = self.link_actions().into_iter().map(scaled);
        steps
            .chain(orderings)
            .chain(links)
            .fold(0u64, u64::wrapping_add)
    }
}

/// Multiset equality of two element lists.
fn same_multiset<T: Hash + Eq>(a: Vec<T>, b: Vec<T>) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut counts: HashMap<T, isize> = HashMap::new();
    for item in a {
        *counts.entry(item).or_default() += 1;
    }
    for item in b {
        *counts.entry(item).or_default() -= 1;
    }
    counts.values().all(|&c| c == 0)
}

/// Two plans are equal when their steps, orderings and causal links match
/// as multisets of operators, whatever ids the steps carry.
impl PartialEq for Plan {
    fn eq(&self, other: &Self) -> bool {
        if self.steps.len() != other.steps.len()
            || self.orderings.edge_count() != other.orderings.edge_count()
            || self.causal_links.len() != other.causal_links.len()
        {
            return false;
        }
        same_multiset(self.step_actions(), other.step_actions())
            && same_multiset(self.ordering_actions(), other.ordering_actions())
            && same_multiset(self.link_actions(), other.link_actions())
    }
}

impl Eq for Plan {}

impl Hash for Plan {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.structural_hash());
    }
}

/// Branches a plan. Steps, flaws and containers are copied; the context is
/// shared. The clone's lineage id extends the parent's with a fresh serial.
impl Clone for Plan {
    fn clone(&self) -> Self {
        let serial = self.ctx.ids().next_plan_serial();
        Self {
            id: format!("{}{}", self.id, serial),
            initial: self.initial.clone(),
            goal: self.goal.clone(),
            initial_step: self.initial_step.clone(),
            goal_step: self.goal_step.clone(),
            steps: self.steps.clone(),
            index: self.index.clone(),
            orderings: self.orderings.clone(),
            causal_links: self.causal_links.clone(),
            decomp_links: self.decomp_links.clone(),
            flaws: self.flaws.clone(),
            tucks: self.tucks.clone(),
            decomps: self.decomps,
            hdepth: self.hdepth,
            ctx: self.ctx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_plan() -> Plan {
        let at_a = Predicate::new("at", ["p", "A"]);
        let at_b = Predicate::new("at", ["p", "B"]);
        Plan::new(
            State::new([at_a]),
            State::new([at_b]),
            PlanContext::with_operators([]),
        )
    }

    #[test]
    fn new_plan_orders_initial_before_goal() {
        let plan = empty_plan();
        assert!(plan.is_path(plan.initial_step().id, plan.goal_step().id));
        assert!(plan.steps().is_empty());
        assert!(plan.topo_sort().is_empty());
        assert!(plan.is_solution());
        assert_eq!(plan.initial_step().effects, plan.initial().predicates());
        assert_eq!(plan.goal_step().preconditions, plan.goal().predicates());
    }

    #[test]
    fn open_goal_conditions_queues_each_goal() {
        let mut plan = empty_plan();
        plan.open_goal_conditions();
        assert_eq!(plan.flaws().open_conditions().len(), 1);
        assert_eq!(plan.flaws().open_conditions()[0].step, plan.goal_step().id);
        plan.open_goal_conditions();
        assert_eq!(plan.flaws().len(), 1, "re-seeding does not duplicate");
    }

    #[test]
    fn clone_extends_lineage() {
        let plan = empty_plan();
        let child = plan.clone();
        assert!(child.id().starts_with(plan.id()));
        assert_ne!(child.id(), plan.id());
        assert_eq!(plan, child);
        assert_eq!(plan.structural_hash(), child.structural_hash());
    }

    #[test]
    fn unknown_step_is_reported() {
        let plan = empty_plan();
        assert_eq!(
            plan.step(StepId(9999)).unwrap_err(),
            PlanError::StepNotFound(StepId(9999))
        );
    }

    #[test]
    fn same_multiset_counts_duplicates() {
        assert!(same_multiset(vec![1, 2, 2], vec![2, 1, 2]));
        assert!(!same_multiset(vec![1, 2, 2], vec![1, 1, 2]));
        assert!(!same_multiset(vec![1], vec![1, 1]));
    }
}
