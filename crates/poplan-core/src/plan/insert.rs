//! Step insertion and method expansion.

use std::collections::HashMap;
use std::sync::Arc;

use poplan_model::Predicate;

use super::Plan;
use crate::error::PlanError;
use crate::flaw::{OpenCondition, ThreatenedLinkFlaw};
use crate::ids::StepId;
use crate::links::CausalLink;
use crate::step::{Expansion, PlanStep, StepKind};

impl Plan {
    /// Add a step to the plan: primitive steps are inserted directly,
    /// composite steps are expanded through their method.
    pub fn insert(&mut self, step: PlanStep) -> Result<StepId, PlanError> {
        if step.is_composite() {
            self.insert_decomp(step)
        } else {
            self.insert_primitive(step)
        }
    }

    /// Place a primitive step between the global brackets and queue an open
    /// condition for each of its preconditions.
    ///
    /// No threat detection happens here; the step is only ordered against the
    /// global brackets, so it cannot be placed inside a link's span yet.
    pub fn insert_primitive(&mut self, step: PlanStep) -> Result<StepId, PlanError> {
        let id = step.id;
        let open = step.open_conditions().to_vec();
        self.push_step(step)?;
        self.order_within_plan(id)?;

        for pre in open {
            self.add_open_condition(pre, id);
        }

        tracing::debug!(plan = %self.id, step = %id, "inserted primitive step");
        Ok(id)
    }

    /// Insert a step that lives inside a decomposition.
    ///
    /// Preconditions already asserted by the local dummy-init (`init_effects`)
    /// are linked straight from it; the rest become open conditions, tagged
    /// as dummy-goal conditions when `is_goal` is set.
    pub fn insert_primitive_substep(
        &mut self,
        step: PlanStep,
        init_effects: &[Predicate],
        is_goal: bool,
    ) -> Result<StepId, PlanError> {
        let id = step.id;
        let init = step.init_cndt;
        let open = step.open_conditions().to_vec();
        self.push_step(step)?;
        self.order_within_plan(id)?;

        for pre in open {
            match init {
                Some(init) if init_effects.contains(&pre) => {
                    self.step_mut(id)?.fulfill(&pre);
                    self.add_causal_link(CausalLink::new(pre, init, id))?;
                }
                _ => {
                    let mut oc = OpenCondition::new(pre, id);
                    oc.is_dummy_goal = is_goal;
                    self.flaws.add_open_condition(oc);
                }
            }
        }

        tracing::trace!(plan = %self.id, step = %id, is_goal, "inserted sub-step");
        Ok(id)
    }

    /// Expand a composite step into a fresh copy of its method's sub-plan.
    ///
    /// Returns the composite's id. The composite is registered as a step but
    /// never ordered itself; its brackets carry its place in the ordering.
    pub fn insert_decomp(&mut self, mut composite: PlanStep) -> Result<StepId, PlanError> {
        let cid = composite.id;
        let method = match &composite.kind {
            StepKind::Composite(c) if c.expansion.is_some() => {
                return Err(PlanError::AlreadyExpanded(cid));
            }
            StepKind::Composite(c) => Arc::clone(&c.method),
            _ => return Err(PlanError::NotComposite(cid)),
        };
        if self.contains(cid) {
            return Err(PlanError::DuplicateStep(cid));
        }

        self.decomps += 1;
        self.hdepth += method.sub_steps.len();
        let depth = composite.depth;

        // Brackets scoped to this expansion.
        let init_id = self.ctx.next_step_id();
        let goal_id = self.ctx.next_step_id();

        let mut dummy_init = method.dummy_init.duplicate(init_id);
        dummy_init.depth = depth;
        dummy_init.init_cndt = composite.init_cndt;
        dummy_init.goal_cndt = Some(goal_id);
        let init_effects = dummy_init.effects.clone();

        let mut dummy_goal = method.dummy_goal.duplicate(goal_id);
        dummy_goal.depth = depth;
        dummy_goal.init_cndt = Some(init_id);
        dummy_goal.goal_cndt = composite.goal_cndt;

        self.push_step(dummy_init)?;
        self.order_within_plan(init_id)?;
        self.order(init_id, goal_id)?;
        self.insert_primitive_substep(dummy_goal, &init_effects, true)?;

        // The composite hands its interface over to the brackets.
        let pending = composite.clear_conditions();
        if let StepKind::Composite(c) = &mut composite.kind {
            c.expansion = Some(Expansion {
                initial: init_id,
                goal: goal_id,
                sub_steps: Vec::new(),
            });
        }
        self.push_step(composite)?;
        self.decomp_links.insert(cid, init_id);
        self.decomp_links.insert(cid, goal_id);

        let mut id_map: HashMap<StepId, StepId> = HashMap::new();
        id_map.insert(method.dummy_init.id, init_id);
        id_map.insert(method.dummy_goal.id, goal_id);

        let mut sub_ids = Vec::with_capacity(method.sub_steps.len());
        for template in &method.sub_steps {
            let sub_id = self.ctx.next_step_id();
            id_map.insert(template.id, sub_id);
            sub_ids.push(sub_id);

            let mut sub = template.duplicate(sub_id);
            sub.depth = depth + 1;
            sub.init_cndt = Some(init_id);
            sub.goal_cndt = Some(goal_id);
            self.decomp_links.insert(cid, sub_id);

            if sub.is_composite() {
                self.insert_decomp(sub)?;
                let (sub_init, sub_goal) = self.brackets(sub_id)?;
                self.order(init_id, sub_init)?;
                self.order(sub_goal, goal_id)?;
            } else {
                self.order(init_id, sub_id)?;
                self.order(sub_id, goal_id)?;
                self.insert_primitive_substep(sub, &init_effects, false)?;
            }
        }

        for &(before, after) in &method.sub_orderings {
            if method.is_bracket(before) || method.is_bracket(after) {
                continue;
            }
            let (Some(&before), Some(&after)) = (id_map.get(&before), id_map.get(&after)) else {
                continue;
            };
            let before = self.exit_of(before)?;
            let after = self.entry_of(after)?;
            self.order(before, after)?;
        }

        for template in &method.sub_links {
            let (Some(&head), Some(&tail)) = (id_map.get(&template.head), id_map.get(&template.tail))
            else {
                continue;
            };
            let link = CausalLink::new(
                template.predicate.clone(),
                self.exit_of(head)?,
                self.entry_of(tail)?,
            );

            self.step_mut(link.tail)?.fulfill(&link.predicate);
            self.flaws
                .discharge(&OpenCondition::new(link.predicate.clone(), link.tail));
            self.add_causal_link(link.clone())?;

            for &candidate in &sub_ids {
                if candidate == link.head || candidate == link.tail {
                    continue;
                }
                if self.decomp_links.on_decomp_path(link.head, candidate)
                    || self.decomp_links.on_decomp_path(link.tail, candidate)
                {
                    continue;
                }
                if self.threatens_span(&link, candidate)? {
                    tracing::trace!(plan = %self.id, threat = %candidate, link = %link, "threat inside expansion");
                    self.flaws
                        .add_threat(ThreatenedLinkFlaw::new(link.clone(), candidate));
                }
            }
        }

        if let StepKind::Composite(c) = &mut self.step_mut(cid)?.kind {
            if let Some(expansion) = c.expansion.as_mut() {
                expansion.sub_steps = sub_ids;
            }
        }

        for pre in pending {
            self.add_open_condition(pre, init_id);
        }

        tracing::debug!(
            plan = %self.id,
            step = %cid,
            method = %method.name,
            sub_steps = method.sub_steps.len(),
            "expanded composite step"
        );
        Ok(cid)
    }

    fn order_within_plan(&mut self, id: StepId) -> Result<(), PlanError> {
        self.order(self.initial_step.id, id)?;
        self.order(id, self.goal_step.id)
    }

    /// Where orderings leaving `id` start: its dummy-goal if it is an
    /// expanded composite, otherwise the step itself.
    pub(crate) fn exit_of(&self, id: StepId) -> Result<StepId, PlanError> {
        if self.step(id)?.is_composite() {
            return Ok(self.brackets(id)?.1);
        }
        Ok(id)
    }

    /// Where orderings entering `id` end: its dummy-init if it is an
    /// expanded composite, otherwise the step itself.
    pub(crate) fn entry_of(&self, id: StepId) -> Result<StepId, PlanError> {
        if self.step(id)?.is_composite() {
            return Ok(self.brackets(id)?.0);
        }
        Ok(id)
    }
}
