//! Open-condition repair and threat detection.
//!
//! A causal link `head -p-> tail` is threatened by a step that can falsify
//! `p` and may run inside the link's span. When the head is the dummy-goal of
//! an expanded composite `R`, the span starts at `R`'s dummy-init and steps
//! inside `R` are `R`'s own business.
//!
//! Composite candidates are judged through their brackets, with three
//! outcomes:
//! - the link's head lies inside the candidate: the consumer is tucked into
//!   the candidate's span with an extra ordering;
//! - the link's tail lies inside the candidate: no threat;
//! - otherwise the ordinary span check applies.

use super::{Plan, TuckedOrdering};
use crate::error::PlanError;
use crate::flaw::{OpenCondition, ThreatenedLinkFlaw};
use crate::ids::StepId;
use crate::links::CausalLink;
use crate::step::BracketSide;

impl Plan {
    /// Support `oc` with an effect of `repair_step`.
    ///
    /// A composite repair step supplies the effect through its dummy-goal.
    /// The repaired condition is discharged from the flaw queue and every
    /// step that may now interfere with the new link is checked.
    pub fn repair(&mut self, oc: &OpenCondition, repair_step: StepId) -> Result<(), PlanError> {
        if self.step(repair_step)?.is_composite() {
            self.repair_with_composite(oc, repair_step)
        } else {
            self.repair_with_primitive(oc, repair_step)
        }
    }

    fn repair_with_primitive(
        &mut self,
        oc: &OpenCondition,
        repair_step: StepId,
    ) -> Result<(), PlanError> {
        let link = self.support(oc, repair_step)?;

        let candidates: Vec<StepId> = self
            .steps
            .iter()
            .filter(|s| s.is_primitive() && s.id != link.head && s.id != link.tail)
            .map(|s| s.id)
            .collect();
        for candidate in candidates {
            if self.threatens_span(&link, candidate)? {
                self.record_threat(&link, candidate);
            }
        }
        Ok(())
    }

    fn repair_with_composite(
        &mut self,
        oc: &OpenCondition,
        repair_step: StepId,
    ) -> Result<(), PlanError> {
        let (_, repair_goal) = self.brackets(repair_step)?;
        let link = self.support(oc, repair_goal)?;

        let candidates: Vec<StepId> = self
            .steps
            .iter()
            .map(|s| s.id)
            .filter(|&id| id != repair_step && id != link.head && id != link.tail)
            .collect();
        for candidate in candidates {
            self.check_candidate(&link, candidate)?;
        }
        Ok(())
    }

    /// Fulfil the need, add the link and its ordering, and discharge the flaw.
    fn support(&mut self, oc: &OpenCondition, head: StepId) -> Result<CausalLink, PlanError> {
        let need = self.find(oc.step)?;
        let tail = need.id;
        if !need.is_bracket() {
            self.step_mut(tail)?.fulfill(&oc.precondition);
        }

        let link = CausalLink::new(oc.precondition.clone(), head, tail);
        self.add_causal_link(link.clone())?;
        self.flaws.discharge(oc);

        tracing::debug!(plan = %self.id, link = %link, "repaired open condition");
        Ok(link)
    }

    /// Check `candidate` against every causal link of the plan.
    ///
    /// Returns how many new threats were queued.
    pub fn detect_threats(&mut self, candidate: StepId) -> Result<usize, PlanError> {
        self.step(candidate)?;
        let before = self.flaws.threats().len();
        let links = self.causal_links.clone();
        for link in &links {
            self.check_candidate(link, candidate)?;
        }
        let found = self.flaws.threats().len() - before;
        tracing::debug!(plan = %self.id, step = %candidate, found, "detected threats");
        Ok(found)
    }

    /// The composite that produces `link`'s predicate, if its head is a
    /// dummy-goal.
    fn producer_of(&self, link: &CausalLink) -> Option<StepId> {
        let head = self.step(link.head).ok()?;
        if head.bracket_side() != Some(BracketSide::Goal) {
            return None;
        }
        self.decomp_links.parent(link.head)
    }

    /// First step of the span `link` must be protected over.
    fn span_start(&self, link: &CausalLink) -> StepId {
        match self.step(link.head) {
            Ok(head) if head.bracket_side() == Some(BracketSide::Goal) => {
                head.init_cndt.unwrap_or(link.head)
            }
            _ => link.head,
        }
    }

    /// Whether `candidate` can falsify `link` and is not ordered outside its
    /// span. Composite candidates are ordered through their brackets.
    pub(crate) fn threatens_span(
        &self,
        link: &CausalLink,
        candidate: StepId,
    ) -> Result<bool, PlanError> {
        let step = self.step(candidate)?;
        if !self.ctx.oracle().is_threat(&link.predicate, step) {
            return Ok(false);
        }

        let (first, last) = if step.is_composite() {
            self.brackets(candidate)?
        } else {
            (candidate, candidate)
        };
        let start = self.span_start(link);
        let safe = self.is_path(last, start) || self.is_path(link.tail, first);
        tracing::trace!(step = %candidate, link = %link, safe, "checked threat");
        Ok(!safe)
    }

    /// Decomposition-aware check of one candidate against one link.
    fn check_candidate(&mut self, link: &CausalLink, candidate: StepId) -> Result<(), PlanError> {
        if candidate == link.head || candidate == link.tail {
            return Ok(());
        }
        if let Some(producer) = self.producer_of(link) {
            if self.decomp_links.on_decomp_path(candidate, producer) {
                return Ok(());
            }
        }

        let step = self.step(candidate)?;
        if !self.ctx.oracle().is_threat(&link.predicate, step) {
            return Ok(());
        }

        if step.is_composite() {
            if self.decomp_links.on_decomp_path(link.head, candidate) {
                return self.contain(link, candidate);
            }
            if self.decomp_links.on_decomp_path(link.tail, candidate) {
                return Ok(());
            }
        }

        if self.threatens_span(link, candidate)? {
            self.record_threat(link, candidate);
        }
        Ok(())
    }

    /// Keep `link` inside `container`, whose subtree holds the link's head,
    /// by ordering the tail before the container's dummy-goal.
    fn contain(&mut self, link: &CausalLink, container: StepId) -> Result<(), PlanError> {
        let (_, container_goal) = self.brackets(container)?;
        if self.is_path(link.tail, container_goal)
            || self.decomp_links.on_decomp_path(link.tail, container)
        {
            return Ok(());
        }

        if link.tail == self.goal_step.id {
            tracing::warn!(
                plan = %self.id,
                container = %container,
                link = %link,
                "threat cannot be contained before the plan goal"
            );
            self.flaws
                .add_threat(ThreatenedLinkFlaw::new(link.clone(), container));
            return Ok(());
        }

        // Widest scope around the tail that does not also enclose the
        // container.
        let mut scope = link.tail;
        while let Some(parent) = self.decomp_links.parent(scope) {
            if self.decomp_links.on_decomp_path(container, parent) {
                break;
            }
            scope = parent;
        }
        let anchor = self.exit_of(scope)?;

        self.order(anchor, container_goal)?;
        self.tucks.push(TuckedOrdering {
            link: link.clone(),
            container,
            before: anchor,
            after: container_goal,
        });
        tracing::debug!(
            plan = %self.id,
            before = %anchor,
            after = %container_goal,
            link = %link,
            "tucked link into composite"
        );
        Ok(())
    }

    fn record_threat(&mut self, link: &CausalLink, threat: StepId) {
        if self
            .flaws
            .add_threat(ThreatenedLinkFlaw::new(link.clone(), threat))
        {
            tracing::trace!(plan = %self.id, threat = %threat, link = %link, "queued threat");
        }
    }
}
