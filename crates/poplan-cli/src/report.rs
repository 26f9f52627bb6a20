//! Summaries of a replayed plan, as text or JSON.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use poplan_core::{BracketSide, CausalLink, StepKind};
use serde::Serialize;

use crate::replay::Replay;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub label: String,
    pub id: u64,
    pub operator: String,
    /// `primitive`, `init`, `goal`, `composite` or `expanded`.
    pub kind: &'static str,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub predicate: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TuckReport {
    pub link: LinkReport,
    pub container: String,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenConditionReport {
    pub precondition: String,
    pub step: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreatReport {
    pub link: LinkReport,
    pub threat: String,
}

/// Everything `poplan run` prints about a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    pub scenario: String,
    pub plan_id: String,
    pub solution: bool,
    pub decomps: usize,
    pub hdepth: usize,
    pub steps: Vec<StepReport>,
    /// Executable order, without the global initial and goal steps.
    pub order: Vec<String>,
    pub causal_links: Vec<LinkReport>,
    pub tucks: Vec<TuckReport>,
    pub open_conditions: Vec<OpenConditionReport>,
    pub threats: Vec<ThreatReport>,
}

impl PlanReport {
    pub fn from_replay(replay: &Replay) -> Self {
        let plan = &replay.plan;
        let link = |l: &CausalLink| LinkReport {
            predicate: l.predicate.to_string(),
            from: replay.label(l.head),
            to: replay.label(l.tail),
        };

        let steps = std::iter::once(plan.initial_step())
            .chain(plan.steps())
            .chain(std::iter::once(plan.goal_step()))
            .map(|step| StepReport {
                label: replay.label(step.id),
                id: step.id.0,
                operator: step.action.to_string(),
                kind: match &step.kind {
                    StepKind::Primitive => "primitive",
                    StepKind::Bracket(BracketSide::Init) => "init",
                    StepKind::Bracket(BracketSide::Goal) => "goal",
                    StepKind::Composite(c) if c.expansion.is_some() => "expanded",
                    StepKind::Composite(_) => "composite",
                },
                depth: step.depth,
            })
            .collect();

        Self {
            scenario: replay.name.clone(),
            plan_id: plan.id().to_string(),
            solution: plan.is_solution(),
            decomps: plan.decomps(),
            hdepth: plan.hdepth(),
            steps,
            order: plan
                .topo_sort()
                .into_iter()
                .map(|step| replay.label(step.id))
                .collect(),
            causal_links: plan.causal_links().iter().map(link).collect(),
            tucks: plan
                .tucks()
                .iter()
                .map(|t| TuckReport {
                    link: link(&t.link),
                    container: replay.label(t.container),
                    before: replay.label(t.before),
                    after: replay.label(t.after),
                })
                .collect(),
            open_conditions: plan
                .flaws()
                .open_conditions()
                .iter()
                .map(|oc| OpenConditionReport {
                    precondition: oc.precondition.to_string(),
                    step: replay.label(oc.step),
                })
                .collect(),
            threats: plan
                .flaws()
                .threats()
                .iter()
                .map(|t| ThreatReport {
                    link: link(&t.link),
                    threat: replay.label(t.threat),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize plan report")
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "Scenario: {}", self.scenario)?;
        writeln!(out, "  Plan ID:     {}", self.plan_id)?;
        writeln!(out, "  Solution:    {}", if self.solution { "yes" } else { "no" })?;
        writeln!(out, "  Steps:       {}", self.steps.len())?;
        writeln!(out, "  Decomps:     {}", self.decomps)?;
        writeln!(out, "  Depth:       {}", self.hdepth)?;
        writeln!(out)?;

        writeln!(out, "{:<28} {:>5} {:<10} {:>5}  OPERATOR", "STEP", "ID", "KIND", "DEPTH")?;
        writeln!(out, "{}", "-".repeat(76))?;
        for step in &self.steps {
            writeln!(
                out,
                "{:<28} {:>5} {:<10} {:>5}  {}",
                step.label, step.id, step.kind, step.depth, step.operator
            )?;
        }
        writeln!(out)?;

        writeln!(out, "Order:")?;
        writeln!(out, "  {}", self.order.join(" -> "))?;

        if !self.causal_links.is_empty() {
            writeln!(out)?;
            writeln!(out, "Causal links:")?;
            for l in &self.causal_links {
                writeln!(out, "  {} --{}--> {}", l.from, l.predicate, l.to)?;
            }
        }

        if !self.tucks.is_empty() {
            writeln!(out)?;
            writeln!(out, "Tucked orderings:")?;
            for t in &self.tucks {
                writeln!(
                    out,
                    "  {} < {} (keeps {} outside {} --{}--> {})",
                    t.before, t.after, t.container, t.link.from, t.link.predicate, t.link.to
                )?;
            }
        }

        if !self.open_conditions.is_empty() {
            writeln!(out)?;
            writeln!(out, "Open conditions:")?;
            for oc in &self.open_conditions {
                writeln!(out, "  {} needs {}", oc.step, oc.precondition)?;
            }
        }

        if !self.threats.is_empty() {
            writeln!(out)?;
            writeln!(out, "Threats:")?;
            for t in &self.threats {
                writeln!(
                    out,
                    "  {} threatens {} --{}--> {}",
                    t.threat, t.link.from, t.link.predicate, t.link.to
                )?;
            }
        }
        Ok(())
    }
}
