//! Replays a scenario's actions against a fresh plan.
//!
//! Every plan step gets a human-readable label so later actions and the
//! report can refer to it: inserted steps use their action label, the global
//! brackets are `initial` and `goal`, and steps produced by expanding a
//! composite labelled `L` are `L.<substep>`, `L.init` and `L.goal`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use poplan_core::{Method, OpenCondition, Plan, PlanContext, StepId};
use poplan_model::{Operator, State};

use crate::scenario::{
    ActionToml, CompositeToml, GOAL_LABEL, INIT_LABEL, PLAN_GOAL, PLAN_INITIAL, Scenario,
    parse_predicate, parse_predicates,
};

// -----------------------------------------------------------------------
// Domain
// -----------------------------------------------------------------------

/// A composite task ready to be instantiated.
#[derive(Debug)]
struct CompositeDef {
    operator: Operator,
    height: u32,
    method: Arc<Method>,
    /// Sub-step labels in method order, with the composite label of nested
    /// composite sub-steps.
    substeps: Vec<(String, Option<String>)>,
}

/// Ground operators and composites of a scenario, keyed by label.
#[derive(Debug)]
struct Domain {
    primitives: HashMap<String, Operator>,
    composites: HashMap<String, CompositeDef>,
}

impl Domain {
    fn build(scenario: &Scenario, ctx: &PlanContext) -> Result<Self> {
        let mut primitives = HashMap::new();
        for op in &scenario.operators {
            primitives.insert(op.label.clone(), op.to_operator()?);
        }

        let mut domain = Self {
            primitives,
            composites: HashMap::new(),
        };
        for composite in &scenario.composites {
            let def = domain
                .build_composite(composite, ctx)
                .with_context(|| format!("failed to build composite {:?}", composite.label))?;
            domain.composites.insert(composite.label.clone(), def);
        }
        Ok(domain)
    }

    fn build_composite(&self, composite: &CompositeToml, ctx: &PlanContext) -> Result<CompositeDef> {
        let operator = composite.to_operator()?;
        let mut builder = ctx.method(composite.label.clone(), &operator);

        let mut ids: HashMap<&str, StepId> = HashMap::new();
        ids.insert(INIT_LABEL, builder.init_id());
        ids.insert(GOAL_LABEL, builder.goal_id());

        let mut substeps = Vec::with_capacity(composite.substeps.len());
        for sub in &composite.substeps {
            let (id, nested) = if let Some(op) = self.primitives.get(&sub.operator) {
                (builder.primitive(op.clone()), None)
            } else if let Some(def) = self.composites.get(&sub.operator) {
                let step = ctx.composite(def.operator.clone(), def.height, Arc::clone(&def.method));
                (builder.step(step), Some(sub.operator.clone()))
            } else {
                bail!("unknown operator {:?} for sub-step {:?}", sub.operator, sub.label);
            };
            ids.insert(sub.label.as_str(), id);
            substeps.push((sub.label.clone(), nested));
        }

        let lookup = |label: &str| {
            ids.get(label)
                .copied()
                .with_context(|| format!("unknown sub-step {label:?}"))
        };
        for [before, after] in &composite.orderings {
            builder.ordering(lookup(before.as_str())?, lookup(after.as_str())?);
        }
        let context = format!("composite {:?}", composite.label);
        for link in &composite.links {
            let predicate = parse_predicate(&context, &link.predicate)?;
            builder.link(predicate, lookup(link.from.as_str())?, lookup(link.to.as_str())?);
        }

        Ok(CompositeDef {
            operator,
            height: composite.height,
            method: builder.build()?,
            substeps,
        })
    }
}

// -----------------------------------------------------------------------
// Replay
// -----------------------------------------------------------------------

/// A plan refined by a scenario's actions, with its step labels.
#[derive(Debug)]
pub struct Replay {
    pub name: String,
    pub plan: Plan,
    labels: HashMap<String, StepId>,
    names: HashMap<StepId, String>,
}

impl Replay {
    /// Label of a step, or its id when it has none.
    pub fn label(&self, id: StepId) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub fn step_id(&self, label: &str) -> Option<StepId> {
        self.labels.get(label).copied()
    }

    fn lookup(&self, label: &str) -> Result<StepId> {
        self.step_id(label)
            .with_context(|| format!("no step labelled {label:?}"))
    }

    fn assign(&mut self, label: String, id: StepId) -> Result<()> {
        if self.labels.contains_key(&label) {
            bail!("step label {label:?} is already in use");
        }
        self.names.insert(id, label.clone());
        self.labels.insert(label, id);
        Ok(())
    }

    /// Label the brackets and sub-steps produced by expanding `id`.
    fn name_expansion(&mut self, domain: &Domain, label: &str, def: &CompositeDef, id: StepId) -> Result<()> {
        let expansion = self.plan.expansion(id)?.clone();
        self.assign(format!("{label}.{INIT_LABEL}"), expansion.initial)?;
        self.assign(format!("{label}.{GOAL_LABEL}"), expansion.goal)?;

        for ((sub_label, nested), &sub_id) in def.substeps.iter().zip(&expansion.sub_steps) {
            let full = format!("{label}.{sub_label}");
            self.assign(full.clone(), sub_id)?;
            if let Some(nested) = nested {
                let nested_def = domain
                    .composites
                    .get(nested)
                    .with_context(|| format!("unknown composite {nested:?}"))?;
                self.name_expansion(domain, &full, nested_def, sub_id)?;
            }
        }
        Ok(())
    }
}

/// Build the scenario's plan and apply every action in order.
///
/// Stops at the first failing action; its error names the action.
pub fn run(scenario: &Scenario) -> Result<Replay> {
    let operators: Vec<Operator> = scenario
        .operators
        .iter()
        .map(|o| o.to_operator())
        .chain(scenario.composites.iter().map(|c| c.to_operator()))
        .collect::<Result<_, _>>()?;
    let ctx = PlanContext::with_operators(&operators);
    let domain = Domain::build(scenario, &ctx)?;

    let initial = State::new(parse_predicates("problem initial state", &scenario.problem.initial)?);
    let goal = State::new(parse_predicates("problem goal", &scenario.problem.goal)?);
    let plan = Plan::new(initial, goal, ctx.clone());

    let mut replay = Replay {
        name: scenario.problem.name.clone(),
        labels: HashMap::new(),
        names: HashMap::new(),
        plan,
    };
    let (initial_id, goal_id) = (replay.plan.initial_step().id, replay.plan.goal_step().id);
    replay.assign(PLAN_INITIAL.to_string(), initial_id)?;
    replay.assign(PLAN_GOAL.to_string(), goal_id)?;

    tracing::info!(scenario = %replay.name, actions = scenario.actions.len(), "replaying scenario");

    for (i, action) in scenario.actions.iter().enumerate() {
        apply(&mut replay, &domain, &ctx, action)
            .with_context(|| format!("action {} ({}) failed", i + 1, action.kind()))?;
    }

    tracing::info!(
        scenario = %replay.name,
        steps = replay.plan.steps().len(),
        flaws = replay.plan.flaws().len(),
        "replay finished"
    );
    Ok(replay)
}

fn apply(replay: &mut Replay, domain: &Domain, ctx: &PlanContext, action: &ActionToml) -> Result<()> {
    match action {
        ActionToml::Insert { operator, label } => {
            let label = label.clone().unwrap_or_else(|| operator.clone());
            if replay.labels.contains_key(&label) {
                bail!("step label {label:?} is already in use");
            }
            if let Some(op) = domain.primitives.get(operator) {
                let id = replay.plan.insert(ctx.primitive(op.clone()))?;
                replay.assign(label, id)?;
            } else if let Some(def) = domain.composites.get(operator) {
                let step = ctx.composite(def.operator.clone(), def.height, Arc::clone(&def.method));
                let id = replay.plan.insert(step)?;
                replay.assign(label.clone(), id)?;
                replay.name_expansion(domain, &label, def, id)?;
            } else {
                bail!("unknown operator {operator:?}");
            }
        }
        ActionToml::Repair {
            step,
            precondition,
            with,
        } => {
            let need = replay.lookup(step)?;
            let repair = replay.lookup(with)?;
            let predicate = parse_predicate("repair", precondition)?;
            let oc = replay
                .plan
                .flaws()
                .open_conditions()
                .iter()
                .find(|oc| oc.step == need && oc.precondition == predicate)
                .cloned()
                .unwrap_or_else(|| OpenCondition::new(predicate, need));
            replay.plan.repair(&oc, repair)?;
        }
        ActionToml::DetectThreats { step } => {
            let id = replay.lookup(step)?;
            let found = replay.plan.detect_threats(id)?;
            tracing::debug!(step = %step, found, "threat detection");
        }
        ActionToml::SeedGoals => replay.plan.open_goal_conditions(),
    }
    Ok(())
}
