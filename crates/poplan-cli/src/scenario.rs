//! Scenario files: a problem, a domain, and a script of refinements.
//!
//! A scenario is TOML:
//!
//! ```toml
//! [problem]
//! name = "walk"
//! initial = ["(at p A)"]
//! goal = ["(at p B)"]
//!
//! [[operators]]
//! label = "move"
//! signature = "(move p A B)"
//! preconditions = ["(at p A)"]
//! effects = ["(at p B)"]
//!
//! [[actions]]
//! kind = "insert"
//! operator = "move"
//! ```
//!
//! [`parse_scenario`] checks that labels are unique, that every reference
//! resolves, that predicates parse, that method orderings are acyclic, and
//! that ground operators respect their inequality constraints.

use std::collections::HashSet;
use std::path::Path;

use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use poplan_model::{Operator, Predicate, PredicateParseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label of a method's dummy-init in orderings and links.
pub const INIT_LABEL: &str = "init";
/// Label of a method's dummy-goal in orderings and links.
pub const GOAL_LABEL: &str = "goal";
/// Plan labels of the global initial and goal steps.
pub const PLAN_INITIAL: &str = "initial";
pub const PLAN_GOAL: &str = "goal";

/// Errors that can occur during scenario parsing and validation.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("invalid predicate {text:?} in {context}: {source}")]
    InvalidPredicate {
        context: String,
        text: String,
        #[source]
        source: PredicateParseError,
    },

    #[error("duplicate label: {0:?}")]
    DuplicateLabel(String),

    #[error("label {0:?} is reserved")]
    ReservedLabel(String),

    #[error("{context} references unknown operator {label:?}")]
    UnknownOperator { context: String, label: String },

    #[error("composite {composite:?} references unknown sub-step {label:?}")]
    UnknownSubstep { composite: String, label: String },

    #[error("ordering cycle among sub-steps of composite {0:?}")]
    CycleDetected(String),

    #[error("operator {label:?} violates its inequality constraint {left} != {right}")]
    NonequalityViolated {
        label: String,
        left: String,
        right: String,
    },

    #[error("composite {label:?} must have height of at least 1")]
    InvalidHeight { label: String },
}

// -----------------------------------------------------------------------
// File format
// -----------------------------------------------------------------------

/// Top-level structure of a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub problem: ProblemToml,
    #[serde(default)]
    pub operators: Vec<OperatorToml>,
    #[serde(default)]
    pub composites: Vec<CompositeToml>,
    #[serde(default)]
    pub actions: Vec<ActionToml>,
}

/// `[problem]`: initial state and goal, as predicate strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProblemToml {
    pub name: String,
    #[serde(default)]
    pub initial: Vec<String>,
    #[serde(default)]
    pub goal: Vec<String>,
}

/// A ground primitive operator in `[[operators]]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperatorToml {
    pub label: String,
    /// Operator head, e.g. `(move p A B)`.
    pub signature: String,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub effects: Vec<String>,
    /// Pairs of terms that must differ.
    #[serde(default)]
    pub nonequal: Vec<[String; 2]>,
}

/// An abstract task with one method, in `[[composites]]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositeToml {
    pub label: String,
    pub signature: String,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default)]
    pub substeps: Vec<SubstepToml>,
    /// `[before, after]` pairs of sub-step labels, `init` or `goal`.
    #[serde(default)]
    pub orderings: Vec<[String; 2]>,
    #[serde(default)]
    pub links: Vec<LinkToml>,
}

fn default_height() -> u32 {
    1
}

/// A method sub-step: an operator or an earlier composite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubstepToml {
    pub label: String,
    pub operator: String,
}

/// A causal link inside a method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkToml {
    pub predicate: String,
    pub from: String,
    pub to: String,
}

/// One scripted refinement, in `[[actions]]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionToml {
    /// Insert a new step; composites are expanded immediately.
    Insert {
        operator: String,
        /// Plan label of the new step. Defaults to the operator label.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Support `precondition` of step `step` with step `with`.
    Repair {
        step: String,
        precondition: String,
        with: String,
    },
    /// Check one step against every causal link.
    DetectThreats { step: String },
    /// Queue the goal conditions as open conditions.
    SeedGoals,
}

impl ActionToml {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Repair { .. } => "repair",
            Self::DetectThreats { .. } => "detect_threats",
            Self::SeedGoals => "seed_goals",
        }
    }
}

// -----------------------------------------------------------------------
// Conversion
// -----------------------------------------------------------------------

/// Parse one predicate, naming `context` on failure.
pub fn parse_predicate(context: &str, text: &str) -> Result<Predicate, ScenarioError> {
    text.parse()
        .map_err(|source| ScenarioError::InvalidPredicate {
            context: context.to_string(),
            text: text.to_string(),
            source,
        })
}

pub fn parse_predicates(context: &str, texts: &[String]) -> Result<Vec<Predicate>, ScenarioError> {
    texts.iter().map(|t| parse_predicate(context, t)).collect()
}

fn build_operator(
    label: &str,
    signature: &str,
    preconditions: &[String],
    effects: &[String],
) -> Result<Operator, ScenarioError> {
    let context = format!("operator {label:?}");
    let head = parse_predicate(&context, signature)?;
    Ok(Operator::from_signature(&head)
        .with_preconditions(parse_predicates(&context, preconditions)?)
        .with_effects(parse_predicates(&context, effects)?))
}

impl OperatorToml {
    pub fn to_operator(&self) -> Result<Operator, ScenarioError> {
        let mut op = build_operator(&self.label, &self.signature, &self.preconditions, &self.effects)?;
        for [left, right] in &self.nonequal {
            op = op.with_nonequality(left.as_str(), right.as_str());
        }
        Ok(op)
    }
}

impl CompositeToml {
    pub fn to_operator(&self) -> Result<Operator, ScenarioError> {
        build_operator(&self.label, &self.signature, &self.preconditions, &self.effects)
    }
}

// -----------------------------------------------------------------------
// Parsing and validation
// -----------------------------------------------------------------------

/// Parse and validate a scenario string.
pub fn parse_scenario(content: &str) -> Result<Scenario, ScenarioError> {
    let scenario: Scenario = toml::from_str(content)?;
    validate(&scenario)?;
    Ok(scenario)
}

/// Read, parse and validate a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    let content = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_scenario(&content)
}

fn validate(scenario: &Scenario) -> Result<(), ScenarioError> {
    parse_predicates("problem initial state", &scenario.problem.initial)?;
    parse_predicates("problem goal", &scenario.problem.goal)?;

    let mut labels = HashSet::new();
    let mut composites_seen = HashSet::new();
    let labels_in_order = scenario
        .operators
        .iter()
        .map(|o| &o.label)
        .chain(scenario.composites.iter().map(|c| &c.label));
    for label in labels_in_order {
        if label == PLAN_INITIAL || label == PLAN_GOAL {
            return Err(ScenarioError::ReservedLabel(label.clone()));
        }
        if !labels.insert(label.as_str()) {
            return Err(ScenarioError::DuplicateLabel(label.clone()));
        }
    }

    for op in &scenario.operators {
        let operator = op.to_operator()?;
        if !operator.satisfies_nonequalities() {
            let (left, right) = operator
                .nonequalities
                .iter()
                .find(|(a, b)| !a.is_variable() && !b.is_variable() && a.name == b.name)
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .unwrap_or_default();
            return Err(ScenarioError::NonequalityViolated {
                label: op.label.clone(),
                left,
                right,
            });
        }
    }

    let primitives: HashSet<&str> = scenario.operators.iter().map(|o| o.label.as_str()).collect();
    for composite in &scenario.composites {
        validate_composite(composite, &primitives, &composites_seen)?;
        composites_seen.insert(composite.label.as_str());
    }

    for (i, action) in scenario.actions.iter().enumerate() {
        if let ActionToml::Insert { operator, .. } = action {
            if !labels.contains(operator.as_str()) {
                return Err(ScenarioError::UnknownOperator {
                    context: format!("action {}", i + 1),
                    label: operator.clone(),
                });
            }
        }
        if let ActionToml::Repair { precondition, .. } = action {
            parse_predicate(&format!("action {}", i + 1), precondition)?;
        }
    }

    Ok(())
}

/// Check one composite. Sub-steps may only use composites defined earlier,
/// which rules out recursive methods.
fn validate_composite(
    composite: &CompositeToml,
    primitives: &HashSet<&str>,
    earlier: &HashSet<&str>,
) -> Result<(), ScenarioError> {
    composite.to_operator()?;
    if composite.height == 0 {
        return Err(ScenarioError::InvalidHeight {
            label: composite.label.clone(),
        });
    }

    let context = format!("composite {:?}", composite.label);
    let mut sub_labels = HashSet::new();
    for sub in &composite.substeps {
        if sub.label == INIT_LABEL || sub.label == GOAL_LABEL {
            return Err(ScenarioError::ReservedLabel(sub.label.clone()));
        }
        if !sub_labels.insert(sub.label.as_str()) {
            return Err(ScenarioError::DuplicateLabel(format!(
                "{}.{}",
                composite.label, sub.label
            )));
        }
        let op = sub.operator.as_str();
        if !primitives.contains(op) && !earlier.contains(op) {
            return Err(ScenarioError::UnknownOperator {
                context: context.clone(),
                label: sub.operator.clone(),
            });
        }
    }

    let known = |label: &str| label == INIT_LABEL || label == GOAL_LABEL || sub_labels.contains(label);
    let endpoints = composite
        .orderings
        .iter()
        .flat_map(|[a, b]| [a, b])
        .chain(composite.links.iter().flat_map(|l| [&l.from, &l.to]));
    for label in endpoints {
        if !known(label.as_str()) {
            return Err(ScenarioError::UnknownSubstep {
                composite: composite.label.clone(),
                label: label.clone(),
            });
        }
    }

    for link in &composite.links {
        parse_predicate(&context, &link.predicate)?;
    }

    check_for_cycles(composite)
}

/// Detect ordering cycles among sub-steps.
fn check_for_cycles(composite: &CompositeToml) -> Result<(), ScenarioError> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for step in &composite.substeps {
        graph.add_node(step.label.as_str());
    }

    for [before, after] in &composite.orderings {
        if before == after {
            return Err(ScenarioError::CycleDetected(composite.label.clone()));
        }
        // Bracket orderings are implied and never close a cycle.
        let (before, after) = (before.as_str(), after.as_str());
        if graph.contains_node(before) && graph.contains_node(after) {
            graph.add_edge(before, after, ());
        }
    }

    if is_cyclic_directed(&graph) {
        return Err(ScenarioError::CycleDetected(composite.label.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
[problem]
name = "walk"
initial = ["(at p A)"]
goal = ["(at p B)"]

[[operators]]
label = "move"
signature = "(move p A B)"
preconditions = ["(at p A)"]
effects = ["(at p B)"]
"#;

    fn with(extra: &str) -> String {
        format!("{BASE}\n{extra}")
    }

    #[test]
    fn parses_minimal_scenario() {
        let scenario = parse_scenario(&with(
            r#"
[[actions]]
kind = "seed_goals"

[[actions]]
kind = "insert"
operator = "move"

[[actions]]
kind = "repair"
step = "move"
precondition = "(at p A)"
with = "initial"
"#,
        ))
        .unwrap();

        assert_eq!(scenario.problem.name, "walk");
        assert_eq!(scenario.actions.len(), 3);
        assert_eq!(scenario.actions[0], ActionToml::SeedGoals);
        assert_eq!(scenario.actions[2].kind(), "repair");
        let op = scenario.operators[0].to_operator().unwrap();
        assert_eq!(op.name, "move");
        assert_eq!(op.terms.len(), 3);
    }

    #[test]
    fn rejects_duplicate_labels() {
        let err = parse_scenario(&with(
            r#"
[[operators]]
label = "move"
signature = "(move p B A)"
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ScenarioError::DuplicateLabel(ref l) if l == "move"));
    }

    #[test]
    fn rejects_unknown_insert_operator() {
        let err = parse_scenario(&with(
            r#"
[[actions]]
kind = "insert"
operator = "fly"
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownOperator { ref label, .. } if label == "fly"));
    }

    #[test]
    fn rejects_bad_predicate() {
        let err = parse_scenario(&with(
            r#"
[[operators]]
label = "broken"
signature = "(broken"
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidPredicate { .. }));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn rejects_violated_nonequality() {
        let err = parse_scenario(&with(
            r#"
[[operators]]
label = "stay"
signature = "(stay p A A)"
nonequal = [["A", "A"]]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ScenarioError::NonequalityViolated { ref label, .. } if label == "stay"));
    }

    #[test]
    fn rejects_method_ordering_cycle() {
        let err = parse_scenario(&with(
            r#"
[[composites]]
label = "loop"
signature = "(loop p)"
substeps = [
  { label = "a", operator = "move" },
  { label = "b", operator = "move" },
]
orderings = [["a", "b"], ["b", "a"]]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ScenarioError::CycleDetected(ref l) if l == "loop"));
    }

    #[test]
    fn rejects_transitive_method_ordering_cycle() {
        let err = parse_scenario(&with(
            r#"
[[composites]]
label = "ring"
signature = "(ring p)"
substeps = [
  { label = "a", operator = "move" },
  { label = "b", operator = "move" },
  { label = "c", operator = "move" },
]
orderings = [["a", "b"], ["b", "c"], ["c", "a"]]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ScenarioError::CycleDetected(ref l) if l == "ring"));
    }

    #[test]
    fn bracket_orderings_are_accepted() {
        let scenario = parse_scenario(&with(
            r#"
[[composites]]
label = "hop"
signature = "(hop p)"
substeps = [
  { label = "a", operator = "move" },
  { label = "b", operator = "move" },
]
orderings = [["init", "a"], ["a", "b"], ["b", "goal"]]
"#,
        ))
        .unwrap();
        assert_eq!(scenario.composites.len(), 1);
    }

    #[test]
    fn rejects_unknown_link_endpoint() {
        let err = parse_scenario(&with(
            r#"
[[composites]]
label = "trip"
signature = "(trip p)"
substeps = [{ label = "walk", operator = "move" }]
links = [{ predicate = "(at p B)", from = "walk", to = "finish" }]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownSubstep { ref label, .. } if label == "finish"));
    }

    #[test]
    fn composites_may_only_nest_earlier_composites() {
        let err = parse_scenario(&with(
            r#"
[[composites]]
label = "outer"
signature = "(outer p)"
substeps = [{ label = "inner", operator = "inner" }]

[[composites]]
label = "inner"
signature = "(inner p)"
substeps = [{ label = "walk", operator = "move" }]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownOperator { ref label, .. } if label == "inner"));
    }

    #[test]
    fn reserved_labels_are_rejected() {
        let err = parse_scenario(&with(
            r#"
[[operators]]
label = "goal"
signature = "(goal)"
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ScenarioError::ReservedLabel(_)));
    }
}
