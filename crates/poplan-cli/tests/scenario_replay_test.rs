//! Integration tests for scenario replay and plan reports.
//!
//! Each test builds a scenario from TOML, replays its actions against a
//! fresh plan, and checks the resulting [`PlanReport`].

use std::io::Write;

use poplan_cli::replay;
use poplan_cli::report::PlanReport;
use poplan_cli::scenario::{ScenarioError, load_scenario, parse_scenario};

// -----------------------------------------------------------------------
// Scenario fixtures
// -----------------------------------------------------------------------

const WALK_DOMAIN: &str = r#"
[problem]
name = "walk"
initial = ["(at p A)"]
goal = ["(at p B)"]

[[operators]]
label = "move"
signature = "(move p A B)"
preconditions = ["(at p A)"]
effects = ["(at p B)"]

[[operators]]
label = "unmove"
signature = "(unmove p B A)"
preconditions = ["(at p B)"]
effects = ["(at p A)", "(not (at p B))"]
"#;

const CAR_DOMAIN: &str = r#"
[problem]
name = "drive"
initial = ["(at p A)", "(at car A)"]
goal = ["(at p B)"]

[[operators]]
label = "get-in-car"
signature = "(get-in-car p car A)"
preconditions = ["(at p A)", "(at car A)"]
effects = ["(in p car)", "(not (at p A))"]

[[operators]]
label = "drive"
signature = "(drive car A B)"
preconditions = ["(in p car)", "(at car A)"]
effects = ["(at car B)", "(not (at car A))"]

[[operators]]
label = "get-out-of-car"
signature = "(get-out-of-car p car B)"
preconditions = ["(in p car)", "(at car B)"]
effects = ["(at p B)", "(not (in p car))"]

[[operators]]
label = "celebrate"
signature = "(celebrate p B)"
preconditions = ["(at p B)"]
effects = ["(happy p)"]

[[composites]]
label = "travel"
signature = "(travel p A B)"
preconditions = ["(at p A)"]
effects = ["(at p B)", "(not (at p A))"]
substeps = [
  { label = "get-in", operator = "get-in-car" },
  { label = "drive", operator = "drive" },
  { label = "get-out", operator = "get-out-of-car" },
]
orderings = [["get-in", "drive"], ["drive", "get-out"]]
links = [
  { predicate = "(in p car)", from = "get-in", to = "drive" },
  { predicate = "(at car B)", from = "drive", to = "get-out" },
]

[[composites]]
label = "journey"
signature = "(journey p A B)"
height = 2
preconditions = ["(at p A)"]
effects = ["(happy p)"]
substeps = [
  { label = "trip", operator = "travel" },
  { label = "party", operator = "celebrate" },
]
orderings = [["trip", "party"]]
links = [
  { predicate = "(at p B)", from = "trip", to = "party" },
  { predicate = "(happy p)", from = "party", to = "goal" },
]
"#;

fn scenario(domain: &str, actions: &str) -> String {
    format!("{domain}\n{actions}")
}

fn replay_report(content: &str) -> PlanReport {
    let scenario = parse_scenario(content).expect("scenario should parse");
    let replay = replay::run(&scenario).expect("replay should succeed");
    PlanReport::from_replay(&replay)
}

fn position(report: &PlanReport, label: &str) -> usize {
    report
        .order
        .iter()
        .position(|l| l == label)
        .unwrap_or_else(|| panic!("{label} missing from order {:?}", report.order))
}

const WALK_SOLVED: &str = r#"
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

[[actions]]
kind = "repair"
step = "goal"
precondition = "(at p B)"
with = "move"
"#;

// -----------------------------------------------------------------------
// Replay
// -----------------------------------------------------------------------

#[test]
fn linear_walk_ends_as_solution() {
    let report = replay_report(&scenario(WALK_DOMAIN, WALK_SOLVED));

    assert_eq!(report.scenario, "walk");
    assert!(report.solution, "unexpected flaws: {report:?}");
    assert_eq!(report.order, vec!["move"]);
    assert_eq!(report.causal_links.len(), 2);
    assert!(report.causal_links.iter().any(|l| l.from == "move"
        && l.to == "goal"
        && l.predicate == "(at p B)"));
    assert!(report.open_conditions.is_empty());
    assert!(report.threats.is_empty());
}

#[test]
fn unrepaired_goal_stays_open() {
    let report = replay_report(&scenario(
        WALK_DOMAIN,
        r#"
[[actions]]
kind = "seed_goals"
"#,
    ));

    assert!(!report.solution);
    assert_eq!(report.open_conditions.len(), 1);
    assert_eq!(report.open_conditions[0].step, "goal");
    assert_eq!(report.open_conditions[0].precondition, "(at p B)");
}

#[test]
fn detect_threats_reports_unordered_clobberer() {
    let report = replay_report(&scenario(
        WALK_DOMAIN,
        r#"
[[actions]]
kind = "insert"
operator = "move"

[[actions]]
kind = "repair"
step = "goal"
precondition = "(at p B)"
with = "move"

[[actions]]
kind = "insert"
operator = "unmove"

[[actions]]
kind = "detect_threats"
step = "unmove"
"#,
    ));

    assert_eq!(report.threats.len(), 1);
    let threat = &report.threats[0];
    assert_eq!(threat.threat, "unmove");
    assert_eq!(threat.link.from, "move");
    assert_eq!(threat.link.to, "goal");
    assert!(!report.solution);
}

#[test]
fn composite_insert_labels_expansion() {
    let report = replay_report(&scenario(
        CAR_DOMAIN,
        r#"
[[actions]]
kind = "insert"
operator = "travel"
label = "trip"
"#,
    ));

    let labels: Vec<&str> = report.steps.iter().map(|s| s.label.as_str()).collect();
    for expected in ["trip", "trip.init", "trip.goal", "trip.get-in", "trip.drive", "trip.get-out"] {
        assert!(labels.contains(&expected), "{expected} missing from {labels:?}");
    }
    let trip = report.steps.iter().find(|s| s.label == "trip").unwrap();
    assert_eq!(trip.kind, "expanded");
    assert!(!report.order.iter().any(|l| l == "trip"), "composites are not ordered");

    assert!(position(&report, "trip.init") < position(&report, "trip.get-in"));
    assert!(position(&report, "trip.get-in") < position(&report, "trip.drive"));
    assert!(position(&report, "trip.drive") < position(&report, "trip.get-out"));
    assert!(position(&report, "trip.get-out") < position(&report, "trip.goal"));

    assert_eq!(report.causal_links.len(), 2);
    assert_eq!(report.decomps, 1);
    assert!(report.threats.is_empty());
}

#[test]
fn nested_composite_labels_use_dotted_paths() {
    let report = replay_report(&scenario(
        CAR_DOMAIN,
        r#"
[[actions]]
kind = "insert"
operator = "journey"
label = "j"
"#,
    ));

    assert_eq!(report.decomps, 2);
    let labels: Vec<&str> = report.steps.iter().map(|s| s.label.as_str()).collect();
    for expected in ["j.trip", "j.party", "j.trip.init", "j.trip.drive", "j.trip.goal"] {
        assert!(labels.contains(&expected), "{expected} missing from {labels:?}");
    }
    assert!(position(&report, "j.init") < position(&report, "j.trip.init"));
    assert!(position(&report, "j.trip.goal") < position(&report, "j.party"));
    assert!(position(&report, "j.party") < position(&report, "j.goal"));
}

#[test]
fn failing_action_names_its_position() {
    let scenario = parse_scenario(&scenario(
        WALK_DOMAIN,
        r#"
[[actions]]
kind = "insert"
operator = "move"

[[actions]]
kind = "repair"
step = "nowhere"
precondition = "(at p A)"
with = "initial"
"#,
    ))
    .unwrap();

    let err = replay::run(&scenario).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("action 2 (repair) failed"), "unexpected error: {msg}");
    assert!(msg.contains("nowhere"), "unexpected error: {msg}");
}

#[test]
fn duplicate_step_label_is_rejected() {
    let scenario = parse_scenario(&scenario(
        WALK_DOMAIN,
        r#"
[[actions]]
kind = "insert"
operator = "move"

[[actions]]
kind = "insert"
operator = "move"
"#,
    ))
    .unwrap();

    let msg = format!("{:#}", replay::run(&scenario).unwrap_err());
    assert!(msg.contains("action 2 (insert) failed"), "unexpected error: {msg}");
    assert!(msg.contains("already in use"), "unexpected error: {msg}");
}

// -----------------------------------------------------------------------
// Reports and files
// -----------------------------------------------------------------------

#[test]
fn json_report_carries_plan_summary() {
    let report = replay_report(&scenario(WALK_DOMAIN, WALK_SOLVED));
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    assert_eq!(json["scenario"], "walk");
    assert_eq!(json["solution"], true);
    assert_eq!(json["steps"].as_array().unwrap().len(), 3);
    assert_eq!(json["order"][0], "move");
}

#[test]
fn text_report_lists_steps_and_links() {
    let text = replay_report(&scenario(WALK_DOMAIN, WALK_SOLVED)).render_text();

    assert!(text.starts_with("Scenario: walk"));
    assert!(text.contains("Solution:    yes"));
    assert!(text.contains("Order:\n  move\n"));
    assert!(text.contains("move --(at p B)--> goal"));
    assert!(!text.contains("Threats:"));
}

#[test]
fn load_scenario_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(scenario(WALK_DOMAIN, WALK_SOLVED).as_bytes())
        .unwrap();

    let loaded = load_scenario(file.path()).unwrap();
    assert_eq!(loaded.problem.name, "walk");
    assert_eq!(loaded.actions.len(), 4);
}

#[test]
fn load_scenario_reports_missing_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = load_scenario(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ScenarioError::Io { .. }));
    assert!(err.to_string().contains("absent.toml"));
}
