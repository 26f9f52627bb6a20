//! Shared fixtures for poplan integration tests.
//!
//! Provides a small travel domain: a person `p` moving from `A` to `B` on
//! foot (`move` / `unmove`), by car, or by plane, plus a two-level `journey`
//! task whose method nests the car trip.
//!
//! Every fixture draws its step ids from the [`PlanContext`] it is given, so
//! a test that builds its own context with [`IdAllocator::starting_at`] gets
//! deterministic ids.

use std::sync::Arc;

use poplan_core::{IdAllocator, Method, Plan, PlanContext, PlanStep, ThreatCache};
use poplan_model::{Operator, Predicate, State};

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

pub fn at(who: &str, place: &str) -> Predicate {
    Predicate::new("at", [who, place])
}

pub fn not_at(who: &str, place: &str) -> Predicate {
    Predicate::negative("at", [who, place])
}

pub fn inside(who: &str, vehicle: &str) -> Predicate {
    Predicate::new("in", [who, vehicle])
}

pub fn not_inside(who: &str, vehicle: &str) -> Predicate {
    Predicate::negative("in", [who, vehicle])
}

// ---------------------------------------------------------------------------
// Primitive operators
// ---------------------------------------------------------------------------

pub fn move_op() -> Operator {
    Operator::new("move", ["p", "A", "B"])
        .with_preconditions([at("p", "A")])
        .with_effects([at("p", "B")])
}

pub fn unmove_op() -> Operator {
    Operator::new("unmove", ["p", "B", "A"])
        .with_preconditions([at("p", "B")])
        .with_effects([at("p", "A"), not_at("p", "B")])
}

pub fn get_in_car() -> Operator {
    Operator::new("get-in-car", ["p", "car", "A"])
        .with_preconditions([at("p", "A"), at("car", "A")])
        .with_effects([inside("p", "car"), not_at("p", "A")])
}

pub fn drive() -> Operator {
    Operator::new("drive", ["car", "A", "B"])
        .with_preconditions([inside("p", "car"), at("car", "A")])
        .with_effects([at("car", "B"), not_at("car", "A")])
}

pub fn get_out_of_car() -> Operator {
    Operator::new("get-out-of-car", ["p", "car", "B"])
        .with_preconditions([inside("p", "car"), at("car", "B")])
        .with_effects([at("p", "B"), not_inside("p", "car")])
}

pub fn board_plane() -> Operator {
    Operator::new("board", ["p", "plane", "A"])
        .with_preconditions([at("p", "A"), at("plane", "A")])
        .with_effects([inside("p", "plane"), not_at("p", "A")])
}

pub fn fly() -> Operator {
    Operator::new("fly", ["plane", "A", "B"])
        .with_preconditions([at("plane", "A")])
        .with_effects([at("plane", "B"), not_at("plane", "A")])
}

pub fn deplane() -> Operator {
    Operator::new("deplane", ["p", "plane", "B"])
        .with_preconditions([inside("p", "plane"), at("plane", "B")])
        .with_effects([at("p", "B"), not_inside("p", "plane")])
}

pub fn celebrate() -> Operator {
    Operator::new("celebrate", ["p", "B"])
        .with_preconditions([at("p", "B")])
        .with_effects([Predicate::new("happy", ["p"])])
}

// ---------------------------------------------------------------------------
// Abstract tasks
// ---------------------------------------------------------------------------

/// `travel(p, A, B)`: the interface every travel method implements.
pub fn travel_task() -> Operator {
    Operator::new("travel", ["p", "A", "B"])
        .with_preconditions([at("p", "A")])
        .with_effects([at("p", "B"), not_at("p", "A")])
}

/// `journey(p, A, B)`: travel, then celebrate.
pub fn journey_task() -> Operator {
    Operator::new("journey", ["p", "A", "B"])
        .with_preconditions([at("p", "A")])
        .with_effects([Predicate::new("happy", ["p"])])
}

/// Every operator of the domain, primitive and abstract.
pub fn all_operators() -> Vec<Operator> {
    vec![
        move_op(),
        unmove_op(),
        get_in_car(),
        drive(),
        get_out_of_car(),
        board_plane(),
        fly(),
        deplane(),
        celebrate(),
        travel_task(),
        journey_task(),
    ]
}

/// Context over the whole travel domain with a fresh allocator.
pub fn travel_context() -> PlanContext {
    context_starting_at(0)
}

/// Context over the whole travel domain whose step ids start at `first`.
pub fn context_starting_at(first: u64) -> PlanContext {
    let operators = all_operators();
    PlanContext::new(
        Arc::new(IdAllocator::starting_at(first)),
        Arc::new(ThreatCache::from_operators(&operators)),
    )
}

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

/// `get-in-car -> drive -> get-out-of-car`, linked by `in(p, car)` and
/// `at(car, B)`.
pub fn travel_by_car(ctx: &PlanContext) -> Arc<Method> {
    let mut m = ctx.method("travel-by-car", &travel_task());
    let get_in = m.primitive(get_in_car());
    let go = m.primitive(drive());
    let get_out = m.primitive(get_out_of_car());
    m.ordering(get_in, go)
        .ordering(go, get_out)
        .link(inside("p", "car"), get_in, go)
        .link(at("car", "B"), go, get_out);
    m.build().expect("travel-by-car method is well formed")
}

/// `board -> fly -> deplane`, linked by `in(p, plane)` and `at(plane, B)`,
/// with the arrival linked to the dummy-goal.
pub fn travel_by_plane(ctx: &PlanContext) -> Arc<Method> {
    let mut m = ctx.method("travel-by-plane", &travel_task());
    let goal = m.goal_id();
    let on = m.primitive(board_plane());
    let up = m.primitive(fly());
    let off = m.primitive(deplane());
    m.ordering(on, up)
        .ordering(up, off)
        .link(inside("p", "plane"), on, off)
        .link(at("plane", "B"), up, off)
        .link(at("p", "B"), off, goal);
    m.build().expect("travel-by-plane method is well formed")
}

/// A single `move` step bracketed by the travel interface.
pub fn travel_on_foot(ctx: &PlanContext) -> Arc<Method> {
    let mut m = ctx.method("travel-on-foot", &travel_task());
    let goal = m.goal_id();
    let step = m.primitive(move_op());
    m.link(at("p", "B"), step, goal);
    m.build().expect("travel-on-foot method is well formed")
}

/// A nested car trip followed by `celebrate`.
pub fn journey_by_car(ctx: &PlanContext) -> Arc<Method> {
    let trip = ctx.composite(travel_task(), 1, travel_by_car(ctx));
    let mut m = ctx.method("journey-by-car", &journey_task());
    let goal = m.goal_id();
    let trip = m.step(trip);
    let party = m.primitive(celebrate());
    m.ordering(trip, party)
        .link(at("p", "B"), trip, party)
        .link(Predicate::new("happy", ["p"]), party, goal);
    m.build().expect("journey-by-car method is well formed")
}

// ---------------------------------------------------------------------------
// Steps and plans
// ---------------------------------------------------------------------------

/// Unexpanded `travel` step refined by `method`.
pub fn travel_step(ctx: &PlanContext, method: Arc<Method>) -> PlanStep {
    ctx.composite(travel_task(), 1, method)
}

/// Unexpanded `journey` step refined by [`journey_by_car`].
pub fn journey_step(ctx: &PlanContext) -> PlanStep {
    ctx.composite(journey_task(), 2, journey_by_car(ctx))
}

/// `initial = {at(p, A)}`, `goal = {at(p, B)}`, goal conditions not yet
/// queued.
pub fn linear_problem(ctx: &PlanContext) -> Plan {
    Plan::new(
        State::new([at("p", "A")]),
        State::new([at("p", "B")]),
        ctx.clone(),
    )
}

/// Like [`linear_problem`] with the car and plane also at `A`.
pub fn vehicle_problem(ctx: &PlanContext) -> Plan {
    Plan::new(
        State::new([at("p", "A"), at("car", "A"), at("plane", "A")]),
        State::new([at("p", "B")]),
        ctx.clone(),
    )
}
