//! Partial-order HTN plan refinement.
//!
//! [`Plan`] is the search node: a set of steps, a partial order over them,
//! causal links, a decomposition forest, and a queue of flaws. A search
//! driver branches with [`Plan::clone`] and refines each branch with
//! [`Plan::insert`], [`Plan::repair`] and [`Plan::detect_threats`] until the
//! flaw queue is empty.

pub mod context;
pub mod error;
pub mod flaw;
pub mod graph;
pub mod ids;
pub mod links;
pub mod method;
pub mod oracle;
pub mod plan;
pub mod step;

pub use context::PlanContext;
pub use error::PlanError;
pub use flaw::{Flaw, FlawQueue, OpenCondition, ThreatenedLinkFlaw};
pub use graph::OrderingGraph;
pub use ids::{IdAllocator, StepId};
pub use links::{CausalLink, DecompositionLinks};
pub use method::{Method, MethodBuilder};
pub use oracle::{ThreatCache, ThreatOracle};
pub use plan::{Plan, TuckedOrdering};
pub use step::{BracketSide, CompositeStep, Expansion, PlanStep, StepKind};
