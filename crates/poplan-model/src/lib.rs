//! Action-schema vocabulary shared by every poplan crate.
//!
//! Terms, predicates, states, and operators are immutable value types. Two
//! values compare equal when their contents match, which is what the plan
//! layer relies on when it compares steps by their underlying operator.

pub mod operator;
pub mod predicate;
pub mod state;
pub mod term;

pub use operator::Operator;
pub use predicate::{Predicate, PredicateParseError};
pub use state::State;
pub use term::Term;
