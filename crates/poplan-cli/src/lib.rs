//! Command-line front end for the poplan refinement engine.
//!
//! A scenario file declares a ground domain (primitive operators and
//! composite tasks with one method each), an initial and goal state, and a
//! list of refinement actions. [`replay::run`] applies those actions to a
//! fresh [`poplan_core::Plan`] and [`report::PlanReport`] summarises the
//! result.

pub mod config;
pub mod replay;
pub mod report;
pub mod scenario;

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialise tests that touch process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}
