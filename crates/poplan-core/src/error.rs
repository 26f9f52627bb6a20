use thiserror::Error;

use crate::ids::StepId;

/// Errors raised by plan refinement.
///
/// Any of these means the refinement that produced it is inconsistent and
/// the branch should be dropped. Recoverable defects are flaws, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("ordering {before} -> {after} would create a cycle")]
    OrderingConflict { before: StepId, after: StepId },

    #[error("step {0} is not part of this plan")]
    StepNotFound(StepId),

    #[error("step {0} is already part of this plan")]
    DuplicateStep(StepId),

    #[error("step {0} is not a composite step")]
    NotComposite(StepId),

    #[error("composite step {0} has not been expanded")]
    NotExpanded(StepId),

    #[error("composite step {0} is already expanded")]
    AlreadyExpanded(StepId),

    #[error("method {method:?} references unknown step {step}")]
    UnknownMethodStep { method: String, step: StepId },
}
