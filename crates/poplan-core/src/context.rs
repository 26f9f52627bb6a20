use std::fmt;
use std::sync::Arc;

use poplan_model::Operator;

use crate::ids::{IdAllocator, StepId};
use crate::method::{Method, MethodBuilder};
use crate::oracle::{ThreatCache, ThreatOracle};
use crate::step::PlanStep;

/// Collaborators shared by every plan of one search: the id allocator and the
/// threat oracle. Cloning a plan shares its context.
#[derive(Clone)]
pub struct PlanContext {
    ids: Arc<IdAllocator>,
    oracle: Arc<dyn ThreatOracle>,
}

impl PlanContext {
    pub fn new(ids: Arc<IdAllocator>, oracle: Arc<dyn ThreatOracle>) -> Self {
        Self { ids, oracle }
    }

    /// Context with a fresh allocator and a [`ThreatCache`] over `operators`.
    pub fn with_operators<'a>(operators: impl IntoIterator<Item = &'a Operator>) -> Self {
        Self::new(
            Arc::new(IdAllocator::new()),
            Arc::new(ThreatCache::from_operators(operators)),
        )
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn oracle(&self) -> &dyn ThreatOracle {
        self.oracle.as_ref()
    }

    pub fn next_step_id(&self) -> StepId {
        self.ids.next_step()
    }

    /// A new primitive step under a fresh id.
    pub fn primitive(&self, action: impl Into<Arc<Operator>>) -> PlanStep {
        PlanStep::primitive(self.ids.next_step(), action)
    }

    /// A new, unexpanded composite step under a fresh id.
    pub fn composite(
        &self,
        action: impl Into<Arc<Operator>>,
        height: u32,
        method: Arc<Method>,
    ) -> PlanStep {
        PlanStep::composite(self.ids.next_step(), action, height, method)
    }

    /// Start a method for `task` whose template ids come from this context.
    pub fn method(&self, name: impl Into<String>, task: &Operator) -> MethodBuilder<'_> {
        Method::builder(name, task, &self.ids)
    }
}

impl fmt::Debug for PlanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanContext")
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}
