//! Grid search over initial weights, with weight learning run at every location.

use iw_types::{
    precondition_error, GroundingContext, Grounder, ParameterVector, ReleaseFailure, SearchResult,
    SharedParameters, TeardownError,
};
use tracing::{debug, info, warn};

use crate::inner::InnerOptimizer;
use crate::strategy::{Inspection, LocationStrategy};

/// Scores each grid location by running a full inner learner from it.
///
/// Grounding happens once: the coordinator builds the context, owns it, and
/// lends it to the inner learner for every call. A location's score is the
/// learner's loss after convergence, and the weights recorded for it are the
/// learned ones rather than the raw grid point.
pub struct InitialWeightCoordinator<G, O> {
    grounder: G,
    inner: O,
    parameters: SharedParameters,
    context: Option<GroundingContext>,
}

impl<G: Grounder, O: InnerOptimizer> InitialWeightCoordinator<G, O> {
    /// `inner` must not have had its ground model initialized yet, and must
    /// refine the same parameters the search writes into.
    pub fn new(parameters: SharedParameters, grounder: G, inner: O) -> SearchResult<Self> {
        if !inner.parameters().same_as(&parameters) {
            return Err(precondition_error!(
                "inner optimizer {} does not share the searched parameters",
                inner.name()
            ));
        }
        Ok(Self {
            grounder,
            inner,
            parameters,
            context: None,
        })
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    pub fn grounding_context(&self) -> Option<&GroundingContext> {
        self.context.as_ref()
    }
}

impl<G: Grounder, O: InnerOptimizer> LocationStrategy for InitialWeightCoordinator<G, O> {
    fn name(&self) -> &str {
        "initial-weight"
    }

    fn init_ground_model(&mut self) -> SearchResult<()> {
        if self.context.is_some() {
            return Err(precondition_error!("ground model already initialized"));
        }

        let mut context = self.grounder.ground(&self.parameters)?;
        info!("Grounded model: {:?}", context);

        // Keep the context even if the learner rejects it, so close() releases it.
        let init = self.inner.init_ground_model(&mut context);
        self.context = Some(context);
        init
    }

    fn inspect_location(&mut self, candidate: &ParameterVector) -> SearchResult<Inspection> {
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| precondition_error!("location inspected before ground model init"))?;

        self.inner.learn(context)?;

        let weights = self.parameters.snapshot();
        weights.ensure_len(candidate.len())?;
        let score = self.inner.compute_loss(context)?;

        debug!("{} learned {} from {}", self.inner.name(), weights, candidate);
        Ok(Inspection { weights, score })
    }

    /// Releases the grounding context, then the inner learner. Both are
    /// attempted regardless of the other's outcome.
    fn close(&mut self) -> SearchResult<()> {
        let mut failures = Vec::new();

        if let Some(context) = self.context.take() {
            if let Err(e) = context.release() {
                warn!("Failed to release grounding context: {}", e);
                failures.push(ReleaseFailure::new("grounding context", e));
            }
        }

        if let Err(e) = self.inner.close() {
            warn!("Failed to close inner optimizer {}: {}", self.inner.name(), e);
            failures.push(ReleaseFailure::new(
                format!("inner optimizer {}", self.inner.name()),
                e,
            ));
        }

        TeardownError::check(failures)?;
        Ok(())
    }
}
