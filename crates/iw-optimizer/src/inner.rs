use iw_types::{GroundingContext, Score, SearchResult, SharedParameters};

/// A complete weight-learning procedure that can be run from any starting point.
///
/// The learner never owns the grounding context. It borrows it for each call
/// between [`init_ground_model`](Self::init_ground_model) and
/// [`close`](Self::close), and must not keep references to it.
pub trait InnerOptimizer {
    fn name(&self) -> &str;

    /// The parameters `learn` refines. Must be the same handle the outer
    /// search writes its candidates into.
    fn parameters(&self) -> &SharedParameters;

    /// One-time setup against an already grounded model. A second call is an error.
    fn init_ground_model(&mut self, context: &mut GroundingContext) -> SearchResult<()>;

    /// Learn to convergence, starting from the current parameter values and
    /// leaving the learned values in the parameters.
    fn learn(&mut self, context: &mut GroundingContext) -> SearchResult<()>;

    /// Loss of the current state. Only meaningful after `learn`.
    fn compute_loss(&self, context: &GroundingContext) -> SearchResult<Score>;

    /// Release the learner's own resources. The grounding context is not one of them.
    fn close(&mut self) -> SearchResult<()>;
}
