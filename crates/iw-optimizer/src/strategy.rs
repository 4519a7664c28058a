use iw_types::{ParameterVector, Score, SearchResult};

/// What inspecting one location produced: the weights the score belongs to
/// and the score itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub weights: ParameterVector,
    pub score: Score,
}

/// The hooks a [`GridSearchEngine`](crate::GridSearchEngine) calls while it
/// walks the grid.
pub trait LocationStrategy {
    /// Human-readable strategy name.
    fn name(&self) -> &str;

    /// Build whatever the scoring hook needs. Called once, before any location.
    fn init_ground_model(&mut self) -> SearchResult<()>;

    /// Score a location. `candidate` has already been written into the
    /// model's mutable parameters.
    fn inspect_location(&mut self, candidate: &ParameterVector) -> SearchResult<Inspection>;

    /// Release everything the strategy owns.
    fn close(&mut self) -> SearchResult<()>;
}
