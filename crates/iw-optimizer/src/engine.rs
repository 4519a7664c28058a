//! The outer loop: walk the grid, score each location, keep the best.

use chrono::{DateTime, Utc};
use iw_types::{
    internal_error, precondition_error, ReleaseFailure, SearchError, SearchResult,
    SharedParameters, TeardownError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::search::{GridConfig, GridEnumerator};
use crate::strategy::{Inspection, LocationStrategy};
use crate::trial::{LocationResult, RunId, SearchOutcome, SearchState};

/// Lifecycle of a single search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchPhase {
    Uninitialized,
    GroundModelReady,
    Scoring,
    Finalized,
    Closed,
}

/// Drives a [`LocationStrategy`] over a grid of candidate weights.
///
/// One engine performs one run. The model's parameters are rewritten in
/// place for every location and are left at the best refined weights once
/// the run finishes.
pub struct GridSearchEngine<S: LocationStrategy> {
    run_id: RunId,
    config: GridConfig,
    parameters: SharedParameters,
    strategy: S,
    state: SearchState,
    phase: SearchPhase,
}

impl<S: LocationStrategy> GridSearchEngine<S> {
    pub fn new(parameters: SharedParameters, strategy: S, config: GridConfig) -> SearchResult<Self> {
        config.validate()?;
        Ok(Self::assemble(parameters, strategy, config))
    }

    fn assemble(parameters: SharedParameters, strategy: S, config: GridConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config,
            parameters,
            strategy,
            state: SearchState::new(),
            phase: SearchPhase::Uninitialized,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn parameters(&self) -> &SharedParameters {
        &self.parameters
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Let the strategy build its ground model. Optional: [`run`](Self::run)
    /// does it when it has not happened yet.
    pub fn init_ground_model(&mut self) -> SearchResult<()> {
        if self.phase != SearchPhase::Uninitialized {
            return Err(precondition_error!(
                "search {} ground model already initialized (phase {:?})",
                self.run_id,
                self.phase
            ));
        }
        self.strategy.init_ground_model()?;
        self.phase = SearchPhase::GroundModelReady;
        Ok(())
    }

    /// Run the whole search. Any error aborts the run without a result;
    /// [`close`](Self::close) must still be called afterwards.
    pub fn run(&mut self) -> SearchResult<SearchOutcome> {
        if !matches!(
            self.phase,
            SearchPhase::Uninitialized | SearchPhase::GroundModelReady
        ) {
            return Err(precondition_error!(
                "search {} already ran (phase {:?})",
                self.run_id,
                self.phase
            ));
        }

        let started_at = Utc::now();
        let grid = GridEnumerator::new(&self.config, self.parameters.len())?;
        let dimensions = grid.dimensions();
        info!(
            "Starting {} search {} over {} locations ({} weights)",
            self.strategy.name(),
            self.run_id,
            grid.num_locations(),
            dimensions
        );

        if self.phase == SearchPhase::Uninitialized {
            self.init_ground_model()?;
        }

        self.phase = SearchPhase::Scoring;
        for (index, candidate) in grid {
            self.parameters.apply(&candidate)?;
            let Inspection { weights, score } = self.strategy.inspect_location(&candidate)?;
            weights.ensure_len(dimensions)?;

            debug!(
                "Location {}: start {} -> refined {}, score {}",
                index, candidate, weights, score
            );
            let improved = self.state.record(LocationResult {
                index,
                candidate,
                refined: weights,
                score,
            });
            if improved {
                debug!("New best score {} at location {}", score, index);
            }
        }

        self.finalize(started_at)
    }

    fn finalize(&mut self, started_at: DateTime<Utc>) -> SearchResult<SearchOutcome> {
        let best = self
            .state
            .best()
            .cloned()
            .ok_or_else(|| internal_error!("search {} visited no locations", self.run_id))?;

        self.parameters.apply(&best.refined)?;
        self.phase = SearchPhase::Finalized;
        info!(
            "Search {} finished: best location {} with score {} at {}",
            self.run_id, best.index, best.score, best.refined
        );

        Ok(SearchOutcome {
            run_id: self.run_id,
            best_index: best.index,
            best_weights: best.refined,
            best_score: best.score,
            locations_visited: self.state.num_visited(),
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Release the strategy. Valid after a finished or aborted run, once.
    pub fn close(&mut self) -> SearchResult<()> {
        if self.phase == SearchPhase::Closed {
            return Err(precondition_error!("search {} already closed", self.run_id));
        }
        self.phase = SearchPhase::Closed;
        self.strategy.close()
    }

    /// Construct an engine, run it and always close the strategy, including
    /// when the config is rejected before the run starts.
    ///
    /// A run failure takes precedence; if teardown fails as well, both are
    /// reported in a single [`SearchError::Aborted`].
    pub fn run_scoped(
        parameters: SharedParameters,
        mut strategy: S,
        config: GridConfig,
    ) -> SearchResult<SearchOutcome> {
        if let Err(e) = config.validate() {
            let closed = strategy.close();
            return fold_teardown(strategy.name(), Err(e), closed);
        }

        let mut engine = Self::assemble(parameters, strategy, config);
        let outcome = engine.run();
        let closed = engine.close();
        fold_teardown(engine.strategy.name(), outcome, closed)
    }
}

/// Combine a run result with the teardown that followed it.
fn fold_teardown<T>(
    strategy: &str,
    outcome: SearchResult<T>,
    closed: SearchResult<()>,
) -> SearchResult<T> {
    match (outcome, closed) {
        (Ok(outcome), Ok(())) => Ok(outcome),
        (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
        (Err(e), Err(teardown)) => {
            warn!("{} search aborted and teardown failed: {}", strategy, teardown);
            let teardown = match teardown {
                SearchError::Teardown(t) => t,
                other => TeardownError {
                    failures: vec![ReleaseFailure::new(strategy, other)],
                },
            };
            Err(SearchError::Aborted {
                source: Box::new(e),
                teardown,
            })
        }
    }
}
