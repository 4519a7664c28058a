//! # iw-optimizer
//!
//! Nested search over initial weights.
//!
//! An outer grid enumerates candidate starting points for the model's mutable
//! weights. At each location an inner learner refines all weights from that
//! start, and the loss it reaches becomes the location's score. The model ends
//! up at the best refined weights found across the grid.
//!
//! Provides grid configuration and enumeration, per-location result tracking,
//! the search engine driving the loop, and the coordinator that shares one
//! grounding context between the grid and the inner learner.

mod coordinator;
mod engine;
mod inner;
mod search;
mod strategy;
mod trial;

pub use coordinator::InitialWeightCoordinator;
pub use engine::{GridSearchEngine, SearchPhase};
pub use inner::InnerOptimizer;
pub use search::{
    GridConfig, GridEnumerator, GridOrder, DEFAULT_GRID_WEIGHTS, MAX_SAMPLED_LOCATIONS,
};
pub use strategy::{Inspection, LocationStrategy};
pub use trial::{LocationResult, RunId, SearchOutcome, SearchState};
