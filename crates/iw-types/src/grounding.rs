//! Grounded inference structures shared by the outer search and the inner learner.
//!
//! A [`GroundingContext`] is expensive to build and is built once per search.
//! Its components are opaque seams: the model's grounding and inference
//! machinery lives behind them.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::errors::{ReleaseFailure, SearchResult, TeardownError};
use crate::params::SharedParameters;

/// Runs inference over the optimization terms.
pub trait Reasoner: Send {
    fn name(&self) -> &str;

    /// Minimize the objective encoded in `term_store`.
    fn optimize(&mut self, term_store: &mut dyn TermStore) -> SearchResult<()>;

    fn close(&mut self) -> SearchResult<()> {
        Ok(())
    }
}

/// Holds the ground rule instances produced by grounding.
pub trait GroundRuleStore: Send {
    fn size(&self) -> usize;

    fn close(&mut self) -> SearchResult<()> {
        Ok(())
    }
}

/// Holds the optimization terms the reasoner works on.
pub trait TermStore: Send {
    fn size(&self) -> usize;

    fn close(&mut self) -> SearchResult<()> {
        Ok(())
    }
}

/// Turns ground rules into optimization terms.
pub trait TermGenerator: Send {
    /// Push the current rule weights into already generated terms.
    fn update_weights(
        &mut self,
        rules: &dyn GroundRuleStore,
        terms: &mut dyn TermStore,
    ) -> SearchResult<()>;
}

/// Tracks the ground atoms known to the model.
pub trait AtomManager: Send {
    fn atom_count(&self) -> usize;
}

/// One latent atom paired with its observed truth value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub atom: String,
    pub observed: f64,
}

/// Correspondence between the model's random variables and the observed data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMap {
    pairs: Vec<TrainingPair>,
    /// Random variables with no observed counterpart.
    latent: Vec<String>,
}

impl TrainingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, atom: impl Into<String>, observed: f64) {
        self.pairs.push(TrainingPair {
            atom: atom.into(),
            observed,
        });
    }

    pub fn add_latent(&mut self, atom: impl Into<String>) {
        self.latent.push(atom.into());
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainingPair> {
        self.pairs.iter()
    }

    pub fn latent_variables(&self) -> &[String] {
        &self.latent
    }
}

/// The grounded structures for one search run.
///
/// Owned by whoever built it; everybody else borrows it per call.
pub struct GroundingContext {
    pub reasoner: Box<dyn Reasoner>,
    pub ground_rule_store: Box<dyn GroundRuleStore>,
    pub term_store: Box<dyn TermStore>,
    pub term_generator: Box<dyn TermGenerator>,
    pub atom_manager: Box<dyn AtomManager>,
    pub training_map: TrainingMap,
}

impl GroundingContext {
    /// Push the current weights into the terms, then run the reasoner.
    pub fn infer(&mut self) -> SearchResult<()> {
        self.term_generator
            .update_weights(self.ground_rule_store.as_ref(), self.term_store.as_mut())?;
        self.reasoner.optimize(self.term_store.as_mut())
    }

    /// Close every releasable component, even when an earlier one fails.
    pub fn release(mut self) -> Result<(), TeardownError> {
        let mut failures = Vec::new();

        if let Err(e) = self.term_store.close() {
            warn!("failed to close term store: {}", e);
            failures.push(ReleaseFailure::new("term store", e));
        }
        if let Err(e) = self.ground_rule_store.close() {
            warn!("failed to close ground rule store: {}", e);
            failures.push(ReleaseFailure::new("ground rule store", e));
        }
        if let Err(e) = self.reasoner.close() {
            warn!("failed to close reasoner {}: {}", self.reasoner.name(), e);
            failures.push(ReleaseFailure::new("reasoner", e));
        }

        debug!("grounding context released ({} failures)", failures.len());
        TeardownError::check(failures)
    }
}

impl fmt::Debug for GroundingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroundingContext")
            .field("reasoner", &self.reasoner.name())
            .field("ground_rules", &self.ground_rule_store.size())
            .field("terms", &self.term_store.size())
            .field("atoms", &self.atom_manager.atom_count())
            .field("training_pairs", &self.training_map.len())
            .finish()
    }
}

/// Builds the grounding context from the model and its two data sources
/// (the random-variable database and the fully observed one).
pub trait Grounder: Send {
    fn ground(&mut self, parameters: &SharedParameters) -> SearchResult<GroundingContext>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{GroundingError, SearchError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Part {
        fail: bool,
        closes: Arc<AtomicUsize>,
    }

    impl Part {
        fn close_part(&mut self, name: &str) -> SearchResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GroundingError::ReleaseFailed {
                    component: name.into(),
                    message: "boom".into(),
                }
                .into())
            } else {
                Ok(())
            }
        }
    }

    impl Reasoner for Part {
        fn name(&self) -> &str {
            "part"
        }
        fn optimize(&mut self, _term_store: &mut dyn TermStore) -> SearchResult<()> {
            Ok(())
        }
        fn close(&mut self) -> SearchResult<()> {
            self.close_part("reasoner")
        }
    }

    impl GroundRuleStore for Part {
        fn size(&self) -> usize {
            2
        }
        fn close(&mut self) -> SearchResult<()> {
            self.close_part("ground rule store")
        }
    }

    impl TermStore for Part {
        fn size(&self) -> usize {
            4
        }
        fn close(&mut self) -> SearchResult<()> {
            self.close_part("term store")
        }
    }

    struct Generator;

    impl TermGenerator for Generator {
        fn update_weights(
            &mut self,
            _rules: &dyn GroundRuleStore,
            _terms: &mut dyn TermStore,
        ) -> SearchResult<()> {
            Ok(())
        }
    }

    struct Atoms;

    impl AtomManager for Atoms {
        fn atom_count(&self) -> usize {
            6
        }
    }

    fn context(fail_terms: bool, fail_reasoner: bool, closes: &Arc<AtomicUsize>) -> GroundingContext {
        let part = |fail| Part {
            fail,
            closes: Arc::clone(closes),
        };
        GroundingContext {
            reasoner: Box::new(part(fail_reasoner)),
            ground_rule_store: Box::new(part(false)),
            term_store: Box::new(part(fail_terms)),
            term_generator: Box::new(Generator),
            atom_manager: Box::new(Atoms),
            training_map: TrainingMap::new(),
        }
    }

    #[test]
    fn release_closes_all_components() {
        let closes = Arc::new(AtomicUsize::new(0));
        context(false, false, &closes).release().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn release_keeps_going_after_failure() {
        let closes = Arc::new(AtomicUsize::new(0));
        let err = context(true, true, &closes).release().unwrap_err();

        assert_eq!(closes.load(Ordering::SeqCst), 3);
        assert_eq!(err.resources(), vec!["term store", "reasoner"]);
        assert!(matches!(*err.failures[0].cause, SearchError::Grounding(_)));
    }

    #[test]
    fn infer_runs_generator_then_reasoner() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut ctx = context(false, false, &closes);
        ctx.infer().unwrap();
        let debug = format!("{ctx:?}");
        assert!(debug.contains("terms: 4"));
        assert!(debug.contains("atoms: 6"));
    }

    struct StalledReasoner;

    impl Reasoner for StalledReasoner {
        fn name(&self) -> &str {
            "stalled"
        }
        fn optimize(&mut self, term_store: &mut dyn TermStore) -> SearchResult<()> {
            Err(GroundingError::ComponentFailed {
                component: self.name().into(),
                message: format!("no progress over {} terms", term_store.size()),
            }
            .into())
        }
    }

    #[test]
    fn infer_propagates_reasoner_failure() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut ctx = context(false, false, &closes);
        ctx.reasoner = Box::new(StalledReasoner);

        let err = ctx.infer().unwrap_err();
        assert!(err.to_string().contains("no progress over 4 terms"));
        assert!(matches!(
            err,
            SearchError::Grounding(GroundingError::ComponentFailed { .. })
        ));

        // The replacement reasoner closes by default; the other two still count.
        ctx.release().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn training_map_tracks_pairs_and_latent() {
        let mut map = TrainingMap::new();
        map.insert("Friends(a, b)", 1.0);
        map.insert("Friends(b, c)", 0.0);
        map.add_latent("Knows(a, c)");

        assert_eq!(map.len(), 2);
        assert_eq!(map.iter().map(|p| p.observed).sum::<f64>(), 1.0);
        assert_eq!(map.latent_variables(), &["Knows(a, c)".to_string()]);
    }
}
