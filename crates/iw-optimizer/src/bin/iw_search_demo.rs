//! Runs a nested initial-weight search against a small in-memory model.
//!
//! `IW_GRID_CONFIG` may point at a JSON grid config; `RUST_LOG` controls output.

use iw_optimizer::{GridConfig, GridSearchEngine, InitialWeightCoordinator, InnerOptimizer};
use iw_types::{
    AtomManager, GroundRuleStore, Grounder, GroundingContext, GroundingError, LearningError,
    Reasoner, Score, SearchResult, SharedParameters, TermGenerator, TermStore, TrainingMap,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const OBSERVED: [(&str, f64); 3] = [("Friends", 2.0), ("Colleagues", 0.4), ("Neighbors", 1.3)];

struct CountingReasoner {
    runs: usize,
}

impl Reasoner for CountingReasoner {
    fn name(&self) -> &str {
        "counting"
    }

    fn optimize(&mut self, term_store: &mut dyn TermStore) -> SearchResult<()> {
        if term_store.size() == 0 {
            return Err(GroundingError::ComponentFailed {
                component: self.name().to_string(),
                message: "no terms to optimize".to_string(),
            }
            .into());
        }
        self.runs += 1;
        Ok(())
    }

    fn close(&mut self) -> SearchResult<()> {
        debug!("reasoner ran {} times", self.runs);
        Ok(())
    }
}

struct MemoryStore {
    size: usize,
}

impl GroundRuleStore for MemoryStore {
    fn size(&self) -> usize {
        self.size
    }
}

impl TermStore for MemoryStore {
    fn size(&self) -> usize {
        self.size
    }
}

struct NoopGenerator;

impl TermGenerator for NoopGenerator {
    fn update_weights(
        &mut self,
        _rules: &dyn GroundRuleStore,
        _terms: &mut dyn TermStore,
    ) -> SearchResult<()> {
        Ok(())
    }
}

struct FixedAtoms(usize);

impl AtomManager for FixedAtoms {
    fn atom_count(&self) -> usize {
        self.0
    }
}

struct MemoryGrounder;

impl Grounder for MemoryGrounder {
    fn ground(&mut self, parameters: &SharedParameters) -> SearchResult<GroundingContext> {
        if parameters.len() != OBSERVED.len() {
            return Err(GroundingError::ConstructionFailed {
                message: format!(
                    "{} rules but {} observed predicates",
                    parameters.len(),
                    OBSERVED.len()
                ),
            }
            .into());
        }
        let mut training_map = TrainingMap::new();
        for (name, observed) in OBSERVED {
            training_map.insert(name, observed);
        }
        let rules = parameters.len();
        Ok(GroundingContext {
            reasoner: Box::new(CountingReasoner { runs: 0 }),
            ground_rule_store: Box::new(MemoryStore { size: rules }),
            term_store: Box::new(MemoryStore { size: rules }),
            term_generator: Box::new(NoopGenerator),
            atom_manager: Box::new(FixedAtoms(OBSERVED.len())),
            training_map,
        })
    }
}

/// Gradient descent on a wavy loss with several local minima per weight.
struct GradientLearner {
    parameters: SharedParameters,
    targets: Vec<f64>,
    step_size: f64,
    max_iterations: usize,
}

impl GradientLearner {
    fn loss_of(&self, weights: &[f64]) -> Score {
        weights
            .iter()
            .zip(&self.targets)
            .map(|(w, t)| (w - t).powi(2) / 4.0 + (3.0 * w).sin())
            .sum()
    }
}

impl InnerOptimizer for GradientLearner {
    fn name(&self) -> &str {
        "gradient-descent"
    }

    fn parameters(&self) -> &SharedParameters {
        &self.parameters
    }

    fn init_ground_model(&mut self, context: &mut GroundingContext) -> SearchResult<()> {
        if !self.targets.is_empty() {
            return Err(iw_types::precondition_error!("learner already initialized"));
        }
        self.targets = context.training_map.iter().map(|p| p.observed).collect();
        Ok(())
    }

    fn learn(&mut self, context: &mut GroundingContext) -> SearchResult<()> {
        if self.targets.is_empty() {
            return Err(LearningError::NotInitialized.into());
        }
        for iteration in 0..self.max_iterations {
            context.infer()?;
            let targets = &self.targets;
            let step_size = self.step_size;
            let movement = self.parameters.update(|params| {
                let mut movement = 0.0;
                for (p, t) in params.iter_mut().zip(targets) {
                    let gradient = (p.weight - t) / 2.0 + 3.0 * (3.0 * p.weight).cos();
                    let next = (p.weight - step_size * gradient).max(0.0);
                    movement += (next - p.weight).abs();
                    p.weight = next;
                }
                movement
            });
            if !movement.is_finite() {
                return Err(LearningError::Diverged { iteration }.into());
            }
            if movement < 1e-9 {
                break;
            }
        }
        Ok(())
    }

    fn compute_loss(&self, _context: &GroundingContext) -> SearchResult<Score> {
        Ok(self.loss_of(self.parameters.snapshot().as_slice()))
    }

    fn close(&mut self) -> SearchResult<()> {
        self.targets.clear();
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::var("IW_GRID_CONFIG") {
        Ok(path) => {
            info!("Loading grid config from {}", path);
            GridConfig::load(path)?
        }
        Err(_) => GridConfig::default(),
    };

    let parameters = SharedParameters::from_weights(OBSERVED.iter().map(|(name, _)| (*name, 1.0)));
    let learner = GradientLearner {
        parameters: parameters.clone(),
        targets: Vec::new(),
        step_size: 0.05,
        max_iterations: 500,
    };
    let coordinator = InitialWeightCoordinator::new(parameters.clone(), MemoryGrounder, learner)?;

    let outcome = GridSearchEngine::run_scoped(parameters.clone(), coordinator, config)?;
    for (param, weight) in parameters.names().iter().zip(outcome.best_weights.iter()) {
        info!("{}: {:.4}", param, weight);
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
