//! Grid definition and location enumeration.

use iw_types::{config_error, ParameterVector, SearchResult};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Candidate values tried for every mutable weight unless configured otherwise.
pub const DEFAULT_GRID_WEIGHTS: [f64; 5] = [0.001, 0.01, 0.1, 1.0, 10.0];

/// Most locations a random order will draw. Sampled indices are held in
/// memory, unlike the lazily walked exhaustive order.
pub const MAX_SAMPLED_LOCATIONS: usize = 1 << 20;

/// Order in which grid locations are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GridOrder {
    /// Ascending location index.
    #[default]
    Exhaustive,
    /// Distinct locations drawn from a seeded RNG.
    Random { seed: u64 },
}

/// Shape of the outer grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Values each mutable weight may take. The grid is the cartesian
    /// product of this list with itself, once per weight.
    pub weights: Vec<f64>,

    pub order: GridOrder,

    /// Upper bound on visited locations.
    pub max_locations: Option<usize>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            weights: DEFAULT_GRID_WEIGHTS.to_vec(),
            order: GridOrder::Exhaustive,
            max_locations: None,
        }
    }
}

impl GridConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_max_locations(mut self, n: usize) -> Self {
        self.max_locations = Some(n);
        self
    }

    pub fn with_random_order(mut self, seed: u64) -> Self {
        self.order = GridOrder::Random { seed };
        self
    }

    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> SearchResult<Self> {
        let config: GridConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> SearchResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> SearchResult<()> {
        if self.weights.is_empty() {
            return Err(config_error!("grid weights must not be empty"));
        }
        if let Some(bad) = self.weights.iter().find(|w| !w.is_finite()) {
            return Err(config_error!("grid weight {bad} is not finite"));
        }
        if self.max_locations == Some(0) {
            return Err(config_error!("max_locations must be at least 1"));
        }
        Ok(())
    }

    /// Number of locations in the full grid for `dimensions` weights, or
    /// `None` if it does not fit in a `usize`.
    pub fn grid_size(&self, dimensions: usize) -> Option<usize> {
        let exp = u32::try_from(dimensions).ok()?;
        self.weights.len().checked_pow(exp)
    }
}

#[derive(Debug, Clone)]
enum VisitPlan {
    Sequential { limit: usize },
    Sampled(Vec<usize>),
}

/// Walks the grid, yielding `(location index, candidate weights)`.
///
/// Location `i` decodes as the base-`k` digits of `i`, least significant
/// digit first, each digit picking one of the `k` configured weights.
#[derive(Debug, Clone)]
pub struct GridEnumerator {
    weights: Vec<f64>,
    dimensions: usize,
    plan: VisitPlan,
    cursor: usize,
}

impl GridEnumerator {
    pub fn new(config: &GridConfig, dimensions: usize) -> SearchResult<Self> {
        config.validate()?;
        let total = config.grid_size(dimensions);
        let k = config.weights.len();

        let plan = match config.order {
            GridOrder::Exhaustive => {
                let limit = match (total, config.max_locations) {
                    (Some(t), Some(m)) => t.min(m),
                    (Some(t), None) => t,
                    (None, Some(m)) => m,
                    (None, None) => {
                        return Err(config_error!(
                            "grid of {k}^{dimensions} locations is too large, set max_locations"
                        ))
                    }
                };
                VisitPlan::Sequential { limit }
            }
            GridOrder::Random { seed } => {
                let total = total.ok_or_else(|| {
                    config_error!("grid of {k}^{dimensions} locations is too large to sample")
                })?;
                let amount = config.max_locations.map_or(total, |m| m.min(total));
                if amount > MAX_SAMPLED_LOCATIONS {
                    return Err(config_error!(
                        "random order would draw {amount} locations (limit {MAX_SAMPLED_LOCATIONS}), set max_locations"
                    ));
                }
                let mut rng = StdRng::seed_from_u64(seed);
                VisitPlan::Sampled(index::sample(&mut rng, total, amount).into_vec())
            }
        };

        Ok(Self {
            weights: config.weights.clone(),
            dimensions,
            plan,
            cursor: 0,
        })
    }

    /// How many locations this enumerator will yield in total.
    pub fn num_locations(&self) -> usize {
        match &self.plan {
            VisitPlan::Sequential { limit } => *limit,
            VisitPlan::Sampled(indices) => indices.len(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn location(&self, mut index: usize) -> ParameterVector {
        let k = self.weights.len();
        let mut values = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            values.push(self.weights[index % k]);
            index /= k;
        }
        ParameterVector::new(values)
    }
}

impl Iterator for GridEnumerator {
    type Item = (usize, ParameterVector);

    fn next(&mut self) -> Option<Self::Item> {
        let index = match &self.plan {
            VisitPlan::Sequential { limit } => (self.cursor < *limit).then_some(self.cursor),
            VisitPlan::Sampled(indices) => indices.get(self.cursor).copied(),
        }?;
        self.cursor += 1;
        Some((index, self.location(index)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.num_locations() - self.cursor;
        (remaining, Some(remaining))
    }
}
