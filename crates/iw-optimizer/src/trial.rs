//! Per-location results and best-location tracking.

use chrono::{DateTime, Utc};
use iw_types::{ParameterVector, Score};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique search run identifier.
pub type RunId = Uuid;

/// What one grid location produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResult {
    /// Grid index of the location.
    pub index: usize,
    /// The raw grid candidate the inner learner started from.
    pub candidate: ParameterVector,
    /// Weights the inner learner converged to.
    pub refined: ParameterVector,
    pub score: Score,
}

/// Every visited location plus the best one so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchState {
    visited: Vec<LocationResult>,
    best: Option<usize>,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result, replacing the best only on a strictly lower score.
    /// Ties keep the earlier location. NaN never displaces a real score.
    ///
    /// Returns `true` if the result became the new best.
    pub fn record(&mut self, result: LocationResult) -> bool {
        let improved = match self.best() {
            None => true,
            Some(current) => {
                !result.score.is_nan() && (current.score.is_nan() || result.score < current.score)
            }
        };
        self.visited.push(result);
        if improved {
            self.best = Some(self.visited.len() - 1);
        }
        improved
    }

    pub fn best(&self) -> Option<&LocationResult> {
        self.best.map(|i| &self.visited[i])
    }

    pub fn best_score(&self) -> Option<Score> {
        self.best().map(|r| r.score)
    }

    pub fn visited(&self) -> &[LocationResult] {
        &self.visited
    }

    pub fn num_visited(&self) -> usize {
        self.visited.len()
    }
}

/// Final report of a completed search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub run_id: RunId,
    pub best_index: usize,
    /// Refined weights the model was left at.
    pub best_weights: ParameterVector,
    pub best_score: Score,
    pub locations_visited: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize, score: Score) -> LocationResult {
        LocationResult {
            index,
            candidate: ParameterVector::new(vec![index as f64]),
            refined: ParameterVector::new(vec![index as f64 + 0.5]),
            score,
        }
    }

    #[test]
    fn best_tracking_minimizes() {
        let mut state = SearchState::new();
        assert!(state.best().is_none());

        assert!(state.record(result(0, 5.0)));
        assert!(state.record(result(1, 3.0)));
        assert!(!state.record(result(2, 8.0)));
        assert!(state.record(result(3, 1.0)));

        let best = state.best().unwrap();
        assert_eq!(best.index, 3);
        assert_eq!(best.score, 1.0);
        assert_eq!(best.refined, ParameterVector::new(vec![3.5]));
        assert_eq!(state.num_visited(), 4);
    }

    #[test]
    fn best_score_is_running_minimum() {
        let scores = [4.0, 9.0, 2.5, 2.5, 7.0, 0.25, 3.0];
        let mut state = SearchState::new();
        for (k, score) in scores.iter().enumerate() {
            state.record(result(k, *score));
            let expected = scores[..=k].iter().cloned().fold(f64::INFINITY, f64::min);
            assert_eq!(state.best_score(), Some(expected));
        }
    }

    #[test]
    fn ties_keep_first_location() {
        let mut state = SearchState::new();
        state.record(result(0, 2.0));
        assert!(!state.record(result(1, 2.0)));
        assert_eq!(state.best().unwrap().index, 0);
    }

    #[test]
    fn nan_never_beats_a_real_score() {
        let mut state = SearchState::new();
        state.record(result(0, f64::NAN));
        assert!(state.record(result(1, 10.0)));
        assert!(!state.record(result(2, f64::NAN)));
        assert_eq!(state.best().unwrap().index, 1);
    }

    #[test]
    fn outcome_serializes() {
        let outcome = SearchOutcome {
            run_id: Uuid::new_v4(),
            best_index: 3,
            best_weights: ParameterVector::new(vec![0.1, 2.0]),
            best_score: 1.0,
            locations_visited: 4,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["best_weights"], serde_json::json!([0.1, 2.0]));
        assert_eq!(json["locations_visited"], 4);
    }
}
