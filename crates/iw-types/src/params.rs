//! Mutable model parameters and the vectors that describe them.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::errors::{SearchError, SearchResult};

/// A scalar loss. Lower is better.
pub type Score = f64;

/// A named weight that the search is allowed to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutableParameter {
    pub name: String,
    pub weight: f64,
}

impl MutableParameter {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// One float per mutable parameter, index-aligned with the parameter sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterVector(Vec<f64>);

impl ParameterVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// Fails with [`SearchError::ShapeMismatch`] unless the vector has `expected` entries.
    pub fn ensure_len(&self, expected: usize) -> SearchResult<()> {
        if self.0.len() == expected {
            Ok(())
        } else {
            Err(SearchError::ShapeMismatch {
                expected,
                actual: self.0.len(),
            })
        }
    }
}

impl From<Vec<f64>> for ParameterVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl fmt::Display for ParameterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, "]")
    }
}

/// The model's ordered mutable parameters.
///
/// Cloning yields another handle to the same storage: the outer search writes
/// candidates through one handle and the inner learner refines them through
/// another. Access is strictly sequential, the lock only makes the sharing
/// explicit.
#[derive(Debug, Clone)]
pub struct SharedParameters {
    inner: Arc<RwLock<Vec<MutableParameter>>>,
}

impl SharedParameters {
    pub fn new(parameters: Vec<MutableParameter>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(parameters)),
        }
    }

    /// Build from `(name, weight)` pairs.
    pub fn from_weights<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self::new(
            weights
                .into_iter()
                .map(|(name, weight)| MutableParameter::new(name, weight))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.read().iter().map(|p| p.name.clone()).collect()
    }

    pub fn weight(&self, index: usize) -> Option<f64> {
        self.inner.read().get(index).map(|p| p.weight)
    }

    /// Current weights, in parameter order.
    pub fn snapshot(&self) -> ParameterVector {
        ParameterVector(self.inner.read().iter().map(|p| p.weight).collect())
    }

    /// Overwrite every weight with the matching entry of `weights`.
    pub fn apply(&self, weights: &ParameterVector) -> SearchResult<()> {
        let mut params = self.inner.write();
        weights.ensure_len(params.len())?;
        for (param, value) in params.iter_mut().zip(weights.iter()) {
            param.weight = *value;
        }
        Ok(())
    }

    pub fn set_weight(&self, index: usize, weight: f64) -> SearchResult<()> {
        let mut params = self.inner.write();
        let len = params.len();
        let param = params.get_mut(index).ok_or(SearchError::ShapeMismatch {
            expected: len,
            actual: index + 1,
        })?;
        param.weight = weight;
        Ok(())
    }

    /// Mutate the parameters in place under a single write lock.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut [MutableParameter]) -> R,
    {
        let mut params = self.inner.write();
        f(&mut params)
    }

    /// True when both handles point at the same storage.
    pub fn same_as(&self, other: &SharedParameters) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SharedParameters {
        SharedParameters::from_weights([("friends", 1.0), ("spouse", 2.0), ("prior", 0.5)])
    }

    #[test]
    fn snapshot_follows_parameter_order() {
        let params = sample();
        assert_eq!(params.snapshot(), ParameterVector::new(vec![1.0, 2.0, 0.5]));
        assert_eq!(params.names(), vec!["friends", "spouse", "prior"]);
    }

    #[test]
    fn apply_rejects_wrong_shape() {
        let params = sample();
        let err = params.apply(&ParameterVector::new(vec![1.0])).unwrap_err();
        assert!(matches!(
            err,
            SearchError::ShapeMismatch {
                expected: 3,
                actual: 1
            }
        ));
        // Nothing was written.
        assert_eq!(params.weight(0), Some(1.0));
    }

    #[test]
    fn clones_share_storage() {
        let params = sample();
        let other = params.clone();
        other.set_weight(1, 9.0).unwrap();

        assert!(params.same_as(&other));
        assert_eq!(params.weight(1), Some(9.0));
        assert!(!params.same_as(&sample()));
    }

    #[test]
    fn update_mutates_in_place() {
        let params = sample();
        let total = params.update(|ps| {
            for p in ps.iter_mut() {
                p.weight *= 2.0;
            }
            ps.iter().map(|p| p.weight).sum::<f64>()
        });
        assert_eq!(total, 7.0);
        assert_eq!(params.snapshot().as_slice(), &[2.0, 4.0, 1.0]);
    }

    #[test]
    fn set_weight_out_of_range() {
        let params = sample();
        assert!(params.set_weight(3, 1.0).is_err());
    }

    #[test]
    fn vector_display() {
        let v = ParameterVector::new(vec![0.1, 10.0]);
        assert_eq!(v.to_string(), "[0.1, 10]");
    }
}
