use thiserror::Error;

/// Main error type for initial-weight search
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Precondition violated: {message}")]
    Precondition { message: String },

    #[error("Grounding error: {0}")]
    Grounding(#[from] GroundingError),

    #[error("Learning error: {0}")]
    Learning(#[from] LearningError),

    #[error("Teardown error: {0}")]
    Teardown(#[from] TeardownError),

    #[error("Search aborted: {source}; teardown also failed: {teardown}")]
    Aborted {
        source: Box<SearchError>,
        teardown: TeardownError,
    },

    #[error("Shape mismatch: expected {expected} parameters, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while building or tearing down grounded structures
#[derive(Error, Debug)]
pub enum GroundingError {
    #[error("Grounding failed: {message}")]
    ConstructionFailed { message: String },

    #[error("Grounding component {component} failed: {message}")]
    ComponentFailed { component: String, message: String },

    #[error("Release of {component} failed: {message}")]
    ReleaseFailed { component: String, message: String },
}

/// Errors raised by an inner learning procedure
#[derive(Error, Debug)]
pub enum LearningError {
    #[error("Learning failed: {message}")]
    LearnFailed { message: String },

    #[error("Loss computation failed: {message}")]
    LossFailed { message: String },

    #[error("Learner used before its ground model was initialized")]
    NotInitialized,

    #[error("Learner diverged at iteration {iteration}")]
    Diverged { iteration: usize },
}

/// One resource that could not be released.
#[derive(Error, Debug)]
#[error("{resource}: {cause}")]
pub struct ReleaseFailure {
    pub resource: String,
    pub cause: Box<SearchError>,
}

impl ReleaseFailure {
    pub fn new(resource: impl Into<String>, cause: impl Into<SearchError>) -> Self {
        Self {
            resource: resource.into(),
            cause: Box::new(cause.into()),
        }
    }
}

/// Every release that failed during a teardown. Never empty.
#[derive(Error, Debug)]
#[error("{} release(s) failed: {}", .failures.len(), join_failures(.failures))]
pub struct TeardownError {
    pub failures: Vec<ReleaseFailure>,
}

fn join_failures(failures: &[ReleaseFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl TeardownError {
    /// `Ok` when nothing failed, otherwise one error naming every failure.
    pub fn check(failures: Vec<ReleaseFailure>) -> Result<(), TeardownError> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TeardownError { failures })
        }
    }

    pub fn resources(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.resource.as_str()).collect()
    }
}

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Macro for creating precondition errors
#[macro_export]
macro_rules! precondition_error {
    ($($arg:tt)*) => {
        $crate::SearchError::Precondition { message: format!($($arg)*) }
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::SearchError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::SearchError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SearchError::ShapeMismatch {
            expected: 3,
            actual: 2,
        };

        assert!(error.to_string().contains("Shape mismatch"));
        assert!(error.to_string().contains('3'));
        assert!(error.to_string().contains('2'));
    }

    #[test]
    fn test_error_conversion() {
        let learning_error = LearningError::LearnFailed {
            message: "test".to_string(),
        };
        let search_error: SearchError = learning_error.into();

        match search_error {
            SearchError::Learning(_) => (),
            _ => panic!("Expected Learning error"),
        }
    }

    #[test]
    fn test_teardown_names_every_failure() {
        let failures = vec![
            ReleaseFailure::new(
                "grounding context",
                GroundingError::ReleaseFailed {
                    component: "term store".into(),
                    message: "disk gone".into(),
                },
            ),
            ReleaseFailure::new("inner optimizer", internal_error!("handle leaked")),
        ];
        let err = TeardownError::check(failures).unwrap_err();
        let text = err.to_string();

        assert!(text.starts_with("2 release(s) failed"));
        assert!(text.contains("grounding context"));
        assert!(text.contains("disk gone"));
        assert!(text.contains("inner optimizer"));
        assert!(text.contains("handle leaked"));
        assert_eq!(err.resources(), vec!["grounding context", "inner optimizer"]);
    }

    #[test]
    fn test_teardown_check_empty_is_ok() {
        assert!(TeardownError::check(Vec::new()).is_ok());
    }

    #[test]
    fn test_macros() {
        let precondition = precondition_error!("already initialized: {}", "inner");
        assert!(matches!(precondition, SearchError::Precondition { .. }));
        let _internal_err = internal_error!("Something went wrong");
        let _config_err = config_error!("Missing required field: {}", "weights");
    }
}
