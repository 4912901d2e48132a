use std::fmt::Debug;

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Contract violations and solve failures.
///
/// Every variant except `SolveFailed` means the caller and the model have
/// drifted apart (e.g. the graph holds a species the model never saw).
/// Infeasible or unstable ecosystems are ordinary outcomes, not errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("ecosystem already contains species {0}")]
    DuplicateSpecies(String),
    #[error("ecosystem does not contain species {0}")]
    UnknownSpecies(String),
    #[error("ecosystem already has interaction {0} -> {1}")]
    DuplicateInteraction(String, String),
    #[error("ecosystem does not have interaction {0} -> {1}")]
    UnknownInteraction(String, String),
    #[error("producer {consumer} cannot consume {resource}")]
    InvalidForaging { resource: String, consumer: String },
    #[error("species {0} cannot eat itself")]
    SelfInteraction(String),
    #[error("stability requested before the equilibrium was solved")]
    StabilityBeforeFeasibility,
    #[error("solve failed: {0}")]
    SolveFailed(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ModelError {
    pub fn duplicate_species<K: Debug>(key: &K) -> Self {
        ModelError::DuplicateSpecies(format!("{:?}", key))
    }

    pub fn unknown_species<K: Debug>(key: &K) -> Self {
        ModelError::UnknownSpecies(format!("{:?}", key))
    }

    pub fn duplicate_interaction<K: Debug>(resource: &K, consumer: &K) -> Self {
        ModelError::DuplicateInteraction(format!("{:?}", resource), format!("{:?}", consumer))
    }

    pub fn unknown_interaction<K: Debug>(resource: &K, consumer: &K) -> Self {
        ModelError::UnknownInteraction(format!("{:?}", resource), format!("{:?}", consumer))
    }

    pub fn invalid_foraging<K: Debug>(resource: &K, consumer: &K) -> Self {
        ModelError::InvalidForaging {
            resource: format!("{:?}", resource),
            consumer: format!("{:?}", consumer),
        }
    }

    pub fn self_interaction<K: Debug>(key: &K) -> Self {
        ModelError::SelfInteraction(format!("{:?}", key))
    }

    /// True for errors that indicate the caller broke an invariant.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, ModelError::SolveFailed(_) | ModelError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_species() {
        let err = ModelError::duplicate_species(&7u32);
        assert_eq!(err.to_string(), "ecosystem already contains species 7");

        let err = ModelError::invalid_foraging(&"grass", &"oak");
        assert_eq!(err.to_string(), "producer \"oak\" cannot consume \"grass\"");
    }

    #[test]
    fn solve_failures_are_not_contract_violations() {
        assert!(ModelError::unknown_species(&1).is_contract_violation());
        assert!(ModelError::StabilityBeforeFeasibility.is_contract_violation());
        assert!(!ModelError::SolveFailed("boom".into()).is_contract_violation());
    }
}
