//! Error types for the admission pipeline

/// Why an envelope was not admitted, or why a rule set is unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("Rejected by rule: {rule}")]
    Rejected { rule: String },

    #[error("No rule reached a decision")]
    NoDecision,

    #[error("Rule set must end with a catch-all rule, last rule is {last}")]
    MissingCatchAll { last: String },

    #[error("Rule set is empty")]
    Empty,
}

/// Result type for pipeline evaluation
pub type FilterResult<T> = Result<T, FilterError>;
