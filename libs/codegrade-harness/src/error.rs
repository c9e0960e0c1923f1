use thiserror::Error;

/// Reasons a harness could not be synthesized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("submission is empty")]
    EmptySource,

    /// Code declares a function, but its header cannot be read
    #[error("no usable function signature found: {0}")]
    NoSignature(String),

    /// Brace matching ran off the end of a method or class
    #[error("unbalanced braces in `{method}`")]
    UnbalancedBraces { method: String },
}
