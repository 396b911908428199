/// Convenience result type used across the compositor.
pub type CompositeResult<T> = Result<T, CompositeError>;

/// Top-level error taxonomy used by compositor APIs.
#[derive(thiserror::Error, Debug)]
pub enum CompositeError {
    /// Malformed layers, rectangles, targets or configuration. No phase was built.
    #[error("validation error: {0}")]
    Validation(String),

    /// A bounded resource ran out: every pooled buffer busy, a layer that cannot fit any phase,
    /// or a cache allocation failure. The caller may retry the whole composite later.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// No kernel combination could be searched or linked for a phase.
    #[error("kernel resolution error: {0}")]
    KernelResolution(String),

    /// Command emission or device submission failed. The command stream was rolled back.
    #[error("submission error: {0}")]
    Submission(String),

    /// Wrapped lower-level error from a collaborator.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CompositeError {
    /// Build a [`CompositeError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CompositeError::ResourceExhausted`] value.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Build a [`CompositeError::KernelResolution`] value.
    pub fn kernel(msg: impl Into<String>) -> Self {
        Self::KernelResolution(msg.into())
    }

    /// Build a [`CompositeError::Submission`] value.
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    /// Return `true` when retrying the whole composite later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ResourceExhausted(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
