use uuid::Uuid;

/// Error taxonomy for the consultation pipeline.
///
/// `Validation` and `Conflict` are synchronous, caller-visible, and leave
/// state unchanged. Transient provider failures are retried internally and
/// never surface directly; only exhausted-retry failures appear, as
/// `ExternalService`, and those always resolve the consultation to `Failed`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad input from the caller. No side effects.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The monthly transcription budget cannot cover the estimated cost.
    #[error("monthly budget exhausted: requested {requested:.2}, remaining {remaining:.2}")]
    BudgetExceeded { requested: f64, remaining: f64 },

    /// A provider chain (primary retries plus fallback) is exhausted.
    #[error("external service unavailable: {0}")]
    ExternalService(String),

    /// Another edit is already in flight for the same consultation.
    #[error("concurrent edit in flight for consultation {0}")]
    Conflict(Uuid),

    /// Document rendering failed. No partial artifact is produced.
    #[error("document rendering failed: {0}")]
    Render(String),

    #[error("consultation {0} not found")]
    NotFound(Uuid),

    /// The audit sink refused an append. The triggering transition is
    /// aborted: an action whose audit record cannot be written did not
    /// happen.
    #[error("audit append failed: {0}")]
    Audit(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
