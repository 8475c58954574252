use thiserror::Error;

/// The unified error taxonomy of the DRP core.
///
/// Every public operation surfaces errors from exactly this set; transport
/// adapters translate kinds to status codes. Infrastructure failures on
/// idempotent reads are retried internally before surfacing.
#[derive(Debug, Error)]
pub enum DrpError {
    /// Field constraint violation: bad enum, out-of-range number, empty
    /// required field, malformed hex/base64. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced decision, dispute, or elder does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Vote by an unassigned reviewer, signing request naming an inactive
    /// elder, and similar authority violations.
    #[error("unauthorized action: {0}")]
    UnauthorizedAction(String),

    /// Quorum arithmetic violation at boot, closing an already-closed
    /// dispute, re-registering an elder id.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Keystore / persistent-store / artifact-store I/O failure.
    #[error("infrastructure unavailable: {0}")]
    InfrastructureUnavailable(String),
}

impl DrpError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// True for errors that an idempotent caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DrpError::InfrastructureUnavailable(_))
    }
}
