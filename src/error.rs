use thiserror::Error;

/// Errors surfaced by the analytics engine.
///
/// Row-level problems never reach callers through this type unless a whole
/// request has to fail; offending rows are dropped by the aggregators and
/// reported as [`crate::calc::RowWarning`]s instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: i64 },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("render failed: {0}")]
    Render(#[from] std::io::Error),

    #[error("request cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn not_found(what: &'static str, id: i64) -> Self {
        Self::NotFound { what, id }
    }

    /// Stable wire code used by the sidecar error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::DataUnavailable(_) => "db_query_failed",
            Self::Render(_) => "render_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        Self::DataUnavailable(e.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(e: csv::Error) -> Self {
        Self::Render(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(EngineError::not_found("student", 7).code(), "not_found");
        assert_eq!(EngineError::Cancelled.code(), "cancelled");
        assert_eq!(
            EngineError::from(rusqlite::Error::QueryReturnedNoRows).code(),
            "db_query_failed"
        );
        assert_eq!(
            EngineError::not_found("subject", 3).to_string(),
            "subject 3 not found"
        );
    }
}
