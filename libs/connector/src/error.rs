use crate::endpoint::Endpoint;

/// Unified error type for session and query operations.
///
/// Variants split along the retry boundary: transport-level trouble
/// (`Connectivity`, `Execution`) is worth re-issuing a whole request for,
/// while `Authentication` and `Query` will fail the same way every time.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// No cluster endpoint could be reached
    #[error("no cluster endpoint reachable: {0}")]
    Connectivity(String),

    /// The cluster rejected the credentials
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Operation on a closed (or never-opened) session
    #[error("session is closed")]
    SessionClosed,

    /// Transport failures exhausted the retry budget
    #[error("query failed after {attempts} attempt(s), last endpoint {endpoint}: {message}")]
    Execution {
        endpoint: Endpoint,
        attempts: u32,
        message: String,
    },

    /// The database rejected the statement; `message` is the database's
    /// own error text, unmodified
    #[error("{message}")]
    Query { message: String },
}

impl ConnectorError {
    /// Stable tag for each variant, used at the API boundary so callers
    /// can tell retryable from non-retryable failures.
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectorError::Connectivity(_) => "connectivity",
            ConnectorError::Authentication(_) => "authentication",
            ConnectorError::SessionClosed => "session_closed",
            ConnectorError::Execution { .. } => "execution",
            ConnectorError::Query { .. } => "query",
        }
    }

    /// Whether re-issuing the whole request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectorError::Connectivity(_) | ConnectorError::Execution { .. }
        )
    }
}

/// Result type alias for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;
