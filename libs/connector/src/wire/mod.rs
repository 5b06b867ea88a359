//! The seam between the session layer and the database wire protocol.
//!
//! [`Dialer`] opens physical connections, [`Connection`] executes SQL and
//! answers liveness probes. [`WireError`] classifies failures so the
//! layers above can apply their retry policies: transport trouble is
//! retried on another connection, statement trouble never is.

pub mod postgres;

use crate::endpoint::{Credentials, Endpoint};
use crate::result_set::ResultSet;
use async_trait::async_trait;
use std::time::Duration;

/// Failure classification at the wire level.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The node rejected the credentials
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The node is unreachable or the connection broke mid-flight
    #[error("network failure: {0}")]
    Network(String),

    /// The attempt exceeded its deadline
    #[error("operation timed out")]
    Timeout,

    /// The database rejected the statement; carries its error text verbatim
    #[error("{0}")]
    Statement(String),
}

impl WireError {
    /// Transport-level failures are retried on an alternate connection;
    /// everything else surfaces immediately.
    pub fn is_transport(&self) -> bool {
        matches!(self, WireError::Network(_) | WireError::Timeout)
    }
}

/// One physical connection to a cluster node.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connection: Send {
    /// Execute a single SQL statement and drain its result.
    async fn execute(&mut self, sql: &str) -> Result<ResultSet, WireError>;

    /// Lightweight liveness probe.
    async fn ping(&mut self) -> Result<(), WireError>;
}

/// Opens physical connections to cluster nodes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, WireError>;
}
