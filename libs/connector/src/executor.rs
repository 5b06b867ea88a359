//! Bounded retry-aware statement execution on top of a [`Session`].

use crate::error::{ConnectorError, ConnectorResult};
use crate::result_set::ResultSet;
use crate::session::Session;
use crate::wire::WireError;
use core_config::cluster::ClusterConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// Tunables for statement execution.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Extra attempts after the first one, spent only on transport
    /// failures
    pub retry_budget: u32,

    /// Deadline for a single attempt
    pub query_timeout: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            retry_budget: 1,
            query_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ClusterConfig> for ExecutorOptions {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            retry_budget: config.retry_budget,
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        }
    }
}

/// Executes single SQL statements against a session's pooled connections.
///
/// Each attempt borrows a fresh handle, runs the statement under the
/// query deadline, and settles the handle before returning:
///
/// * success releases the connection back to the pool;
/// * a database-rejected statement releases the connection too, since
///   the statement would fail identically anywhere; it is never retried;
/// * a transport failure or timeout discards the connection via
///   [`Session::mark_unhealthy`] and, while budget remains, retries on
///   whatever connection the session hands out next.
///
/// The attempt count is fixed up front, so execution always terminates.
pub struct QueryExecutor {
    options: ExecutorOptions,
}

impl QueryExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self { options }
    }

    /// Run one SQL statement to completion.
    pub async fn execute(&self, session: &Session, sql: &str) -> ConnectorResult<ResultSet> {
        if sql.trim().is_empty() {
            return Err(ConnectorError::Query {
                message: "empty statement".to_string(),
            });
        }

        let attempts = self.options.retry_budget + 1;
        let mut last_failure = None;

        for attempt in 1..=attempts {
            let mut handle = session.borrow().await?;
            let endpoint = handle.endpoint().clone();
            debug!("executing on {} (attempt {}/{})", endpoint, attempt, attempts);

            let outcome = tokio::time::timeout(
                self.options.query_timeout,
                handle.execute(sql),
            )
            .await
            .unwrap_or(Err(WireError::Timeout));

            match outcome {
                Ok(result) => {
                    session.release(handle).await;
                    return Ok(result);
                }
                Err(e) if e.is_transport() => {
                    warn!(
                        "attempt {}/{} on {} failed: {}",
                        attempt, attempts, endpoint, e
                    );
                    session.mark_unhealthy(handle).await;
                    last_failure = Some((endpoint, e.to_string()));
                }
                Err(e) => {
                    // The connection is fine; only the request is bad.
                    session.release(handle).await;
                    return Err(match e {
                        WireError::Auth(message) => ConnectorError::Authentication(message),
                        other => ConnectorError::Query {
                            message: other.to_string(),
                        },
                    });
                }
            }
        }

        // Unreachable without a recorded failure: the loop only falls
        // through after a transport error consumed the last attempt.
        let (endpoint, message) = last_failure.unwrap_or_else(|| {
            (
                crate::endpoint::Endpoint::new("unknown", 0),
                "no attempts were made".to_string(),
            )
        });
        Err(ConnectorError::Execution {
            endpoint,
            attempts,
            message,
        })
    }
}
