//! Cluster-aware SQL connector for YugabyteDB's PostgreSQL interface.
//!
//! The crate is layered bottom-up:
//!
//! * [`wire`] opens connections and executes statements at the protocol
//!   seam, classifying failures;
//! * [`session`] pools connectivity to a multi-node cluster with
//!   endpoint priority and background recovery;
//! * [`executor`] runs statements with bounded retries;
//! * [`result_set`] models the normalized query output.

pub mod endpoint;
pub mod error;
pub mod executor;
pub mod result_set;
pub mod retry;
pub mod session;
pub mod wire;

pub use endpoint::{Credentials, Endpoint};
pub use error::{ConnectorError, ConnectorResult};
pub use executor::{ExecutorOptions, QueryExecutor};
pub use result_set::{ResultSet, Row, Value};
pub use retry::RetryConfig;
pub use session::{ConnectionHandle, Session, SessionManager, SessionOptions};
pub use wire::{Connection, Dialer, WireError};
