//! Shared application state: one gateway-wide session slot plus the
//! executor that drives queries through it.

use connector::{
    ConnectorError, ConnectorResult, Credentials, Dialer, Endpoint, ExecutorOptions,
    QueryExecutor, ResultSet, Session, SessionManager, SessionOptions,
};
use core_config::cluster::ClusterConfig;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub connector: GatewayConnector,
}

/// Session lifecycle and query dispatch for the HTTP handlers.
///
/// Holds at most one active session. `/connect` swaps it atomically: the
/// replacement is installed first, then the previous session is closed,
/// so in-flight queries on the old session finish on their borrowed
/// connections while new queries land on the new one.
#[derive(Clone)]
pub struct GatewayConnector {
    manager: Arc<SessionManager>,
    executor: Arc<QueryExecutor>,
    session: Arc<RwLock<Option<Session>>>,
}

impl GatewayConnector {
    pub fn new(
        dialer: Arc<dyn Dialer>,
        sessions: SessionOptions,
        executor: ExecutorOptions,
    ) -> Self {
        Self::with_manager(SessionManager::new(dialer, sessions), executor)
    }

    /// Connector over the PostgreSQL wire protocol, tuned from the
    /// cluster config when one is present.
    pub fn postgres(config: Option<&ClusterConfig>) -> Self {
        let sessions = config.map(SessionOptions::from).unwrap_or_default();
        let executor = config.map(ExecutorOptions::from).unwrap_or_default();
        Self::with_manager(SessionManager::postgres(sessions), executor)
    }

    fn with_manager(manager: SessionManager, executor: ExecutorOptions) -> Self {
        Self {
            manager: Arc::new(manager),
            executor: Arc::new(QueryExecutor::new(executor)),
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Open a session, replacing and closing any previous one. Returns
    /// the endpoint the new session prefers.
    pub async fn connect(
        &self,
        endpoints: &[Endpoint],
        credentials: Credentials,
    ) -> ConnectorResult<Option<Endpoint>> {
        let session = self.manager.connect(endpoints, credentials).await?;
        Ok(self.install(session).await)
    }

    /// Open a session from cluster configuration, replacing and closing
    /// any previous one.
    pub async fn connect_from_config(
        &self,
        config: &ClusterConfig,
    ) -> ConnectorResult<Option<Endpoint>> {
        let session = self.manager.connect_from_config(config).await?;
        Ok(self.install(session).await)
    }

    async fn install(&self, session: Session) -> Option<Endpoint> {
        let preferred = session.preferred_endpoint().await;
        let previous = self.session.write().await.replace(session);
        if let Some(previous) = previous {
            previous.close().await;
        }
        preferred
    }

    pub async fn query(&self, sql: &str) -> ConnectorResult<ResultSet> {
        let session = self.session.read().await.clone();
        match session {
            Some(session) => self.executor.execute(&session, sql).await,
            None => Err(ConnectorError::SessionClosed),
        }
    }

    /// Readiness: a pooled connection can be borrowed right now.
    pub async fn ready(&self) -> bool {
        let session = self.session.read().await.clone();
        let Some(session) = session else {
            return false;
        };
        match session.borrow().await {
            Ok(handle) => {
                session.release(handle).await;
                true
            }
            Err(_) => false,
        }
    }

    pub async fn shutdown(&self) {
        if let Some(session) = self.session.write().await.take() {
            session.close().await;
        }
    }
}
