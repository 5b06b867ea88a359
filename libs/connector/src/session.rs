//! Session management for a multi-node cluster.
//!
//! A [`Session`] exclusively owns its physical connections: at most one
//! idle connection per known endpoint, handed out as exclusively-borrowed
//! [`ConnectionHandle`]s for the duration of a single query. All pool
//! mutations go through one `tokio::sync::Mutex`; once borrowed, a handle
//! is owned by exactly one caller, so no per-connection locking exists.
//!
//! Endpoint priority is positional: the slot at index 0 is the preferred
//! endpoint. Connect promotes the first reachable endpoint, failures
//! demote to the back of the order.

use crate::endpoint::{Credentials, Endpoint};
use crate::error::{ConnectorError, ConnectorResult};
use crate::result_set::ResultSet;
use crate::retry::{RetryConfig, retry_with_backoff};
use crate::wire::postgres::PgDialer;
use crate::wire::{Connection, Dialer, WireError};
use core_config::cluster::ClusterConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Tunables for session behavior.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Per-endpoint dial timeout
    pub connect_timeout: Duration,

    /// How long a connection's last successful check stays fresh; stale
    /// connections are probed before being handed out
    pub freshness: Duration,

    /// Backoff schedule for the background reconnect after a connection
    /// is discarded
    pub reconnect: RetryConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            freshness: Duration::from_secs(30),
            reconnect: RetryConfig::default(),
        }
    }
}

impl From<&ClusterConfig> for SessionOptions {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            freshness: Duration::from_secs(config.freshness_secs),
            reconnect: RetryConfig::default(),
        }
    }
}

/// Establishes sessions against a cluster through a pluggable [`Dialer`].
pub struct SessionManager {
    dialer: Arc<dyn Dialer>,
    options: SessionOptions,
}

impl SessionManager {
    pub fn new(dialer: Arc<dyn Dialer>, options: SessionOptions) -> Self {
        Self { dialer, options }
    }

    /// Manager over the PostgreSQL wire protocol.
    pub fn postgres(options: SessionOptions) -> Self {
        Self::new(Arc::new(PgDialer), options)
    }

    /// Attempt each endpoint in order until one succeeds.
    ///
    /// The first reachable endpoint becomes the session's preferred
    /// endpoint. An authentication rejection aborts immediately:
    /// credentials are endpoint-independent, so no other node would
    /// accept them either. Network failures move on to the next
    /// endpoint; if every endpoint fails the session is never created.
    ///
    /// After the first success the remaining endpoints are dialed in the
    /// background to pre-fill pool capacity; failures there only log.
    pub async fn connect(
        &self,
        endpoints: &[Endpoint],
        credentials: Credentials,
    ) -> ConnectorResult<Session> {
        if endpoints.is_empty() {
            return Err(ConnectorError::Connectivity(
                "no endpoints to try".to_string(),
            ));
        }

        let mut last_error: Option<WireError> = None;
        for (i, endpoint) in endpoints.iter().enumerate() {
            debug!(
                "dialing {} ({}/{})",
                endpoint,
                i + 1,
                endpoints.len()
            );
            match self
                .dialer
                .dial(endpoint, &credentials, self.options.connect_timeout)
                .await
            {
                Ok(conn) => {
                    info!("connected to {}", endpoint);
                    let mut order = Vec::with_capacity(endpoints.len());
                    order.push(endpoint.clone());
                    order.extend(
                        endpoints
                            .iter()
                            .enumerate()
                            .filter(|(j, _)| *j != i)
                            .map(|(_, e)| e.clone()),
                    );
                    let session = Session::new(
                        self.dialer.clone(),
                        order,
                        conn,
                        credentials,
                        self.options.clone(),
                    );
                    session.spawn_prefill();
                    return Ok(session);
                }
                Err(WireError::Auth(message)) => {
                    warn!("{} rejected credentials: {}", endpoint, message);
                    return Err(ConnectorError::Authentication(message));
                }
                Err(e) => {
                    warn!("endpoint {} unreachable: {}", endpoint, e);
                    last_error = Some(e);
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Err(ConnectorError::Connectivity(format!(
            "all {} endpoint(s) failed, last error: {}",
            endpoints.len(),
            detail
        )))
    }

    /// Connect using contact points and credentials from a [`ClusterConfig`].
    pub async fn connect_from_config(&self, config: &ClusterConfig) -> ConnectorResult<Session> {
        let endpoints = Endpoint::parse_list(&config.contact_points, config.default_port)
            .map_err(|e| ConnectorError::Connectivity(e.to_string()))?;
        let credentials =
            Credentials::new(&config.database, &config.username, &config.password);
        self.connect(&endpoints, credentials).await
    }
}

/// A logical connectivity context to the cluster, backed by pooled
/// physical connections. Cheap to clone; clones share the same pool.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    dialer: Arc<dyn Dialer>,
    credentials: Credentials,
    options: SessionOptions,
    pool: Mutex<Pool>,
}

struct Pool {
    /// Priority order: `slots[0]` is the preferred endpoint
    slots: Vec<Slot>,
    closed: bool,
}

struct Slot {
    endpoint: Endpoint,
    idle: Option<IdleConnection>,
    /// Handles currently checked out against this endpoint
    borrowed: usize,
}

struct IdleConnection {
    conn: Box<dyn Connection>,
    verified_at: Instant,
}

impl Session {
    fn new(
        dialer: Arc<dyn Dialer>,
        order: Vec<Endpoint>,
        first_conn: Box<dyn Connection>,
        credentials: Credentials,
        options: SessionOptions,
    ) -> Self {
        let mut slots: Vec<Slot> = order
            .into_iter()
            .map(|endpoint| Slot {
                endpoint,
                idle: None,
                borrowed: 0,
            })
            .collect();
        slots[0].idle = Some(IdleConnection {
            conn: first_conn,
            verified_at: Instant::now(),
        });

        Self {
            inner: Arc::new(SessionInner {
                dialer,
                credentials,
                options,
                pool: Mutex::new(Pool {
                    slots,
                    closed: false,
                }),
            }),
        }
    }

    /// The endpoint currently favored for new borrows.
    pub async fn preferred_endpoint(&self) -> Option<Endpoint> {
        let pool = self.inner.pool.lock().await;
        pool.slots.first().map(|s| s.endpoint.clone())
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.pool.lock().await.closed
    }

    /// Number of idle pooled connections.
    pub async fn pooled_connections(&self) -> usize {
        let pool = self.inner.pool.lock().await;
        pool.slots.iter().filter(|s| s.idle.is_some()).count()
    }

    /// Number of handles currently checked out.
    pub async fn borrowed_connections(&self) -> usize {
        let pool = self.inner.pool.lock().await;
        pool.slots.iter().map(|s| s.borrowed).sum()
    }

    /// Borrow an exclusively-owned connection handle.
    ///
    /// Preferred endpoint first. An idle connection verified within the
    /// freshness window is handed out directly; a stale one is probed
    /// first and discarded (with its endpoint demoted) if the probe
    /// fails. When every idle connection is taken or gone, one bounded
    /// dial pass runs over the endpoints in priority order, so borrowing
    /// never blocks indefinitely.
    pub async fn borrow(&self) -> ConnectorResult<ConnectionHandle> {
        // Reuse phase: take the best idle connection, probing stale ones.
        loop {
            let taken = {
                let mut guard = self.inner.pool.lock().await;
                let pool = &mut *guard;
                if pool.closed {
                    return Err(ConnectorError::SessionClosed);
                }
                match pool.slots.iter_mut().find(|s| s.idle.is_some()) {
                    Some(slot) => {
                        let idle = slot.idle.take();
                        slot.borrowed += 1;
                        idle.map(|idle| (slot.endpoint.clone(), idle))
                    }
                    None => None,
                }
            };

            let Some((endpoint, idle)) = taken else { break };

            if idle.verified_at.elapsed() <= self.inner.options.freshness {
                return Ok(self.handle(endpoint, idle.conn));
            }

            let mut conn = idle.conn;
            match conn.ping().await {
                Ok(()) => return Ok(self.handle(endpoint, conn)),
                Err(e) => {
                    warn!("probe of {} failed: {}", endpoint, e);
                    drop(conn);
                    self.forget_lease(&endpoint).await;
                    self.demote(&endpoint).await;
                }
            }
        }

        // Dial phase: no idle connection anywhere. One bounded attempt
        // per endpoint, in priority order, then fail fast.
        let endpoints: Vec<Endpoint> = {
            let pool = self.inner.pool.lock().await;
            if pool.closed {
                return Err(ConnectorError::SessionClosed);
            }
            pool.slots.iter().map(|s| s.endpoint.clone()).collect()
        };

        let mut last_error: Option<WireError> = None;
        for endpoint in endpoints {
            match self
                .inner
                .dialer
                .dial(
                    &endpoint,
                    &self.inner.credentials,
                    self.inner.options.connect_timeout,
                )
                .await
            {
                Ok(conn) => {
                    let mut guard = self.inner.pool.lock().await;
                    let pool = &mut *guard;
                    if pool.closed {
                        return Err(ConnectorError::SessionClosed);
                    }
                    if let Some(slot) =
                        pool.slots.iter_mut().find(|s| s.endpoint == endpoint)
                    {
                        slot.borrowed += 1;
                    }
                    drop(guard);
                    return Ok(self.handle(endpoint, conn));
                }
                Err(WireError::Auth(message)) => {
                    return Err(ConnectorError::Authentication(message));
                }
                Err(e) => {
                    warn!("dial of {} failed: {}", endpoint, e);
                    self.demote(&endpoint).await;
                    last_error = Some(e);
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "pool has no endpoints".to_string());
        Err(ConnectorError::Connectivity(detail))
    }

    /// Return a handle to the pool for reuse.
    ///
    /// If the endpoint's slot already holds an idle connection (or the
    /// session closed meanwhile), the physical connection is dropped.
    pub async fn release(&self, mut handle: ConnectionHandle) {
        let Some(conn) = handle.conn.take() else {
            return;
        };
        let mut guard = self.inner.pool.lock().await;
        let pool = &mut *guard;
        let closed = pool.closed;
        if let Some(slot) = pool
            .slots
            .iter_mut()
            .find(|s| s.endpoint == handle.endpoint)
        {
            slot.borrowed = slot.borrowed.saturating_sub(1);
            if !closed && slot.idle.is_none() {
                slot.idle = Some(IdleConnection {
                    conn,
                    verified_at: Instant::now(),
                });
            }
        }
    }

    /// Discard a connection that failed mid-query.
    ///
    /// The endpoint is demoted to the back of the priority order and a
    /// background reconnect with bounded backoff restores capacity
    /// without blocking the caller.
    pub async fn mark_unhealthy(&self, mut handle: ConnectionHandle) {
        let endpoint = handle.endpoint.clone();
        drop(handle.conn.take());
        warn!("connection to {} marked unhealthy", endpoint);

        {
            let mut guard = self.inner.pool.lock().await;
            let pool = &mut *guard;
            if let Some(pos) = pool.slots.iter().position(|s| s.endpoint == endpoint) {
                pool.slots[pos].borrowed = pool.slots[pos].borrowed.saturating_sub(1);
                if pos + 1 < pool.slots.len() {
                    let slot = pool.slots.remove(pos);
                    pool.slots.push(slot);
                    debug!("demoted {}", endpoint);
                }
            }
            if pool.closed {
                return;
            }
        }

        self.spawn_reconnect(endpoint);
    }

    /// Release all connections. Idempotent; later borrows fail with
    /// `SessionClosed`. Other sessions are unaffected.
    pub async fn close(&self) {
        let mut guard = self.inner.pool.lock().await;
        if guard.closed {
            return;
        }
        guard.closed = true;
        for slot in &mut guard.slots {
            slot.idle = None;
        }
        info!("session closed");
    }

    fn handle(&self, endpoint: Endpoint, conn: Box<dyn Connection>) -> ConnectionHandle {
        ConnectionHandle {
            session: self.clone(),
            endpoint,
            conn: Some(conn),
        }
    }

    /// Dial endpoints that have no connection yet, off the caller's path.
    fn spawn_prefill(&self) {
        let session = self.clone();
        tokio::spawn(async move {
            let targets: Vec<Endpoint> = {
                let pool = session.inner.pool.lock().await;
                if pool.closed {
                    return;
                }
                pool.slots
                    .iter()
                    .filter(|s| s.idle.is_none() && s.borrowed == 0)
                    .map(|s| s.endpoint.clone())
                    .collect()
            };
            for endpoint in targets {
                match session
                    .inner
                    .dialer
                    .dial(
                        &endpoint,
                        &session.inner.credentials,
                        session.inner.options.connect_timeout,
                    )
                    .await
                {
                    Ok(conn) => session.adopt_idle(&endpoint, conn).await,
                    Err(e) => debug!("prefill dial of {} failed: {}", endpoint, e),
                }
            }
        });
    }

    fn spawn_reconnect(&self, endpoint: Endpoint) {
        let session = self.clone();
        tokio::spawn(async move {
            let inner = &session.inner;
            let result = retry_with_backoff(
                || inner.dialer.dial(&endpoint, &inner.credentials, inner.options.connect_timeout),
                inner.options.reconnect.clone(),
            )
            .await;

            match result {
                Ok(conn) => {
                    session.adopt_idle(&endpoint, conn).await;
                    info!("restored connection to {}", endpoint);
                }
                Err(e) => warn!("reconnect to {} failed: {}", endpoint, e),
            }
        });
    }

    /// Park a freshly dialed connection in its endpoint's idle slot,
    /// unless the session closed or the slot filled meanwhile.
    async fn adopt_idle(&self, endpoint: &Endpoint, conn: Box<dyn Connection>) {
        let mut guard = self.inner.pool.lock().await;
        let pool = &mut *guard;
        if pool.closed {
            return;
        }
        if let Some(slot) = pool.slots.iter_mut().find(|s| &s.endpoint == endpoint) {
            if slot.idle.is_none() {
                slot.idle = Some(IdleConnection {
                    conn,
                    verified_at: Instant::now(),
                });
            }
        }
    }

    async fn forget_lease(&self, endpoint: &Endpoint) {
        let mut pool = self.inner.pool.lock().await;
        if let Some(slot) = pool.slots.iter_mut().find(|s| &s.endpoint == endpoint) {
            slot.borrowed = slot.borrowed.saturating_sub(1);
        }
    }

    async fn demote(&self, endpoint: &Endpoint) {
        let mut pool = self.inner.pool.lock().await;
        if let Some(pos) = pool.slots.iter().position(|s| &s.endpoint == endpoint) {
            if pos + 1 < pool.slots.len() {
                let slot = pool.slots.remove(pos);
                pool.slots.push(slot);
                debug!("demoted {}", endpoint);
            }
        }
    }
}

/// An exclusively-owned lease on one physical connection.
///
/// Handles are never shared between concurrent queries. Completion paths:
/// [`Session::release`] returns the connection for reuse,
/// [`Session::mark_unhealthy`] discards it, and plain `drop` (an
/// abandoned request) discards the connection and frees the lease, so an
/// abandoned handle never stays "borrowed".
pub struct ConnectionHandle {
    session: Session,
    endpoint: Endpoint,
    conn: Option<Box<dyn Connection>>,
}

impl ConnectionHandle {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Execute one SQL statement on the leased connection.
    pub async fn execute(&mut self, sql: &str) -> Result<ResultSet, WireError> {
        match self.conn.as_mut() {
            Some(conn) => conn.execute(sql).await,
            None => Err(WireError::Network(
                "connection handle already released".to_string(),
            )),
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if self.conn.take().is_some() {
            let session = self.session.clone();
            let endpoint = self.endpoint.clone();
            if let Ok(rt) = tokio::runtime::Handle::try_current() {
                rt.spawn(async move { session.forget_lease(&endpoint).await });
            }
        }
    }
}
