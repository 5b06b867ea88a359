//! In-memory fake cluster for exercising session and executor behavior
//! without a live database.
#![allow(dead_code)]

use async_trait::async_trait;
use connector::{Connection, Credentials, Dialer, Endpoint, ResultSet, Value, WireError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a fake node does with dials and queries.
#[derive(Clone)]
pub enum Behavior {
    /// Dials fail with a network error
    Unreachable,
    /// Dials fail with an authentication error
    AuthReject,
    /// Dials succeed while the node is up. Flipping `down` makes new
    /// dials fail and established connections start erroring, like a
    /// node going away mid-flight.
    Reachable { down: Arc<AtomicBool> },
}

pub fn reachable() -> (Behavior, Arc<AtomicBool>) {
    let down = Arc::new(AtomicBool::new(false));
    (Behavior::Reachable { down: down.clone() }, down)
}

pub struct FakeCluster {
    behaviors: HashMap<String, Behavior>,
    dials: Mutex<Vec<String>>,
}

impl FakeCluster {
    pub fn new(nodes: Vec<(&str, Behavior)>) -> Self {
        Self {
            behaviors: nodes
                .into_iter()
                .map(|(host, b)| (host.to_string(), b))
                .collect(),
            dials: Mutex::new(Vec::new()),
        }
    }

    /// How many times `host` has been dialed so far.
    pub fn dial_count(&self, host: &str) -> usize {
        self.dials
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.as_str() == host)
            .count()
    }
}

#[async_trait]
impl Dialer for FakeCluster {
    async fn dial(
        &self,
        endpoint: &Endpoint,
        _credentials: &Credentials,
        _timeout: Duration,
    ) -> Result<Box<dyn Connection>, WireError> {
        self.dials
            .lock()
            .unwrap()
            .push(endpoint.host().to_string());

        match self.behaviors.get(endpoint.host()) {
            Some(Behavior::Reachable { down }) => {
                if down.load(Ordering::SeqCst) {
                    Err(WireError::Network(format!("no route to {}", endpoint)))
                } else {
                    Ok(Box::new(FakeConnection {
                        host: endpoint.host().to_string(),
                        down: down.clone(),
                    }) as Box<dyn Connection>)
                }
            }
            Some(Behavior::AuthReject) => Err(WireError::Auth(
                "password authentication failed".to_string(),
            )),
            Some(Behavior::Unreachable) | None => {
                Err(WireError::Network(format!("no route to {}", endpoint)))
            }
        }
    }
}

/// A connection to one fake node. Queries answer with the serving host
/// so tests can observe routing.
pub struct FakeConnection {
    host: String,
    down: Arc<AtomicBool>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn execute(&mut self, sql: &str) -> Result<ResultSet, WireError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(WireError::Network("connection reset by peer".to_string()));
        }
        if sql.trim_start().to_ascii_uppercase().starts_with("SELEC ") {
            return Err(WireError::Statement(
                "syntax error at or near \"SELEC\"".to_string(),
            ));
        }
        let mut rs = ResultSet::new(vec!["host".to_string()]);
        rs.push_row(vec![Value::Text(self.host.clone())]);
        Ok(rs)
    }

    async fn ping(&mut self) -> Result<(), WireError> {
        if self.down.load(Ordering::SeqCst) {
            Err(WireError::Network("connection reset by peer".to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("yugabyte", "yugabyte", "yugabyte")
}

pub fn endpoints(hosts: &[&str]) -> Vec<Endpoint> {
    hosts.iter().map(|h| Endpoint::new(*h, 5433)).collect()
}

/// The host a handle's queries land on.
pub async fn served_by(handle: &mut connector::ConnectionHandle) -> String {
    let rs = handle.execute("SELECT host").await.unwrap();
    match rs.rows().next().unwrap().get("host") {
        Some(Value::Text(host)) => host.clone(),
        other => panic!("unexpected value: {:?}", other),
    }
}
