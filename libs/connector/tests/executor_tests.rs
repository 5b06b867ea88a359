mod common;

use common::{FakeCluster, credentials, endpoints, reachable};
use connector::{
    ConnectorError, ExecutorOptions, QueryExecutor, Session, SessionManager, SessionOptions, Value,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;

async fn connect(cluster: Arc<FakeCluster>, hosts: &[&str]) -> Session {
    SessionManager::new(cluster, SessionOptions::default())
        .connect(&endpoints(hosts), credentials())
        .await
        .unwrap()
}

fn executor() -> QueryExecutor {
    QueryExecutor::new(ExecutorOptions::default())
}

#[tokio::test]
async fn test_query_returns_rows_from_preferred_endpoint() {
    let (up1, _) = reachable();
    let (up2, _) = reachable();
    let cluster = Arc::new(FakeCluster::new(vec![("n1", up1), ("n2", up2)]));
    let session = connect(cluster, &["n1", "n2"]).await;

    let rs = executor().execute(&session, "SELECT host").await.unwrap();
    assert_eq!(rs.columns(), &["host".to_string()]);
    assert_eq!(
        rs.rows().next().unwrap().get("host"),
        Some(&Value::Text("n1".to_string()))
    );
}

#[tokio::test]
async fn test_connection_drop_mid_query_retries_on_another_endpoint() {
    let (up1, down1) = reachable();
    let (up2, _) = reachable();
    let cluster = Arc::new(FakeCluster::new(vec![("n1", up1), ("n2", up2)]));
    let session = connect(cluster, &["n1", "n2"]).await;

    // The preferred node dies after the session is established: the
    // first attempt fails in-flight, the retry lands elsewhere and the
    // dead endpoint loses its preferred spot.
    down1.store(true, Ordering::SeqCst);
    let rs = executor().execute(&session, "SELECT host").await.unwrap();
    assert_eq!(
        rs.rows().next().unwrap().get("host"),
        Some(&Value::Text("n2".to_string()))
    );
    assert_eq!(
        session.preferred_endpoint().await.map(|e| e.host().to_string()),
        Some("n2".to_string())
    );
}

#[tokio::test]
async fn test_malformed_sql_fails_once_and_keeps_the_connection() {
    let (up, _) = reachable();
    let cluster = Arc::new(FakeCluster::new(vec![("n1", up)]));
    let session = connect(cluster.clone(), &["n1"]).await;

    let result = executor().execute(&session, "SELEC 1").await;
    match result {
        Err(ConnectorError::Query { message }) => {
            assert!(message.contains("syntax error"));
        }
        other => panic!("expected query error, got {:?}", other.map(|_| ())),
    }

    // No retry happened (the only dial was the session's own) and the
    // healthy connection went back to the pool.
    assert_eq!(cluster.dial_count("n1"), 1);
    assert_eq!(session.pooled_connections().await, 1);
}

#[tokio::test]
async fn test_whole_cluster_down_surfaces_connectivity_error() {
    let (up, down) = reachable();
    let cluster = Arc::new(FakeCluster::new(vec![("n1", up)]));
    let session = connect(cluster, &["n1"]).await;

    down.store(true, Ordering::SeqCst);
    let result = executor().execute(&session, "SELECT host").await;
    assert!(matches!(
        result,
        Err(ConnectorError::Connectivity(_) | ConnectorError::Execution { .. })
    ));
}

#[tokio::test]
async fn test_query_on_closed_session() {
    let (up, _) = reachable();
    let cluster = Arc::new(FakeCluster::new(vec![("n1", up)]));
    let session = connect(cluster, &["n1"]).await;

    session.close().await;
    let result = executor().execute(&session, "SELECT host").await;
    assert!(matches!(result, Err(ConnectorError::SessionClosed)));
}
