//! PostgreSQL wire implementation of the dialer/connection seam.
//!
//! YugabyteDB speaks the PostgreSQL protocol, so one implementation
//! covers every node flavor the cluster can present.

use super::{Connection, Dialer, WireError};
use crate::endpoint::{Credentials, Endpoint};
use crate::result_set::{ResultSet, Value};
use async_trait::async_trait;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::types::Type;
use tokio_postgres::{Column, NoTls, Row};
use tracing::debug;

/// Opens plain-TCP PostgreSQL connections.
pub struct PgDialer;

#[async_trait]
impl Dialer for PgDialer {
    async fn dial(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, WireError> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(endpoint.host())
            .port(endpoint.port())
            .dbname(&credentials.database)
            .user(&credentials.username)
            .connect_timeout(timeout)
            .application_name("sql-gateway");
        if !credentials.password.is_empty() {
            config.password(&credentials.password);
        }

        let (client, connection) = tokio::time::timeout(timeout, config.connect(NoTls))
            .await
            .map_err(|_| WireError::Timeout)?
            .map_err(classify)?;

        // The driver task owns the socket; it resolves when the client is
        // dropped or the connection breaks.
        let label = endpoint.to_string();
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("connection driver for {} terminated: {}", label, e);
            }
        });

        debug!("dialed {}", endpoint);
        Ok(Box::new(PgConnection { client, driver }))
    }
}

/// One live PostgreSQL connection plus its driver task.
pub struct PgConnection {
    client: tokio_postgres::Client,
    driver: JoinHandle<()>,
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[async_trait]
impl Connection for PgConnection {
    async fn execute(&mut self, sql: &str) -> Result<ResultSet, WireError> {
        if self.client.is_closed() {
            return Err(WireError::Network("connection is closed".to_string()));
        }

        // Preparing first captures the column schema even when the
        // statement returns zero rows (DDL/DML).
        let statement = self.client.prepare(sql).await.map_err(classify)?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let rows = self.client.query(&statement, &[]).await.map_err(classify)?;

        let mut result = ResultSet::new(columns);
        for row in &rows {
            result.push_row(decode_row(row)?);
        }
        Ok(result)
    }

    async fn ping(&mut self) -> Result<(), WireError> {
        if self.client.is_closed() {
            return Err(WireError::Network("connection is closed".to_string()));
        }
        self.client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

/// Map a driver error onto the wire taxonomy.
///
/// SQLSTATE class 28 (invalid authorization) and 3D (unknown database)
/// are credential/catalog problems no alternate endpoint can fix, so
/// they classify as `Auth`. Any other database-reported error is a
/// statement failure; errors without a database payload are transport
/// failures.
fn classify(err: tokio_postgres::Error) -> WireError {
    if let Some(db) = err.as_db_error() {
        let code = db.code().code();
        if code.starts_with("28") || code.starts_with("3D") {
            WireError::Auth(db.message().to_string())
        } else {
            WireError::Statement(db.message().to_string())
        }
    } else {
        WireError::Network(err.to_string())
    }
}

fn decode_row(row: &Row) -> Result<Vec<Value>, WireError> {
    let mut values = Vec::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        values.push(decode_value(row, idx, column)?);
    }
    Ok(values)
}

/// Decode one column into the canonical scalar representation.
///
/// See the type mapping table in [`crate::result_set`]. Anything outside
/// the table surfaces as a statement error naming the column and type.
fn decode_value(row: &Row, idx: usize, column: &Column) -> Result<Value, WireError> {
    let ty = column.type_();
    let decoded: Result<Value, tokio_postgres::Error> = match *ty {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .map(|v| v.map(Value::Bool).into()),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .map(|v| v.map(|n| Value::Int(n.into())).into()),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .map(|v| v.map(|n| Value::Int(n.into())).into()),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .map(|v| v.map(Value::Int).into()),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .map(|v| v.map(|n| Value::Float(n.into())).into()),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .map(|v| v.map(Value::Float).into()),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => row
            .try_get::<_, Option<String>>(idx)
            .map(|v| v.map(Value::Text).into()),
        Type::TIMESTAMP => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .map(|v| {
                v.map(|t| Value::Text(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
                    .into()
            }),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map(|v| v.map(|t| Value::Text(t.to_rfc3339())).into()),
        Type::DATE => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .map(|v| v.map(|d| Value::Text(d.to_string())).into()),
        Type::TIME => row
            .try_get::<_, Option<chrono::NaiveTime>>(idx)
            .map(|v| v.map(|t| Value::Text(t.to_string())).into()),
        Type::UUID => row
            .try_get::<_, Option<uuid::Uuid>>(idx)
            .map(|v| v.map(|u| Value::Text(u.to_string())).into()),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .map(|v| v.map(|j| Value::Text(j.to_string())).into()),
        _ => {
            return Err(WireError::Statement(format!(
                "unsupported column type {} for column '{}'",
                ty,
                column.name()
            )));
        }
    };

    decoded.map_err(|e| {
        WireError::Statement(format!(
            "failed to decode column '{}': {}",
            column.name(),
            e
        ))
    })
}
