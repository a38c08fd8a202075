//! sqlx-backed MySQL driver.
//!
//! sqlx is async; the collector is not. Each connector owns a private
//! current-thread tokio runtime and blocks on it for every call, so a run
//! stays strictly sequential. Connect and every query are bounded by a
//! timeout.

use std::sync::Arc;
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{ColumnIndex, ConnectOptions, Connection, Executor, Row};
use tokio::runtime::Runtime;
use tracing::debug;

use super::traits::{Column, Connector, DriverCapability, MetricValue, Query, QueryError, Session};
use crate::config::MySqlConfig;

/// Default bound for opening a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound for a single query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Connector using sqlx's MySQL driver over TCP.
pub struct SqlxConnector {
    runtime: Arc<Runtime>,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl SqlxConnector {
    /// Creates a connector with its own runtime.
    ///
    /// Fails if the runtime cannot be built.
    pub fn new(connect_timeout: Duration, query_timeout: Duration) -> Result<Self, String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("cannot start driver runtime: {}", e))?;

        Ok(Self {
            runtime: Arc::new(runtime),
            connect_timeout,
            query_timeout,
        })
    }

    /// Builds the driver capability, `Unavailable` if the driver cannot start.
    pub fn capability(connect_timeout: Duration, query_timeout: Duration) -> DriverCapability {
        match Self::new(connect_timeout, query_timeout) {
            Ok(connector) => DriverCapability::available(connector),
            Err(reason) => DriverCapability::Unavailable(reason),
        }
    }
}

impl Connector for SqlxConnector {
    fn connect(&self, config: &MySqlConfig) -> Result<Box<dyn Session>, String> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .disable_statement_logging();

        let timeout = self.connect_timeout;
        let conn = self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, options.connect()).await })
            .map_err(|_| format!("connection timed out after {:?}", timeout))?
            .map_err(|e| format_mysql_error(&e))?;

        debug!(host = %config.host, port = config.port, "mysql: connected");

        Ok(Box::new(SqlxSession {
            runtime: Arc::clone(&self.runtime),
            conn: Some(conn),
            query_timeout: self.query_timeout,
        }))
    }
}

struct SqlxSession {
    runtime: Arc<Runtime>,
    conn: Option<MySqlConnection>,
    query_timeout: Duration,
}

impl Session for SqlxSession {
    fn fetch_one(&mut self, query: &Query) -> Result<Option<MetricValue>, QueryError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| QueryError::Driver("session is closed".to_string()))?;

        let timeout = self.query_timeout;
        // Text protocol: SHOW statements are not all preparable.
        let row = self
            .runtime
            .block_on(async {
                let fetch = Executor::fetch_optional(&mut *conn, sqlx::raw_sql(&query.sql));
                tokio::time::timeout(timeout, fetch).await
            })
            .map_err(|_| QueryError::Timeout(timeout))?
            .map_err(query_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value = match query.column {
            Column::Index(i) => decode_column(&row, i),
            Column::Named(name) => decode_column(&row, name),
        }
        .map_err(|e| QueryError::MissingColumn(format!("{} ({})", query.column, e)))?;

        Ok(Some(value))
    }

    fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let timeout = self.query_timeout;
        match self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, conn.close()).await })
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %format_mysql_error(&e), "mysql: close failed"),
            Err(_) => debug!("mysql: close timed out"),
        }
    }
}

/// Decodes a column without interpreting it.
///
/// Status and variable values arrive as strings; slave status columns may
/// be integers or NULL.
fn decode_column<I>(row: &MySqlRow, index: I) -> Result<MetricValue, sqlx::Error>
where
    I: ColumnIndex<MySqlRow> + Copy,
{
    if let Ok(v) = row.try_get::<Option<String>, I>(index) {
        return Ok(v.map_or(MetricValue::Null, MetricValue::Text));
    }
    if let Ok(v) = row.try_get::<Option<i64>, I>(index) {
        return Ok(v.map_or(MetricValue::Null, MetricValue::Int));
    }
    if let Ok(v) = row.try_get::<Option<u64>, I>(index) {
        return Ok(v.map_or(MetricValue::Null, MetricValue::UInt));
    }
    if let Ok(v) = row.try_get::<Option<f64>, I>(index) {
        return Ok(v.map_or(MetricValue::Null, MetricValue::Float));
    }
    row.try_get::<Option<Vec<u8>>, I>(index).map(|v| {
        v.map_or(MetricValue::Null, |bytes| {
            MetricValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        })
    })
}

/// Maps a driver error; an empty result is `NoRow`, not a driver failure.
fn query_error(e: sqlx::Error) -> QueryError {
    match e {
        sqlx::Error::RowNotFound => QueryError::NoRow,
        other => QueryError::Driver(format_mysql_error(&other)),
    }
}

/// Formats a MySQL error message for logging.
pub(crate) fn format_mysql_error(e: &sqlx::Error) -> String {
    if let Some(db_error) = e.as_database_error() {
        match db_error.code() {
            Some(code) => format!("{}: {}", code, db_error.message()),
            None => db_error.message().to_string(),
        }
    } else {
        let msg = e.to_string();
        if msg.contains("Connection refused") {
            "connection refused".to_string()
        } else {
            msg
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_shortened() {
        let err = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Connection refused (os error 111)",
        ));
        assert_eq!(format_mysql_error(&err), "connection refused");
    }

    #[test]
    fn empty_result_maps_to_no_row() {
        assert_eq!(query_error(sqlx::Error::RowNotFound), QueryError::NoRow);
    }

    #[test]
    fn driver_errors_keep_reason() {
        let err = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Connection refused (os error 111)",
        ));
        assert_eq!(
            query_error(err),
            QueryError::Driver("connection refused".to_string())
        );
    }

    #[test]
    fn other_errors_keep_message() {
        let err = sqlx::Error::PoolTimedOut;
        assert_eq!(format_mysql_error(&err), sqlx::Error::PoolTimedOut.to_string());
    }

    #[test]
    fn capability_is_available_with_runtime() {
        let capability = SqlxConnector::capability(DEFAULT_CONNECT_TIMEOUT, DEFAULT_QUERY_TIMEOUT);
        assert!(matches!(capability, DriverCapability::Available(_)));
    }
}
