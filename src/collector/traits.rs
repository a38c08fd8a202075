//! Abstractions over the MySQL driver to enable testing and mocking.
//!
//! The `Connector` trait opens sessions; a `Session` answers single-row,
//! single-column queries. The collector works with both the real sqlx-backed
//! driver and the scripted `MockConnector` used in tests.

use std::time::Duration;

use serde::Serialize;

use crate::config::MySqlConfig;

/// Column to extract from the single result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Positional column, e.g. `0` for `SELECT VERSION()`.
    Index(usize),
    /// Named column, e.g. `Value` for `SHOW STATUS LIKE ...`.
    Named(&'static str),
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Column::Index(i) => write!(f, "#{}", i),
            Column::Named(name) => f.write_str(name),
        }
    }
}

/// A text query expected to return exactly one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub sql: String,
    pub column: Column,
}

impl Query {
    /// `SELECT VERSION()`, first column.
    pub fn version() -> Self {
        Self {
            sql: "SELECT VERSION()".to_string(),
            column: Column::Index(0),
        }
    }

    /// `SHOW STATUS LIKE '<name>'` (session scope), `Value` column.
    pub fn status(name: &str) -> Self {
        Self::show("SHOW STATUS", name)
    }

    /// `SHOW GLOBAL STATUS LIKE '<name>'`, `Value` column.
    pub fn global_status(name: &str) -> Self {
        Self::show("SHOW GLOBAL STATUS", name)
    }

    /// `SHOW VARIABLES LIKE '<name>'`, `Value` column.
    pub fn variable(name: &str) -> Self {
        Self::show("SHOW VARIABLES", name)
    }

    /// `SHOW SLAVE STATUS`, the given column.
    pub fn slave_status(column: &'static str) -> Self {
        Self {
            sql: "SHOW SLAVE STATUS".to_string(),
            column: Column::Named(column),
        }
    }

    fn show(prefix: &str, name: &str) -> Self {
        Self {
            sql: format!("{} LIKE '{}'", prefix, name),
            column: Column::Named("Value"),
        }
    }
}

/// Scalar value passed through from the driver uninterpreted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Null,
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::UInt(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
            MetricValue::Null => f.write_str("NULL"),
        }
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Int(value)
    }
}

/// Failure of a single query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Driver-level error (syntax, permissions, lost connection).
    Driver(String),
    /// Query succeeded but returned no row.
    NoRow,
    /// Row does not contain the requested column, or it cannot be decoded.
    MissingColumn(String),
    /// Query did not complete within the configured timeout.
    Timeout(Duration),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Driver(msg) => f.write_str(msg),
            QueryError::NoRow => write!(f, "query returned no row"),
            QueryError::MissingColumn(col) => write!(f, "column {} not in result", col),
            QueryError::Timeout(d) => write!(f, "query timed out after {:?}", d),
        }
    }
}

impl std::error::Error for QueryError {}

/// One live database session.
pub trait Session {
    /// Runs `query` and returns the requested column of the first row.
    ///
    /// Returns `Ok(None)` when the query produced no rows.
    fn fetch_one(&mut self, query: &Query) -> Result<Option<MetricValue>, QueryError>;

    /// Closes the session. Called exactly once per session.
    fn close(&mut self);
}

/// Opens sessions to a MySQL server.
pub trait Connector {
    /// Opens exactly one blocking session.
    ///
    /// On failure returns the driver's reason (authentication, network,
    /// timeout) for logging.
    fn connect(&self, config: &MySqlConfig) -> Result<Box<dyn Session>, String>;
}

/// Query execution capability handed to the collector at construction.
pub enum DriverCapability {
    Available(Box<dyn Connector>),
    /// The driver could not be initialized; every run fails with this reason.
    Unavailable(String),
}

impl DriverCapability {
    pub fn available(connector: impl Connector + 'static) -> Self {
        DriverCapability::Available(Box::new(connector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_queries_use_value_column() {
        let q = Query::global_status("Slow_queries");
        assert_eq!(q.sql, "SHOW GLOBAL STATUS LIKE 'Slow_queries'");
        assert_eq!(q.column, Column::Named("Value"));

        assert_eq!(
            Query::status("Slow_queries").sql,
            "SHOW STATUS LIKE 'Slow_queries'"
        );
        assert_eq!(
            Query::variable("max_connections").sql,
            "SHOW VARIABLES LIKE 'max_connections'"
        );
    }

    #[test]
    fn slave_status_extracts_named_column() {
        let q = Query::slave_status("Seconds_Behind_Master");
        assert_eq!(q.sql, "SHOW SLAVE STATUS");
        assert_eq!(q.column, Column::Named("Seconds_Behind_Master"));
    }

    #[test]
    fn metric_values_serialize_untagged() {
        let values = vec![
            MetricValue::Text("42".to_string()),
            MetricValue::Int(-1),
            MetricValue::UInt(7),
            MetricValue::Null,
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"["42",-1,7,null]"#);
    }
}
