//! MySQL status collector.
//!
//! One run opens a single connection, reads the server version and collects
//! a fixed, ordered set of metric groups into a flat [`SampleMap`].
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      MySqlCollector                        │
//! │  preliminaries ─► connect ─► SELECT VERSION() ─► groups    │
//! │                                      │             │       │
//! │                               ServerVersion ──► catalog    │
//! │                                                    │       │
//! │                     ┌─────────────┐         SessionGuard   │
//! │                     │  Connector  │ (trait) ◄──────┘       │
//! │                     └──────┬──────┘                        │
//! └────────────────────────────┼───────────────────────────────┘
//!                    ┌─────────┴─────────┐
//!             ┌──────▼───────┐    ┌──────▼───────┐
//!             │ SqlxConnector│    │ MockConnector│
//!             │  (MySQL)     │    │  (Testing)   │
//!             └──────────────┘    └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use myglot::collector::{DriverCapability, MySqlCollector, RunOutcome};
//! use myglot::collector::mock::MockConnector;
//! use myglot::config::RawConfig;
//!
//! let raw = RawConfig {
//!     mysql_server: Some("localhost".to_string()),
//!     mysql_user: Some("monitor".to_string()),
//!     mysql_pass: Some("secret".to_string()),
//!     ..RawConfig::default()
//! };
//! let mut collector = MySqlCollector::new(DriverCapability::available(MockConnector::mysql80()));
//! let outcome = collector.run(&raw).unwrap();
//! assert!(matches!(outcome, RunOutcome::Collected(_)));
//! ```

pub mod groups;
pub mod mock;
mod mysql_driver;
mod pipeline;
pub mod traits;
pub mod version;

pub use groups::{FailurePolicy, MetricGroup, catalog};
pub use mysql_driver::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_QUERY_TIMEOUT, SqlxConnector};
pub use pipeline::{CollectMode, GroupFailure, MySqlCollector, RunOutcome, SampleMap, SampleValue};
pub use traits::{Connector, DriverCapability, MetricValue, Query, QueryError, Session};
pub use version::{ServerVersion, VersionParseError};

/// Error type for a failed collection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectError {
    /// The query execution capability could not be loaded.
    DriverUnavailable(String),
    /// Connection failed (authentication, network, timeout).
    Connection(String),
    /// `SELECT VERSION()` failed or returned no row.
    Version(QueryError),
    /// Version string could not be parsed.
    VersionParse(VersionParseError),
    /// Query of a fatal metric group failed.
    Query {
        group: &'static str,
        key: &'static str,
        error: QueryError,
    },
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::DriverUnavailable(msg) => write!(f, "MySQL driver unavailable: {}", msg),
            CollectError::Connection(msg) => write!(f, "MySQL connection error: {}", msg),
            CollectError::Version(e) => {
                write!(f, "MySQL query error when getting version: {}", e)
            }
            CollectError::VersionParse(e) => write!(f, "MySQL version not understood: {}", e),
            CollectError::Query { group, key, error } => write!(
                f,
                "MySQL query error when getting {} ({}): {}",
                key, group, error
            ),
        }
    }
}

impl std::error::Error for CollectError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_group_and_driver_message() {
        let err = CollectError::Query {
            group: "buffer_pool",
            key: "buffer_pool_pages_free",
            error: QueryError::Driver("1146: Table doesn't exist".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("buffer_pool_pages_free"));
        assert!(msg.contains("buffer_pool"));
        assert!(msg.contains("1146: Table doesn't exist"));
    }
}
