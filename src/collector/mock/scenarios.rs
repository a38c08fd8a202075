//! Pre-built mock server scenarios for testing.
//!
//! These scenarios answer every query the collector issues for a given
//! server flavour.

use super::connector::{MockConnector, MockRow};
use crate::collector::traits::MetricValue;

/// Status counters shared by every scenario.
const COMMON_STATUS: &[(&str, &str)] = &[
    ("Slow_queries", "3"),
    ("Queries", "1048576"),
    ("Threads_connected", "12"),
    ("Threads_running", "2"),
    ("Innodb_buffer_pool_pages_total", "8191"),
    ("Innodb_buffer_pool_pages_free", "6930"),
    ("Innodb_buffer_pool_pages_dirty", "4"),
    ("Innodb_buffer_pool_pages_data", "1257"),
    ("Qcache_hits", "0"),
    ("Qcache_free_memory", "1031832"),
    ("Qcache_not_cached", "48"),
    ("Qcache_queries_in_cache", "0"),
    ("Aborted_clients", "1"),
    ("Aborted_connects", "7"),
    ("Created_tmp_tables", "322"),
    ("Created_tmp_disk_tables", "15"),
    ("Select_full_join", "2"),
    ("Slave_running", "OFF"),
];

impl MockConnector {
    /// Primary running MySQL 5.7 with no replication configured.
    pub fn mysql57() -> Self {
        Self::standard("5.7.26-log")
    }

    /// Primary running MySQL 8.0.
    pub fn mysql80() -> Self {
        Self::standard("8.0.31")
    }

    /// Pre-5.0 server; slow queries come from session status.
    pub fn legacy() -> Self {
        Self::standard("4.1.22-standard-log")
    }

    /// MySQL 5.7 replica lagging 12 seconds behind its source.
    pub fn replica() -> Self {
        Self::standard("5.7.26-log")
            .with_status("Slave_running", "ON")
            .with_row(
                "SHOW SLAVE STATUS",
                MockRow::new()
                    .column("Slave_IO_State", "Waiting for master to send event")
                    .column("Master_Host", "10.0.0.1")
                    .column("Slave_IO_Running", "Yes")
                    .column("Slave_SQL_Running", "Yes")
                    .column("Seconds_Behind_Master", MetricValue::UInt(12)),
            )
    }

    /// Looks up a scenario by name (`mysql57`, `mysql80`, `legacy`, `replica`).
    pub fn scenario(name: &str) -> Option<Self> {
        match name {
            "mysql57" => Some(Self::mysql57()),
            "mysql80" => Some(Self::mysql80()),
            "legacy" => Some(Self::legacy()),
            "replica" => Some(Self::replica()),
            _ => None,
        }
    }

    fn standard(version: &str) -> Self {
        COMMON_STATUS
            .iter()
            .fold(Self::new(version), |mock, (name, value)| {
                mock.with_status(name, value)
            })
            .with_variable("max_connections", "151")
    }
}
