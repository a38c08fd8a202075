//! Metric group catalog.
//!
//! Groups are collected in the order returned by [`catalog`]. Each metric is
//! one query answered by exactly one row.

use super::traits::Query;
use super::version::ServerVersion;

/// What happens to the run when a group fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The whole run fails.
    Fatal,
    /// The failure is logged and the group's metrics are left out.
    Soft,
}

/// One sample key and the query that produces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    pub key: &'static str,
    pub query: Query,
}

/// Independently fetched cluster of related metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricGroup {
    pub name: &'static str,
    pub policy: FailurePolicy,
    pub metrics: Vec<MetricQuery>,
}

impl MetricGroup {
    fn fatal(name: &'static str, metrics: Vec<MetricQuery>) -> Self {
        Self {
            name,
            policy: FailurePolicy::Fatal,
            metrics,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.metrics.iter().map(|m| m.key)
    }
}

fn metric(key: &'static str, query: Query) -> MetricQuery {
    MetricQuery { key, query }
}

/// Builds the ordered group list for a server version.
///
/// The slow query counter uses `SHOW GLOBAL STATUS` when
/// [`ServerVersion::has_global_status`] holds. Replication lag is only
/// included in slave mode.
pub fn catalog(version: &ServerVersion, slave_mode: bool) -> Vec<MetricGroup> {
    let slow_queries = if version.has_global_status() {
        Query::global_status("Slow_queries")
    } else {
        Query::status("Slow_queries")
    };

    let mut groups = vec![
        MetricGroup::fatal("slow_queries", vec![metric("slow_queries", slow_queries)]),
        // Raw counter; rates are computed by the consumer.
        MetricGroup::fatal(
            "queries",
            vec![metric("queries", Query::global_status("Queries"))],
        ),
        MetricGroup::fatal(
            "connections",
            vec![
                metric("threads_connected", Query::status("Threads_connected")),
                metric("threads_running", Query::status("Threads_running")),
                metric("max_connections", Query::variable("max_connections")),
            ],
        ),
        MetricGroup::fatal(
            "buffer_pool",
            vec![
                metric(
                    "buffer_pool_pages_total",
                    Query::status("Innodb_buffer_pool_pages_total"),
                ),
                metric(
                    "buffer_pool_pages_free",
                    Query::status("Innodb_buffer_pool_pages_free"),
                ),
                metric(
                    "buffer_pool_pages_dirty",
                    Query::status("Innodb_buffer_pool_pages_dirty"),
                ),
                metric(
                    "buffer_pool_pages_data",
                    Query::status("Innodb_buffer_pool_pages_data"),
                ),
            ],
        ),
        MetricGroup::fatal(
            "query_cache",
            vec![
                metric("qcache_hits", Query::status("Qcache_hits")),
                metric("qcache_free_memory", Query::status("Qcache_free_memory")),
                metric("qcache_not_cached", Query::status("Qcache_not_cached")),
                metric("qcache_in_cache", Query::status("Qcache_queries_in_cache")),
            ],
        ),
        MetricGroup::fatal(
            "aborted",
            vec![
                metric("aborted_clients", Query::status("Aborted_clients")),
                metric("aborted_connects", Query::status("Aborted_connects")),
            ],
        ),
    ];

    if slave_mode {
        groups.push(MetricGroup {
            name: "replication_lag",
            policy: FailurePolicy::Soft,
            metrics: vec![metric(
                "seconds_behind_master",
                Query::slave_status("Seconds_Behind_Master"),
            )],
        });
    }

    groups.extend([
        MetricGroup::fatal(
            "temp_tables",
            vec![
                metric("created_tmp_tables", Query::global_status("Created_tmp_tables")),
                metric(
                    "created_tmp_tables_on_disk",
                    Query::global_status("Created_tmp_disk_tables"),
                ),
            ],
        ),
        MetricGroup::fatal(
            "join_efficiency",
            vec![metric("select_full_join", Query::global_status("Select_full_join"))],
        ),
        MetricGroup::fatal(
            "slave_running",
            vec![metric("slave_running", Query::status("Slave_running"))],
        ),
    ]);

    groups
}
