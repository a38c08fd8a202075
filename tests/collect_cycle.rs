//! End-to-end collection cycles against the scripted mock server.

use myglot::collector::mock::MockConnector;
use myglot::collector::{
    CollectError, CollectMode, DriverCapability, MySqlCollector, QueryError, RunOutcome,
};
use myglot::config::RawConfig;

fn raw(slave: bool) -> RawConfig {
    RawConfig {
        mysql_server: Some("127.0.0.1".to_string()),
        mysql_port: Some("3306".to_string()),
        mysql_user: Some("monitor".to_string()),
        mysql_pass: Some("secret".to_string()),
        mysql_slave: slave.then(|| "true".to_string()),
    }
}

fn keys(outcome: &RunOutcome) -> Vec<String> {
    outcome
        .sample()
        .expect("sample")
        .keys()
        .map(str::to_string)
        .collect()
}

#[test]
fn consecutive_runs_produce_same_keys() {
    let mock = MockConnector::replica();
    let mut collector = MySqlCollector::new(DriverCapability::available(mock.clone()));

    let first = collector.run(&raw(true)).unwrap();
    let second = collector.run(&raw(true)).unwrap();

    assert_eq!(keys(&first), keys(&second));
    assert!(keys(&first).contains(&"seconds_behind_master".to_string()));
    assert_eq!(mock.connects(), 2);
    assert_eq!(mock.closes(), 2);
}

#[test]
fn connection_closed_once_per_run_for_every_outcome() {
    let mock = MockConnector::mysql57()
        .fail_on("SHOW STATUS LIKE 'Aborted_clients'", "Lost connection to MySQL server")
        .without_row("SHOW SLAVE STATUS");
    let mut collector = MySqlCollector::new(DriverCapability::available(mock.clone()));

    // Fatal failure.
    assert!(collector.run(&raw(false)).is_err());
    assert_eq!(mock.closes(), 1);

    // Skipped: no connection at all.
    assert_eq!(
        collector.run(&RawConfig::default()).unwrap(),
        RunOutcome::Skipped
    );
    assert_eq!(mock.connects(), 1);
    assert_eq!(mock.closes(), 1);

    // Partial mode with a soft failure too.
    let mut partial = MySqlCollector::new(DriverCapability::available(mock.clone()))
        .with_mode(CollectMode::Partial);
    assert!(matches!(
        partial.run(&raw(true)).unwrap(),
        RunOutcome::Partial { .. }
    ));
    assert_eq!(mock.connects(), 2);
    assert_eq!(mock.closes(), 2);
}

#[test]
fn fatal_failure_after_successful_groups_returns_no_metrics() {
    let mock = MockConnector::mysql80()
        .fail_on("SHOW STATUS LIKE 'Innodb_buffer_pool_pages_total'", "Unknown table");
    let mut collector = MySqlCollector::new(DriverCapability::available(mock.clone()));

    let err = collector.run(&raw(false)).unwrap_err();
    assert_eq!(
        err,
        CollectError::Query {
            group: "buffer_pool",
            key: "buffer_pool_pages_total",
            error: QueryError::Driver("Unknown table".to_string()),
        }
    );
    assert!(mock.was_issued("SHOW STATUS LIKE 'Threads_connected'"));
    assert_eq!(
        collector.last_error(),
        Some(err.to_string().as_str())
    );
}

#[test]
fn version_query_comes_first() {
    let mock = MockConnector::mysql80();
    let mut collector = MySqlCollector::new(DriverCapability::available(mock.clone()));
    collector.run(&raw(false)).unwrap();

    let issued = mock.issued();
    assert_eq!(issued[0], "SELECT VERSION()");
    assert_eq!(issued[1], "SHOW GLOBAL STATUS LIKE 'Slow_queries'");
    assert_eq!(issued.last().map(String::as_str), Some("SHOW STATUS LIKE 'Slave_running'"));
}

#[test]
fn missing_version_row_is_fatal() {
    let mock = MockConnector::mysql80().without_row("SELECT VERSION()");
    let mut collector = MySqlCollector::new(DriverCapability::available(mock.clone()));
    assert_eq!(
        collector.run(&raw(false)).unwrap_err(),
        CollectError::Version(QueryError::NoRow)
    );
    assert_eq!(mock.closes(), 1);
}

#[test]
fn sample_json_matches_agent_keys() {
    let mut collector =
        MySqlCollector::new(DriverCapability::available(MockConnector::mysql57()));
    let outcome = collector.run(&raw(false)).unwrap();
    let json = serde_json::to_value(outcome.sample().unwrap()).unwrap();

    assert_eq!(json["version"], serde_json::json!(["5", "7", "26"]));
    assert_eq!(json["created_tmp_tables_on_disk"], serde_json::json!("15"));
    assert_eq!(json["qcache_in_cache"], serde_json::json!("0"));
}
