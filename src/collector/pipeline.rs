//! Collection run: preliminaries, connect, version check, metric groups.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, warn};

use super::CollectError;
use super::groups::{FailurePolicy, MetricGroup, catalog};
use super::traits::{DriverCapability, MetricValue, Query, QueryError, Session};
use super::version::{ServerVersion, VersionParseError};
use crate::config::{MySqlConfig, RawConfig};

/// Value stored in a [`SampleMap`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SampleValue {
    Metric(MetricValue),
    /// Server version components as decimal strings.
    Version(Vec<String>),
}

/// Flat metric name → value mapping produced by one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SampleMap(BTreeMap<String, SampleValue>);

impl SampleMap {
    pub fn insert(&mut self, key: impl Into<String>, value: SampleValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&SampleValue> {
        self.0.get(key)
    }

    /// Returns the metric stored under `key`, if it is not the version entry.
    pub fn metric(&self, key: &str) -> Option<&MetricValue> {
        match self.0.get(key) {
            Some(SampleValue::Metric(value)) => Some(value),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How fatal group failures are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollectMode {
    /// A fatal group failure discards everything collected so far.
    #[default]
    AllOrNothing,
    /// Fatal group failures are recorded and collection continues.
    Partial,
}

/// Fatal group that failed during a [`CollectMode::Partial`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFailure {
    pub group: &'static str,
    pub key: &'static str,
    pub error: QueryError,
}

/// Result of a run that did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Configuration is incomplete; nothing was collected. Not an error.
    Skipped,
    /// Every fatal group succeeded.
    Collected(SampleMap),
    /// Partial mode only: some fatal groups failed.
    Partial {
        sample: SampleMap,
        failures: Vec<GroupFailure>,
    },
}

impl RunOutcome {
    /// Returns the collected sample, if any.
    pub fn sample(&self) -> Option<&SampleMap> {
        match self {
            RunOutcome::Skipped => None,
            RunOutcome::Collected(sample) => Some(sample),
            RunOutcome::Partial { sample, .. } => Some(sample),
        }
    }
}

/// Owns a session for the duration of one run and closes it on drop.
struct SessionGuard {
    session: Box<dyn Session>,
}

impl SessionGuard {
    fn new(session: Box<dyn Session>) -> Self {
        Self { session }
    }

    /// Runs `query`; a query without rows is an error.
    fn fetch(&mut self, query: &Query) -> Result<MetricValue, QueryError> {
        self.session.fetch_one(query)?.ok_or(QueryError::NoRow)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
        debug!("mysql: connection closed");
    }
}

/// MySQL metrics collector.
///
/// Each call to [`MySqlCollector::run`] opens one connection, collects every
/// metric group in order and closes the connection before returning.
pub struct MySqlCollector {
    driver: DriverCapability,
    mode: CollectMode,
    last_error: Option<String>,
}

impl MySqlCollector {
    /// Creates a collector using the given driver capability.
    pub fn new(driver: DriverCapability) -> Self {
        Self {
            driver,
            mode: CollectMode::default(),
            last_error: None,
        }
    }

    /// Sets how fatal group failures are handled.
    pub fn with_mode(mut self, mode: CollectMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> CollectMode {
        self.mode
    }

    /// Returns the error of the last run, if it failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Runs one collection cycle.
    ///
    /// Returns [`RunOutcome::Skipped`] if the configuration is incomplete.
    /// Connection, version and (by default) fatal group failures are
    /// returned as errors, with no partial sample.
    pub fn run(&mut self, raw: &RawConfig) -> Result<RunOutcome, CollectError> {
        debug!("mysql: started gathering data");

        let config = match raw.preliminaries() {
            Ok(config) => config,
            Err(e) => {
                debug!(reason = %e, "mysql: config not set");
                self.last_error = None;
                return Ok(RunOutcome::Skipped);
            }
        };
        debug!("mysql: config set");

        let started = Instant::now();
        let result = self.collect(&config);
        self.last_error = result.as_ref().err().map(|e| e.to_string());

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "mysql: completed, returning"
        );
        result
    }

    fn collect(&self, config: &MySqlConfig) -> Result<RunOutcome, CollectError> {
        let connector = match &self.driver {
            DriverCapability::Available(connector) => connector,
            DriverCapability::Unavailable(reason) => {
                error!(error = %reason, "mysql: driver unavailable");
                return Err(CollectError::DriverUnavailable(reason.clone()));
            }
        };

        let session = connector.connect(config).map_err(|reason| {
            error!(
                host = %config.host,
                port = config.port,
                error = %reason,
                "mysql: connection error"
            );
            CollectError::Connection(reason)
        })?;
        let mut session = SessionGuard::new(session);

        let version = fetch_version(&mut session)?;
        debug!(version = %version, "mysql: getting version - done");

        let mut sample = SampleMap::default();
        sample.insert(
            "version",
            SampleValue::Version(version.components_as_strings()),
        );

        let mut failures = Vec::new();
        for group in catalog(&version, config.slave_mode) {
            match collect_group(&mut session, &group) {
                Ok(values) => {
                    for (key, value) in values {
                        sample.insert(key, SampleValue::Metric(value));
                    }
                    debug!(group = group.name, "mysql: getting group - done");
                }
                Err((key, e)) => match (group.policy, self.mode) {
                    (FailurePolicy::Soft, _) => {
                        warn!(
                            group = group.name,
                            metric = key,
                            error = %e,
                            "mysql: query error, group skipped"
                        );
                    }
                    (FailurePolicy::Fatal, CollectMode::AllOrNothing) => {
                        error!(
                            group = group.name,
                            metric = key,
                            error = %e,
                            "mysql: query error"
                        );
                        return Err(CollectError::Query {
                            group: group.name,
                            key,
                            error: e,
                        });
                    }
                    (FailurePolicy::Fatal, CollectMode::Partial) => {
                        error!(
                            group = group.name,
                            metric = key,
                            error = %e,
                            "mysql: query error, continuing in partial mode"
                        );
                        failures.push(GroupFailure {
                            group: group.name,
                            key,
                            error: e,
                        });
                    }
                },
            }
        }

        if failures.is_empty() {
            Ok(RunOutcome::Collected(sample))
        } else {
            Ok(RunOutcome::Partial { sample, failures })
        }
    }
}

fn fetch_version(session: &mut SessionGuard) -> Result<ServerVersion, CollectError> {
    let value = session.fetch(&Query::version()).map_err(|e| {
        error!(error = %e, "mysql: query error when getting version");
        CollectError::Version(e)
    })?;

    let raw = match value {
        MetricValue::Text(s) => s,
        MetricValue::Null => String::new(),
        other => other.to_string(),
    };

    ServerVersion::parse(&raw).map_err(|e: VersionParseError| {
        error!(version = %raw, error = %e, "mysql: cannot parse version");
        CollectError::VersionParse(e)
    })
}

/// Runs every query of a group. Values are returned only if all succeed.
fn collect_group(
    session: &mut SessionGuard,
    group: &MetricGroup,
) -> Result<Vec<(&'static str, MetricValue)>, (&'static str, QueryError)> {
    group
        .metrics
        .iter()
        .map(|m| {
            session
                .fetch(&m.query)
                .map(|value| (m.key, value))
                .map_err(|e| (m.key, e))
        })
        .collect()
}
