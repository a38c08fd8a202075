//! Scripted in-memory MySQL server.
//!
//! Responses are keyed by exact SQL text. Queries without a scripted
//! response return no rows, like `SHOW STATUS LIKE` for an unknown name.
//! Clones share state, so a test can keep a handle and inspect connects,
//! closes and issued queries after handing a clone to the collector.
//! Every `close` call is counted, including repeated ones.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use crate::collector::traits::{Column, Connector, MetricValue, Query, QueryError, Session};
use crate::config::MySqlConfig;

/// Single result row: ordered `(column name, value)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MockRow {
    columns: Vec<(String, MetricValue)>,
}

impl MockRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: &str, value: impl Into<MetricValue>) -> Self {
        self.columns.push((name.to_string(), value.into()));
        self
    }

    /// Row shaped like `SHOW STATUS` / `SHOW VARIABLES` output.
    pub fn variable(name: &str, value: &str) -> Self {
        Self::new()
            .column("Variable_name", name)
            .column("Value", value)
    }

    fn get(&self, column: Column) -> Option<&MetricValue> {
        match column {
            Column::Index(i) => self.columns.get(i).map(|(_, v)| v),
            Column::Named(name) => self
                .columns
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v),
        }
    }
}

#[derive(Debug, Clone)]
enum Response {
    Row(MockRow),
    Empty,
    Error(String),
    Timeout,
}

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<String, Response>,
    refuse: Option<String>,
    connects: usize,
    closes: usize,
    issued: Vec<String>,
}

/// In-memory connector returning scripted responses.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Rc<RefCell<MockState>>,
}

impl MockConnector {
    /// Creates a server that answers only `SELECT VERSION()`.
    pub fn new(version: &str) -> Self {
        Self::default().with_version(version)
    }

    /// Sets the `SELECT VERSION()` answer.
    pub fn with_version(self, version: &str) -> Self {
        self.with_row(
            &Query::version().sql,
            MockRow::new().column("VERSION()", version),
        )
    }

    /// Scripts a full row for `sql`.
    pub fn with_row(self, sql: &str, row: MockRow) -> Self {
        self.respond(sql, Response::Row(row))
    }

    /// Scripts `SHOW STATUS LIKE` and `SHOW GLOBAL STATUS LIKE` for `name`.
    pub fn with_status(self, name: &str, value: &str) -> Self {
        let row = MockRow::variable(name, value);
        self.with_row(&Query::status(name).sql, row.clone())
            .with_row(&Query::global_status(name).sql, row)
    }

    /// Scripts `SHOW VARIABLES LIKE` for `name`.
    pub fn with_variable(self, name: &str, value: &str) -> Self {
        self.with_row(&Query::variable(name).sql, MockRow::variable(name, value))
    }

    /// Makes `sql` fail with a driver error.
    pub fn fail_on(self, sql: &str, message: &str) -> Self {
        self.respond(sql, Response::Error(message.to_string()))
    }

    /// Makes `sql` return an empty result set.
    pub fn without_row(self, sql: &str) -> Self {
        self.respond(sql, Response::Empty)
    }

    /// Makes `sql` exceed the query timeout.
    pub fn time_out_on(self, sql: &str) -> Self {
        self.respond(sql, Response::Timeout)
    }

    /// Makes every connection attempt fail with `reason`.
    pub fn refuse_connections(self, reason: &str) -> Self {
        self.state.borrow_mut().refuse = Some(reason.to_string());
        self
    }

    /// Number of sessions opened.
    pub fn connects(&self) -> usize {
        self.state.borrow().connects
    }

    /// Number of sessions closed.
    pub fn closes(&self) -> usize {
        self.state.borrow().closes
    }

    /// All SQL text issued so far, in order.
    pub fn issued(&self) -> Vec<String> {
        self.state.borrow().issued.clone()
    }

    pub fn was_issued(&self, sql: &str) -> bool {
        self.state.borrow().issued.iter().any(|q| q == sql)
    }

    fn respond(self, sql: &str, response: Response) -> Self {
        self.state
            .borrow_mut()
            .responses
            .insert(sql.to_string(), response);
        self
    }
}

impl Connector for MockConnector {
    fn connect(&self, _config: &MySqlConfig) -> Result<Box<dyn Session>, String> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = &state.refuse {
            return Err(reason.clone());
        }
        state.connects += 1;
        Ok(Box::new(MockSession {
            state: Rc::clone(&self.state),
            closed: false,
        }))
    }
}

struct MockSession {
    state: Rc<RefCell<MockState>>,
    closed: bool,
}

impl Session for MockSession {
    fn fetch_one(&mut self, query: &Query) -> Result<Option<MetricValue>, QueryError> {
        if self.closed {
            return Err(QueryError::Driver("session is closed".to_string()));
        }

        let mut state = self.state.borrow_mut();
        state.issued.push(query.sql.clone());

        match state.responses.get(&query.sql) {
            None | Some(Response::Empty) => Ok(None),
            Some(Response::Error(msg)) => Err(QueryError::Driver(msg.clone())),
            Some(Response::Timeout) => Err(QueryError::Timeout(Duration::from_secs(10))),
            Some(Response::Row(row)) => row
                .get(query.column)
                .cloned()
                .map(Some)
                .ok_or_else(|| QueryError::MissingColumn(query.column.to_string())),
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.state.borrow_mut().closes += 1;
    }
}
