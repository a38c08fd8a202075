//! Mock driver implementations for testing.
//!
//! This module provides `MockConnector` and pre-built server scenarios for
//! testing the collector without a running MySQL server.

mod connector;
mod scenarios;

pub use connector::{MockConnector, MockRow};
