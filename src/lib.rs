//! myglot - MySQL status collector library.
//!
//! This library provides the collection pipeline used by:
//! - `myglotd` - background daemon that runs a collection every interval
//!   and prints each sample as a JSON line

pub mod collector;
pub mod config;
