//! Core domain + application logic for the Jira → Circuit issue bot.
//!
//! This crate is framework-agnostic. The Jira HTTP transport and the Circuit
//! chat client live behind ports (traits) implemented in adapter crates.

pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod issue;
pub mod logging;
pub mod messaging;
pub mod publisher;
pub mod report;
pub mod scheduler;
pub mod tracker;

pub use errors::{AuthError, Error, QueryError, Result, TransportError};
