//! Core types and workflow for triage: alert intake, observable ingestion and
//! alert-to-case conversion.
//!
//! This crate is free of HTTP and database dependencies. Storage backends
//! implement the traits in [`store`]; transports drive
//! [`workflow::AlertWorkflow`].

pub mod alert;
pub mod attachment;
pub mod audit;
pub mod case;
pub mod error;
pub mod ingest;
pub mod merge;
pub mod observable;
pub mod permission;
pub mod store;
pub mod workflow;

pub use error::{Error, Result};
