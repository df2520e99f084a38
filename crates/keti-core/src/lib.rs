//! Core types, derived-data rules and trait definitions for the Keti research
//! tracker.
//!
//! This crate carries no HTTP or database dependencies. The storage backend,
//! the REST layer and the terminal client all build on the [`ResearchStore`]
//! abstraction and the pure rules defined here.

pub mod achievement;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod profile;
pub mod progress;
pub mod stats;
pub mod store;
pub mod subject;

mod nullable;

pub use dashboard::Dashboard;
pub use error::{Classify, Error, ErrorKind, Result};
pub use store::ResearchStore;
