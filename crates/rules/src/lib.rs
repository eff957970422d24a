//! File-backed synchronization of traffic-control rules.
//!
//! This crate provides:
//! - Typed schemas for the five rule files (flow, degrade, system, authority, hot-parameter)
//! - Per-kind JSON codecs selected from a static table
//! - An observable [`Property`](property::Property) holding each kind's live rule set
//! - A polling file watcher (pull path) and a writable source (push path) that
//!   share a fingerprint so pushed writes are never re-read as external edits
//! - [`RuleContext`](context::RuleContext), which wires all of it together at startup

pub mod context;
pub mod datasource;
pub mod property;
pub mod schema;

pub use context::{RuleContext, SyncHandle};
pub use datasource::{PollOutcome, RuleError};
pub use property::Property;
pub use schema::{RuleKind, RuleSet};
