//! spacedrep-core — Scheduling engine, review queue, and progress aggregation.
//!
//! This crate defines the data model, the SM-2-derived scheduling engine,
//! session building, progress counters and the card store contract that the
//! rest of spacedrep builds on. [`service::Scheduler`] ties them together.

pub mod clock;
pub mod engine;
pub mod error;
pub mod grading;
pub mod model;
pub mod parser;
pub mod progress;
pub mod queue;
pub mod service;
pub mod store;

pub use error::{Result, SchedulerError};
pub use service::{Scheduler, SchedulerConfig};
