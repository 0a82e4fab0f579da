//! MLTrack Store
//!
//! Persistence layer for machine-learning experiments and their training
//! jobs. Callers construct a [`TrackingStore`] and go through its
//! operations; they never touch rows directly.
//!
//! Layers:
//! - `repository`: SQL against one table each, no policy
//! - `service`: validation, the job status machine, error mapping
//! - `store`: the handle that ties a pool to a clock

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod repository;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{Result, StoreError};
pub use store::{ExperimentTracker, TrackingStore};
