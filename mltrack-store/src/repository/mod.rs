//! Repository Module
//!
//! Data access layer for the tracking store.
//! Each repository handles database operations for a specific domain entity.

pub mod experiment;
pub mod job;

// Re-export for convenience
pub use experiment as experiment_repository;
pub use job as job_repository;
