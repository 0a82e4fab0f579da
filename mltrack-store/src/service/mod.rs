//! Service Module
//!
//! Business logic layer for the tracking store.
//! Services validate requests, enforce the job state machine and map
//! storage outcomes onto `StoreError`.

pub mod experiment;
pub mod job;

// Re-export for convenience
pub use experiment as experiment_service;
pub use job as job_service;
