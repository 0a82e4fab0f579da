//! Core domain types
//!
//! These are plain data structures. Persistence lives in `mltrack-store`;
//! the only behaviour here is the job status state machine.

pub mod experiment;
pub mod job;
