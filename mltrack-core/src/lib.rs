//! MLTrack Core
//!
//! Core types for the MLTrack experiment tracking store.
//!
//! This crate contains:
//! - Domain types: Experiment and Job records plus the job status machine
//! - DTOs: Requests accepted by the tracking store, with their validation

pub mod domain;
pub mod dto;
pub mod error;

pub use error::ValidationError;
