//! # quire-core
//!
//! Core types, traits, and abstractions for the quire background job system.
//!
//! This crate provides the job model, the state machine, and the trait
//! definitions that the registry backends and the job engine depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{new_v7, parse_job_id};
