//! Domain logic for batch attribute changes with an immutable audit trail.
//!
//! This crate has no database or HTTP dependencies. Persistence and the
//! edited entities are reached through the traits in [`store`].

pub mod attributes;
pub mod batch;
pub mod engine;
pub mod error;
pub mod memory;
pub mod model;
pub mod store;
pub mod types;
pub mod value;
