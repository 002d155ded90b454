//! Row structs for the change tables.
//!
//! Statuses are stored as text; rows convert into the `amend-core` domain
//! models, rejecting any status the core does not know.

pub mod change_batch;
pub mod change_log;
