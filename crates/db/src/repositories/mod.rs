//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod change_batch_repo;
pub mod change_log_repo;
pub mod employee_repo;

pub use change_batch_repo::ChangeBatchRepo;
pub use change_log_repo::ChangeLogRepo;
pub use employee_repo::EmployeeRepo;
