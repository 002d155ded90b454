pub mod attributes;
pub mod batches;
pub mod logs;
