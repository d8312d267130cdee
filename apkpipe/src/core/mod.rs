//! Deterministic, pure logic shared by the pipeline stages.
//!
//! Core modules must be free of I/O side effects. They operate on names and
//! in-memory data and return deterministic outputs suitable for tests.

pub mod lineage;
pub mod naming;
pub mod packages;
pub mod types;
