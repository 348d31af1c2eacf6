//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for transactional storage and the repositories
//! - In-process memory storage with fail points, for tests and dry runs
//! - Message publishers (in-memory, JSON lines file, retrying wrapper)

pub mod duckdb;
pub mod memory;
pub mod publisher;
