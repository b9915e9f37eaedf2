//! Token store: repository, row-store contract and backends.
//!
//! `TokenMapper` is the only entry point callers need; it runs against
//! PostgreSQL in production and the in-memory table in tests.

pub mod mapper;
pub mod memory;
pub mod pg;
pub mod rows;
pub mod sweep;

pub use mapper::{TokenMapper, MAX_TOKENS_PER_USER};
pub use memory::MemoryTokenRows;
pub use pg::PgTokenRows;
pub use rows::{Predicate, TokenFilter, TokenPatch, TokenRows};
pub use sweep::{sweep_daemon, sweep_once, SweepPolicy};
