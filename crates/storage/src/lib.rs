//! Pluggable persistence for the Isnad trust ledger
//!
//! The ledger talks to storage through one small contract: a keyed record
//! log with secondary indexes ([`StorageBackend`]). Three implementations:
//! - [`MemoryBackend`] — HashMaps, for tests and ephemeral use
//! - [`SqliteBackend`] — embedded relational store with WAL mode, for
//!   single-node production
//! - [`JsonlBackend`] — append-only JSONL log with tombstones, portable
//!
//! The ledger never knows which backend it holds. All backends are safe for
//! concurrent readers with a single writer, and non-memory backends survive
//! process restart with a partially written record either fully present or
//! absent.

pub mod backend;
pub mod error;
pub mod jsonl;
pub mod memory;
pub mod sqlite;

pub use backend::{RecordKind, StorageBackend};
pub use error::StorageError;
pub use jsonl::JsonlBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
