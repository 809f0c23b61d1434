//! SQLite export for enumeration results and resource walks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        PagedQuery / ResourceWalker (caller)         │
//! └─────────────────────┬───────────────────────────────┘
//!                       │ DecodedEntry / ResourceTree
//!                       ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                  ExportWriter                       │
//! │  - Buffers rows in memory                           │
//! │  - Commits one transaction per batch                │
//! │  - Builds indexes and run metadata at finish        │
//! └─────────────────────┬───────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                   SQLite File                       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod schema;
pub mod writer;

pub use schema::{create_database, create_indexes, get_walk_info, keys, optimize_for_reads};
pub use writer::{ExportWriter, WriterStats, DEFAULT_BATCH_SIZE};
