//! netenum - Paged Directory-Service Enumeration
//!
//! A reader of enumerable, possibly hierarchical, possibly large result
//! sets held by a directory service: accounts, groups, shares, sessions,
//! connections, servers, disks, logged-on users and the network resource
//! tree.
//!
//! # Features
//!
//! - **Paged Queries**: Every flat enumeration runs as a "fetch a page,
//!   continue while more data" loop with resume cursors bound to the
//!   request that issued them.
//!
//! - **Guaranteed Release**: Enumeration handles and page buffers are
//!   scoped guards; each is released exactly once on every exit path.
//!
//! - **Failure Isolation**: The resource walker records per-container
//!   failures and keeps walking the rest of the tree.
//!
//! - **SQLite Output**: Results can be exported to SQLite for later
//!   analysis with SQL queries.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     DirectoryService                            │
//! │        open / fetch_page / release_page / close                 │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ raw pages
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   EnumScope / PageGuard  (handle and buffer release)            │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   PagedQuery  ──▶  EntryDecoder / ResourceDecoder               │
//! └──────────────┬──────────────────────────────────┬───────────────┘
//!                │ flat entries                     │ per container
//!                ▼                                  ▼
//!        ┌──────────────┐                 ┌──────────────────┐
//!        │ output / db  │ ◀────────────── │  ResourceWalker  │
//!        └──────────────┘      tree       │  (work list +    │
//!                                         │   arena tree)    │
//!                                         └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Shares on a server, ten per page
//! netenum share \\FILESRV --snapshot dir.json --page-entries 10
//!
//! # Walk the global network three levels deep and export it
//! netenum resource --max-depth 3 --snapshot dir.json -o net.db
//!
//! # Query results
//! sqlite3 net.db "SELECT remote_name, depth FROM resources WHERE expansion = 'failed'"
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod output;
pub mod progress;
pub mod query;
pub mod service;
pub mod walker;

pub use config::{CliArgs, EnumConfig, Job, OutputFormat};
pub use error::{EnumError, Result, ServiceError};
pub use query::{run_paged_query, EnumerationRequest, PagedQuery, QueryOutcome};
pub use service::{DecodedEntry, DirectoryService, MemoryDirectory, ResourceNode};
pub use walker::{walk, ResourceTree, ResourceWalker, WalkOutcome};
