//! Paged enumeration queries
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  EnumerationRequest  │  key + capacity + resume cursor
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐     open / fetch / release / close
//! │     PagedQuery       │ ───────────────────────────────────▶ DirectoryService
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │ EntryDecoder /       │  raw records -> owned values
//! │ ResourceDecoder      │
//! └──────────────────────┘
//! ```

pub mod decode;
pub mod paged;
pub mod request;

pub use decode::{DecodeRecords, EntryDecoder, RawRecords, ResourceDecoder};
pub use paged::{run_paged_query, PageStats, PagedQuery, QueryOutcome};
pub use request::EnumerationRequest;
