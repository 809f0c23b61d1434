//! Directory service boundary
//!
//! This module defines what the enumeration core consumes from a
//! directory/administration service, and an in-memory implementation of
//! it backed by a JSON snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 DirectoryService                     │
//! │  open(key) -> EnumHandle                            │
//! │  fetch_page(handle, capacity, cursor) -> RawPage    │
//! │  release_page(PageBuffer)                           │
//! │  close(EnumHandle)                                  │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │            EnumScope / PageGuard (RAII)              │
//! │  - close on drop, release on drop                   │
//! │  - handles and buffers are not Clone                │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Handles and page buffers are move-only tokens: `close` and
//! `release_page` consume them, so a second release does not type-check.

pub mod codec;
pub mod lifecycle;
pub mod memory;
pub mod request;
pub mod types;

pub use codec::{CodecError, EncodeRecord, RecordLayout, RecordReader, RecordWriter};
pub use lifecycle::{EnumScope, PageGuard};
pub use memory::{CounterSnapshot, DirectorySnapshot, MemoryDirectory};
pub use request::{Capacity, Filter, RecordKind, RequestKey, ResumeCursor, Target};
pub use types::*;

use crate::error::{codes, RequestField, ServiceError, ServiceResult};
use bytes::Bytes;

/// Open enumeration on the service side
#[derive(Debug, PartialEq, Eq)]
pub struct EnumHandle {
    id: u64,
}

impl EnumHandle {
    /// Wrap a service-assigned handle id
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Service-allocated page buffer
#[derive(Debug, PartialEq, Eq)]
pub struct PageBuffer {
    id: u64,
    kind: RecordKind,
    data: Bytes,
}

impl PageBuffer {
    pub fn new(id: u64, kind: RecordKind, data: Bytes) -> Self {
        Self { id, kind, data }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Record kind the records were laid out for
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Outcome status of a successful fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    /// Last page of the result set
    Success,
    /// More records remain; continue with the page's cursor
    MoreData,
}

/// One page as returned by the service
#[derive(Debug)]
pub struct RawPage {
    pub status: PageStatus,
    pub buffer: PageBuffer,
    /// Records actually in the buffer
    pub entries_read: u32,
    /// Service estimate of the full result size; may be 0
    pub total_entries: u32,
    pub next_cursor: Option<ResumeCursor>,
}

/// Paginated enumeration primitives of a directory service
///
/// A terminal `Error(code)` page is an `Err` from `fetch_page`; no buffer
/// is handed out in that case.
pub trait DirectoryService {
    fn open(&self, key: &RequestKey) -> ServiceResult<EnumHandle>;

    fn fetch_page(
        &self,
        handle: &EnumHandle,
        capacity: Capacity,
        cursor: Option<&ResumeCursor>,
    ) -> ServiceResult<RawPage>;

    fn release_page(&self, buffer: PageBuffer);

    fn close(&self, handle: EnumHandle);
}

/// One-shot account administration calls
///
/// The enumeration core never composes or retries these.
pub trait AccountAdmin {
    fn create_account(&self, target: &Target, spec: &AccountSpec) -> ServiceResult<()>;

    fn set_account_info(
        &self,
        target: &Target,
        name: &str,
        update: &AccountUpdate,
    ) -> ServiceResult<()>;

    fn change_password(
        &self,
        target: &Target,
        name: &str,
        old_password: &str,
        new_password: &str,
    ) -> ServiceResult<()>;

    fn get_account_info(&self, target: &Target, name: &str) -> ServiceResult<AccountSummary>;
}

/// Longest computer name a machine account may be created for
pub const MAX_COMPUTER_NAME: usize = 15;

/// Longest initial machine account password
pub const MAX_MACHINE_PASSWORD: usize = 14;

/// Account to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSpec {
    pub name: String,
    pub password: String,
    pub account_type: AccountType,
    pub full_name: Option<String>,
    pub comment: Option<String>,
}

impl AccountSpec {
    /// Normal user account
    pub fn user(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            account_type: AccountType::Normal,
            full_name: None,
            comment: None,
        }
    }

    /// Computer or trust account for `machine`
    ///
    /// The account name is the upper-cased computer name with a trailing
    /// `$`; the initial password is the lower-cased computer name cut to
    /// [`MAX_MACHINE_PASSWORD`] characters.
    pub fn machine(machine: &str, account_type: AccountType) -> ServiceResult<Self> {
        if !account_type.is_machine() {
            return Err(ServiceError::InvalidParameter {
                field: RequestField::Selector,
            });
        }

        let bare = machine.trim_start_matches('\\').trim_end_matches('$');
        if bare.is_empty() || bare.chars().count() > MAX_COMPUTER_NAME {
            return Err(ServiceError::Unknown {
                code: codes::ERROR_INVALID_ACCOUNT_NAME,
                message: format!("invalid computer name '{}'", machine),
            });
        }

        Ok(Self {
            name: format!("{}$", bare.to_uppercase()),
            password: bare.to_lowercase().chars().take(MAX_MACHINE_PASSWORD).collect(),
            account_type,
            full_name: None,
            comment: None,
        })
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Flag bits the new account starts with
    pub fn flags(&self) -> AccountFlags {
        AccountFlags(AccountFlags::SCRIPT | self.account_type.flag())
    }
}

/// Fields to change on an existing account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountUpdate {
    pub full_name: Option<String>,
    pub comment: Option<String>,
    pub set_flags: u32,
    pub clear_flags: u32,
}

impl AccountUpdate {
    pub fn disable() -> Self {
        Self {
            set_flags: AccountFlags::ACCOUNT_DISABLE,
            ..Default::default()
        }
    }

    pub fn enable() -> Self {
        Self {
            clear_flags: AccountFlags::ACCOUNT_DISABLE,
            ..Default::default()
        }
    }

    /// Apply this update to an account summary
    pub fn apply(&self, account: &mut AccountSummary) {
        if let Some(full_name) = &self.full_name {
            account.full_name = Some(full_name.clone());
        }
        if let Some(comment) = &self.comment {
            account.comment = Some(comment.clone());
        }
        account.flags = account.flags.with(self.set_flags).without(self.clear_flags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_account_naming() {
        let spec = AccountSpec::machine("wks-build01", AccountType::WorkstationTrust).unwrap();
        assert_eq!(spec.name, "WKS-BUILD01$");
        assert_eq!(spec.password, "wks-build01");
        assert_eq!(spec.flags().account_type(), Some(AccountType::WorkstationTrust));
    }

    #[test]
    fn test_machine_password_truncated() {
        let spec = AccountSpec::machine("\\\\ABCDEFGHIJKLMNO", AccountType::ServerTrust).unwrap();
        assert_eq!(spec.name, "ABCDEFGHIJKLMNO$");
        assert_eq!(spec.password, "abcdefghijklmn");
    }

    #[test]
    fn test_machine_account_rules() {
        assert!(AccountSpec::machine("ABCDEFGHIJKLMNOP", AccountType::WorkstationTrust).is_err());
        assert_eq!(
            AccountSpec::machine("WKS01", AccountType::Normal),
            Err(ServiceError::InvalidParameter {
                field: RequestField::Selector
            })
        );
    }

    #[test]
    fn test_account_update_apply() {
        let mut account = AccountSummary {
            name: "alice".into(),
            full_name: None,
            comment: None,
            flags: AccountFlags(AccountFlags::NORMAL_ACCOUNT),
            user_id: 1001,
        };

        AccountUpdate::disable().apply(&mut account);
        assert!(account.flags.is_disabled());

        AccountUpdate::enable().apply(&mut account);
        assert!(!account.flags.is_disabled());
        assert_eq!(account.flags.account_type(), Some(AccountType::Normal));
    }
}
