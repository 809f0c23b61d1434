//! Scoped ownership of enumeration handles and page buffers
//!
//! `EnumScope` closes its handle and `PageGuard` releases its buffer
//! exactly once: explicitly through `close`/`release`, or on drop along
//! any early return.

use crate::error::{RequestField, ServiceError, ServiceResult};
use crate::service::{
    Capacity, DirectoryService, EnumHandle, PageBuffer, PageStatus, RecordKind, RequestKey,
    ResumeCursor,
};
use tracing::debug;

/// An open enumeration, closed when dropped
pub struct EnumScope<'s, S: DirectoryService + ?Sized> {
    service: &'s S,
    handle: Option<EnumHandle>,
    kind: RecordKind,
}

impl<'s, S: DirectoryService + ?Sized> EnumScope<'s, S> {
    /// Open an enumeration for `key`
    pub fn open(service: &'s S, key: &RequestKey) -> ServiceResult<Self> {
        let handle = service.open(key)?;
        debug!("Opened {} (handle {})", key, handle.id());
        Ok(Self {
            service,
            handle: Some(handle),
            kind: key.kind,
        })
    }

    /// Fetch one page; the returned guard owns the buffer
    ///
    /// The guard borrows the scope, so every page is released before the
    /// handle can be closed:
    ///
    /// ```compile_fail
    /// use netenum::service::{
    ///     Capacity, EnumScope, Filter, MemoryDirectory, RecordKind, RequestKey, Target,
    /// };
    ///
    /// let service = MemoryDirectory::from_json_str(
    ///     r#"{"local_server": "WKS01", "servers": [{"name": "WKS01", "disks": [{"drive": "C:"}]}]}"#,
    /// )
    /// .unwrap();
    /// let key = RequestKey::new(Target::Local, RecordKind::Disk, Filter::None);
    /// let scope = EnumScope::open(&service, &key).unwrap();
    /// let page = scope.fetch(Capacity::Entries(1), None).unwrap();
    /// scope.close();
    /// page.release();
    /// ```
    pub fn fetch(
        &self,
        capacity: Capacity,
        cursor: Option<&ResumeCursor>,
    ) -> ServiceResult<PageGuard<'_, S>> {
        let Some(handle) = self.handle.as_ref() else {
            return Err(ServiceError::InvalidParameter {
                field: RequestField::Target,
            });
        };

        let page = self.service.fetch_page(handle, capacity, cursor)?;
        Ok(PageGuard {
            service: self.service,
            kind: page.buffer.kind(),
            buffer: Some(page.buffer),
            status: page.status,
            entries_read: page.entries_read,
            total_entries: page.total_entries,
            next_cursor: page.next_cursor,
        })
    }

    /// Record kind this scope enumerates
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Close the enumeration now
    pub fn close(self) {
        // Drop does the work
    }
}

impl<S: DirectoryService + ?Sized> Drop for EnumScope<'_, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Closing handle {}", handle.id());
            self.service.close(handle);
        }
    }
}

/// A fetched page, released when dropped
pub struct PageGuard<'s, S: DirectoryService + ?Sized> {
    service: &'s S,
    buffer: Option<PageBuffer>,
    kind: RecordKind,
    status: PageStatus,
    entries_read: u32,
    total_entries: u32,
    next_cursor: Option<ResumeCursor>,
}

impl<S: DirectoryService + ?Sized> PageGuard<'_, S> {
    pub fn status(&self) -> PageStatus {
        self.status
    }

    pub fn entries_read(&self) -> u32 {
        self.entries_read
    }

    pub fn total_entries(&self) -> u32 {
        self.total_entries
    }

    /// Record kind the buffer was laid out for
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Raw buffer contents, valid until the guard is released
    pub fn data(&self) -> &[u8] {
        self.buffer.as_ref().map_or(&[][..], |b| b.data())
    }

    /// Take the continuation cursor out of the page
    pub fn take_cursor(&mut self) -> Option<ResumeCursor> {
        self.next_cursor.take()
    }

    /// Release the buffer now
    pub fn release(self) {
        // Drop does the work
    }
}

impl<S: DirectoryService + ?Sized> Drop for PageGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.service.release_page(buffer);
        }
    }
}
