//! Fixed-layout record codec for page buffers
//!
//! A page buffer holds `count` fixed-size records followed by a string
//! heap:
//!
//! ```text
//! +----------+----------+-----+----------+----------------------+
//! | record 0 | record 1 | ... | record n | heap (UTF-16LE text) |
//! +----------+----------+-----+----------+----------------------+
//! ```
//!
//! String fields are `(heap offset, unit length)` pairs of little-endian
//! `u32`s with offsets relative to the heap start; a null string has
//! offset `u32::MAX`. Drive labels are stored inline as three UTF-16
//! units (`"C:\0"`).

use crate::error::ServiceError;
use crate::service::request::RecordKind;
use crate::service::types::*;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

const NULL_OFFSET: u32 = u32::MAX;
const DRIVE_UNITS: usize = 3;

/// Layout violations found while reading a page buffer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer of {len} bytes cannot hold {count} records of {stride} bytes")]
    Truncated {
        len: usize,
        count: usize,
        stride: usize,
    },

    #[error("string at heap offset {offset} (+{units} units) is out of bounds")]
    StringOutOfBounds { offset: u32, units: u32 },

    #[error("invalid UTF-16 text at heap offset {offset}")]
    InvalidUtf16 { offset: u32 },

    #[error("record layout mismatch: expected {expected}, found {found}")]
    LayoutMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("required string field is null")]
    NullString,
}

impl From<CodecError> for ServiceError {
    fn from(err: CodecError) -> Self {
        ServiceError::malformed(err.to_string())
    }
}

/// Type of one fixed field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U32,
    Str,
    OptStr,
    Drive,
}

impl FieldKind {
    /// Bytes the field occupies in the fixed record
    pub const fn width(self) -> usize {
        match self {
            FieldKind::U32 => 4,
            FieldKind::Str | FieldKind::OptStr => 8,
            FieldKind::Drive => DRIVE_UNITS * 2,
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldKind::U32 => "u32",
            FieldKind::Str => "string",
            FieldKind::OptStr => "optional string",
            FieldKind::Drive => "drive label",
        }
    }
}

/// Field layout of one record kind
#[derive(Debug, PartialEq, Eq)]
pub struct RecordLayout {
    pub name: &'static str,
    pub fields: &'static [FieldKind],
}

use FieldKind::{Drive, OptStr, Str, U32};

static ACCOUNT: RecordLayout = RecordLayout {
    name: "account",
    fields: &[Str, OptStr, OptStr, U32, U32],
};
static GLOBAL_GROUP: RecordLayout = RecordLayout {
    name: "global group",
    fields: &[Str, OptStr, U32, U32],
};
static LOCAL_GROUP: RecordLayout = RecordLayout {
    name: "local group",
    fields: &[Str, OptStr],
};
static SHARE: RecordLayout = RecordLayout {
    name: "share",
    fields: &[Str, U32, OptStr, U32, U32, OptStr, U32],
};
static SESSION: RecordLayout = RecordLayout {
    name: "session",
    fields: &[Str, OptStr, U32, U32],
};
static CONNECTION: RecordLayout = RecordLayout {
    name: "connection",
    fields: &[U32, U32, U32, U32, U32, OptStr, OptStr],
};
static SERVER: RecordLayout = RecordLayout {
    name: "server",
    fields: &[U32, Str, U32, U32, U32, OptStr],
};
static DISK: RecordLayout = RecordLayout {
    name: "disk",
    fields: &[Drive],
};
static LOGGED_ON_USER: RecordLayout = RecordLayout {
    name: "logged-on user",
    fields: &[Str],
};
static NET_RESOURCE: RecordLayout = RecordLayout {
    name: "net resource",
    fields: &[U32, U32, U32, U32, OptStr, Str, OptStr, OptStr],
};

impl RecordLayout {
    pub fn for_kind(kind: RecordKind) -> &'static RecordLayout {
        match kind {
            RecordKind::Account => &ACCOUNT,
            RecordKind::GlobalGroup => &GLOBAL_GROUP,
            RecordKind::LocalGroup => &LOCAL_GROUP,
            RecordKind::Share => &SHARE,
            RecordKind::Session => &SESSION,
            RecordKind::Connection => &CONNECTION,
            RecordKind::Server => &SERVER,
            RecordKind::Disk => &DISK,
            RecordKind::LoggedOnUser => &LOGGED_ON_USER,
            RecordKind::NetResource => &NET_RESOURCE,
        }
    }

    /// Size of one fixed record
    pub fn stride(&self) -> usize {
        self.fields.iter().map(|f| f.width()).sum()
    }
}

/// Something the service can lay out as one fixed record
pub trait EncodeRecord {
    fn encode(&self, out: &mut FieldWriter<'_>);
}

/// Writes the fields of one record in layout order
pub struct FieldWriter<'a> {
    fixed: &'a mut BytesMut,
    heap: &'a mut BytesMut,
}

impl FieldWriter<'_> {
    pub fn u32(&mut self, value: u32) {
        self.fixed.put_u32_le(value);
    }

    pub fn string(&mut self, value: &str) {
        let offset = self.heap.len() as u32;
        let mut units = 0u32;
        for unit in value.encode_utf16() {
            self.heap.put_u16_le(unit);
            units += 1;
        }
        self.fixed.put_u32_le(offset);
        self.fixed.put_u32_le(units);
    }

    pub fn opt_string(&mut self, value: Option<&str>) {
        match value {
            Some(s) => self.string(s),
            None => {
                self.fixed.put_u32_le(NULL_OFFSET);
                self.fixed.put_u32_le(0);
            }
        }
    }

    /// Inline drive label; longer labels are cut to two units
    pub fn drive(&mut self, value: &str) {
        let mut units = value.encode_utf16().take(DRIVE_UNITS - 1);
        for _ in 0..DRIVE_UNITS - 1 {
            self.fixed.put_u16_le(units.next().unwrap_or(0));
        }
        self.fixed.put_u16_le(0);
    }
}

/// Accumulates records into a page buffer within a byte budget
pub struct RecordWriter {
    layout: &'static RecordLayout,
    fixed: BytesMut,
    heap: BytesMut,
    count: usize,
}

impl RecordWriter {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            layout: RecordLayout::for_kind(kind),
            fixed: BytesMut::new(),
            heap: BytesMut::new(),
            count: 0,
        }
    }

    /// Bytes used so far (fixed records plus heap)
    pub fn len(&self) -> usize {
        self.fixed.len() + self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Append a record if the buffer stays within `budget` bytes
    ///
    /// Returns the size the buffer would have needed when the record does
    /// not fit; the writer is left unchanged in that case.
    pub fn try_push<R: EncodeRecord + ?Sized>(
        &mut self,
        record: &R,
        budget: Option<usize>,
    ) -> std::result::Result<(), usize> {
        let fixed_mark = self.fixed.len();
        let heap_mark = self.heap.len();

        record.encode(&mut FieldWriter {
            fixed: &mut self.fixed,
            heap: &mut self.heap,
        });
        debug_assert_eq!(self.fixed.len() - fixed_mark, self.layout.stride());

        let needed = self.len();
        if budget.is_some_and(|b| needed > b) {
            self.fixed.truncate(fixed_mark);
            self.heap.truncate(heap_mark);
            return Err(needed);
        }

        self.count += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Bytes {
        self.fixed.unsplit(self.heap);
        self.fixed.freeze()
    }
}

/// Random access to the records of a page buffer
pub struct RecordReader<'a> {
    layout: &'static RecordLayout,
    records: &'a [u8],
    heap: &'a [u8],
    count: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(kind: RecordKind, buf: &'a [u8], count: usize) -> Result<Self, CodecError> {
        let layout = RecordLayout::for_kind(kind);
        let stride = layout.stride();
        let fixed_len = count
            .checked_mul(stride)
            .filter(|&n| n <= buf.len())
            .ok_or(CodecError::Truncated {
                len: buf.len(),
                count,
                stride,
            })?;

        let (records, heap) = buf.split_at(fixed_len);
        Ok(Self {
            layout,
            records,
            heap,
            count,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Field cursor over record `index`
    pub fn record(&self, index: usize) -> FieldCursor<'a> {
        let stride = self.layout.stride();
        let start = (index * stride).min(self.records.len());
        let end = (start + stride).min(self.records.len());
        FieldCursor {
            layout: self.layout,
            fixed: &self.records[start..end],
            heap: self.heap,
            field: 0,
        }
    }
}

/// Reads the fields of one record in layout order
pub struct FieldCursor<'a> {
    layout: &'static RecordLayout,
    fixed: &'a [u8],
    heap: &'a [u8],
    field: usize,
}

impl FieldCursor<'_> {
    fn expect(&mut self, kind: FieldKind) -> Result<(), CodecError> {
        let found = self.layout.fields.get(self.field).copied();
        if found != Some(kind) {
            return Err(CodecError::LayoutMismatch {
                expected: kind.name(),
                found: found.map_or("end of record", FieldKind::name),
            });
        }
        if self.fixed.remaining() < kind.width() {
            return Err(CodecError::Truncated {
                len: self.fixed.remaining(),
                count: 1,
                stride: kind.width(),
            });
        }
        self.field += 1;
        Ok(())
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        self.expect(FieldKind::U32)?;
        Ok(self.fixed.get_u32_le())
    }

    pub fn string(&mut self) -> Result<String, CodecError> {
        self.expect(FieldKind::Str)?;
        self.read_heap_string()?.ok_or(CodecError::NullString)
    }

    pub fn opt_string(&mut self) -> Result<Option<String>, CodecError> {
        self.expect(FieldKind::OptStr)?;
        self.read_heap_string()
    }

    pub fn drive(&mut self) -> Result<String, CodecError> {
        self.expect(FieldKind::Drive)?;
        let raw: Vec<u16> = (0..DRIVE_UNITS).map(|_| self.fixed.get_u16_le()).collect();
        let units: Vec<u16> = raw.into_iter().take_while(|&u| u != 0).collect();
        String::from_utf16(&units).map_err(|_| CodecError::InvalidUtf16 { offset: 0 })
    }

    fn read_heap_string(&mut self) -> Result<Option<String>, CodecError> {
        let offset = self.fixed.get_u32_le();
        let units = self.fixed.get_u32_le();
        if offset == NULL_OFFSET {
            return Ok(None);
        }

        let start = offset as usize;
        let end = start
            .checked_add(units as usize * 2)
            .filter(|&e| e <= self.heap.len())
            .ok_or(CodecError::StringOutOfBounds { offset, units })?;

        let mut raw = &self.heap[start..end];
        let mut text = Vec::with_capacity(units as usize);
        while raw.has_remaining() {
            text.push(raw.get_u16_le());
        }
        String::from_utf16(&text)
            .map(Some)
            .map_err(|_| CodecError::InvalidUtf16 { offset })
    }
}

impl EncodeRecord for AccountSummary {
    fn encode(&self, out: &mut FieldWriter<'_>) {
        out.string(&self.name);
        out.opt_string(self.full_name.as_deref());
        out.opt_string(self.comment.as_deref());
        out.u32(self.flags.bits());
        out.u32(self.user_id);
    }
}

/// Global groups use the display layout with id and attributes
pub struct GlobalGroupRecord<'a>(pub &'a GroupSummary);

impl EncodeRecord for GlobalGroupRecord<'_> {
    fn encode(&self, out: &mut FieldWriter<'_>) {
        out.string(&self.0.name);
        out.opt_string(self.0.comment.as_deref());
        out.u32(self.0.group_id.unwrap_or_default());
        out.u32(self.0.attributes.unwrap_or_default());
    }
}

/// Local groups carry only name and comment
pub struct LocalGroupRecord<'a>(pub &'a GroupSummary);

impl EncodeRecord for LocalGroupRecord<'_> {
    fn encode(&self, out: &mut FieldWriter<'_>) {
        out.string(&self.0.name);
        out.opt_string(self.0.comment.as_deref());
    }
}

impl EncodeRecord for ShareInfo {
    fn encode(&self, out: &mut FieldWriter<'_>) {
        out.string(&self.name);
        out.u32(self.share_type);
        out.opt_string(self.remark.as_deref());
        out.u32(self.max_uses);
        out.u32(self.current_uses);
        out.opt_string(self.path.as_deref());
        out.u32(u32::from(self.secured));
    }
}

impl EncodeRecord for SessionInfo {
    fn encode(&self, out: &mut FieldWriter<'_>) {
        out.string(&self.client);
        out.opt_string(self.user.as_deref());
        out.u32(self.active_secs);
        out.u32(self.idle_secs);
    }
}

impl EncodeRecord for ConnectionInfo {
    fn encode(&self, out: &mut FieldWriter<'_>) {
        out.u32(self.id);
        out.u32(self.connection_type);
        out.u32(self.open_files);
        out.u32(self.users);
        out.u32(self.active_secs);
        out.opt_string(self.user.as_deref());
        out.opt_string(self.net_name.as_deref());
    }
}

impl EncodeRecord for ServerInfo {
    fn encode(&self, out: &mut FieldWriter<'_>) {
        out.u32(self.platform_id);
        out.string(&self.name);
        out.u32(self.version_major);
        out.u32(self.version_minor);
        out.u32(self.server_type.bits());
        out.opt_string(self.comment.as_deref());
    }
}

impl EncodeRecord for DiskLabel {
    fn encode(&self, out: &mut FieldWriter<'_>) {
        out.drive(&self.drive);
    }
}

impl EncodeRecord for WorkstationUserInfo {
    fn encode(&self, out: &mut FieldWriter<'_>) {
        out.string(&self.user);
    }
}

impl EncodeRecord for ResourceNode {
    fn encode(&self, out: &mut FieldWriter<'_>) {
        out.u32(self.scope.as_u32());
        out.u32(self.resource_type.as_u32());
        out.u32(self.display_type.as_u32());
        out.u32(self.usage.bits());
        out.opt_string(self.local_name.as_deref());
        out.string(&self.remote_name);
        out.opt_string(self.comment.as_deref());
        out.opt_string(self.provider.as_deref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(client: &str, user: Option<&str>) -> SessionInfo {
        SessionInfo {
            client: client.into(),
            user: user.map(String::from),
            active_secs: 120,
            idle_secs: 5,
        }
    }

    #[test]
    fn test_strides() {
        assert_eq!(RecordLayout::for_kind(RecordKind::Disk).stride(), 6);
        assert_eq!(RecordLayout::for_kind(RecordKind::Session).stride(), 24);
        assert_eq!(RecordLayout::for_kind(RecordKind::NetResource).stride(), 48);
    }

    #[test]
    fn test_heap_follows_fixed_records() {
        let mut writer = RecordWriter::new(RecordKind::Session);
        writer.try_push(&session("WKS01", Some("alice")), None).unwrap();
        writer.try_push(&session("WKS02", None), None).unwrap();
        let buf = writer.finish();

        // two records of 24 bytes, then "WKS01" "alice" "WKS02" as UTF-16
        assert_eq!(buf.len(), 48 + (5 + 5 + 5) * 2);

        let reader = RecordReader::new(RecordKind::Session, &buf, 2).unwrap();
        let mut second = reader.record(1);
        assert_eq!(second.string().unwrap(), "WKS02");
        assert_eq!(second.opt_string().unwrap(), None);
        assert_eq!(second.u32().unwrap(), 120);
    }

    #[test]
    fn test_budget_rolls_back() {
        let mut writer = RecordWriter::new(RecordKind::Session);
        let first = session("WKS01", None);
        writer.try_push(&first, Some(40)).unwrap();
        let used = writer.len();

        let needed = writer.try_push(&first, Some(40)).unwrap_err();
        assert!(needed > 40);
        assert_eq!(writer.len(), used);
        assert_eq!(writer.count(), 1);
    }

    #[test]
    fn test_drive_label_inline() {
        let mut writer = RecordWriter::new(RecordKind::Disk);
        writer
            .try_push(&DiskLabel { drive: "C:".into() }, None)
            .unwrap();
        let buf = writer.finish();
        assert_eq!(&buf[..], &[b'C', 0, b':', 0, 0, 0]);

        let reader = RecordReader::new(RecordKind::Disk, &buf, 1).unwrap();
        assert_eq!(reader.record(0).drive().unwrap(), "C:");
    }

    #[test]
    fn test_truncated_buffer() {
        let err = RecordReader::new(RecordKind::Session, &[0u8; 30], 2)
            .err()
            .unwrap();
        assert!(matches!(err, CodecError::Truncated { count: 2, .. }));
    }

    #[test]
    fn test_string_out_of_bounds() {
        let mut raw = BytesMut::new();
        raw.put_u32_le(100);
        raw.put_u32_le(4);
        let reader = RecordReader::new(RecordKind::LoggedOnUser, &raw, 1).unwrap();
        assert_eq!(
            reader.record(0).string().unwrap_err(),
            CodecError::StringOutOfBounds {
                offset: 100,
                units: 4
            }
        );
    }

    #[test]
    fn test_field_order_enforced() {
        let mut writer = RecordWriter::new(RecordKind::LoggedOnUser);
        writer
            .try_push(&WorkstationUserInfo { user: "bob".into() }, None)
            .unwrap();
        let buf = writer.finish();
        let reader = RecordReader::new(RecordKind::LoggedOnUser, &buf, 1).unwrap();

        let err = reader.record(0).u32().unwrap_err();
        assert!(matches!(err, CodecError::LayoutMismatch { .. }));

        let svc: ServiceError = err.into();
        assert_eq!(svc.code(), crate::error::codes::ERROR_INVALID_DATA);
    }
}
