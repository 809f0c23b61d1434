//! Record decoders
//!
//! Decoders turn the raw records of one page into owned values. They read
//! the buffer during the call only and keep nothing from it.

use crate::error::ServiceResult;
use crate::service::codec::{CodecError, FieldCursor, RecordReader};
use crate::service::types::*;
use crate::service::RecordKind;

/// Raw records of one page
#[derive(Debug, Clone, Copy)]
pub struct RawRecords<'a> {
    /// Kind the service laid the records out for
    pub kind: RecordKind,
    pub bytes: &'a [u8],
    pub count: usize,
}

/// Translation from raw records into typed entries
pub trait DecodeRecords {
    type Entry;

    /// Kind this decoder expects
    fn kind(&self) -> RecordKind;

    fn decode(&self, records: RawRecords<'_>) -> ServiceResult<Vec<Self::Entry>>;
}

/// Value that can be read from one fixed record
trait FromRecord: Sized {
    fn from_record(cursor: &mut FieldCursor<'_>) -> Result<Self, CodecError>;
}

fn decode_all<T: FromRecord>(
    expected: RecordKind,
    records: RawRecords<'_>,
) -> Result<Vec<T>, CodecError> {
    if records.kind != expected {
        return Err(CodecError::LayoutMismatch {
            expected: expected_name(expected),
            found: expected_name(records.kind),
        });
    }

    let reader = RecordReader::new(expected, records.bytes, records.count)?;
    (0..reader.len())
        .map(|i| T::from_record(&mut reader.record(i)))
        .collect()
}

fn expected_name(kind: RecordKind) -> &'static str {
    crate::service::RecordLayout::for_kind(kind).name
}

/// Decoder for the flat record kinds, producing [`DecodedEntry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryDecoder {
    kind: RecordKind,
}

impl EntryDecoder {
    pub fn new(kind: RecordKind) -> Self {
        Self { kind }
    }
}

impl DecodeRecords for EntryDecoder {
    type Entry = DecodedEntry;

    fn kind(&self) -> RecordKind {
        self.kind
    }

    fn decode(&self, records: RawRecords<'_>) -> ServiceResult<Vec<DecodedEntry>> {
        fn wrap<T>(entries: Vec<T>, f: fn(T) -> DecodedEntry) -> Vec<DecodedEntry> {
            entries.into_iter().map(f).collect()
        }

        let kind = self.kind;
        let entries = match kind {
            RecordKind::Account => wrap(decode_all(kind, records)?, DecodedEntry::Account),
            RecordKind::GlobalGroup => wrap(
                decode_all::<GlobalGroup>(kind, records)?,
                |g| DecodedEntry::Group(g.0),
            ),
            RecordKind::LocalGroup => wrap(
                decode_all::<LocalGroup>(kind, records)?,
                |g| DecodedEntry::Group(g.0),
            ),
            RecordKind::Share => wrap(decode_all(kind, records)?, DecodedEntry::Share),
            RecordKind::Session => wrap(decode_all(kind, records)?, DecodedEntry::Session),
            RecordKind::Connection => wrap(decode_all(kind, records)?, DecodedEntry::Connection),
            RecordKind::Server => wrap(decode_all(kind, records)?, DecodedEntry::Server),
            RecordKind::Disk => wrap(decode_all(kind, records)?, DecodedEntry::Disk),
            RecordKind::LoggedOnUser => {
                wrap(decode_all(kind, records)?, DecodedEntry::WorkstationUser)
            }
            RecordKind::NetResource => {
                return Err(CodecError::LayoutMismatch {
                    expected: "flat entry",
                    found: expected_name(kind),
                }
                .into())
            }
        };
        Ok(entries)
    }
}

/// Decoder for network resource records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceDecoder;

impl DecodeRecords for ResourceDecoder {
    type Entry = ResourceNode;

    fn kind(&self) -> RecordKind {
        RecordKind::NetResource
    }

    fn decode(&self, records: RawRecords<'_>) -> ServiceResult<Vec<ResourceNode>> {
        Ok(decode_all(RecordKind::NetResource, records)?)
    }
}

impl FromRecord for AccountSummary {
    fn from_record(c: &mut FieldCursor<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            name: c.string()?,
            full_name: c.opt_string()?,
            comment: c.opt_string()?,
            flags: AccountFlags(c.u32()?),
            user_id: c.u32()?,
        })
    }
}

struct GlobalGroup(GroupSummary);

impl FromRecord for GlobalGroup {
    fn from_record(c: &mut FieldCursor<'_>) -> Result<Self, CodecError> {
        Ok(Self(GroupSummary {
            name: c.string()?,
            comment: c.opt_string()?,
            group_id: Some(c.u32()?),
            attributes: Some(c.u32()?),
        }))
    }
}

struct LocalGroup(GroupSummary);

impl FromRecord for LocalGroup {
    fn from_record(c: &mut FieldCursor<'_>) -> Result<Self, CodecError> {
        Ok(Self(GroupSummary {
            name: c.string()?,
            comment: c.opt_string()?,
            group_id: None,
            attributes: None,
        }))
    }
}

impl FromRecord for ShareInfo {
    fn from_record(c: &mut FieldCursor<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            name: c.string()?,
            share_type: c.u32()?,
            remark: c.opt_string()?,
            max_uses: c.u32()?,
            current_uses: c.u32()?,
            path: c.opt_string()?,
            secured: c.u32()? != 0,
        })
    }
}

impl FromRecord for SessionInfo {
    fn from_record(c: &mut FieldCursor<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            client: c.string()?,
            user: c.opt_string()?,
            active_secs: c.u32()?,
            idle_secs: c.u32()?,
        })
    }
}

impl FromRecord for ConnectionInfo {
    fn from_record(c: &mut FieldCursor<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            id: c.u32()?,
            connection_type: c.u32()?,
            open_files: c.u32()?,
            users: c.u32()?,
            active_secs: c.u32()?,
            user: c.opt_string()?,
            net_name: c.opt_string()?,
        })
    }
}

impl FromRecord for ServerInfo {
    fn from_record(c: &mut FieldCursor<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            platform_id: c.u32()?,
            name: c.string()?,
            version_major: c.u32()?,
            version_minor: c.u32()?,
            server_type: ServerTypes(c.u32()?),
            comment: c.opt_string()?,
        })
    }
}

impl FromRecord for DiskLabel {
    fn from_record(c: &mut FieldCursor<'_>) -> Result<Self, CodecError> {
        Ok(Self { drive: c.drive()? })
    }
}

impl FromRecord for WorkstationUserInfo {
    fn from_record(c: &mut FieldCursor<'_>) -> Result<Self, CodecError> {
        Ok(Self { user: c.string()? })
    }
}

impl FromRecord for ResourceNode {
    fn from_record(c: &mut FieldCursor<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            scope: ResourceScope::from_u32(c.u32()?),
            resource_type: ResourceType::from_u32(c.u32()?),
            display_type: DisplayType::from_u32(c.u32()?),
            usage: ResourceUsage(c.u32()?),
            local_name: c.opt_string()?,
            remote_name: c.string()?,
            comment: c.opt_string()?,
            provider: c.opt_string()?,
        })
    }
}
