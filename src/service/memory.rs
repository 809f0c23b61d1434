//! In-memory directory service backed by a JSON snapshot
//!
//! `MemoryDirectory` serves pages the way a live service does: records are
//! laid out with the fixed-layout codec, pages honor the requested
//! capacity, and cursors are bound to the request that issued them. It
//! counts every open, close, fetch, acquisition and release, and can be
//! told to fail specific opens or fetches, which makes it the test double
//! for the enumeration core as well.

use crate::error::{codes, EnumError, RequestField, ServiceError, ServiceResult};
use crate::service::codec::{EncodeRecord, FieldWriter, GlobalGroupRecord, LocalGroupRecord, RecordWriter};
use crate::service::{
    AccountAdmin, AccountSpec, AccountUpdate, Capacity, DirectoryService, EnumHandle, Filter,
    PageBuffer, PageStatus, RawPage, RecordKind, RequestKey, ResumeCursor, Target,
};
use crate::service::types::*;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Handle value the service does not know
const ERROR_INVALID_HANDLE: u32 = 6;

/// First relative id handed to created accounts
const FIRST_USER_ID: u32 = 1000;

/// Contents of a directory, as loaded from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    /// Name of the machine `Target::Local` refers to
    #[serde(default = "default_local_server")]
    pub local_server: String,

    #[serde(default)]
    pub servers: Vec<ServerFixture>,

    #[serde(default)]
    pub domains: Vec<DomainFixture>,

    #[serde(default)]
    pub network: NetworkFixture,
}

fn default_local_server() -> String {
    "LOCALHOST".to_string()
}

impl Default for DirectorySnapshot {
    fn default() -> Self {
        Self {
            local_server: default_local_server(),
            servers: Vec::new(),
            domains: Vec::new(),
            network: NetworkFixture::default(),
        }
    }
}

/// One server and everything enumerable on it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerFixture {
    pub name: String,
    /// Every enumeration against this server is refused
    pub denied: bool,
    pub users: Vec<AccountSummary>,
    pub groups: Vec<GroupSummary>,
    pub local_groups: Vec<GroupSummary>,
    pub shares: Vec<ShareInfo>,
    pub sessions: Vec<SessionInfo>,
    pub connections: Vec<ConnectionFixture>,
    pub logged_on: Vec<WorkstationUserInfo>,
    pub disks: Vec<DiskLabel>,
    /// Account passwords by lower-cased account name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub passwords: BTreeMap<String, String>,
}

/// A connection from a client computer to a share
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionFixture {
    pub share: String,
    pub client: String,
    pub id: u32,
    pub connection_type: u32,
    pub open_files: u32,
    pub users: u32,
    pub active_secs: u32,
    pub user: Option<String>,
}

impl ConnectionFixture {
    /// The net name field names the other side of the qualifier
    fn to_info(&self, by_computer: bool) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            connection_type: self.connection_type,
            open_files: self.open_files,
            users: self.users,
            active_secs: self.active_secs,
            user: self.user.clone(),
            net_name: Some(if by_computer {
                self.share.clone()
            } else {
                self.client.clone()
            }),
        }
    }
}

/// A domain and the servers it lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainFixture {
    pub name: String,
    #[serde(default)]
    pub servers: Vec<ServerInfo>,
}

/// Network resource forests, one per scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkFixture {
    pub connected: Vec<ResourceFixture>,
    pub global: Vec<ResourceFixture>,
    pub remembered: Vec<ResourceFixture>,
}

impl NetworkFixture {
    fn roots(&self, scope: ResourceScope) -> &[ResourceFixture] {
        match scope {
            ResourceScope::Connected => &self.connected,
            ResourceScope::GlobalNet => &self.global,
            ResourceScope::Remembered => &self.remembered,
            ResourceScope::Other(_) => &[],
        }
    }
}

/// A network resource with the resources enumerable under it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceFixture {
    #[serde(flatten)]
    pub node: ResourceNode,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResourceFixture>,

    /// Enumerating under this container is refused
    #[serde(default)]
    pub denied: bool,
}

impl ResourceFixture {
    fn matches(&self, locator: &ResourceLocator) -> bool {
        self.node.locator().same_resource(locator)
    }
}

/// Counter values at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub opens: u64,
    pub closes: u64,
    pub fetches: u64,
    pub acquired: u64,
    pub released: u64,
}

#[derive(Debug, Default)]
struct ServiceCounters {
    opens: AtomicU64,
    closes: AtomicU64,
    fetches: AtomicU64,
    acquired: AtomicU64,
    released: AtomicU64,
}

#[derive(Debug, Clone)]
enum Fault {
    Open(ServiceError),
    /// Fail the nth fetch (1-based) on every handle opened for the target
    Fetch { nth: usize, error: ServiceError },
}

/// A record staged for serving, tagged with its layout
#[derive(Debug, Clone)]
enum Record {
    Account(AccountSummary),
    GlobalGroup(GroupSummary),
    LocalGroup(GroupSummary),
    Share(ShareInfo),
    Session(SessionInfo),
    Connection(ConnectionInfo),
    Server(ServerInfo),
    Disk(DiskLabel),
    LoggedOn(WorkstationUserInfo),
    Resource(ResourceNode),
}

impl EncodeRecord for Record {
    fn encode(&self, out: &mut FieldWriter<'_>) {
        match self {
            Record::Account(r) => r.encode(out),
            Record::GlobalGroup(r) => GlobalGroupRecord(r).encode(out),
            Record::LocalGroup(r) => LocalGroupRecord(r).encode(out),
            Record::Share(r) => r.encode(out),
            Record::Session(r) => r.encode(out),
            Record::Connection(r) => r.encode(out),
            Record::Server(r) => r.encode(out),
            Record::Disk(r) => r.encode(out),
            Record::LoggedOn(r) => r.encode(out),
            Record::Resource(r) => r.encode(out),
        }
    }
}

#[derive(Debug)]
struct OpenEnum {
    key: RequestKey,
    label: String,
    records: Vec<Record>,
    total_hint: u32,
    fetches: usize,
}

#[derive(Debug, Default)]
struct State {
    snapshot: DirectorySnapshot,
    handles: HashMap<u64, OpenEnum>,
    outstanding: HashSet<u64>,
    faults: Vec<(String, Fault)>,
    open_log: Vec<String>,
    next_id: u64,
}

impl State {
    fn issue_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Directory service over an in-memory snapshot
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    state: Mutex<State>,
    counters: ServiceCounters,
}

impl MemoryDirectory {
    pub fn new(snapshot: DirectorySnapshot) -> Self {
        Self {
            state: Mutex::new(State {
                snapshot,
                ..Default::default()
            }),
            counters: ServiceCounters::default(),
        }
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Load a snapshot file
    pub fn from_json_file(path: &Path) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let snapshot = serde_json::from_str(&text).map_err(|source| EnumError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(snapshot))
    }

    /// Make every open for `target` fail with `error`
    ///
    /// `target` is matched against the target's display form, e.g.
    /// `\\FILESRV` or a container's remote name.
    pub fn fail_open(&self, target: &str, error: ServiceError) {
        self.state
            .lock()
            .faults
            .push((target.to_lowercase(), Fault::Open(error)));
    }

    /// Make the `nth` fetch (1-based) of each enumeration of `target` fail
    pub fn fail_fetch(&self, target: &str, nth: usize, error: ServiceError) {
        self.state
            .lock()
            .faults
            .push((target.to_lowercase(), Fault::Fetch { nth, error }));
    }

    pub fn counters(&self) -> CounterSnapshot {
        CounterSnapshot {
            opens: self.counters.opens.load(Ordering::Relaxed),
            closes: self.counters.closes.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            acquired: self.counters.acquired.load(Ordering::Relaxed),
            released: self.counters.released.load(Ordering::Relaxed),
        }
    }

    /// Handles opened and not yet closed
    pub fn open_handles(&self) -> usize {
        self.state.lock().handles.len()
    }

    /// Page buffers handed out and not yet released
    pub fn outstanding_buffers(&self) -> usize {
        self.state.lock().outstanding.len()
    }

    /// Every target an open was attempted for, in order
    pub fn opened_targets(&self) -> Vec<String> {
        self.state.lock().open_log.clone()
    }
}

fn bare(name: &str) -> &str {
    name.trim_start_matches('\\')
}

fn server_index(snapshot: &DirectorySnapshot, target: &Target) -> ServiceResult<usize> {
    let name = match target {
        Target::Local => snapshot.local_server.as_str(),
        Target::Server(name) => bare(name),
        _ => {
            return Err(ServiceError::InvalidParameter {
                field: RequestField::Target,
            })
        }
    };

    let index = snapshot
        .servers
        .iter()
        .position(|s| bare(&s.name).eq_ignore_ascii_case(name))
        .ok_or_else(|| ServiceError::from_code(codes::ERROR_BAD_NETPATH, &target.to_string()))?;

    if snapshot.servers[index].denied {
        return Err(ServiceError::PermissionDenied {
            target: target.to_string(),
        });
    }
    Ok(index)
}

fn find_resource<'a>(
    roots: &'a [ResourceFixture],
    locator: &ResourceLocator,
) -> Option<&'a ResourceFixture> {
    // Breadth-first in document order: the shallowest listing defines a container
    let mut queue: VecDeque<&ResourceFixture> = roots.iter().collect();
    while let Some(fixture) = queue.pop_front() {
        if fixture.matches(locator) {
            return Some(fixture);
        }
        queue.extend(fixture.children.iter());
    }
    None
}

/// Stage the records `key` enumerates, with the service's total estimate
fn collect(snapshot: &DirectorySnapshot, key: &RequestKey) -> ServiceResult<(Vec<Record>, u32)> {
    let records: Vec<Record> = match key.kind {
        RecordKind::Server => {
            let domain = match &key.target {
                Target::Local => snapshot.domains.first(),
                Target::Domain(name) => snapshot
                    .domains
                    .iter()
                    .find(|d| d.name.eq_ignore_ascii_case(name)),
                _ => None,
            }
            .ok_or(ServiceError::Unavailable {
                code: codes::ERROR_NO_BROWSER_SERVERS_FOUND,
            })?;

            let mask = match &key.filter {
                Filter::ServerTypes(mask) => *mask,
                _ => ServerTypes(ServerTypes::ALL),
            };
            domain
                .servers
                .iter()
                .filter(|s| s.server_type.intersects(mask))
                .cloned()
                .map(Record::Server)
                .collect()
        }
        RecordKind::NetResource => return collect_resources(snapshot, key),
        kind => {
            let server = &snapshot.servers[server_index(snapshot, &key.target)?];
            collect_server(server, kind, &key.filter)?
        }
    };

    let total = records.len() as u32;
    Ok((records, total))
}

fn collect_server(
    server: &ServerFixture,
    kind: RecordKind,
    filter: &Filter,
) -> ServiceResult<Vec<Record>> {
    let records = match kind {
        RecordKind::Account => server
            .users
            .iter()
            .filter(|u| match filter {
                Filter::Accounts(t) => u.flags.account_type() == Some(*t),
                _ => true,
            })
            .cloned()
            .map(Record::Account)
            .collect(),
        RecordKind::GlobalGroup => server.groups.iter().cloned().map(Record::GlobalGroup).collect(),
        RecordKind::LocalGroup => server
            .local_groups
            .iter()
            .cloned()
            .map(Record::LocalGroup)
            .collect(),
        RecordKind::Share => server.shares.iter().cloned().map(Record::Share).collect(),
        RecordKind::Session => {
            let (client, user) = match filter {
                Filter::Sessions { client, user } => (client.as_deref(), user.as_deref()),
                _ => (None, None),
            };
            server
                .sessions
                .iter()
                .filter(|s| client.map_or(true, |c| bare(&s.client).eq_ignore_ascii_case(bare(c))))
                .filter(|s| {
                    user.map_or(true, |u| {
                        s.user.as_deref().is_some_and(|su| su.eq_ignore_ascii_case(u))
                    })
                })
                .cloned()
                .map(Record::Session)
                .collect()
        }
        RecordKind::Connection => {
            let Filter::Connections { qualifier } = filter else {
                return Err(ServiceError::InvalidParameter {
                    field: RequestField::Filter,
                });
            };
            collect_connections(server, qualifier)?
        }
        RecordKind::Disk => server.disks.iter().cloned().map(Record::Disk).collect(),
        RecordKind::LoggedOnUser => server.logged_on.iter().cloned().map(Record::LoggedOn).collect(),
        RecordKind::Server | RecordKind::NetResource => {
            return Err(ServiceError::InvalidParameter {
                field: RequestField::Selector,
            })
        }
    };
    Ok(records)
}

fn collect_connections(server: &ServerFixture, qualifier: &str) -> ServiceResult<Vec<Record>> {
    let by_computer = qualifier.starts_with("\\\\");
    let wanted = bare(qualifier);

    let known = if by_computer {
        server
            .connections
            .iter()
            .any(|c| bare(&c.client).eq_ignore_ascii_case(wanted))
            || server
                .sessions
                .iter()
                .any(|s| bare(&s.client).eq_ignore_ascii_case(wanted))
    } else {
        server.shares.iter().any(|s| s.name.eq_ignore_ascii_case(wanted))
    };
    if !known {
        let code = if by_computer {
            codes::NERR_CLIENT_NAME_NOT_FOUND
        } else {
            codes::NERR_NET_NAME_NOT_FOUND
        };
        return Err(ServiceError::from_code(code, qualifier));
    }

    Ok(server
        .connections
        .iter()
        .filter(|c| {
            let side = if by_computer { bare(&c.client) } else { c.share.as_str() };
            side.eq_ignore_ascii_case(wanted)
        })
        .map(|c| Record::Connection(c.to_info(by_computer)))
        .collect())
}

fn collect_resources(
    snapshot: &DirectorySnapshot,
    key: &RequestKey,
) -> ServiceResult<(Vec<Record>, u32)> {
    let Target::Network { scope, container } = &key.target else {
        return Err(ServiceError::InvalidParameter {
            field: RequestField::Target,
        });
    };
    let wanted = match &key.filter {
        Filter::Resources(t) => *t,
        _ => ResourceType::Any,
    };

    let roots = snapshot.network.roots(*scope);
    let children = match container {
        None => roots,
        Some(locator) => {
            let fixture = find_resource(roots, locator).ok_or_else(|| {
                ServiceError::from_code(codes::ERROR_BAD_NET_NAME, &locator.remote_name)
            })?;
            if !fixture.node.is_container() {
                return Err(ServiceError::from_code(
                    codes::ERROR_NOT_CONTAINER,
                    &locator.remote_name,
                ));
            }
            if fixture.denied {
                return Err(ServiceError::PermissionDenied {
                    target: locator.remote_name.clone(),
                });
            }
            &fixture.children
        }
    };

    let records = children
        .iter()
        .filter(|c| c.node.is_container() || wanted.admits(c.node.resource_type))
        .map(|c| {
            let mut node = c.node.clone();
            node.scope = *scope;
            Record::Resource(node)
        })
        .collect();

    // Resource enumeration has no size estimate
    Ok((records, 0))
}

impl DirectoryService for MemoryDirectory {
    fn open(&self, key: &RequestKey) -> ServiceResult<EnumHandle> {
        let label = key.target.to_string();
        let mut state = self.state.lock();
        state.open_log.push(label.clone());

        let lowered = label.to_lowercase();
        let fault = state.faults.iter().find_map(|(target, fault)| match fault {
            Fault::Open(err) if *target == lowered => Some(err.clone()),
            _ => None,
        });
        if let Some(err) = fault {
            debug!("Injected open failure for {}: {}", label, err);
            return Err(err);
        }

        key.validate()?;
        let (records, total_hint) = collect(&state.snapshot, key)?;

        let id = state.issue_id();
        state.handles.insert(
            id,
            OpenEnum {
                key: key.clone(),
                label: lowered,
                records,
                total_hint,
                fetches: 0,
            },
        );
        self.counters.opens.fetch_add(1, Ordering::Relaxed);
        Ok(EnumHandle::new(id))
    }

    fn fetch_page(
        &self,
        handle: &EnumHandle,
        capacity: Capacity,
        cursor: Option<&ResumeCursor>,
    ) -> ServiceResult<RawPage> {
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let open = state
            .handles
            .get_mut(&handle.id())
            .ok_or_else(|| ServiceError::Unknown {
                code: ERROR_INVALID_HANDLE,
                message: format!("unknown enumeration handle {}", handle.id()),
            })?;
        open.fetches += 1;

        let position = match cursor {
            Some(c) if !c.belongs_to(&open.key) => {
                return Err(ServiceError::InvalidParameter {
                    field: RequestField::Resume,
                })
            }
            Some(c) => c.position() as usize,
            None => 0,
        };
        if position > open.records.len() {
            return Err(ServiceError::InvalidParameter {
                field: RequestField::Resume,
            });
        }

        let fault = state.faults.iter().find_map(|(target, fault)| match fault {
            Fault::Fetch { nth, error } if *target == open.label && *nth == open.fetches => {
                Some(error.clone())
            }
            _ => None,
        });
        if let Some(err) = fault {
            debug!("Injected fetch failure for {}: {}", open.label, err);
            return Err(err);
        }

        let (max_records, budget) = match capacity {
            Capacity::Entries(0) | Capacity::Bytes(0) => {
                return Err(ServiceError::InvalidParameter {
                    field: RequestField::Capacity,
                })
            }
            Capacity::Entries(n) => (n as usize, None),
            Capacity::Bytes(n) => (usize::MAX, Some(n as usize)),
            Capacity::Unbounded => (usize::MAX, None),
        };

        let mut writer = RecordWriter::new(open.key.kind);
        let mut next = position;
        while next < open.records.len() && writer.count() < max_records {
            match writer.try_push(&open.records[next], budget) {
                Ok(()) => next += 1,
                Err(required) if writer.is_empty() => {
                    return Err(ServiceError::BufferTooSmall { required })
                }
                Err(_) => break,
            }
        }

        let entries_read = writer.count() as u32;
        let status = if next < open.records.len() {
            PageStatus::MoreData
        } else {
            PageStatus::Success
        };
        let next_cursor =
            (status == PageStatus::MoreData).then(|| ResumeCursor::issue(&open.key, next as u64));
        let kind = open.key.kind;
        let total_entries = open.total_hint;

        let id = state.issue_id();
        state.outstanding.insert(id);
        self.counters.acquired.fetch_add(1, Ordering::Relaxed);

        Ok(RawPage {
            status,
            buffer: PageBuffer::new(id, kind, writer.finish()),
            entries_read,
            total_entries,
            next_cursor,
        })
    }

    fn release_page(&self, buffer: PageBuffer) {
        if self.state.lock().outstanding.remove(&buffer.id()) {
            self.counters.released.fetch_add(1, Ordering::Relaxed);
        } else {
            warn!("Release of unknown page buffer {}", buffer.id());
        }
    }

    fn close(&self, handle: EnumHandle) {
        if self.state.lock().handles.remove(&handle.id()).is_some() {
            self.counters.closes.fetch_add(1, Ordering::Relaxed);
        } else {
            warn!("Close of unknown enumeration handle {}", handle.id());
        }
    }
}

fn user_index(server: &ServerFixture, name: &str) -> ServiceResult<usize> {
    server
        .users
        .iter()
        .position(|u| u.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ServiceError::from_code(codes::NERR_USER_NOT_FOUND, name))
}

impl AccountAdmin for MemoryDirectory {
    fn create_account(&self, target: &Target, spec: &AccountSpec) -> ServiceResult<()> {
        let mut state = self.state.lock();
        let index = server_index(&state.snapshot, target)?;
        let server = &mut state.snapshot.servers[index];

        if user_index(server, &spec.name).is_ok() {
            return Err(ServiceError::Unknown {
                code: codes::NERR_USER_EXISTS,
                message: format!("account '{}' already exists", spec.name),
            });
        }

        let user_id = server
            .users
            .iter()
            .map(|u| u.user_id + 1)
            .max()
            .unwrap_or(FIRST_USER_ID)
            .max(FIRST_USER_ID);
        server.users.push(AccountSummary {
            name: spec.name.clone(),
            full_name: spec.full_name.clone(),
            comment: spec.comment.clone(),
            flags: spec.flags(),
            user_id,
        });
        server
            .passwords
            .insert(spec.name.to_lowercase(), spec.password.clone());

        debug!("Created account {} on {}", spec.name, target);
        Ok(())
    }

    fn set_account_info(
        &self,
        target: &Target,
        name: &str,
        update: &AccountUpdate,
    ) -> ServiceResult<()> {
        let mut state = self.state.lock();
        let index = server_index(&state.snapshot, target)?;
        let server = &mut state.snapshot.servers[index];
        let user = user_index(server, name)?;
        update.apply(&mut server.users[user]);
        Ok(())
    }

    fn change_password(
        &self,
        target: &Target,
        name: &str,
        old_password: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        let mut state = self.state.lock();
        let index = server_index(&state.snapshot, target)?;
        let server = &mut state.snapshot.servers[index];
        user_index(server, name)?;

        let key = name.to_lowercase();
        let current = server.passwords.get(&key).map(String::as_str).unwrap_or("");
        if current != old_password {
            return Err(ServiceError::Unknown {
                code: codes::ERROR_INVALID_PASSWORD,
                message: "old password does not match".into(),
            });
        }
        server.passwords.insert(key, new_password.to_string());
        Ok(())
    }

    fn get_account_info(&self, target: &Target, name: &str) -> ServiceResult<AccountSummary> {
        let state = self.state.lock();
        let index = server_index(&state.snapshot, target)?;
        let server = &state.snapshot.servers[index];
        Ok(server.users[user_index(server, name)?].clone())
    }
}
