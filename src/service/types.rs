//! Entry types returned by the directory service
//!
//! These are flat value records decoded from service pages. None of them
//! hold references into a page buffer, so they outlive the buffer they
//! were decoded from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Enumeration scope of a network resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
    /// Currently connected resources
    Connected,
    /// All resources on the network
    #[default]
    #[serde(rename = "global")]
    GlobalNet,
    /// Remembered (persistent) connections
    Remembered,
    /// Scope value the decoder does not know
    Other(u32),
}

impl ResourceScope {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => ResourceScope::Connected,
            2 => ResourceScope::GlobalNet,
            3 => ResourceScope::Remembered,
            other => ResourceScope::Other(other),
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            ResourceScope::Connected => 1,
            ResourceScope::GlobalNet => 2,
            ResourceScope::Remembered => 3,
            ResourceScope::Other(v) => *v,
        }
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceScope::Connected => f.write_str("connected"),
            ResourceScope::GlobalNet => f.write_str("global"),
            ResourceScope::Remembered => f.write_str("remembered"),
            ResourceScope::Other(v) => write!(f, "scope {}", v),
        }
    }
}

/// Kind of network resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    #[default]
    Any,
    Disk,
    Print,
    Other(u32),
}

impl ResourceType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => ResourceType::Any,
            1 => ResourceType::Disk,
            2 => ResourceType::Print,
            other => ResourceType::Other(other),
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            ResourceType::Any => 0,
            ResourceType::Disk => 1,
            ResourceType::Print => 2,
            ResourceType::Other(v) => *v,
        }
    }

    /// Whether a resource of type `other` passes this type as a filter
    pub fn admits(&self, other: ResourceType) -> bool {
        *self == ResourceType::Any || *self == other
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Any => f.write_str("any"),
            ResourceType::Disk => f.write_str("disk"),
            ResourceType::Print => f.write_str("print"),
            ResourceType::Other(v) => write!(f, "type {}", v),
        }
    }
}

/// How a network resource should be displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayType {
    #[default]
    Generic,
    Domain,
    Server,
    Share,
    File,
    Group,
    Network,
    Other(u32),
}

impl DisplayType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => DisplayType::Generic,
            1 => DisplayType::Domain,
            2 => DisplayType::Server,
            3 => DisplayType::Share,
            4 => DisplayType::File,
            5 => DisplayType::Group,
            6 => DisplayType::Network,
            other => DisplayType::Other(other),
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            DisplayType::Generic => 0,
            DisplayType::Domain => 1,
            DisplayType::Server => 2,
            DisplayType::Share => 3,
            DisplayType::File => 4,
            DisplayType::Group => 5,
            DisplayType::Network => 6,
            DisplayType::Other(v) => *v,
        }
    }
}

impl fmt::Display for DisplayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayType::Generic => f.write_str("generic"),
            DisplayType::Domain => f.write_str("domain"),
            DisplayType::Server => f.write_str("server"),
            DisplayType::Share => f.write_str("share"),
            DisplayType::File => f.write_str("file"),
            DisplayType::Group => f.write_str("group"),
            DisplayType::Network => f.write_str("network"),
            DisplayType::Other(v) => write!(f, "display type {}", v),
        }
    }
}

/// Usage bits of a network resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceUsage(pub u32);

impl ResourceUsage {
    pub const CONNECTABLE: u32 = 0x0000_0001;
    pub const CONTAINER: u32 = 0x0000_0002;
    pub const NO_LOCAL_DEVICE: u32 = 0x0000_0004;
    pub const SIBLING: u32 = 0x0000_0008;
    pub const ATTACHED: u32 = 0x0000_0010;

    /// Get the raw usage bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Check if the resource can be connected to
    pub fn is_connectable(&self) -> bool {
        self.0 & Self::CONNECTABLE != 0
    }

    /// Check if the resource holds further resources
    pub fn is_container(&self) -> bool {
        self.0 & Self::CONTAINER != 0
    }
}

/// Identity of a network resource, used to open an enumeration under it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceLocator {
    pub remote_name: String,
    pub provider: Option<String>,
}

impl ResourceLocator {
    /// Case-folded copy; remote names and providers compare without case
    pub fn folded(&self) -> ResourceLocator {
        ResourceLocator {
            remote_name: self.remote_name.to_ascii_lowercase(),
            provider: self.provider.as_ref().map(|p| p.to_ascii_lowercase()),
        }
    }

    /// Check if `other` names the same resource
    pub fn same_resource(&self, other: &ResourceLocator) -> bool {
        self.remote_name.eq_ignore_ascii_case(&other.remote_name)
            && match (&self.provider, &other.provider) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(p) => write!(f, "{} [{}]", self.remote_name, p),
            None => f.write_str(&self.remote_name),
        }
    }
}

/// A network resource returned from a resource enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    #[serde(default)]
    pub scope: ResourceScope,

    #[serde(default)]
    pub resource_type: ResourceType,

    #[serde(default)]
    pub display_type: DisplayType,

    #[serde(default)]
    pub usage: ResourceUsage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,

    pub remote_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ResourceNode {
    /// The only signal for recursion eligibility
    pub fn is_container(&self) -> bool {
        self.usage.is_container()
    }

    pub fn is_connectable(&self) -> bool {
        self.usage.is_connectable()
    }

    /// Identity used to enumerate under this node
    pub fn locator(&self) -> ResourceLocator {
        ResourceLocator {
            remote_name: self.remote_name.clone(),
            provider: self.provider.clone(),
        }
    }
}

/// Account classes, exactly one of which is set on an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Normal,
    TempDuplicate,
    InterdomainTrust,
    WorkstationTrust,
    ServerTrust,
}

impl AccountType {
    /// Account flag bit marking this type
    pub fn flag(self) -> u32 {
        match self {
            AccountType::TempDuplicate => AccountFlags::TEMP_DUPLICATE_ACCOUNT,
            AccountType::Normal => AccountFlags::NORMAL_ACCOUNT,
            AccountType::InterdomainTrust => AccountFlags::INTERDOMAIN_TRUST_ACCOUNT,
            AccountType::WorkstationTrust => AccountFlags::WORKSTATION_TRUST_ACCOUNT,
            AccountType::ServerTrust => AccountFlags::SERVER_TRUST_ACCOUNT,
        }
    }

    /// Whether this is one of the computer/trust account types
    pub fn is_machine(self) -> bool {
        matches!(
            self,
            AccountType::InterdomainTrust | AccountType::WorkstationTrust | AccountType::ServerTrust
        )
    }
}

/// Account flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountFlags(pub u32);

impl AccountFlags {
    pub const SCRIPT: u32 = 0x0000_0001;
    pub const ACCOUNT_DISABLE: u32 = 0x0000_0002;
    pub const HOMEDIR_REQUIRED: u32 = 0x0000_0008;
    pub const LOCKOUT: u32 = 0x0000_0010;
    pub const PASSWD_NOTREQD: u32 = 0x0000_0020;
    pub const PASSWD_CANT_CHANGE: u32 = 0x0000_0040;
    pub const TEMP_DUPLICATE_ACCOUNT: u32 = 0x0000_0100;
    pub const NORMAL_ACCOUNT: u32 = 0x0000_0200;
    pub const INTERDOMAIN_TRUST_ACCOUNT: u32 = 0x0000_0800;
    pub const WORKSTATION_TRUST_ACCOUNT: u32 = 0x0000_1000;
    pub const SERVER_TRUST_ACCOUNT: u32 = 0x0000_2000;
    pub const DONT_EXPIRE_PASSWD: u32 = 0x0001_0000;
    pub const PASSWORD_EXPIRED: u32 = 0x0080_0000;

    const TYPE_MASK: u32 = Self::TEMP_DUPLICATE_ACCOUNT
        | Self::NORMAL_ACCOUNT
        | Self::INTERDOMAIN_TRUST_ACCOUNT
        | Self::WORKSTATION_TRUST_ACCOUNT
        | Self::SERVER_TRUST_ACCOUNT;

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_disabled(&self) -> bool {
        self.0 & Self::ACCOUNT_DISABLE != 0
    }

    pub fn is_locked_out(&self) -> bool {
        self.0 & Self::LOCKOUT != 0
    }

    pub fn password_expired(&self) -> bool {
        self.0 & Self::PASSWORD_EXPIRED != 0
    }

    /// Account type encoded in the flags, if exactly one is set
    pub fn account_type(&self) -> Option<AccountType> {
        match self.0 & Self::TYPE_MASK {
            Self::TEMP_DUPLICATE_ACCOUNT => Some(AccountType::TempDuplicate),
            Self::NORMAL_ACCOUNT => Some(AccountType::Normal),
            Self::INTERDOMAIN_TRUST_ACCOUNT => Some(AccountType::InterdomainTrust),
            Self::WORKSTATION_TRUST_ACCOUNT => Some(AccountType::WorkstationTrust),
            Self::SERVER_TRUST_ACCOUNT => Some(AccountType::ServerTrust),
            _ => None,
        }
    }

    pub fn with(self, bits: u32) -> Self {
        Self(self.0 | bits)
    }

    pub fn without(self, bits: u32) -> Self {
        Self(self.0 & !bits)
    }
}

/// Server role bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerTypes(pub u32);

impl ServerTypes {
    pub const WORKSTATION: u32 = 0x0000_0001;
    pub const SERVER: u32 = 0x0000_0002;
    pub const DOMAIN_CTRL: u32 = 0x0000_0008;
    pub const DOMAIN_BAKCTRL: u32 = 0x0000_0010;
    pub const ALL: u32 = 0xFFFF_FFFF;

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Whether any bit of `mask` is set
    pub fn intersects(&self, mask: ServerTypes) -> bool {
        self.0 & mask.0 != 0
    }

    pub fn is_primary_dc(&self) -> bool {
        self.0 & Self::DOMAIN_CTRL != 0
    }

    pub fn is_backup_dc(&self) -> bool {
        !self.is_primary_dc() && self.0 & Self::DOMAIN_BAKCTRL != 0
    }
}

/// User account summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub flags: AccountFlags,
    #[serde(default)]
    pub user_id: u32,
}

/// Group summary (global groups carry an id and attributes, local groups don't)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<u32>,
}

/// Shared resource on a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareInfo {
    pub name: String,
    #[serde(default)]
    pub share_type: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(default)]
    pub max_uses: u32,
    #[serde(default)]
    pub current_uses: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub secured: bool,
}

impl ShareInfo {
    pub const DISK_TREE: u32 = 0;
    pub const PRINT_QUEUE: u32 = 1;
    pub const DEVICE: u32 = 2;
    pub const IPC: u32 = 3;
    pub const SPECIAL: u32 = 0x8000_0000;

    /// Administrative share (C$, ADMIN$, IPC$)
    pub fn is_special(&self) -> bool {
        self.share_type & Self::SPECIAL != 0
    }

    pub fn is_ipc(&self) -> bool {
        self.share_type & !Self::SPECIAL == Self::IPC
    }
}

/// Session established with a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub client: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub active_secs: u32,
    #[serde(default)]
    pub idle_secs: u32,
}

/// Connection made to a share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub connection_type: u32,
    #[serde(default)]
    pub open_files: u32,
    #[serde(default)]
    pub users: u32,
    #[serde(default)]
    pub active_secs: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_name: Option<String>,
}

/// Server visible in a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub platform_id: u32,
    pub name: String,
    #[serde(default)]
    pub version_major: u32,
    #[serde(default)]
    pub version_minor: u32,
    #[serde(default)]
    pub server_type: ServerTypes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Disk drive on a server, e.g. "C:"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskLabel {
    pub drive: String,
}

/// User currently logged on to a workstation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkstationUserInfo {
    pub user: String,
}

/// A typed entry decoded from a flat enumeration page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodedEntry {
    Account(AccountSummary),
    Group(GroupSummary),
    Share(ShareInfo),
    Session(SessionInfo),
    Connection(ConnectionInfo),
    Server(ServerInfo),
    Disk(DiskLabel),
    WorkstationUser(WorkstationUserInfo),
}

impl DecodedEntry {
    /// Primary name of the entry
    pub fn name(&self) -> &str {
        match self {
            DecodedEntry::Account(a) => &a.name,
            DecodedEntry::Group(g) => &g.name,
            DecodedEntry::Share(s) => &s.name,
            DecodedEntry::Session(s) => &s.client,
            DecodedEntry::Connection(c) => c
                .net_name
                .as_deref()
                .or(c.user.as_deref())
                .unwrap_or_default(),
            DecodedEntry::Server(s) => &s.name,
            DecodedEntry::Disk(d) => &d.drive,
            DecodedEntry::WorkstationUser(w) => &w.user,
        }
    }

    /// Short label for the entry variant
    pub fn label(&self) -> &'static str {
        match self {
            DecodedEntry::Account(_) => "account",
            DecodedEntry::Group(_) => "group",
            DecodedEntry::Share(_) => "share",
            DecodedEntry::Session(_) => "session",
            DecodedEntry::Connection(_) => "connection",
            DecodedEntry::Server(_) => "server",
            DecodedEntry::Disk(_) => "disk",
            DecodedEntry::WorkstationUser(_) => "workstation_user",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_bits() {
        let usage = ResourceUsage(ResourceUsage::CONTAINER | ResourceUsage::CONNECTABLE);
        assert!(usage.is_container());
        assert!(usage.is_connectable());
        assert!(!ResourceUsage(ResourceUsage::CONNECTABLE).is_container());
    }

    #[test]
    fn test_enum_raw_values() {
        assert_eq!(ResourceScope::from_u32(2), ResourceScope::GlobalNet);
        assert_eq!(ResourceScope::from_u32(9), ResourceScope::Other(9));
        assert_eq!(DisplayType::from_u32(3), DisplayType::Share);
        assert_eq!(DisplayType::Other(42).as_u32(), 42);
        assert_eq!(ResourceType::from_u32(1), ResourceType::Disk);
    }

    #[test]
    fn test_resource_type_filter() {
        assert!(ResourceType::Any.admits(ResourceType::Print));
        assert!(ResourceType::Disk.admits(ResourceType::Disk));
        assert!(!ResourceType::Disk.admits(ResourceType::Print));
    }

    #[test]
    fn test_locator_comparison() {
        let upper = ResourceLocator {
            remote_name: "\\\\FILESRV\\Public".into(),
            provider: Some("Microsoft Windows Network".into()),
        };
        let lower = ResourceLocator {
            remote_name: "\\\\filesrv\\public".into(),
            provider: Some("microsoft windows network".into()),
        };
        assert!(upper.same_resource(&lower));
        assert_eq!(upper.folded(), lower.folded());

        let unnamed = ResourceLocator {
            provider: None,
            ..upper.clone()
        };
        assert!(!unnamed.same_resource(&upper));
    }

    #[test]
    fn test_account_type_from_flags() {
        let flags = AccountFlags(AccountFlags::NORMAL_ACCOUNT | AccountFlags::SCRIPT);
        assert_eq!(flags.account_type(), Some(AccountType::Normal));

        let machine = AccountFlags(AccountFlags::WORKSTATION_TRUST_ACCOUNT);
        assert_eq!(machine.account_type(), Some(AccountType::WorkstationTrust));
        assert!(AccountType::WorkstationTrust.is_machine());

        let disabled = flags.with(AccountFlags::ACCOUNT_DISABLE);
        assert!(disabled.is_disabled());
        assert!(!disabled.without(AccountFlags::ACCOUNT_DISABLE).is_disabled());
    }

    #[test]
    fn test_server_roles() {
        let pdc = ServerTypes(ServerTypes::SERVER | ServerTypes::DOMAIN_CTRL);
        assert!(pdc.is_primary_dc());
        assert!(!pdc.is_backup_dc());

        let bdc = ServerTypes(ServerTypes::SERVER | ServerTypes::DOMAIN_BAKCTRL);
        assert!(bdc.is_backup_dc());
        assert!(bdc.intersects(ServerTypes(ServerTypes::SERVER)));
    }

    #[test]
    fn test_resource_node_json() {
        let json = r#"{"remote_name": "\\\\FILESRV", "display_type": "server", "usage": 2}"#;
        let node: ResourceNode = serde_json::from_str(json).unwrap();
        assert!(node.is_container());
        assert_eq!(node.scope, ResourceScope::GlobalNet);
        assert_eq!(node.display_type, DisplayType::Server);
        assert_eq!(node.locator().remote_name, "\\\\FILESRV");
    }

    #[test]
    fn test_decoded_entry_tagging() {
        let entry = DecodedEntry::Disk(DiskLabel { drive: "C:".into() });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "disk");
        assert_eq!(entry.name(), "C:");
    }
}
