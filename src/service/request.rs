//! Request key types shared by callers and service implementations
//!
//! A [`RequestKey`] names one enumeration: where (`Target`), what
//! (`RecordKind`) and which subset (`Filter`). Resume cursors are bound
//! to the key that produced them.

use crate::error::{RequestField, ServiceError, ServiceResult};
use crate::service::types::{AccountType, ResourceLocator, ResourceScope, ResourceType, ServerTypes};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Record kind (selector) of an enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Account,
    GlobalGroup,
    LocalGroup,
    Share,
    Session,
    Connection,
    Server,
    Disk,
    LoggedOnUser,
    NetResource,
}

impl RecordKind {
    /// Information level the service is asked for
    pub fn info_level(self) -> u32 {
        match self {
            RecordKind::Account => 1,
            RecordKind::GlobalGroup => 3,
            RecordKind::LocalGroup => 1,
            RecordKind::Share => 502,
            RecordKind::Session => 10,
            RecordKind::Connection => 1,
            RecordKind::Server => 101,
            RecordKind::Disk => 0,
            RecordKind::LoggedOnUser => 0,
            RecordKind::NetResource => 0,
        }
    }

    /// Whether records of this kind form a hierarchy
    pub fn is_hierarchical(self) -> bool {
        self == RecordKind::NetResource
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Account => "account",
            RecordKind::GlobalGroup => "group",
            RecordKind::LocalGroup => "local group",
            RecordKind::Share => "share",
            RecordKind::Session => "session",
            RecordKind::Connection => "connection",
            RecordKind::Server => "server",
            RecordKind::Disk => "disk",
            RecordKind::LoggedOnUser => "logged-on user",
            RecordKind::NetResource => "network resource",
        }
    }

    /// Default filter used when the caller does not pick one
    pub fn default_filter(self) -> Filter {
        match self {
            RecordKind::Account => Filter::Accounts(AccountType::Normal),
            RecordKind::Server => Filter::ServerTypes(ServerTypes(ServerTypes::ALL)),
            RecordKind::NetResource => Filter::Resources(ResourceType::Any),
            _ => Filter::None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an enumeration runs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// The local machine
    Local,
    /// A named server, with or without leading backslashes
    Server(String),
    /// A domain (server lists only)
    Domain(String),
    /// A network resource scope, optionally under a container node
    Network {
        scope: ResourceScope,
        container: Option<ResourceLocator>,
    },
}

impl Target {
    /// Build a server target, treating "" and "." as the local machine
    pub fn server(name: &str) -> Self {
        let bare = name.trim_start_matches('\\');
        if bare.is_empty() || bare == "." {
            Target::Local
        } else {
            Target::Server(bare.to_string())
        }
    }

    /// Root of a network resource scope
    pub fn network(scope: ResourceScope) -> Self {
        Target::Network {
            scope,
            container: None,
        }
    }

    /// Server name without leading backslashes
    pub fn server_name(&self) -> Option<&str> {
        match self {
            Target::Server(name) => Some(name.trim_start_matches('\\')),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Local => f.write_str("."),
            Target::Server(name) => write!(f, "\\\\{}", name.trim_start_matches('\\')),
            Target::Domain(domain) => f.write_str(domain),
            Target::Network {
                scope,
                container: None,
            } => write!(f, "{} network", scope),
            Target::Network {
                container: Some(locator),
                ..
            } => f.write_str(&locator.remote_name),
        }
    }
}

/// Subset of records an enumeration returns
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    #[default]
    None,
    /// Accounts of one type
    Accounts(AccountType),
    /// Sessions from a client computer and/or for a user
    Sessions {
        client: Option<String>,
        user: Option<String>,
    },
    /// Connections to a share name, or from a `\\computer`
    Connections { qualifier: String },
    /// Servers with any of these role bits
    ServerTypes(ServerTypes),
    /// Network resources of one type (containers always pass)
    Resources(ResourceType),
}

impl Filter {
    fn applies_to(&self, kind: RecordKind) -> bool {
        match self {
            Filter::None => kind != RecordKind::Connection,
            Filter::Accounts(_) => kind == RecordKind::Account,
            Filter::Sessions { .. } => kind == RecordKind::Session,
            Filter::Connections { qualifier } => {
                kind == RecordKind::Connection && !qualifier.trim_start_matches('\\').is_empty()
            }
            Filter::ServerTypes(_) => kind == RecordKind::Server,
            Filter::Resources(_) => kind == RecordKind::NetResource,
        }
    }
}

/// Identity of one enumeration request: (target, selector, filter)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub target: Target,
    pub kind: RecordKind,
    pub filter: Filter,
}

impl RequestKey {
    pub fn new(target: Target, kind: RecordKind, filter: Filter) -> Self {
        Self {
            target,
            kind,
            filter,
        }
    }

    /// Opaque fingerprint binding resume cursors to this key
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Check that target, selector and filter fit together
    pub fn validate(&self) -> ServiceResult<()> {
        let target_ok = match (&self.target, self.kind) {
            (Target::Network { .. }, kind) => kind == RecordKind::NetResource,
            (_, RecordKind::NetResource) => false,
            (Target::Domain(name), kind) => kind == RecordKind::Server && !name.is_empty(),
            (Target::Server(name), kind) => {
                kind != RecordKind::Server && !name.trim_start_matches('\\').is_empty()
            }
            (Target::Local, _) => true,
        };
        if !target_ok {
            return Err(ServiceError::InvalidParameter {
                field: RequestField::Target,
            });
        }

        if !self.filter.applies_to(self.kind) {
            return Err(ServiceError::InvalidParameter {
                field: RequestField::Filter,
            });
        }

        Ok(())
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.kind, self.target)
    }
}

/// Page capacity offered to the service per fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capacity {
    /// At most this many records per page
    Entries(u32),
    /// At most this many buffer bytes per page
    Bytes(u32),
    /// Let the service size the page
    #[default]
    Unbounded,
}

impl Capacity {
    /// Fixed buffer used for each resource container
    pub const RESOURCE_PAGE: Capacity = Capacity::Bytes(16 * 1024);

    /// Whether the capacity can hold anything at all
    pub fn is_usable(&self) -> bool {
        !matches!(self, Capacity::Entries(0) | Capacity::Bytes(0))
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Entries(n) => write!(f, "{} entries", n),
            Capacity::Bytes(n) => write!(f, "{} bytes", n),
            Capacity::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Opaque continuation token for one enumeration request
///
/// Callers pass it back unchanged; only the service that issued it reads
/// the position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeCursor {
    fingerprint: u64,
    position: u64,
}

impl ResumeCursor {
    /// Issue a cursor continuing `key` at `position`
    pub fn issue(key: &RequestKey, position: u64) -> Self {
        Self {
            fingerprint: key.fingerprint(),
            position,
        }
    }

    /// Whether this cursor was issued for `key`
    pub fn belongs_to(&self, key: &RequestKey) -> bool {
        self.fingerprint == key.fingerprint()
    }

    /// Service-side position; meaningless to callers
    pub fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share_key(server: &str) -> RequestKey {
        RequestKey::new(Target::server(server), RecordKind::Share, Filter::None)
    }

    #[test]
    fn test_server_target_normalization() {
        assert_eq!(Target::server("."), Target::Local);
        assert_eq!(Target::server(""), Target::Local);
        assert_eq!(Target::server("\\\\FILESRV"), Target::Server("FILESRV".into()));
        assert_eq!(Target::server("FILESRV").to_string(), "\\\\FILESRV");
    }

    #[test]
    fn test_cursor_binding() {
        let key = share_key("FILESRV");
        let cursor = ResumeCursor::issue(&key, 3);

        assert!(cursor.belongs_to(&key));
        assert!(!cursor.belongs_to(&share_key("PRINTSRV")));

        let other_kind = RequestKey::new(Target::server("FILESRV"), RecordKind::Session, Filter::None);
        assert!(!cursor.belongs_to(&other_kind));
    }

    #[test]
    fn test_validate_target_compatibility() {
        let servers_on_server = RequestKey::new(
            Target::server("FILESRV"),
            RecordKind::Server,
            RecordKind::Server.default_filter(),
        );
        assert_eq!(
            servers_on_server.validate(),
            Err(ServiceError::InvalidParameter {
                field: RequestField::Target
            })
        );

        let resources_on_server =
            RequestKey::new(Target::Local, RecordKind::NetResource, Filter::None);
        assert!(resources_on_server.validate().is_err());

        let resources = RequestKey::new(
            Target::network(ResourceScope::GlobalNet),
            RecordKind::NetResource,
            RecordKind::NetResource.default_filter(),
        );
        assert!(resources.validate().is_ok());
    }

    #[test]
    fn test_validate_filter_compatibility() {
        let connections = RequestKey::new(Target::Local, RecordKind::Connection, Filter::None);
        assert_eq!(
            connections.validate(),
            Err(ServiceError::InvalidParameter {
                field: RequestField::Filter
            })
        );

        let qualified = RequestKey::new(
            Target::Local,
            RecordKind::Connection,
            Filter::Connections {
                qualifier: "public".into(),
            },
        );
        assert!(qualified.validate().is_ok());

        let mismatched = RequestKey::new(
            Target::Local,
            RecordKind::Share,
            Filter::Accounts(AccountType::Normal),
        );
        assert!(mismatched.validate().is_err());
    }

    #[test]
    fn test_capacity_usable() {
        assert!(Capacity::Entries(1).is_usable());
        assert!(!Capacity::Entries(0).is_usable());
        assert!(!Capacity::Bytes(0).is_usable());
        assert!(Capacity::Unbounded.is_usable());
    }
}
