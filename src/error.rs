//! Error types for netenum
//!
//! This module defines the error hierarchy that covers:
//! - Directory service failures surfaced by open/fetch calls
//! - SQLite export errors
//! - Configuration and CLI errors
//! - Snapshot loading errors
//!
//! `MoreData` is deliberately absent: it is a page status, not an error.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the netenum application
#[derive(Error, Debug)]
pub enum EnumError {
    /// Directory service errors
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Database export errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Snapshot could not be parsed
    #[error("Invalid snapshot '{path}': {source}")]
    Snapshot {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Request fields a service can reject as malformed
///
/// The index is the position of the field in an enumeration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestField {
    Target,
    Selector,
    Filter,
    Capacity,
    Resume,
    /// The service did not say which field it rejected
    Unspecified,
}

impl RequestField {
    /// Position of the field within the request
    pub fn index(self) -> u32 {
        match self {
            RequestField::Target => 0,
            RequestField::Selector => 1,
            RequestField::Filter => 2,
            RequestField::Capacity => 3,
            RequestField::Resume => 4,
            RequestField::Unspecified => u32::MAX,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RequestField::Target => "target",
            RequestField::Selector => "selector",
            RequestField::Filter => "filter",
            RequestField::Capacity => "capacity",
            RequestField::Resume => "resume cursor",
            RequestField::Unspecified => "unspecified",
        }
    }
}

impl std::fmt::Display for RequestField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestField::Unspecified => f.write_str("unspecified field"),
            other => write!(f, "#{} ({})", other.index(), other.name()),
        }
    }
}

/// Directory service errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Caller lacks the rights to enumerate the target
    #[error("Permission denied: '{target}'")]
    PermissionDenied { target: String },

    /// Target server, domain or container does not exist or cannot be enumerated
    #[error("Invalid target '{target}'")]
    InvalidTarget { target: String },

    /// A request field was rejected
    #[error("Invalid parameter {field}")]
    InvalidParameter { field: RequestField },

    /// Nothing to return; PagedQuery treats this as an empty remainder
    #[error("Not found: '{target}'")]
    NotFound { target: String },

    /// Service or network is not reachable
    #[error("Service unavailable (status {code})")]
    Unavailable { code: u32 },

    /// Page capacity cannot hold a single record
    #[error("Page capacity too small: at least {required} bytes required")]
    BufferTooSmall { required: usize },

    /// Pass-through of an opaque lower-level status
    #[error("Service error {code}: {message}")]
    Unknown { code: u32, message: String },
}

impl ServiceError {
    /// Translate a raw Win32 / network-management status code
    ///
    /// Success and continuation codes (`0`, `ERROR_MORE_DATA`,
    /// `ERROR_NO_MORE_ITEMS`) are not errors and must not be passed here;
    /// they map to `Unknown` if they are.
    pub fn from_code(code: u32, target: &str) -> Self {
        use codes::*;

        match code {
            ERROR_ACCESS_DENIED => ServiceError::PermissionDenied {
                target: target.into(),
            },
            ERROR_BAD_NETPATH | ERROR_BAD_NET_NAME | ERROR_NOT_CONTAINER
            | NERR_INVALID_COMPUTER => ServiceError::InvalidTarget {
                target: target.into(),
            },
            ERROR_INVALID_PARAMETER => ServiceError::InvalidParameter {
                field: RequestField::Unspecified,
            },
            NERR_GROUP_NOT_FOUND | NERR_USER_NOT_FOUND | NERR_NET_NAME_NOT_FOUND
            | NERR_CLIENT_NAME_NOT_FOUND => ServiceError::NotFound {
                target: target.into(),
            },
            ERROR_NO_NETWORK | ERROR_NETWORK_UNREACHABLE | NERR_NET_NOT_STARTED
            | NERR_SERVER_NOT_STARTED | ERROR_NO_BROWSER_SERVERS_FOUND => {
                ServiceError::Unavailable { code }
            }
            ERROR_INSUFFICIENT_BUFFER | NERR_BUF_TOO_SMALL => {
                ServiceError::BufferTooSmall { required: 0 }
            }
            _ => ServiceError::Unknown {
                code,
                message: describe_code(code).into(),
            },
        }
    }

    /// Status code this error would carry on the wire
    pub fn code(&self) -> u32 {
        use codes::*;

        match self {
            ServiceError::PermissionDenied { .. } => ERROR_ACCESS_DENIED,
            ServiceError::InvalidTarget { .. } => ERROR_BAD_NETPATH,
            ServiceError::InvalidParameter { .. } => ERROR_INVALID_PARAMETER,
            ServiceError::NotFound { .. } => NERR_NET_NAME_NOT_FOUND,
            ServiceError::Unavailable { code } => *code,
            ServiceError::BufferTooSmall { .. } => NERR_BUF_TOO_SMALL,
            ServiceError::Unknown { code, .. } => *code,
        }
    }

    /// Check if this error is confined to one target (skip it and keep going)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ServiceError::PermissionDenied { .. }
                | ServiceError::InvalidTarget { .. }
                | ServiceError::NotFound { .. }
        )
    }

    /// Check if this error means "empty result" rather than failure
    pub fn is_empty_result(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }

    /// Malformed record layout detected while decoding a page
    pub fn malformed(message: impl Into<String>) -> Self {
        ServiceError::Unknown {
            code: codes::ERROR_INVALID_DATA,
            message: message.into(),
        }
    }
}

/// Raw status codes understood by [`ServiceError::from_code`]
pub mod codes {
    pub const NO_ERROR: u32 = 0;
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    pub const ERROR_INVALID_DATA: u32 = 13;
    pub const ERROR_BAD_NETPATH: u32 = 53;
    pub const ERROR_BAD_NET_NAME: u32 = 67;
    pub const ERROR_INVALID_PASSWORD: u32 = 86;
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
    pub const ERROR_MORE_DATA: u32 = 234;
    pub const ERROR_NO_MORE_ITEMS: u32 = 259;
    pub const ERROR_NOT_CONTAINER: u32 = 1207;
    pub const ERROR_NO_NETWORK: u32 = 1222;
    pub const ERROR_NETWORK_UNREACHABLE: u32 = 1231;
    pub const ERROR_INVALID_ACCOUNT_NAME: u32 = 1315;
    pub const ERROR_NO_BROWSER_SERVERS_FOUND: u32 = 6118;

    /// Start of the network-management range
    pub const NERR_BASE: u32 = 2100;
    pub const NERR_NET_NOT_STARTED: u32 = 2102;
    pub const NERR_SERVER_NOT_STARTED: u32 = 2114;
    pub const NERR_BUF_TOO_SMALL: u32 = 2123;
    pub const NERR_GROUP_NOT_FOUND: u32 = 2220;
    pub const NERR_USER_NOT_FOUND: u32 = 2221;
    pub const NERR_USER_EXISTS: u32 = 2224;
    pub const NERR_NET_NAME_NOT_FOUND: u32 = 2310;
    pub const NERR_CLIENT_NAME_NOT_FOUND: u32 = 2312;
    pub const NERR_INVALID_COMPUTER: u32 = 2351;
    /// End of the network-management range
    pub const MAX_NERR: u32 = NERR_BASE + 899;

    /// Whether a code falls in the network-management message range
    pub fn is_network_code(code: u32) -> bool {
        (NERR_BASE..=MAX_NERR).contains(&code)
    }
}

fn describe_code(code: u32) -> &'static str {
    if codes::is_network_code(code) {
        "network management error"
    } else {
        "system error"
    }
}

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to create database file
    #[error("Failed to create database at '{path}': {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    /// Entry detail could not be serialized
    #[error("Failed to serialize entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Target name is not a valid server or domain name
    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Option not applicable to the selected kind
    #[error("'{option}' cannot be used with '{kind}'")]
    NotApplicable { option: String, kind: String },

    /// Required option missing for the selected kind
    #[error("'{kind}' requires {option}")]
    MissingOption { option: String, kind: String },

    /// Invalid page capacity
    #[error("Invalid page capacity {value}: must be between {min} and {max}")]
    InvalidCapacity { value: u32, min: u32, max: u32 },

    /// Invalid depth cap
    #[error("Invalid max depth {depth}: must be between 1 and {max}")]
    InvalidMaxDepth { depth: usize, max: usize },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Output path error
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },

    /// Snapshot file missing
    #[error("Snapshot '{path}' does not exist")]
    MissingSnapshot { path: PathBuf },
}

/// Result type alias for EnumError
pub type Result<T> = std::result::Result<T, EnumError>;

/// Result type alias for ServiceError
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Result type alias for DbError
pub type DbResult<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_recoverable() {
        let denied = ServiceError::PermissionDenied {
            target: "\\\\FILESRV".into(),
        };
        assert!(denied.is_recoverable());

        let unavailable = ServiceError::Unavailable { code: 1222 };
        assert!(!unavailable.is_recoverable());
    }

    #[test]
    fn test_from_code_taxonomy() {
        assert!(matches!(
            ServiceError::from_code(5, "x"),
            ServiceError::PermissionDenied { .. }
        ));
        assert!(matches!(
            ServiceError::from_code(53, "x"),
            ServiceError::InvalidTarget { .. }
        ));
        assert!(matches!(
            ServiceError::from_code(2221, "x"),
            ServiceError::NotFound { .. }
        ));
        assert!(matches!(
            ServiceError::from_code(1222, "x"),
            ServiceError::Unavailable { code: 1222 }
        ));
        assert_eq!(
            ServiceError::from_code(87, "x"),
            ServiceError::InvalidParameter {
                field: RequestField::Unspecified
            }
        );

        match ServiceError::from_code(2400, "x") {
            ServiceError::Unknown { code, message } => {
                assert_eq!(code, 2400);
                assert_eq!(message, "network management error");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wire_code_for_known_errors() {
        let err = ServiceError::from_code(5, "srv");
        assert_eq!(err.code(), codes::ERROR_ACCESS_DENIED);
        assert_eq!(ServiceError::malformed("bad").code(), codes::ERROR_INVALID_DATA);
    }

    #[test]
    fn test_request_field_display() {
        let err = ServiceError::InvalidParameter {
            field: RequestField::Resume,
        };
        assert_eq!(err.to_string(), "Invalid parameter #4 (resume cursor)");
    }

    #[test]
    fn test_error_conversion() {
        let svc = ServiceError::NotFound {
            target: "\\\\missing".into(),
        };
        let err: EnumError = svc.into();
        assert!(matches!(err, EnumError::Service(_)));
    }
}
