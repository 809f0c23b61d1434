//! Configuration types for netenum
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Target name parsing

use crate::error::ConfigError;
use crate::query::EnumerationRequest;
use crate::service::{
    AccountType, Capacity, Filter, RecordKind, ResourceScope, ServerTypes, Target,
};
use crate::walker::{WalkOptions, DEFAULT_MAX_DEPTH};
use clap::{Parser, ValueEnum};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Deepest walk the CLI accepts
const MAX_DEPTH_LIMIT: usize = 1024;

/// Page capacity limits
const MIN_PAGE_BYTES: u32 = 64;
const MAX_PAGE_BYTES: u32 = 16 * 1024 * 1024;
const MAX_PAGE_ENTRIES: u32 = 65_536;

/// Regex for server and domain names: optional `\\`, then a NetBIOS/DNS style name
static TARGET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\\\\)?([A-Za-z0-9][A-Za-z0-9._$-]{0,254})$").expect("Invalid target regex")
});

/// Enumerate accounts, groups, shares, sessions, servers and network resources
#[derive(Parser, Debug, Clone)]
#[command(
    name = "netenum",
    version,
    about = "Enumerate directory-service resources with paged queries",
    long_about = "Runs paged enumerations (users, groups, shares, sessions, connections, servers, \
                  disks, logged-on users) against a directory service, or walks the network \
                  resource tree.\n\n\
                  The directory is served from a JSON snapshot given with --snapshot.",
    after_help = "EXAMPLES:\n    \
        netenum user \\\\FILESRV --snapshot dir.json\n    \
        netenum share . --snapshot dir.json --page-entries 10\n    \
        netenum connection FILESRV --share PUBLIC --snapshot dir.json\n    \
        netenum server CORP --server-type domain-ctrl --snapshot dir.json\n    \
        netenum resource --scope global --max-depth 3 --snapshot dir.json -o net.db"
)]
pub struct CliArgs {
    /// What to enumerate
    #[arg(value_enum, ignore_case = true, value_name = "KIND")]
    pub kind: KindArg,

    /// Server (\\SERVER, SERVER or . for local); domain name for `server`
    #[arg(value_name = "TARGET")]
    pub target: Option<String>,

    /// JSON directory snapshot serving the enumeration
    #[arg(long, value_name = "FILE")]
    pub snapshot: PathBuf,

    /// Records per page
    #[arg(long, value_name = "NUM", conflicts_with = "page_bytes")]
    pub page_entries: Option<u32>,

    /// Buffer bytes per page
    #[arg(long, value_name = "BYTES")]
    pub page_bytes: Option<u32>,

    /// Maximum resource tree depth (resource only)
    #[arg(short = 'd', long, value_name = "NUM")]
    pub max_depth: Option<usize>,

    /// Resource scope to walk (resource only)
    #[arg(long, value_enum, value_name = "SCOPE")]
    pub scope: Option<ScopeArg>,

    /// Do not expand containers matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Account type to list (user only)
    #[arg(long, value_enum, value_name = "TYPE")]
    pub filter: Option<AccountFilterArg>,

    /// Only sessions from this client computer (session only)
    #[arg(long, value_name = "COMPUTER")]
    pub client: Option<String>,

    /// Only sessions for this user (session only)
    #[arg(long, value_name = "USER")]
    pub user: Option<String>,

    /// Share name, or \\COMPUTER, whose connections are listed (connection only)
    #[arg(long, value_name = "NAME")]
    pub share: Option<String>,

    /// Server role to list (server only)
    #[arg(long, value_enum, value_name = "TYPE")]
    pub server_type: Option<ServerTypeArg>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Also export results to a SQLite database
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Resource kind keyword
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    User,
    Group,
    Localgroup,
    Share,
    Session,
    #[value(alias = "loggedUser", alias = "logged-user")]
    Loggeduser,
    Connection,
    Server,
    Serverdisk,
    Resource,
}

impl KindArg {
    pub fn record_kind(self) -> RecordKind {
        match self {
            KindArg::User => RecordKind::Account,
            KindArg::Group => RecordKind::GlobalGroup,
            KindArg::Localgroup => RecordKind::LocalGroup,
            KindArg::Share => RecordKind::Share,
            KindArg::Session => RecordKind::Session,
            KindArg::Loggeduser => RecordKind::LoggedOnUser,
            KindArg::Connection => RecordKind::Connection,
            KindArg::Server => RecordKind::Server,
            KindArg::Serverdisk => RecordKind::Disk,
            KindArg::Resource => RecordKind::NetResource,
        }
    }

    /// Keyword as typed on the command line
    pub fn keyword(self) -> &'static str {
        match self {
            KindArg::User => "user",
            KindArg::Group => "group",
            KindArg::Localgroup => "localgroup",
            KindArg::Share => "share",
            KindArg::Session => "session",
            KindArg::Loggeduser => "loggedUser",
            KindArg::Connection => "connection",
            KindArg::Server => "server",
            KindArg::Serverdisk => "serverdisk",
            KindArg::Resource => "resource",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeArg {
    Connected,
    Global,
    Remembered,
}

impl From<ScopeArg> for ResourceScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Connected => ResourceScope::Connected,
            ScopeArg::Global => ResourceScope::GlobalNet,
            ScopeArg::Remembered => ResourceScope::Remembered,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountFilterArg {
    Normal,
    TempDuplicate,
    Interdomain,
    Workstation,
    Server,
}

impl From<AccountFilterArg> for AccountType {
    fn from(arg: AccountFilterArg) -> Self {
        match arg {
            AccountFilterArg::Normal => AccountType::Normal,
            AccountFilterArg::TempDuplicate => AccountType::TempDuplicate,
            AccountFilterArg::Interdomain => AccountType::InterdomainTrust,
            AccountFilterArg::Workstation => AccountType::WorkstationTrust,
            AccountFilterArg::Server => AccountType::ServerTrust,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerTypeArg {
    All,
    Server,
    DomainCtrl,
    BackupCtrl,
}

impl From<ServerTypeArg> for ServerTypes {
    fn from(arg: ServerTypeArg) -> Self {
        ServerTypes(match arg {
            ServerTypeArg::All => ServerTypes::ALL,
            ServerTypeArg::Server => ServerTypes::SERVER,
            ServerTypeArg::DomainCtrl => ServerTypes::DOMAIN_CTRL,
            ServerTypeArg::BackupCtrl => ServerTypes::DOMAIN_BAKCTRL,
        })
    }
}

/// Presentation of results on stdout
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// What the run does
#[derive(Debug, Clone)]
pub enum Job {
    /// One flat paged enumeration
    Query(EnumerationRequest),
    /// A resource tree walk
    Walk {
        scope: ResourceScope,
        options: WalkOptions,
    },
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct EnumConfig {
    /// Keyword the run was started with
    pub kind: KindArg,

    pub job: Job,

    /// JSON snapshot backing the directory service
    pub snapshot_path: PathBuf,

    /// SQLite export path
    pub output_path: Option<PathBuf>,

    pub format: OutputFormat,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl EnumConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let kind = args.kind;
        let keyword = kind.keyword();

        let not_applicable = |option: &str| ConfigError::NotApplicable {
            option: option.to_string(),
            kind: keyword.to_string(),
        };

        // Options tied to one kind
        let checks: [(&str, bool, bool); 8] = [
            ("--filter", args.filter.is_some(), kind == KindArg::User),
            ("--client", args.client.is_some(), kind == KindArg::Session),
            ("--user", args.user.is_some(), kind == KindArg::Session),
            ("--share", args.share.is_some(), kind == KindArg::Connection),
            ("--server-type", args.server_type.is_some(), kind == KindArg::Server),
            ("--scope", args.scope.is_some(), kind == KindArg::Resource),
            ("--max-depth", args.max_depth.is_some(), kind == KindArg::Resource),
            (
                "--exclude",
                !args.exclude_patterns.is_empty(),
                kind == KindArg::Resource,
            ),
        ];
        if let Some((option, _, _)) = checks.iter().find(|(_, given, allowed)| *given && !allowed) {
            return Err(not_applicable(*option));
        }

        let capacity = parse_capacity(args.page_entries, args.page_bytes)?;

        if !args.snapshot.exists() {
            return Err(ConfigError::MissingSnapshot {
                path: args.snapshot.clone(),
            });
        }

        if let Some(output) = &args.output {
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(ConfigError::InvalidOutputPath {
                        path: output.clone(),
                        reason: format!("Parent directory '{}' does not exist", parent.display()),
                    });
                }
            }
        }

        let job = if kind == KindArg::Resource {
            if args.target.is_some() {
                return Err(not_applicable("TARGET"));
            }

            let max_depth = args.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
            if max_depth == 0 || max_depth > MAX_DEPTH_LIMIT {
                return Err(ConfigError::InvalidMaxDepth {
                    depth: max_depth,
                    max: MAX_DEPTH_LIMIT,
                });
            }

            // Compile exclude patterns
            let exclude = args
                .exclude_patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                        pattern: p.clone(),
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let mut options = WalkOptions {
                max_depth,
                exclude,
                ..Default::default()
            };
            if capacity != Capacity::Unbounded {
                options.capacity = capacity;
            }

            Job::Walk {
                scope: args.scope.map_or(ResourceScope::GlobalNet, Into::into),
                options,
            }
        } else {
            let record_kind = kind.record_kind();
            let target = parse_target(record_kind, args.target.as_deref())?;
            let filter = match kind {
                KindArg::User => Filter::Accounts(
                    args.filter.map_or(AccountType::Normal, Into::into),
                ),
                KindArg::Session => Filter::Sessions {
                    client: args.client.clone(),
                    user: args.user.clone(),
                },
                KindArg::Connection => Filter::Connections {
                    qualifier: args.share.clone().ok_or_else(|| ConfigError::MissingOption {
                        option: "--share".to_string(),
                        kind: keyword.to_string(),
                    })?,
                },
                KindArg::Server => Filter::ServerTypes(
                    args.server_type
                        .map_or(ServerTypes(ServerTypes::ALL), Into::into),
                ),
                _ => record_kind.default_filter(),
            };

            Job::Query(
                EnumerationRequest::new(record_kind, target)
                    .with_filter(filter)
                    .with_capacity(capacity),
            )
        };

        Ok(Self {
            kind,
            job,
            snapshot_path: args.snapshot,
            output_path: args.output,
            format: args.format,
            show_progress: !args.quiet && args.format == OutputFormat::Text,
            verbose: args.verbose,
        })
    }

    /// Label of the enumerated target, for headers and export metadata
    pub fn target_label(&self) -> String {
        match &self.job {
            Job::Query(request) => request.target().to_string(),
            Job::Walk { scope, .. } => Target::network(*scope).to_string(),
        }
    }
}

/// Parse the TARGET argument for a flat enumeration
///
/// `server` takes a domain name; every other kind takes a server name,
/// with "." or no target meaning the local machine.
pub fn parse_target(kind: RecordKind, target: Option<&str>) -> Result<Target, ConfigError> {
    let Some(raw) = target.map(str::trim) else {
        return Ok(Target::Local);
    };
    if raw.is_empty() || raw == "." {
        return Ok(Target::Local);
    }

    let caps = TARGET_REGEX
        .captures(raw)
        .ok_or_else(|| ConfigError::InvalidTarget {
            target: raw.to_string(),
            reason: "Expected \\\\SERVER, SERVER or .".into(),
        })?;
    let name = caps.get(1).map_or("", |m| m.as_str());

    if kind == RecordKind::Server {
        if raw.starts_with('\\') {
            return Err(ConfigError::InvalidTarget {
                target: raw.to_string(),
                reason: "server lists take a domain name, not a server".into(),
            });
        }
        return Ok(Target::Domain(name.to_string()));
    }

    Ok(Target::server(name))
}

fn parse_capacity(entries: Option<u32>, bytes: Option<u32>) -> Result<Capacity, ConfigError> {
    match (entries, bytes) {
        (Some(n), _) if n == 0 || n > MAX_PAGE_ENTRIES => Err(ConfigError::InvalidCapacity {
            value: n,
            min: 1,
            max: MAX_PAGE_ENTRIES,
        }),
        (Some(n), _) => Ok(Capacity::Entries(n)),
        (None, Some(n)) if !(MIN_PAGE_BYTES..=MAX_PAGE_BYTES).contains(&n) => {
            Err(ConfigError::InvalidCapacity {
                value: n,
                min: MIN_PAGE_BYTES,
                max: MAX_PAGE_BYTES,
            })
        }
        (None, Some(n)) => Ok(Capacity::Bytes(n)),
        (None, None) => Ok(Capacity::Unbounded),
    }
}
