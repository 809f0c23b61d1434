//! Text and JSON presentation of enumeration results
//!
//! The core returns structured values; only this module turns them into
//! lines for a terminal or a JSON document.

use crate::query::{EnumerationRequest, QueryOutcome};
use crate::service::{DecodedEntry, Filter, RecordKind, Target};
use crate::walker::{ResourceTree, WalkOutcome};
use serde_json::{json, Value};
use std::fmt::Write;

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

/// One tab-separated line for an entry
pub fn render_entry(entry: &DecodedEntry) -> String {
    match entry {
        DecodedEntry::Account(a) => format!(
            "{}\t{}\t{}\t0x{:08x}",
            a.name,
            or_dash(a.full_name.as_deref()),
            a.user_id,
            a.flags.bits()
        ),
        DecodedEntry::Group(g) => match g.group_id {
            Some(id) => format!("{}\t{}\t{}", g.name, id, or_dash(g.comment.as_deref())),
            None => format!("{}\t{}", g.name, or_dash(g.comment.as_deref())),
        },
        DecodedEntry::Share(s) => format!(
            "{}\t0x{:08x}\t{}/{}\t{}\t{}",
            s.name,
            s.share_type,
            s.current_uses,
            if s.max_uses == u32::MAX {
                "unlimited".to_string()
            } else {
                s.max_uses.to_string()
            },
            or_dash(s.path.as_deref()),
            or_dash(s.remark.as_deref())
        ),
        DecodedEntry::Session(s) => format!(
            "{}\t{}\t{}s\t{}s",
            s.client,
            or_dash(s.user.as_deref()),
            s.active_secs,
            s.idle_secs
        ),
        DecodedEntry::Connection(c) => format!(
            "{}\t{}",
            or_dash(c.user.as_deref()),
            or_dash(c.net_name.as_deref())
        ),
        DecodedEntry::Server(s) => {
            let role = if s.server_type.is_primary_dc() {
                "\tPDC"
            } else if s.server_type.is_backup_dc() {
                "\tBDC"
            } else {
                ""
            };
            format!(
                "{}\t{}.{}\t0x{:08x}{}",
                s.name,
                s.version_major,
                s.version_minor,
                s.server_type.bits(),
                role
            )
        }
        DecodedEntry::Disk(d) => d.drive.clone(),
        DecodedEntry::WorkstationUser(w) => w.user.clone(),
    }
}

/// Line printed when an enumeration returns nothing
pub fn empty_message(request: &EnumerationRequest) -> String {
    let target = request.target();
    match (request.kind(), request.filter()) {
        (RecordKind::Connection, Filter::Connections { qualifier }) => {
            if qualifier.starts_with('\\') {
                let server = match target {
                    Target::Local => "LocalMachine".to_string(),
                    other => other.to_string(),
                };
                format!("No connection to {} from {}", server, qualifier)
            } else {
                let server = match target {
                    Target::Local => "\\\\LocalMachine".to_string(),
                    other => other.to_string(),
                };
                format!("No one connected to {}\\{}", server, qualifier)
            }
        }
        (kind, _) => format!("No {} entries on {}", kind, target),
    }
}

/// Text rendering of a flat enumeration
pub fn render_entries(request: &EnumerationRequest, outcome: &QueryOutcome<DecodedEntry>) -> String {
    let mut out = String::new();
    if outcome.entries.is_empty() && outcome.error.is_none() {
        out.push_str(&empty_message(request));
        out.push('\n');
        return out;
    }

    for entry in &outcome.entries {
        out.push_str(&render_entry(entry));
        out.push('\n');
    }

    if let Some(error) = &outcome.error {
        let _ = writeln!(
            out,
            "Error: {} (code {}) after {} entries",
            error,
            error.code(),
            outcome.entries.len()
        );
    }
    out
}

/// Indented tree, two spaces per level, with expansion markers
pub fn render_tree(tree: &ResourceTree) -> String {
    let mut out = String::new();
    for node in tree.preorder() {
        let indent = "  ".repeat(node.depth.saturating_sub(1));
        let _ = write!(out, "{}{}", indent, node.resource.remote_name);
        if let Some(comment) = node.resource.comment.as_deref().filter(|c| !c.is_empty()) {
            let _ = write!(out, " ({})", comment);
        }
        let marker = node.expansion.marker();
        if !marker.is_empty() {
            let _ = write!(out, " {}", marker);
        }
        out.push('\n');
    }
    out
}

/// Text rendering of a walk: the tree followed by its failures
pub fn render_walk(outcome: &WalkOutcome) -> String {
    let mut out = render_tree(&outcome.tree);
    for failure in &outcome.failures {
        let at = failure
            .resource
            .as_ref()
            .map_or_else(|| format!("{} network", outcome.scope), |r| r.remote_name.clone());
        let _ = writeln!(out, "Error: {}: {} (code {})", at, failure.error, failure.error.code());
    }
    out
}

pub fn query_json(request: &EnumerationRequest, outcome: &QueryOutcome<DecodedEntry>) -> Value {
    json!({
        "kind": request.kind().name(),
        "target": request.target().to_string(),
        "entries": outcome.entries,
        "complete": outcome.is_complete(),
        "error": outcome.error.as_ref().map(|e| json!({
            "code": e.code(),
            "message": e.to_string(),
        })),
        "pages": outcome.stats.pages,
        "total_hint": outcome.stats.total_hint,
    })
}

fn node_json(tree: &ResourceTree, id: crate::walker::NodeId) -> Value {
    let Some(node) = tree.get(id) else {
        return Value::Null;
    };
    let children: Vec<Value> = node.children.iter().map(|c| node_json(tree, *c)).collect();
    json!({
        "resource": node.resource,
        "depth": node.depth,
        "expansion": node.expansion,
        "children": children,
    })
}

pub fn walk_json(outcome: &WalkOutcome) -> Value {
    let roots: Vec<Value> = outcome
        .tree
        .roots()
        .iter()
        .map(|id| node_json(&outcome.tree, *id))
        .collect();
    let failures: Vec<Value> = outcome
        .failures
        .iter()
        .map(|f| {
            json!({
                "node": f.resource.as_ref().map(|r| r.remote_name.clone()),
                "code": f.error.code(),
                "message": f.error.to_string(),
            })
        })
        .collect();

    json!({
        "scope": outcome.scope.to_string(),
        "roots": roots,
        "failures": failures,
        "nodes": outcome.stats.nodes,
        "max_depth": outcome.stats.max_depth,
    })
}
