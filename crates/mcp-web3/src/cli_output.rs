//! Centralised helpers for user-facing CLI output.
//!
//! Notices go to stderr; listings and machine-readable output go to stdout.

use crate::{
    catalog::{Catalog, Network},
    selection::{SelectIgnored, SelectionStore, ToggleIgnored},
};
use eyre::Context as _;
use std::io::Write as _;

fn stderr_writeln(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    if stderr.write_all(b"\n").is_err() {
        return;
    }
    let _flush = stderr.flush();
}

pub fn stdout_writeln(s: &str) -> eyre::Result<()> {
    writeln!(std::io::stdout().lock(), "{s}").context("write stdout")
}

pub fn stdout_json(v: &serde_json::Value) -> eyre::Result<()> {
    let s = serde_json::to_string_pretty(v).context("serialize output")?;
    stdout_writeln(&s)
}

pub fn print_select_ignored(network: &str, reason: SelectIgnored) {
    stderr_writeln(&format!("mcp-web3: not selecting '{network}': {reason}."));
}

pub fn print_toggle_ignored(tool: &str, reason: ToggleIgnored) {
    stderr_writeln(&format!("mcp-web3: leaving '{tool}' unchanged: {reason}."));
}

pub fn print_notice(msg: &str) {
    stderr_writeln(&format!("mcp-web3: {msg}"));
}

pub fn render_networks(catalog: &Catalog, active: &str) -> String {
    catalog
        .networks()
        .iter()
        .map(|n| {
            let marker = if n.id == active { '*' } else { ' ' };
            format!(
                "{marker} {:<12} {:<12} {:<7} {:<12} {} tools",
                n.id,
                n.name,
                n.chain_type.as_str(),
                n.status.as_str(),
                n.tools.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per tool: `[x]` enabled, `[ ]` disabled, `[R]` required.
///
/// `store` is `None` when listing a network other than the active one.
pub fn render_tools(network: &Network, store: Option<&SelectionStore<'_>>) -> String {
    let header = format!("{} ({})", network.name, network.status.as_str());
    let lines = network.tools.iter().map(|t| {
        let mark = if t.required {
            "[R]"
        } else if store.is_some_and(|s| s.is_enabled(&t.id)) {
            "[x]"
        } else {
            "[ ]"
        };
        format!(
            "{mark} {:<22} {:>7} uses  {}",
            t.id, t.usage_count, t.description
        )
    });
    std::iter::once(header)
        .chain(lines)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_status(store: &SelectionStore<'_>) -> String {
    let n = store.active_network();
    let ids = store.enabled_tool_ids();
    format!(
        "network: {} ({})\nenabled: {}",
        n.id,
        n.name,
        if ids.is_empty() {
            "(none)".to_owned()
        } else {
            ids.join(", ")
        }
    )
}
