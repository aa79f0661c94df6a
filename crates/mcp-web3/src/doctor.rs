use crate::{
    catalog::{self, CatalogSource},
    export,
    paths::AppPaths,
    store::{self, ConfigStore, SelectionFileStore},
};
use eyre::Context as _;
use serde_json::{json, Value};

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Collect the report. Never fails on bad state; problems are reported inside the JSON.
///
/// Uses the same effective config as the other commands (environment overrides included)
/// but never performs the first-run write.
pub fn collect(paths: &AppPaths) -> Value {
    let config_path = paths.config_file();
    let config_exists = config_path.exists();
    let (effective, config_err) = match ConfigStore::new(paths).load_read_only() {
        Ok(cfg) => (cfg, None),
        Err(e) => (store::default_with_env_overrides(), Some(format!("{e:#}"))),
    };

    let (catalog_report, catalog) = match catalog::load_effective(&effective, paths) {
        Ok((c, source)) => {
            let path = match &source {
                CatalogSource::File(p) | CatalogSource::Cached(p) => Some(p.clone()),
                CatalogSource::Builtin => None,
            };
            let available = c
                .networks()
                .iter()
                .filter(|n| n.status.is_selectable())
                .count();
            (
                json!({
                  "ok": true,
                  "source": source.label(),
                  "path": path,
                  "networks": c.networks().len(),
                  "available_networks": available,
                  "tools": c.tool_count(),
                }),
                Some(c),
            )
        }
        Err(e) => (json!({ "ok": false, "error": format!("{e:#}") }), None),
    };

    let files = SelectionFileStore::new(paths);
    let selection_report = match catalog.as_ref() {
        Some(c) => match files.load(c, effective.default_network.as_deref()) {
            Ok(s) => json!({
              "ok": true,
              "saved": files.exists(),
              "network": s.active_network().id,
              "enabled_tools": s.enabled_tool_ids(),
            }),
            Err(e) => json!({ "ok": false, "saved": files.exists(), "error": format!("{e:#}") }),
        },
        None => json!({ "ok": false, "saved": files.exists(), "error": "catalog unavailable" }),
    };

    // Informational only; a missing client install does not fail the report.
    let client_report = match export::claude_desktop_default_path() {
        Ok(p) => match export::read_installed(&p, &effective.export.server_name) {
            Ok(entry) => json!({
              "path": p,
              "installed": entry.is_some(),
              "enabled_tools": entry.map(|e| e.enabled_tool_ids()),
            }),
            Err(e) => json!({ "path": p, "installed": false, "error": format!("{e:#}") }),
        },
        Err(e) => json!({ "path": null, "installed": false, "error": format!("{e:#}") }),
    };

    let ok = config_err.is_none()
        && catalog_report.get("ok").and_then(Value::as_bool) == Some(true)
        && selection_report.get("ok").and_then(Value::as_bool) == Some(true);

    json!({
      "ok": ok,
      "version": env!("CARGO_PKG_VERSION"),
      "paths": {
        "config_dir": paths.config_dir,
        "data_dir": paths.data_dir,
        "log_file": paths.log_file,
      },
      "config": {
        "path": config_path,
        "exists": config_exists,
        "parse_ok": config_exists && config_err.is_none(),
        "error": config_err,
        "default_network": effective.default_network,
        "server_name": effective.export.server_name,
        "endpoint": effective.export.endpoint,
        // Never print the key itself.
        "api_key_configured": effective.api_key_configured(),
        "remote_catalog_configured": effective.catalog.remote_url.is_some(),
      },
      "catalog": catalog_report,
      "selection": selection_report,
      "client": client_report,
      "env": {
        "MCP_WEB3_CONFIG_DIR": env_opt("MCP_WEB3_CONFIG_DIR"),
        "MCP_WEB3_DATA_DIR": env_opt("MCP_WEB3_DATA_DIR"),
        "MCP_WEB3_DEFAULT_NETWORK": env_opt("MCP_WEB3_DEFAULT_NETWORK"),
        "MCP_WEB3_CATALOG_PATH": env_opt("MCP_WEB3_CATALOG_PATH"),
        "MCP_WEB3_CATALOG_URL": env_opt("MCP_WEB3_CATALOG_URL"),
        "MCP_WEB3_ENDPOINT": env_opt("MCP_WEB3_ENDPOINT"),
        "MCP_WEB3_API_KEY_SET": env_opt("MCP_WEB3_API_KEY").is_some(),
        "RUST_LOG": env_opt("RUST_LOG"),
      },
    })
}

fn render_human(r: &Value) -> String {
    let s = |ptr: &str| -> String {
        match r.pointer(ptr) {
            Some(Value::String(v)) => v.clone(),
            Some(Value::Null) | None => "-".to_owned(),
            Some(v) => v.to_string(),
        }
    };
    let verdict = if r.get("ok").and_then(Value::as_bool) == Some(true) {
        "OK"
    } else {
        "PROBLEMS FOUND"
    };
    format!(
        "mcp-web3 doctor: {verdict}\n\
         version        : {}\n\
         config         : {} (exists: {}, parse ok: {})\n\
         data dir       : {}\n\
         catalog        : {} ({} networks, {} tools)\n\
         selection      : {} [{}]\n\
         client config  : {} (installed: {})\n\
         api key        : {}",
        s("/version"),
        s("/config/path"),
        s("/config/exists"),
        s("/config/parse_ok"),
        s("/paths/data_dir"),
        s("/catalog/source"),
        s("/catalog/networks"),
        s("/catalog/tools"),
        s("/selection/network"),
        r.pointer("/selection/enabled_tools")
            .and_then(Value::as_array)
            .map(|a| a
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "))
            .unwrap_or_default(),
        s("/client/path"),
        s("/client/installed"),
        if r.pointer("/config/api_key_configured").and_then(Value::as_bool) == Some(true) {
            "configured"
        } else {
            "not configured"
        },
    )
}

pub fn run(paths: &AppPaths, json_out: bool) -> eyre::Result<()> {
    let report = collect(paths);
    if json_out {
        let s = serde_json::to_string(&report).context("serialize doctor report")?;
        crate::cli_output::stdout_writeln(&s)
    } else {
        crate::cli_output::stdout_writeln(&render_human(&report))
    }
}
