#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::{ArgGroup, Parser, Subcommand};
use eyre::Context as _;
use serde_json::json;
use std::{path::PathBuf, time::Duration};
use tracing_subscriber::prelude::*;

mod catalog;
mod cli_output;
mod config;
mod doctor;
mod errors;
mod export;
mod fsutil;
mod paths;
mod selection;
mod store;

use crate::{
    catalog::Catalog,
    config::AppConfig,
    paths::AppPaths,
    selection::{SelectOutcome, SelectionStore, ToggleOutcome},
    store::{ConfigStore, SelectionFileStore},
};

#[derive(Parser, Debug)]
#[command(name = "mcp-web3", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List networks in the catalog. The active network is marked with `*`.
    Networks {
        /// Emit JSON to stdout (machine-readable).
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the tools of a network with their enabled state.
    Tools {
        /// Network to list (defaults to the active network).
        #[arg(long)]
        network: Option<String>,
        /// Emit JSON to stdout (machine-readable).
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the active network and its enabled tools.
    Status {
        /// Emit JSON to stdout (machine-readable).
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Make a network active. Its tools are reset to the required set.
    ///
    /// Networks that are in beta or coming soon cannot be selected.
    Select { network: String },

    /// Flip tools of the active network on/off. Required tools stay on.
    Toggle {
        #[arg(required = true)]
        tools: Vec<String>,
    },

    /// Turn tools of the active network on.
    Enable {
        #[arg(required = true)]
        tools: Vec<String>,
    },

    /// Turn tools of the active network off. Required tools stay on.
    Disable {
        #[arg(required = true)]
        tools: Vec<String>,
    },

    /// Reset the active network's tools to the required set.
    Reset,

    /// Export the MCP client config for the enabled tools.
    ///
    /// Prints to stdout unless another target is given.
    #[command(group(ArgGroup::new("target").args(["out", "stdout", "clipboard", "install"])))]
    Export {
        /// Write `claude_desktop_config.json` into this directory.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the config to stdout.
        #[arg(long, default_value_t = false)]
        stdout: bool,
        /// Copy the config to the system clipboard.
        #[arg(long, default_value_t = false)]
        clipboard: bool,
        /// Merge the server entry into an MCP client config (Claude Desktop by default).
        #[arg(long, default_value_t = false)]
        install: bool,
        /// Override the config file used by `--install`.
        #[arg(long, requires = "install")]
        path: Option<PathBuf>,
    },

    /// Manage the network/tool catalog.
    Catalog {
        #[command(subcommand)]
        cmd: CatalogCommand,
    },

    /// Print resolved paths (useful for debugging).
    Paths,

    /// Print a quick self-diagnostic report (safe to paste; contains no secrets).
    Doctor {
        /// Emit JSON to stdout (machine-readable).
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Fetch the catalog from the server-catalog endpoint and cache it locally.
    Fetch {
        /// Override `catalog.remote_url` from config.
        #[arg(long)]
        url: Option<String>,
    },
}

fn init_logging(paths: &AppPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("mcp-web3.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn load_config_and_catalog(paths: &AppPaths) -> eyre::Result<(AppConfig, Catalog)> {
    let cfg = ConfigStore::new(paths)
        .load_or_init_default()
        .context("load config")?;
    let (catalog, source) = catalog::load_effective(&cfg, paths)?;
    tracing::debug!(source = source.label(), "catalog loaded");
    Ok((cfg, catalog))
}

fn network_json(n: &catalog::Network, active: &str) -> serde_json::Value {
    json!({
      "id": n.id,
      "name": n.name,
      "chain_type": n.chain_type,
      "status": n.status,
      "active": n.id == active,
      "tools": n.tools.len(),
      "required_tools": n.required_tools().map(|t| t.id.as_str()).collect::<Vec<_>>(),
    })
}

fn apply_tool_actions(
    sel: &mut SelectionStore<'_>,
    tools: &[String],
    action: impl Fn(&mut SelectionStore<'_>, &str) -> ToggleOutcome,
) -> bool {
    let mut changed = false;
    for t in tools {
        match action(&mut *sel, t.as_str()) {
            ToggleOutcome::Toggled { .. } => changed = true,
            ToggleOutcome::Unchanged { .. } => {}
            ToggleOutcome::Ignored(reason) => cli_output::print_toggle_ignored(t, reason),
        }
    }
    changed
}

fn run_selection_command(cmd: Command, paths: &AppPaths) -> eyre::Result<()> {
    let (cfg, catalog) = load_config_and_catalog(paths)?;
    let files = SelectionFileStore::new(paths);
    let mut sel = files.load(&catalog, cfg.default_network.as_deref())?;
    let active = sel.active_network().id.clone();

    match cmd {
        Command::Networks { json } => {
            if json {
                let arr: Vec<_> = catalog
                    .networks()
                    .iter()
                    .map(|n| network_json(n, &active))
                    .collect();
                cli_output::stdout_json(&json!(arr))
            } else {
                cli_output::stdout_writeln(&cli_output::render_networks(&catalog, &active))
            }
        }
        Command::Tools { network, json } => {
            let id = network.unwrap_or_else(|| active.clone());
            let n = catalog
                .network(&id)
                .ok_or_else(|| eyre::eyre!("unknown network: {id}"))?;
            let store = (n.id == active).then_some(&sel);
            if json {
                let tools: Vec<_> = n
                    .tools
                    .iter()
                    .map(|t| {
                        json!({
                          "id": t.id,
                          "name": t.name,
                          "description": t.description,
                          "required": t.required,
                          "enabled": store.is_some_and(|s| s.is_enabled(&t.id)),
                          "parameters": t.parameters,
                          "usage_count": t.usage_count,
                        })
                    })
                    .collect();
                cli_output::stdout_json(&json!({ "network": n.id, "tools": tools }))
            } else {
                cli_output::stdout_writeln(&cli_output::render_tools(n, store))
            }
        }
        Command::Status { json } => {
            if json {
                cli_output::stdout_json(&json!({
                  "network": active,
                  "enabled_tools": sel.enabled_tool_ids(),
                  "saved": files.exists(),
                }))
            } else {
                cli_output::stdout_writeln(&cli_output::render_status(&sel))
            }
        }
        Command::Select { network } => match sel.select_network(&network) {
            SelectOutcome::Switched => {
                files.save(&sel)?;
                cli_output::stdout_writeln(&cli_output::render_status(&sel))
            }
            SelectOutcome::Ignored(reason) => {
                cli_output::print_select_ignored(&network, reason);
                Ok(())
            }
        },
        Command::Toggle { tools } => {
            if apply_tool_actions(&mut sel, &tools, |s, t| s.toggle_tool(t)) {
                files.save(&sel)?;
            }
            cli_output::stdout_writeln(&cli_output::render_status(&sel))
        }
        Command::Enable { tools } => {
            if apply_tool_actions(&mut sel, &tools, |s, t| s.set_tool_enabled(t, true)) {
                files.save(&sel)?;
            }
            cli_output::stdout_writeln(&cli_output::render_status(&sel))
        }
        Command::Disable { tools } => {
            if apply_tool_actions(&mut sel, &tools, |s, t| s.set_tool_enabled(t, false)) {
                files.save(&sel)?;
            }
            cli_output::stdout_writeln(&cli_output::render_status(&sel))
        }
        Command::Reset => {
            sel.reset();
            files.save(&sel)?;
            cli_output::stdout_writeln(&cli_output::render_status(&sel))
        }
        Command::Export {
            out,
            stdout: _,
            clipboard,
            install,
            path,
        } => {
            let tools = sel.enabled_tools();
            let client_cfg = export::export_config(&tools, &cfg.export);
            if !cfg.api_key_configured() {
                cli_output::print_notice(
                    "no API key configured; set export.api_key in config.toml or MCP_WEB3_API_KEY.",
                );
            }
            if let Some(dir) = out {
                let p = export::write_download(&dir, &client_cfg)?;
                cli_output::stdout_json(&json!({ "ok": true, "path": p }))
            } else if clipboard {
                export::copy_to_clipboard(&client_cfg)?;
                cli_output::print_notice("config copied to clipboard.");
                Ok(())
            } else if install {
                let p = match path {
                    Some(p) => p,
                    None => export::claude_desktop_default_path()?,
                };
                export::install(&p, &client_cfg)?;
                cli_output::stdout_json(&json!({ "ok": true, "path": p }))
            } else {
                cli_output::stdout_writeln(&client_cfg.to_json_pretty()?)
            }
        }
        Command::Catalog { .. } | Command::Paths | Command::Doctor { .. } => {
            eyre::bail!("not a selection command")
        }
    }
}

async fn fetch_catalog(paths: &AppPaths, url: Option<String>) -> eyre::Result<()> {
    let cfg = ConfigStore::new(paths)
        .load_or_init_default()
        .context("load config")?;
    let url = url
        .or_else(|| cfg.catalog.remote_url.clone())
        .ok_or_else(|| {
            eyre::eyre!("no catalog url; pass --url or set catalog.remote_url in config.toml")
        })?;
    let timeout = Duration::from_secs(cfg.catalog.fetch_timeout_seconds.max(1));
    let fetched = catalog::fetch_remote(&url, timeout).await?;
    let path = catalog::write_cache(paths, &fetched)?;
    if cfg.catalog.path.is_some() {
        cli_output::print_notice(
            "catalog.path is set in config.toml; it takes precedence over the fetched catalog.",
        );
    }
    cli_output::stdout_json(&json!({
      "ok": true,
      "path": path,
      "networks": fetched.networks().len(),
      "tools": fetched.tool_count(),
    }))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = AppPaths::discover()?;
    paths.ensure_private_dirs().context("create state dirs")?;
    let _log_guard = init_logging(&paths);

    match cli.cmd {
        Command::Paths => cli_output::stdout_json(&json!({
          "config_dir": paths.config_dir,
          "data_dir": paths.data_dir,
          "log_file": paths.log_file,
          "config_file": paths.config_file(),
          "selection_file": paths.selection_file(),
        })),
        Command::Doctor { json } => doctor::run(&paths, json).context("doctor failed"),
        Command::Catalog {
            cmd: CatalogCommand::Fetch { url },
        } => fetch_catalog(&paths, url)
            .await
            .context("catalog fetch failed"),
        other => run_selection_command(other, &paths),
    }
}
