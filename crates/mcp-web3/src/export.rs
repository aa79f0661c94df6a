use crate::{catalog::Tool, config::ExportConfig};
use eyre::{Context as _, ContextCompat as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

pub const DOWNLOAD_FILE_NAME: &str = "claude_desktop_config.json";
const SERVERS_KEY: &str = "mcpServers";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEnv {
    #[serde(rename = "API_KEY")]
    pub api_key: String,
    #[serde(rename = "ENDPOINT")]
    pub endpoint: String,
    /// Comma-joined tool ids.
    #[serde(rename = "ENABLED_TOOLS")]
    pub enabled_tools: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEntry {
    pub command: String,
    pub args: Vec<String>,
    pub env: ServerEnv,
    pub disabled: bool,
    pub auto_approve: Vec<String>,
}

/// The `claude_desktop_config.json` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, ServerEntry>,
}

/// Build the client config for `tools`. `ENABLED_TOOLS` keeps the input order.
pub fn export_config(tools: &[&Tool], settings: &ExportConfig) -> ClientConfig {
    let enabled_tools = tools
        .iter()
        .map(|t| t.id.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let entry = ServerEntry {
        command: settings.command.clone(),
        args: settings.args.clone(),
        env: ServerEnv {
            api_key: settings.api_key.clone(),
            endpoint: settings.endpoint.clone(),
            enabled_tools,
        },
        disabled: settings.disabled,
        auto_approve: settings.auto_approve.clone(),
    };
    ClientConfig {
        mcp_servers: BTreeMap::from([(settings.server_name.clone(), entry)]),
    }
}

impl ClientConfig {
    pub fn to_json_pretty(&self) -> eyre::Result<String> {
        serde_json::to_string_pretty(self).context("serialize client config")
    }

    /// Tool ids listed in `ENABLED_TOOLS` of `server_name`, in order.
    pub fn enabled_tool_ids(&self, server_name: &str) -> Option<Vec<String>> {
        self.mcp_servers
            .get(server_name)
            .map(ServerEntry::enabled_tool_ids)
    }
}

impl ServerEntry {
    pub fn enabled_tool_ids(&self) -> Vec<String> {
        let ids = &self.env.enabled_tools;
        if ids.is_empty() {
            return Vec::new();
        }
        ids.split(',').map(str::to_owned).collect()
    }
}

/// Write the config as a standalone `claude_desktop_config.json` inside `dir`.
pub fn write_download(dir: &Path, cfg: &ClientConfig) -> eyre::Result<PathBuf> {
    let path = dir.join(DOWNLOAD_FILE_NAME);
    let s = cfg.to_json_pretty()?;
    crate::fsutil::write_string_atomic_shared(&path, &format!("{s}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote client config");
    Ok(path)
}

pub fn copy_to_clipboard(cfg: &ClientConfig) -> eyre::Result<()> {
    let s = cfg.to_json_pretty()?;
    let mut clipboard = arboard::Clipboard::new().context("access clipboard")?;
    clipboard.set_text(s).context("copy to clipboard")?;
    tracing::info!("copied client config to clipboard");
    Ok(())
}

pub fn claude_desktop_default_path() -> eyre::Result<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        let home = directories::UserDirs::new()
            .context("resolve home dir")?
            .home_dir()
            .to_path_buf();
        Ok(home.join("Library/Application Support/Claude").join(DOWNLOAD_FILE_NAME))
    }
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").context("resolve %APPDATA%")?;
        Ok(PathBuf::from(appdata).join("Claude").join(DOWNLOAD_FILE_NAME))
    }
    #[cfg(all(not(target_os = "macos"), not(target_os = "windows")))]
    {
        let home = directories::UserDirs::new()
            .context("resolve home dir")?
            .home_dir()
            .to_path_buf();
        Ok(home.join(".config/Claude").join(DOWNLOAD_FILE_NAME))
    }
}

fn insert_servers(root: &mut Value, cfg: &ClientConfig) -> eyre::Result<()> {
    if !root.is_object() {
        *root = json!({});
    }
    let obj = root.as_object_mut().context("root must be an object")?;
    let servers = obj.entry(SERVERS_KEY).or_insert_with(|| json!({}));
    if !servers.is_object() {
        *servers = json!({});
    }
    let s = servers
        .as_object_mut()
        .with_context(|| format!("{SERVERS_KEY} must be an object"))?;
    for (name, entry) in &cfg.mcp_servers {
        let v = serde_json::to_value(entry).context("serialize server entry")?;
        s.insert(name.clone(), v);
    }
    Ok(())
}

/// Merge our server entry into an existing MCP client config file, keeping everything else.
pub fn install(path: &Path, cfg: &ClientConfig) -> eyre::Result<()> {
    let mut root = if path.exists() {
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        if s.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?
        }
    } else {
        json!({})
    };

    insert_servers(&mut root, cfg)?;
    let s = serde_json::to_string_pretty(&root).context("serialize json")?;
    crate::fsutil::write_string_atomic_shared(path, &format!("{s}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), "installed client config");
    Ok(())
}

/// Our server entry in an existing client config file, if it is there.
///
/// Other entries are not parsed, so foreign servers with different shapes are fine.
pub fn read_installed(path: &Path, server_name: &str) -> eyre::Result<Option<ServerEntry>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let root: Value =
        serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    let Some(entry) = root.get(SERVERS_KEY).and_then(|v| v.get(server_name)) else {
        return Ok(None);
    };
    let entry = serde_json::from_value(entry.clone())
        .with_context(|| format!("parse {SERVERS_KEY}.{server_name} in {}", path.display()))?;
    Ok(Some(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, ChainType, Network, NetworkStatus};
    use proptest::prelude::*;

    fn tool(id: &str) -> Tool {
        Tool {
            id: id.to_owned(),
            name: id.to_owned(),
            description: String::new(),
            required: false,
            parameters: BTreeMap::new(),
            usage_count: 0,
        }
    }

    #[test]
    fn exported_shape_matches_client_format() -> eyre::Result<()> {
        let settings = ExportConfig {
            api_key: "key-1".to_owned(),
            auto_approve: vec!["get_balance".to_owned()],
            ..ExportConfig::default()
        };
        let (a, b) = (tool("get_balance"), tool("swap_tokens"));
        let cfg = export_config(&[&a, &b], &settings);
        let v = serde_json::to_value(&cfg)?;

        let entry = v
            .pointer("/mcpServers/mcp-web3")
            .ok_or_else(|| eyre::eyre!("missing server entry"))?;
        assert_eq!(entry.pointer("/command"), Some(&json!("npx")));
        assert_eq!(entry.pointer("/args"), Some(&json!(["-y", "@mcp-web3/server"])));
        assert_eq!(entry.pointer("/env/API_KEY"), Some(&json!("key-1")));
        assert_eq!(
            entry.pointer("/env/ENDPOINT"),
            Some(&json!(crate::config::DEFAULT_ENDPOINT))
        );
        assert_eq!(
            entry.pointer("/env/ENABLED_TOOLS"),
            Some(&json!("get_balance,swap_tokens"))
        );
        assert_eq!(entry.pointer("/disabled"), Some(&json!(false)));
        assert_eq!(entry.pointer("/autoApprove"), Some(&json!(["get_balance"])));
        Ok(())
    }

    #[test]
    fn empty_tool_list_exports_empty_string() {
        let cfg = export_config(&[], &ExportConfig::default());
        let entry = cfg.mcp_servers.get("mcp-web3");
        assert_eq!(entry.map(|e| e.env.enabled_tools.as_str()), Some(""));
        assert_eq!(cfg.enabled_tool_ids("mcp-web3"), Some(Vec::new()));
    }

    #[test]
    fn enabled_tools_round_trip_through_json_in_order() -> eyre::Result<()> {
        let catalog = Catalog::builtin();
        let sol = catalog
            .network("solana")
            .ok_or_else(|| eyre::eyre!("missing solana"))?;
        let tools: Vec<&Tool> = sol.tools.iter().rev().collect();
        let ids: Vec<String> = tools.iter().map(|t| t.id.clone()).collect();

        let s = export_config(&tools, &ExportConfig::default()).to_json_pretty()?;
        let parsed = serde_json::from_str::<ClientConfig>(&s)?;
        assert_eq!(parsed.enabled_tool_ids("mcp-web3"), Some(ids));
        Ok(())
    }

    #[test]
    fn server_name_comes_from_settings() {
        let settings = ExportConfig {
            server_name: "web3-tools".to_owned(),
            ..ExportConfig::default()
        };
        let cfg = export_config(&[], &settings);
        assert!(cfg.mcp_servers.contains_key("web3-tools"));
        assert_eq!(cfg.enabled_tool_ids("mcp-web3"), None);
    }

    #[test]
    fn download_writes_named_file() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let t = tool("get_balance");
        let cfg = export_config(&[&t], &ExportConfig::default());
        let path = write_download(dir.path(), &cfg)?;
        assert_eq!(path.file_name().and_then(|s| s.to_str()), Some(DOWNLOAD_FILE_NAME));
        let back = serde_json::from_str::<ClientConfig>(&fs::read_to_string(&path)?)?;
        assert_eq!(back, cfg);
        Ok(())
    }

    #[test]
    fn install_preserves_other_servers_and_keys() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(DOWNLOAD_FILE_NAME);
        fs::write(
            &path,
            json!({
              "globalShortcut": "Ctrl+Space",
              "mcpServers": {
                "filesystem": { "command": "npx", "args": ["-y", "@modelcontextprotocol/server-filesystem"] },
                "mcp-web3": { "command": "old" }
              }
            })
            .to_string(),
        )?;

        let t = tool("transfer_tokens");
        install(&path, &export_config(&[&t], &ExportConfig::default()))?;

        let v: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(v.pointer("/globalShortcut"), Some(&json!("Ctrl+Space")));
        assert!(v.pointer("/mcpServers/filesystem/command").is_some());
        assert_eq!(v.pointer("/mcpServers/mcp-web3/command"), Some(&json!("npx")));
        assert_eq!(
            v.pointer("/mcpServers/mcp-web3/env/ENABLED_TOOLS"),
            Some(&json!("transfer_tokens"))
        );
        Ok(())
    }

    #[test]
    fn install_creates_missing_file() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("Claude").join(DOWNLOAD_FILE_NAME);
        install(&path, &export_config(&[], &ExportConfig::default()))?;
        let back = serde_json::from_str::<ClientConfig>(&fs::read_to_string(&path)?)?;
        assert_eq!(back.enabled_tool_ids("mcp-web3"), Some(Vec::new()));
        Ok(())
    }

    #[test]
    fn read_installed_finds_our_entry_among_foreign_ones() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(DOWNLOAD_FILE_NAME);
        assert_eq!(read_installed(&path, "mcp-web3")?, None);

        fs::write(&path, r#"{"mcpServers":{"filesystem":{"command":"fs-server"}}}"#)?;
        assert_eq!(read_installed(&path, "mcp-web3")?, None);

        let (a, b) = (tool("get_balance"), tool("bridge_assets"));
        install(&path, &export_config(&[&a, &b], &ExportConfig::default()))?;
        let entry = read_installed(&path, "mcp-web3")?
            .ok_or_else(|| eyre::eyre!("entry not installed"))?;
        assert_eq!(entry.enabled_tool_ids(), vec!["get_balance", "bridge_assets"]);
        Ok(())
    }

    const DEFAULT_SERVER: &str = crate::config::DEFAULT_SERVER_NAME;

    fn fail(e: &eyre::Report) -> TestCaseError {
        TestCaseError::fail(format!("{e:#}"))
    }

    fn round_trip(tools: &[&Tool]) -> Result<Option<Vec<String>>, TestCaseError> {
        let s = export_config(tools, &ExportConfig::default())
            .to_json_pretty()
            .map_err(|e| fail(&e))?;
        let parsed = serde_json::from_str::<ClientConfig>(&s)?;
        Ok(parsed.enabled_tool_ids(DEFAULT_SERVER))
    }

    proptest! {
        #[test]
        fn enabled_tools_are_comma_joined_and_round_trip(
            ids in prop::collection::vec("[a-z0-9_.:-]{1,12}", 0..10),
        ) {
            let tools: Vec<Tool> = ids.iter().map(|id| tool(id)).collect();
            let refs: Vec<&Tool> = tools.iter().collect();
            let cfg = export_config(&refs, &ExportConfig::default());
            prop_assert_eq!(
                cfg.mcp_servers.get(DEFAULT_SERVER).map(|e| e.env.enabled_tools.clone()),
                Some(ids.join(","))
            );
            prop_assert_eq!(round_trip(&refs)?, Some(ids));
        }

        #[test]
        fn ids_accepted_by_the_catalog_survive_the_round_trip(
            ids in prop::collection::btree_set("[a-z_, ]{1,8}", 1..8),
        ) {
            let net = Network {
                id: "devnet".to_owned(),
                name: "Devnet".to_owned(),
                chain_type: ChainType::Evm,
                status: NetworkStatus::Available,
                tools: ids.iter().map(|id| tool(id)).collect(),
            };
            let Ok(catalog) = Catalog::new(vec![net]) else {
                prop_assert!(ids.iter().any(|id| id.contains(',') || id.trim() != id));
                return Ok(());
            };
            let refs: Vec<&Tool> = catalog.networks().iter().flat_map(|n| &n.tools).collect();
            let expected: Vec<String> = ids.into_iter().collect();
            prop_assert_eq!(round_trip(&refs)?, Some(expected));
        }
    }
}
