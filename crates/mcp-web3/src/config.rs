use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SERVER_NAME: &str = "mcp-web3";
pub const DEFAULT_ENDPOINT: &str = "https://api.mcp-web3.dev";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Optional catalog JSON file. Takes precedence over the cached remote catalog.
    pub path: Option<PathBuf>,
    /// Server-catalog endpoint used by `mcp-web3 catalog fetch`.
    ///
    /// Must be `https`, except loopback `http` for local testing.
    pub remote_url: Option<String>,
    /// Request timeout for remote catalog fetches (seconds).
    pub fetch_timeout_seconds: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: None,
            remote_url: None,
            fetch_timeout_seconds: 20,
        }
    }
}

/// Fixed parts of the exported MCP server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Key under `mcpServers`.
    pub server_name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Written to the `API_KEY` env var of the exported entry.
    pub api_key: String,
    /// Written to the `ENDPOINT` env var of the exported entry.
    pub endpoint: String,
    pub disabled: bool,
    pub auto_approve: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            server_name: DEFAULT_SERVER_NAME.into(),
            command: "npx".into(),
            args: vec!["-y".into(), "@mcp-web3/server".into()],
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.into(),
            disabled: false,
            auto_approve: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Network selected on first load. Falls back to the first available network.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_network: Option<String>,
    pub catalog: CatalogConfig,
    pub export: ExportConfig,
}

impl AppConfig {
    pub fn api_key_configured(&self) -> bool {
        !self.export.api_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults_for_missing_keys() -> eyre::Result<()> {
        let cfg: AppConfig = toml::from_str(
            r#"
default_network = "solana"

[export]
api_key = "k-123"
"#,
        )?;
        assert_eq!(cfg.default_network.as_deref(), Some("solana"));
        assert_eq!(cfg.export.api_key, "k-123");
        assert_eq!(cfg.export.server_name, DEFAULT_SERVER_NAME);
        assert_eq!(cfg.export.command, "npx");
        assert_eq!(cfg.catalog.fetch_timeout_seconds, 20);
        assert!(cfg.api_key_configured());
        Ok(())
    }

    #[test]
    fn default_config_serializes_without_default_network() -> eyre::Result<()> {
        let s = toml::to_string_pretty(&AppConfig::default())?;
        assert!(!s.contains("default_network"));
        assert!(s.contains("[export]"));
        Ok(())
    }
}
