use crate::{
    catalog::Catalog,
    config::AppConfig,
    paths::AppPaths,
    selection::{Selection, SelectionStore},
};
use eyre::Context as _;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

/// Apply environment variable overrides to the config.
fn apply_env_overrides(cfg: &mut AppConfig) {
    /// Helper: if an env var is set and non-empty, apply `setter` with the trimmed value.
    fn apply_env(var: &str, setter: impl FnOnce(&str)) {
        if let Ok(u) = std::env::var(var) {
            let t = u.trim();
            if !t.is_empty() {
                setter(t);
            }
        }
    }

    apply_env("MCP_WEB3_API_KEY", |v| {
        v.clone_into(&mut cfg.export.api_key);
    });
    apply_env("MCP_WEB3_ENDPOINT", |v| {
        v.clone_into(&mut cfg.export.endpoint);
    });
    apply_env("MCP_WEB3_DEFAULT_NETWORK", |v| {
        cfg.default_network = Some(v.to_owned());
    });
    apply_env("MCP_WEB3_CATALOG_URL", |v| {
        cfg.catalog.remote_url = Some(v.to_owned());
    });
    apply_env("MCP_WEB3_CATALOG_PATH", |v| {
        cfg.catalog.path = Some(PathBuf::from(v));
    });
}

/// Defaults with environment overrides, for callers that cannot read `config.toml`.
pub fn default_with_env_overrides() -> AppConfig {
    let mut cfg = AppConfig::default();
    apply_env_overrides(&mut cfg);
    cfg
}

impl ConfigStore {
    pub fn new(paths: &AppPaths) -> Self {
        Self {
            path: paths.config_file(),
        }
    }

    /// Load `config.toml`, writing the defaults on first run. Env overrides are applied in
    /// memory only and never persisted.
    pub fn load_or_init_default(&self) -> eyre::Result<AppConfig> {
        if !self.path.exists() {
            let cfg = AppConfig::default();
            self.save(&cfg)?;
            let mut cfg = cfg;
            apply_env_overrides(&mut cfg);
            return Ok(cfg);
        }

        let mut cfg = self.read_file()?;
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    /// Same effective config as [`Self::load_or_init_default`], but never writes.
    /// A missing file reads as the defaults.
    pub fn load_read_only(&self) -> eyre::Result<AppConfig> {
        let mut cfg = if self.path.exists() {
            self.read_file()?
        } else {
            AppConfig::default()
        };
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    fn read_file(&self) -> eyre::Result<AppConfig> {
        let s = fs::read_to_string(&self.path).context("read config.toml")?;
        let cfg: AppConfig = toml::from_str(&s).context("parse config.toml")?;
        Ok(cfg)
    }

    pub fn save(&self, cfg: &AppConfig) -> eyre::Result<()> {
        let s = toml::to_string_pretty(cfg).context("serialize config.toml")?;
        crate::fsutil::write_string_atomic_restrictive(
            &self.path,
            &s,
            crate::fsutil::MODE_FILE_PRIVATE,
        )
        .context("write config.toml")?;
        Ok(())
    }
}

const SELECTION_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SelectionFile {
    version: u32,
    network: String,
    #[serde(default)]
    tools: BTreeMap<String, bool>,
    #[serde(default)]
    saved_at: Option<String>,
}

/// Persists the active selection to `selection.json` in the data dir.
#[derive(Debug, Clone)]
pub struct SelectionFileStore {
    path: PathBuf,
}

impl SelectionFileStore {
    pub fn new(paths: &AppPaths) -> Self {
        Self {
            path: paths.selection_file(),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn read(&self) -> eyre::Result<Option<Selection>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        let f: SelectionFile = serde_json::from_str(&s)
            .with_context(|| format!("parse {}", self.path.display()))?;
        if f.version != SELECTION_FILE_VERSION {
            eyre::bail!(
                "unsupported selection file version {} in {}",
                f.version,
                self.path.display()
            );
        }
        Ok(Some(Selection {
            network: f.network,
            tools: f.tools,
        }))
    }

    /// Load the persisted selection reconciled against `catalog`, or a fresh default one.
    pub fn load<'c>(
        &self,
        catalog: &'c Catalog,
        preferred_network: Option<&str>,
    ) -> eyre::Result<SelectionStore<'c>> {
        match self.read()? {
            Some(snapshot) => SelectionStore::restore(catalog, &snapshot, preferred_network),
            None => SelectionStore::new(catalog, preferred_network),
        }
    }

    pub fn save(&self, store: &SelectionStore<'_>) -> eyre::Result<()> {
        let snap = store.snapshot();
        let f = SelectionFile {
            version: SELECTION_FILE_VERSION,
            network: snap.network,
            tools: snap.tools,
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        let s = serde_json::to_string_pretty(&f).context("serialize selection")?;
        crate::fsutil::write_string_atomic_restrictive(
            &self.path,
            &format!("{s}\n"),
            crate::fsutil::MODE_FILE_PRIVATE,
        )
        .context("write selection.json")?;
        tracing::info!(
            network = %f.network,
            enabled = store.enabled_tool_ids().len(),
            "saved selection"
        );
        Ok(())
    }
}
