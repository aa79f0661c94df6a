use crate::{config::AppConfig, errors::CatalogError, paths::AppPaths};
use eyre::Context as _;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Evm,
    Sui,
    Aptos,
    Solana,
    Move,
}

impl ChainType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evm => "evm",
            Self::Sui => "sui",
            Self::Aptos => "aptos",
            Self::Solana => "solana",
            Self::Move => "move",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    Available,
    Beta,
    ComingSoon,
}

impl NetworkStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Beta => "beta",
            Self::ComingSoon => "coming_soon",
        }
    }

    pub const fn is_selectable(self) -> bool {
        matches!(self, Self::Available)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
    Address,
    Array,
    Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Required tools are enabled whenever their network is active.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamSpec>,
    /// Display-only popularity counter.
    #[serde(default)]
    pub usage_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub chain_type: ChainType,
    pub status: NetworkStatus,
    #[serde(default)]
    pub tools: Vec<Tool>,
}

impl Network {
    pub fn tool(&self, id: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id == id)
    }

    pub fn required_tools(&self) -> impl Iterator<Item = &Tool> {
        self.tools.iter().filter(|t| t.required)
    }
}

/// A validated, immutable set of networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    networks: Vec<Network>,
}

#[derive(Deserialize)]
struct CatalogDoc {
    networks: Vec<Network>,
}

impl Catalog {
    pub fn new(networks: Vec<Network>) -> Result<Self, CatalogError> {
        validate(&networks)?;
        Ok(Self { networks })
    }

    pub fn from_json_str(s: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDoc = serde_json::from_str(s)?;
        Self::new(doc.networks)
    }

    pub fn load(path: &Path) -> eyre::Result<Self> {
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_json_str(&s).with_context(|| format!("parse catalog {}", path.display()))
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn network(&self, id: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.id == id)
    }

    /// `preferred` when it names a selectable network, otherwise the first selectable one.
    ///
    /// Only `None` for catalogs that bypassed validation.
    pub fn default_network(&self, preferred: Option<&str>) -> Option<&Network> {
        preferred
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|id| self.network(id))
            .filter(|n| n.status.is_selectable())
            .or_else(|| self.networks.iter().find(|n| n.status.is_selectable()))
    }

    pub fn tool_count(&self) -> usize {
        self.networks.iter().map(|n| n.tools.len()).sum()
    }

    pub fn to_json_pretty(&self) -> eyre::Result<String> {
        serde_json::to_string_pretty(self).context("serialize catalog")
    }
}

fn validate(networks: &[Network]) -> Result<(), CatalogError> {
    let mut seen_networks = BTreeSet::new();
    for (i, n) in networks.iter().enumerate() {
        if n.id.trim().is_empty() {
            return Err(CatalogError::EmptyNetworkId(i));
        }
        if !seen_networks.insert(n.id.as_str()) {
            return Err(CatalogError::DuplicateNetwork(n.id.clone()));
        }
        let mut seen_tools = BTreeSet::new();
        for (j, t) in n.tools.iter().enumerate() {
            if t.id.trim().is_empty() {
                return Err(CatalogError::EmptyToolId {
                    network: n.id.clone(),
                    index: j,
                });
            }
            // Ids travel comma-joined in ENABLED_TOOLS.
            if t.id.contains(',') || t.id.trim() != t.id {
                return Err(CatalogError::InvalidToolId {
                    network: n.id.clone(),
                    tool: t.id.clone(),
                });
            }
            if !seen_tools.insert(t.id.as_str()) {
                return Err(CatalogError::DuplicateTool {
                    network: n.id.clone(),
                    tool: t.id.clone(),
                });
            }
        }
    }
    if !networks.iter().any(|n| n.status.is_selectable()) {
        return Err(CatalogError::NoAvailableNetwork);
    }
    Ok(())
}

struct ParamDef {
    name: &'static str,
    kind: ParamKind,
    required: bool,
    description: &'static str,
}

struct ToolDef {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    required: bool,
    usage_count: u64,
    params: &'static [ParamDef],
}

struct NetworkDef {
    id: &'static str,
    name: &'static str,
    chain_type: ChainType,
    status: NetworkStatus,
    tools: &'static [ToolDef],
}

const fn p(
    name: &'static str,
    kind: ParamKind,
    required: bool,
    description: &'static str,
) -> ParamDef {
    ParamDef {
        name,
        kind,
        required,
        description,
    }
}

const EVM_TOOLS: &[ToolDef] = &[
    ToolDef {
        id: "get_balance",
        name: "Get Balance",
        description: "Native or ERC-20 token balance of an address.",
        required: true,
        usage_count: 18_420,
        params: &[
            p("address", ParamKind::Address, true, "Account to query."),
            p("token", ParamKind::Address, false, "ERC-20 contract; omit for the native token."),
        ],
    },
    ToolDef {
        id: "get_transaction",
        name: "Get Transaction",
        description: "Transaction details and receipt by hash.",
        required: true,
        usage_count: 9_310,
        params: &[p("hash", ParamKind::String, true, "Transaction hash (0x-prefixed).")],
    },
    ToolDef {
        id: "transfer_tokens",
        name: "Transfer Tokens",
        description: "Send native or ERC-20 tokens to another address.",
        required: false,
        usage_count: 7_045,
        params: &[
            p("to", ParamKind::Address, true, "Recipient address."),
            p("amount", ParamKind::String, true, "Amount in display units."),
            p("token", ParamKind::Address, false, "ERC-20 contract; omit for the native token."),
        ],
    },
    ToolDef {
        id: "swap_tokens",
        name: "Swap Tokens",
        description: "Swap one token for another through a DEX aggregator.",
        required: false,
        usage_count: 5_872,
        params: &[
            p("from_token", ParamKind::Address, true, "Token to sell."),
            p("to_token", ParamKind::Address, true, "Token to buy."),
            p("amount", ParamKind::String, true, "Amount of `from_token` to sell."),
            p("slippage_bps", ParamKind::Integer, false, "Maximum slippage in basis points."),
        ],
    },
    ToolDef {
        id: "call_contract",
        name: "Call Contract",
        description: "Read-only call of a contract function.",
        required: false,
        usage_count: 4_118,
        params: &[
            p("address", ParamKind::Address, true, "Contract address."),
            p("function", ParamKind::String, true, "Function signature, e.g. `balanceOf(address)`."),
            p("args", ParamKind::Array, false, "Positional arguments."),
        ],
    },
    ToolDef {
        id: "estimate_gas",
        name: "Estimate Gas",
        description: "Estimate gas and fee for a transaction.",
        required: false,
        usage_count: 3_260,
        params: &[
            p("to", ParamKind::Address, true, "Destination address."),
            p("data", ParamKind::String, false, "Hex-encoded calldata."),
            p("value", ParamKind::String, false, "Native value in display units."),
        ],
    },
    ToolDef {
        id: "deploy_contract",
        name: "Deploy Contract",
        description: "Deploy compiled bytecode as a new contract.",
        required: false,
        usage_count: 1_204,
        params: &[
            p("bytecode", ParamKind::String, true, "Hex-encoded creation bytecode."),
            p("constructor_args", ParamKind::Array, false, "Constructor arguments."),
        ],
    },
    ToolDef {
        id: "resolve_ens",
        name: "Resolve ENS",
        description: "Resolve an ENS name to an address.",
        required: false,
        usage_count: 2_577,
        params: &[p("name", ParamKind::String, true, "ENS name, e.g. `vitalik.eth`.")],
    },
];

const SOLANA_TOOLS: &[ToolDef] = &[
    ToolDef {
        id: "get_balance",
        name: "Get Balance",
        description: "SOL or SPL token balance of a wallet.",
        required: true,
        usage_count: 12_903,
        params: &[
            p("address", ParamKind::Address, true, "Wallet public key."),
            p("mint", ParamKind::Address, false, "SPL mint; omit for SOL."),
        ],
    },
    ToolDef {
        id: "get_transaction",
        name: "Get Transaction",
        description: "Transaction details by signature.",
        required: true,
        usage_count: 6_482,
        params: &[p("signature", ParamKind::String, true, "Base58 transaction signature.")],
    },
    ToolDef {
        id: "transfer_tokens",
        name: "Transfer Tokens",
        description: "Send SOL or SPL tokens.",
        required: false,
        usage_count: 5_530,
        params: &[
            p("to", ParamKind::Address, true, "Recipient public key."),
            p("amount", ParamKind::String, true, "Amount in display units."),
            p("mint", ParamKind::Address, false, "SPL mint; omit for SOL."),
        ],
    },
    ToolDef {
        id: "swap_tokens",
        name: "Swap Tokens",
        description: "Swap SPL tokens through Jupiter.",
        required: false,
        usage_count: 4_911,
        params: &[
            p("input_mint", ParamKind::Address, true, "Mint to sell."),
            p("output_mint", ParamKind::Address, true, "Mint to buy."),
            p("amount", ParamKind::String, true, "Amount of `input_mint` to sell."),
            p("slippage_bps", ParamKind::Integer, false, "Maximum slippage in basis points."),
        ],
    },
    ToolDef {
        id: "create_token",
        name: "Create Token",
        description: "Create a new SPL token mint.",
        required: false,
        usage_count: 1_870,
        params: &[
            p("name", ParamKind::String, true, "Token name."),
            p("symbol", ParamKind::String, true, "Ticker symbol."),
            p("decimals", ParamKind::Integer, false, "Decimal places (default 9)."),
        ],
    },
    ToolDef {
        id: "stake_sol",
        name: "Stake SOL",
        description: "Delegate SOL to a validator.",
        required: false,
        usage_count: 1_344,
        params: &[
            p("amount", ParamKind::String, true, "SOL to stake."),
            p("validator", ParamKind::Address, false, "Vote account; omit for the default."),
        ],
    },
];

const SUI_TOOLS: &[ToolDef] = &[
    ToolDef {
        id: "get_balance",
        name: "Get Balance",
        description: "Coin balances owned by an address.",
        required: true,
        usage_count: 2_214,
        params: &[
            p("address", ParamKind::Address, true, "Owner address."),
            p("coin_type", ParamKind::String, false, "Coin type; omit for SUI."),
        ],
    },
    ToolDef {
        id: "get_object",
        name: "Get Object",
        description: "Fetch an object and its fields.",
        required: true,
        usage_count: 1_692,
        params: &[p("object_id", ParamKind::String, true, "Object id.")],
    },
    ToolDef {
        id: "transfer_coins",
        name: "Transfer Coins",
        description: "Send coins to another address.",
        required: false,
        usage_count: 980,
        params: &[
            p("to", ParamKind::Address, true, "Recipient address."),
            p("amount", ParamKind::String, true, "Amount in display units."),
            p("coin_type", ParamKind::String, false, "Coin type; omit for SUI."),
        ],
    },
    ToolDef {
        id: "call_move_function",
        name: "Call Move Function",
        description: "Execute an entry function of a published package.",
        required: false,
        usage_count: 611,
        params: &[
            p("package", ParamKind::Address, true, "Package id."),
            p("module", ParamKind::String, true, "Module name."),
            p("function", ParamKind::String, true, "Function name."),
            p("args", ParamKind::Array, false, "Arguments."),
        ],
    },
];

const APTOS_TOOLS: &[ToolDef] = &[
    ToolDef {
        id: "get_balance",
        name: "Get Balance",
        description: "APT or coin balance of an account.",
        required: true,
        usage_count: 0,
        params: &[p("address", ParamKind::Address, true, "Account address.")],
    },
    ToolDef {
        id: "get_account_resources",
        name: "Get Account Resources",
        description: "List resources stored under an account.",
        required: true,
        usage_count: 0,
        params: &[p("address", ParamKind::Address, true, "Account address.")],
    },
    ToolDef {
        id: "transfer_coins",
        name: "Transfer Coins",
        description: "Send coins to another account.",
        required: false,
        usage_count: 0,
        params: &[
            p("to", ParamKind::Address, true, "Recipient address."),
            p("amount", ParamKind::String, true, "Amount in display units."),
        ],
    },
    ToolDef {
        id: "submit_transaction",
        name: "Submit Transaction",
        description: "Submit an entry-function payload.",
        required: false,
        usage_count: 0,
        params: &[p("payload", ParamKind::Object, true, "Entry-function payload.")],
    },
];

const MOVEMENT_TOOLS: &[ToolDef] = &[
    ToolDef {
        id: "get_balance",
        name: "Get Balance",
        description: "MOVE balance of an account.",
        required: true,
        usage_count: 0,
        params: &[p("address", ParamKind::Address, true, "Account address.")],
    },
    ToolDef {
        id: "transfer_coins",
        name: "Transfer Coins",
        description: "Send MOVE to another account.",
        required: false,
        usage_count: 0,
        params: &[
            p("to", ParamKind::Address, true, "Recipient address."),
            p("amount", ParamKind::String, true, "Amount in display units."),
        ],
    },
    ToolDef {
        id: "call_move_function",
        name: "Call Move Function",
        description: "Execute an entry function.",
        required: false,
        usage_count: 0,
        params: &[
            p("function", ParamKind::String, true, "Fully qualified function id."),
            p("args", ParamKind::Array, false, "Arguments."),
        ],
    },
];

const BUILTIN_NETWORKS: &[NetworkDef] = &[
    NetworkDef {
        id: "ethereum",
        name: "Ethereum",
        chain_type: ChainType::Evm,
        status: NetworkStatus::Available,
        tools: EVM_TOOLS,
    },
    NetworkDef {
        id: "base",
        name: "Base",
        chain_type: ChainType::Evm,
        status: NetworkStatus::Available,
        tools: EVM_TOOLS,
    },
    NetworkDef {
        id: "solana",
        name: "Solana",
        chain_type: ChainType::Solana,
        status: NetworkStatus::Available,
        tools: SOLANA_TOOLS,
    },
    NetworkDef {
        id: "sui",
        name: "Sui",
        chain_type: ChainType::Sui,
        status: NetworkStatus::Beta,
        tools: SUI_TOOLS,
    },
    NetworkDef {
        id: "aptos",
        name: "Aptos",
        chain_type: ChainType::Aptos,
        status: NetworkStatus::ComingSoon,
        tools: APTOS_TOOLS,
    },
    NetworkDef {
        id: "movement",
        name: "Movement",
        chain_type: ChainType::Move,
        status: NetworkStatus::ComingSoon,
        tools: MOVEMENT_TOOLS,
    },
];

fn build_network(def: &NetworkDef) -> Network {
    Network {
        id: def.id.to_owned(),
        name: def.name.to_owned(),
        chain_type: def.chain_type,
        status: def.status,
        tools: def
            .tools
            .iter()
            .map(|t| Tool {
                id: t.id.to_owned(),
                name: t.name.to_owned(),
                description: t.description.to_owned(),
                required: t.required,
                parameters: t
                    .params
                    .iter()
                    .map(|p| {
                        (
                            p.name.to_owned(),
                            ParamSpec {
                                kind: p.kind,
                                required: p.required,
                                description: p.description.to_owned(),
                            },
                        )
                    })
                    .collect(),
                usage_count: t.usage_count,
            })
            .collect(),
    }
}

impl Catalog {
    pub fn builtin() -> Self {
        Self {
            networks: BUILTIN_NETWORKS.iter().map(build_network).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    File(PathBuf),
    Cached(PathBuf),
    Builtin,
}

impl CatalogSource {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Cached(_) => "cached",
            Self::Builtin => "builtin",
        }
    }
}

pub fn cached_catalog_path(paths: &AppPaths) -> PathBuf {
    paths.data_dir.join("catalog.json")
}

/// Resolve the catalog for this run: configured file, then cached remote copy, then builtin.
pub fn load_effective(cfg: &AppConfig, paths: &AppPaths) -> eyre::Result<(Catalog, CatalogSource)> {
    if let Some(p) = cfg.catalog.path.as_ref() {
        let c = Catalog::load(p).context("load configured catalog")?;
        return Ok((c, CatalogSource::File(p.clone())));
    }

    let cached = cached_catalog_path(paths);
    if cached.exists() {
        match Catalog::load(&cached) {
            Ok(c) => return Ok((c, CatalogSource::Cached(cached))),
            Err(e) => {
                tracing::warn!(path = %cached.display(), error = %format!("{e:#}"), "ignoring unusable cached catalog");
            }
        }
    }

    Ok((Catalog::builtin(), CatalogSource::Builtin))
}

fn is_loopback_http(url: &str) -> bool {
    fn host_prefix_ok(s: &str, prefix: &str) -> bool {
        if !s.starts_with(prefix) {
            return false;
        }
        matches!(s.as_bytes().get(prefix.len()), None | Some(b':' | b'/'))
    }
    let u = url.trim();
    host_prefix_ok(u, "http://127.0.0.1")
        || host_prefix_ok(u, "http://localhost")
        || host_prefix_ok(u, "http://[::1]")
}

fn ensure_https_or_loopback(url: &str) -> eyre::Result<()> {
    let u = url.trim();
    if u.starts_with("https://") || is_loopback_http(u) {
        return Ok(());
    }
    eyre::bail!("catalog url must use https (or http://localhost for local testing)");
}

/// Fetch a catalog document from the server-catalog endpoint.
pub async fn fetch_remote(url: &str, timeout: Duration) -> eyre::Result<Catalog> {
    ensure_https_or_loopback(url)?;
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if is_loopback_http(url) {
        builder = builder.no_proxy();
    }
    let client = builder.build().context("build http client")?;
    let resp = client
        .get(url.trim())
        .send()
        .await
        .context("catalog request")?;
    if !resp.status().is_success() {
        eyre::bail!("catalog http {}", resp.status());
    }
    let doc: CatalogDoc = resp.json().await.context("parse remote catalog")?;
    let catalog = Catalog::new(doc.networks).context("validate remote catalog")?;
    tracing::info!(
        url = url.trim(),
        networks = catalog.networks().len(),
        tools = catalog.tool_count(),
        "fetched remote catalog"
    );
    Ok(catalog)
}

/// Persist a fetched catalog where [`load_effective`] will pick it up.
pub fn write_cache(paths: &AppPaths, catalog: &Catalog) -> eyre::Result<PathBuf> {
    let path = cached_catalog_path(paths);
    let s = catalog.to_json_pretty()?;
    crate::fsutil::write_string_atomic_restrictive(
        &path,
        &format!("{s}\n"),
        crate::fsutil::MODE_FILE_PRIVATE,
    )
    .context("write cached catalog")?;
    Ok(path)
}
