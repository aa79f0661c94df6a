use thiserror::Error;

/// Reasons a catalog document is rejected.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog json is invalid: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("network at position {0} has an empty id")]
    EmptyNetworkId(usize),

    #[error("duplicate network id: {0}")]
    DuplicateNetwork(String),

    #[error("tool at position {index} of network {network} has an empty id")]
    EmptyToolId { network: String, index: usize },

    #[error("tool id {tool:?} in network {network} must not contain `,` or surrounding whitespace")]
    InvalidToolId { network: String, tool: String },

    #[error("duplicate tool id {tool} in network {network}")]
    DuplicateTool { network: String, tool: String },

    #[error("catalog has no network with status `available`")]
    NoAvailableNetwork,
}
