use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors raised while talking to the ledger (RPC, pubsub, account codecs).
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("rpc request failed: {0}")]
    Rpc(String),

    #[error("failed to decode {account} account {address}: {reason}")]
    Decode {
        account: &'static str,
        address: String,
        reason: String,
    },

    #[error("subscription failed: {0}")]
    Subscription(String),

    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("view call failed: {0}")]
    View(String),
}

/// Liquidation execution errors.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("simulation rejected liquidation: {0}")]
    SimulationRejected(String),

    #[error("position account no longer exists: {0}")]
    PositionClosed(String),

    #[error("failed to submit liquidation: {0}")]
    SubmissionFailed(String),

    #[error("failed to load wallet: {0}")]
    Wallet(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(feature = "solana")]
impl From<solana_client::client_error::ClientError> for Error {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        Error::Ledger(LedgerError::Rpc(err.to_string()))
    }
}
