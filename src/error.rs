use solana_client::client_error::ClientError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Errors surfaced by the liquidation core and its collaborators.
#[derive(Debug, Error)]
pub enum LiquidatorError {
    #[error("no target market provided (set --market or MARKET)")]
    MissingMarket,

    #[error("invalid {field} public key {value:?}")]
    InvalidPubkey { field: &'static str, value: String },

    #[error("max rounds must be at least 1")]
    InvalidMaxRounds,

    #[error("network error: {0}")]
    Network(String),

    #[error("rpc request failed: {0}")]
    Rpc(#[from] ClientError),

    #[error("account {0} not found")]
    AccountNotFound(Pubkey),

    #[error("failed to decode account {account}: {reason}")]
    Decode { account: Pubkey, reason: String },

    #[error("transaction rejected: {0}")]
    ActionExecution(String),
}

impl LiquidatorError {
    pub fn decode(account: Pubkey, reason: impl Into<String>) -> Self {
        Self::Decode { account, reason: reason.into() }
    }
}

pub type Result<T, E = LiquidatorError> = std::result::Result<T, E>;
