//! Contracts between the liquidation core and the outside world.
//!
//! Everything that touches the network (account reads, price reads, token
//! balances, transaction submission) sits behind one of these traits so the
//! scanner itself stays deterministic.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use crate::error::Result;
use crate::model::{CollateralBalance, Obligation, OraclePrice, Reserve};

/// Priced view of a market taken once per epoch.
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    pub oracles: Vec<OraclePrice>,
    pub obligations: Vec<Obligation>,
    pub reserves: Vec<Reserve>,
}

#[async_trait]
pub trait MarketSnapshotProvider: Send + Sync {
    async fn fetch_oracle(&self, market: &Pubkey) -> Result<Vec<OraclePrice>>;

    async fn fetch_obligations(&self, market: &Pubkey) -> Result<Vec<Obligation>>;

    async fn fetch_reserves(&self, market: &Pubkey) -> Result<Vec<Reserve>>;

    /// Read a single obligation account and decode it.
    async fn fetch_obligation(&self, address: &Pubkey) -> Result<Obligation>;

    /// Fetch prices, obligations and reserves, in that order.
    async fn snapshot(&self, market: &Pubkey) -> Result<MarketSnapshot> {
        let oracles = self.fetch_oracle(market).await?;
        let obligations = self.fetch_obligations(market).await?;
        let reserves = self.fetch_reserves(market).await?;
        Ok(MarketSnapshot { oracles, obligations, reserves })
    }
}

#[async_trait]
pub trait WalletReader: Send + Sync {
    /// Balance of `wallet` in `mint`, in base units.
    ///
    /// An `Err` means the balance could not be read, which is distinct from
    /// a readable zero balance.
    async fn fetch_wallet_token_balance(&self, wallet: &Pubkey, mint: &Pubkey) -> Result<u64>;

    /// Balances of each reserve's collateral token held by `wallet`.
    async fn fetch_collateral_balances(
        &self,
        wallet: &Pubkey,
        reserves: &[Reserve],
    ) -> Result<Vec<CollateralBalance>>;
}

/// One liquidation round against an obligation.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationRequest {
    pub wallet: Pubkey,
    pub market: Pubkey,
    pub obligation: Pubkey,
    /// Liquidity to repay. The program caps each round to its close factor.
    pub amount: u64,
    pub repay_reserve: Pubkey,
    pub repay_symbol: String,
    pub withdraw_reserve: Pubkey,
    pub withdraw_symbol: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedemptionRequest {
    pub wallet: Pubkey,
    pub market: Pubkey,
    pub reserve: Pubkey,
    pub symbol: String,
    pub amount: u64,
}

#[async_trait]
pub trait LiquidationExecutor: Send + Sync {
    /// Submit a liquidation and return its signature once the transaction is
    /// confirmed. Rejections must be `Err`.
    ///
    /// The caller re-fetches the obligation right after `Ok`; returning on send
    /// alone makes it read unchanged state and stop with no progress.
    async fn submit_liquidation(&self, request: &LiquidationRequest) -> Result<String>;
}

#[async_trait]
pub trait RedemptionExecutor: Send + Sync {
    async fn submit_redemption(&self, request: &RedemptionRequest) -> Result<String>;
}
