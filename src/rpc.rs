use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::collaborators::{MarketSnapshotProvider, WalletReader};
use crate::config::MarketConfig;
use crate::error::{LiquidatorError, Result};
use crate::layout::{decode_obligation, decode_reserve, LENDING_MARKET_OFFSET, OBLIGATION_LEN, RESERVE_LEN};
use crate::model::{CollateralBalance, Obligation, OraclePrice, Reserve};
use crate::oracle::parse_pyth_price;

const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// `get_multiple_accounts` accepts at most this many keys per request.
const MAX_MULTIPLE_ACCOUNTS: usize = 100;

/// Reads market state straight from program accounts.
pub struct RpcMarket {
    rpc: Arc<RpcClient>,
    program_id: Pubkey,
    market_config: MarketConfig,
}

impl RpcMarket {
    pub fn new(rpc: Arc<RpcClient>, program_id: Pubkey, market_config: MarketConfig) -> Self {
        Self { rpc, program_id, market_config }
    }

    /// Program accounts of one size belonging to `market`.
    async fn market_accounts(&self, market: &Pubkey, size: usize) -> Result<Vec<(Pubkey, Vec<u8>)>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![
                RpcFilterType::DataSize(size as u64),
                RpcFilterType::Memcmp(Memcmp::new_base58_encoded(LENDING_MARKET_OFFSET, market.as_ref())),
            ]),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(CommitmentConfig::confirmed()),
                ..Default::default()
            },
            ..Default::default()
        };
        let accounts = self
            .rpc
            .get_program_accounts_with_config(&self.program_id, config)
            .await?;
        Ok(accounts.into_iter().map(|(pk, acc)| (pk, acc.data)).collect())
    }
}

#[async_trait]
impl MarketSnapshotProvider for RpcMarket {
    async fn fetch_oracle(&self, market: &Pubkey) -> Result<Vec<OraclePrice>> {
        let reserves = self.fetch_reserves(market).await?;
        let feeds: Vec<(Pubkey, Pubkey)> = reserves
            .iter()
            .filter(|r| r.pyth_oracle != Pubkey::default())
            .map(|r| (r.pyth_oracle, r.liquidity_mint))
            .collect();

        let mut prices = Vec::with_capacity(feeds.len());
        for chunk in feeds.chunks(MAX_MULTIPLE_ACCOUNTS) {
            let keys: Vec<Pubkey> = chunk.iter().map(|(oracle, _)| *oracle).collect();
            let accounts = self.rpc.get_multiple_accounts(&keys).await?;
            for ((oracle, mint), account) in chunk.iter().zip(accounts) {
                let Some(account) = account else {
                    warn!(%oracle, "Oracle account missing");
                    continue;
                };
                match parse_pyth_price(*oracle, &account.data) {
                    Ok(Some(price)) => prices.push(OraclePrice { mint: *mint, oracle: *oracle, price }),
                    Ok(None) => warn!(%oracle, "Oracle is not trading, skipping price"),
                    Err(e) => warn!(%oracle, error = %e, "Failed to parse oracle price"),
                }
            }
        }
        Ok(prices)
    }

    async fn fetch_obligations(&self, market: &Pubkey) -> Result<Vec<Obligation>> {
        let accounts = self.market_accounts(market, OBLIGATION_LEN).await?;
        Ok(accounts
            .into_iter()
            .filter_map(|(pk, data)| match decode_obligation(pk, &data) {
                Ok(ob) => Some(ob),
                Err(e) => {
                    debug!(error = %e, "Skipping undecodable obligation");
                    None
                }
            })
            .collect())
    }

    async fn fetch_reserves(&self, market: &Pubkey) -> Result<Vec<Reserve>> {
        let accounts = self.market_accounts(market, RESERVE_LEN).await?;
        let mut reserves = Vec::with_capacity(accounts.len());
        for (pk, data) in accounts {
            match decode_reserve(pk, &data) {
                Ok(mut reserve) => {
                    reserve.symbol = self.market_config.symbol(&reserve.pubkey, &reserve.liquidity_mint);
                    reserves.push(reserve);
                }
                Err(e) => warn!(error = %e, "Skipping undecodable reserve"),
            }
        }
        Ok(reserves)
    }

    async fn fetch_obligation(&self, address: &Pubkey) -> Result<Obligation> {
        let data = self.rpc.get_account_data(address).await?;
        decode_obligation(*address, &data)
    }
}

/// Associated token account of `wallet` for `mint`.
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[wallet.as_ref(), spl_token::ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

/// Reads the liquidator's SPL token balances from associated token accounts.
pub struct RpcWallet {
    rpc: Arc<RpcClient>,
}

impl RpcWallet {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl WalletReader for RpcWallet {
    async fn fetch_wallet_token_balance(&self, wallet: &Pubkey, mint: &Pubkey) -> Result<u64> {
        let ata = associated_token_address(wallet, mint);
        let balance = self.rpc.get_token_account_balance(&ata).await?;
        balance
            .amount
            .parse()
            .map_err(|_| LiquidatorError::decode(ata, format!("bad token amount {:?}", balance.amount)))
    }

    async fn fetch_collateral_balances(
        &self,
        wallet: &Pubkey,
        reserves: &[Reserve],
    ) -> Result<Vec<CollateralBalance>> {
        let lookups = reserves.iter().map(|reserve| async move {
            let result = self.fetch_wallet_token_balance(wallet, &reserve.collateral_mint).await;
            (reserve, result)
        });

        let mut balances = Vec::with_capacity(reserves.len());
        let mut unreadable: HashMap<String, String> = HashMap::new();
        for (reserve, result) in join_all(lookups).await {
            match result {
                Ok(amount) => balances.push(CollateralBalance {
                    reserve: reserve.pubkey,
                    symbol: reserve.symbol.clone(),
                    collateral_mint: reserve.collateral_mint,
                    amount,
                }),
                Err(e) => {
                    unreadable.insert(reserve.symbol.clone(), e.to_string());
                }
            }
        }
        if !unreadable.is_empty() {
            // Missing collateral token accounts are normal; nothing to redeem there.
            debug!(?unreadable, "Collateral balances unavailable");
        }
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn associated_token_address_is_deterministic_per_mint() {
        let wallet = Pubkey::new_unique();
        let mint_a = Pubkey::new_unique();
        let mint_b = Pubkey::new_unique();

        let a = associated_token_address(&wallet, &mint_a);
        assert_eq!(a, associated_token_address(&wallet, &mint_a));
        assert_ne!(a, associated_token_address(&wallet, &mint_b));
    }
}
