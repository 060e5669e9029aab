use std::sync::Arc;

use futures::future::join_all;
use solana_sdk::pubkey::Pubkey;
use tracing::{error, info};

use crate::collaborators::{RedemptionExecutor, RedemptionRequest, WalletReader};
use crate::model::Reserve;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedemptionStats {
    pub submitted: usize,
    pub failed: usize,
}

/// Turns collateral tokens picked up by liquidations back into liquidity.
pub struct RedemptionSweep {
    wallet_reader: Arc<dyn WalletReader>,
    redeemer: Arc<dyn RedemptionExecutor>,
    wallet: Pubkey,
    market: Pubkey,
}

impl RedemptionSweep {
    pub fn new(
        wallet_reader: Arc<dyn WalletReader>,
        redeemer: Arc<dyn RedemptionExecutor>,
        wallet: Pubkey,
        market: Pubkey,
    ) -> Self {
        Self { wallet_reader, redeemer, wallet, market }
    }

    /// Submit one redemption per collateral token with a positive balance.
    ///
    /// Redemptions run concurrently and independently; a rejected one is
    /// logged and does not affect the others.
    pub async fn run(&self, reserves: &[Reserve]) -> RedemptionStats {
        let balances = match self
            .wallet_reader
            .fetch_collateral_balances(&self.wallet, reserves)
            .await
        {
            Ok(balances) => balances,
            Err(e) => {
                error!(error = %e, "Failed to read collateral balances, skipping redemption");
                return RedemptionStats::default();
            }
        };

        let requests: Vec<RedemptionRequest> = balances
            .into_iter()
            .filter(|b| b.amount > 0)
            .map(|b| RedemptionRequest {
                wallet: self.wallet,
                market: self.market,
                reserve: b.reserve,
                symbol: b.symbol,
                amount: b.amount,
            })
            .collect();

        let results = join_all(requests.iter().map(|request| async move {
            (request, self.redeemer.submit_redemption(request).await)
        }))
        .await;

        let mut stats = RedemptionStats::default();
        for (request, result) in results {
            match result {
                Ok(signature) => {
                    stats.submitted += 1;
                    info!(symbol = %request.symbol, amount = request.amount, %signature, "Collateral redeemed");
                }
                Err(e) => {
                    stats.failed += 1;
                    error!(symbol = %request.symbol, amount = request.amount, error = %e, "Redemption failed");
                }
            }
        }
        stats
    }
}
