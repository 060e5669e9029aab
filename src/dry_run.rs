use async_trait::async_trait;
use tracing::info;

use crate::collaborators::{LiquidationExecutor, LiquidationRequest, RedemptionExecutor, RedemptionRequest};
use crate::error::Result;

/// Executor that only logs what it would submit.
///
/// Nothing changes on chain, so re-fetched obligations come back identical
/// and the scanner stops after one round per obligation.
#[derive(Debug, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl LiquidationExecutor for DryRunExecutor {
    async fn submit_liquidation(&self, request: &LiquidationRequest) -> Result<String> {
        info!(
            obligation = %request.obligation,
            amount = request.amount,
            repay = %request.repay_symbol,
            withdraw = %request.withdraw_symbol,
            "Dry-run: would liquidate obligation"
        );
        Ok("dry-run".to_string())
    }
}

#[async_trait]
impl RedemptionExecutor for DryRunExecutor {
    async fn submit_redemption(&self, request: &RedemptionRequest) -> Result<String> {
        info!(
            reserve = %request.reserve,
            symbol = %request.symbol,
            amount = request.amount,
            "Dry-run: would redeem collateral"
        );
        Ok("dry-run".to_string())
    }
}
