use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, error, info, instrument, warn};

use crate::collaborators::{
    LiquidationExecutor, LiquidationRequest, MarketSnapshot, MarketSnapshotProvider, WalletReader,
};
use crate::error::LiquidatorError;
use crate::health::evaluate_obligation;
use crate::model::Obligation;
use crate::selector::{select_positions, Selection};

/// Parameters the scanner needs, built once at startup.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub market: Pubkey,
    pub wallet: Pubkey,
    /// Liquidation rounds allowed per obligation per epoch.
    pub max_rounds: usize,
}

/// Why an obligation was left alone this epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No priced borrow or no priced deposit to act on.
    NoSelectablePosition,
    /// Liquidator holds none of the repay token.
    InsufficientBalance,
    /// Liquidator's balance of the repay token could not be read.
    BalanceUnavailable,
    /// Obligation did not change after a liquidation round.
    NoProgress,
    /// `max_rounds` liquidation rounds were spent.
    RoundLimit,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::NoSelectablePosition => "no selectable borrow/deposit",
            SkipReason::InsufficientBalance => "insufficient repay balance",
            SkipReason::BalanceUnavailable => "repay balance unavailable",
            SkipReason::NoProgress => "obligation unchanged after liquidation",
            SkipReason::RoundLimit => "round limit reached",
        };
        f.write_str(s)
    }
}

/// Repay/withdraw decision plus the valuation it was taken from.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationPlan {
    pub selection: Selection,
    pub borrowed_value: Decimal,
    pub unhealthy_borrow_value: Decimal,
}

/// Per-obligation liquidation state. `Healthy`, `Toxic` and `Failed` are terminal.
#[derive(Debug)]
pub enum ObligationState {
    Evaluating(Obligation),
    AwaitingBalance { obligation: Obligation, plan: LiquidationPlan },
    Liquidating { obligation: Obligation, plan: LiquidationPlan, amount: u64 },
    Healthy,
    Toxic(SkipReason),
    Failed(LiquidatorError),
}

/// EVALUATING transition: value the obligation and decide whether to act.
pub fn evaluate(obligation: Obligation, snapshot: &MarketSnapshot) -> ObligationState {
    let refreshed = evaluate_obligation(&obligation, &snapshot.reserves, &snapshot.oracles);
    if !refreshed.is_liquidatable() {
        return ObligationState::Healthy;
    }
    match select_positions(&refreshed) {
        Some(selection) => ObligationState::AwaitingBalance {
            obligation,
            plan: LiquidationPlan {
                selection,
                borrowed_value: refreshed.borrowed_value,
                unhealthy_borrow_value: refreshed.unhealthy_borrow_value,
            },
        },
        None => ObligationState::Toxic(SkipReason::NoSelectablePosition),
    }
}

/// AWAITING_BALANCE transition: only a positive, readable balance proceeds.
pub fn on_balance(
    obligation: Obligation,
    plan: LiquidationPlan,
    balance: Result<u64, LiquidatorError>,
) -> ObligationState {
    match balance {
        Ok(0) => ObligationState::Toxic(SkipReason::InsufficientBalance),
        Ok(amount) => ObligationState::Liquidating { obligation, plan, amount },
        Err(_) => ObligationState::Toxic(SkipReason::BalanceUnavailable),
    }
}

/// How an obligation's processing ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ObligationOutcome {
    Healthy,
    Toxic(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObligationReport {
    pub obligation: Pubkey,
    pub outcome: ObligationOutcome,
    /// Liquidation actions that were submitted successfully.
    pub liquidations: usize,
}

/// Aggregate of one sweep over every obligation in the market.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpochStats {
    pub total: usize,
    pub healthy: usize,
    pub toxic: usize,
    pub failed: usize,
    pub liquidations: usize,
}

impl EpochStats {
    pub fn record(&mut self, report: &ObligationReport) {
        self.total += 1;
        self.liquidations += report.liquidations;
        match report.outcome {
            ObligationOutcome::Healthy => self.healthy += 1,
            ObligationOutcome::Toxic(_) => self.toxic += 1,
            ObligationOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Walks every obligation in a snapshot and liquidates the unhealthy ones.
pub struct LiquidationScanner {
    provider: Arc<dyn MarketSnapshotProvider>,
    wallet: Arc<dyn WalletReader>,
    liquidator: Arc<dyn LiquidationExecutor>,
    config: ScannerConfig,
}

impl LiquidationScanner {
    pub fn new(
        provider: Arc<dyn MarketSnapshotProvider>,
        wallet: Arc<dyn WalletReader>,
        liquidator: Arc<dyn LiquidationExecutor>,
        config: ScannerConfig,
    ) -> Self {
        Self { provider, wallet, liquidator, config }
    }

    /// Process obligations one at a time. Nothing an obligation does can stop the sweep.
    pub async fn sweep(&self, snapshot: &MarketSnapshot) -> EpochStats {
        let mut stats = EpochStats::default();
        for obligation in &snapshot.obligations {
            let report = self.process_obligation(snapshot, obligation.clone()).await;
            stats.record(&report);
        }
        stats
    }

    /// Drive one obligation through the state machine until it reaches a terminal state.
    #[instrument(skip_all, fields(obligation = %obligation.pubkey))]
    pub async fn process_obligation(
        &self,
        snapshot: &MarketSnapshot,
        obligation: Obligation,
    ) -> ObligationReport {
        let address = obligation.pubkey;
        let mut liquidations = 0;
        let mut state = ObligationState::Evaluating(obligation);

        let outcome = loop {
            state = match state {
                ObligationState::Evaluating(obligation) => {
                    let next = evaluate(obligation, snapshot);
                    if let ObligationState::AwaitingBalance { obligation, plan } = &next {
                        info!(
                            owner = %obligation.owner,
                            borrowed_value = %plan.borrowed_value,
                            unhealthy_borrow_value = %plan.unhealthy_borrow_value,
                            repay = %plan.selection.repay.symbol,
                            withdraw = %plan.selection.withdraw.symbol,
                            "Obligation is underwater"
                        );
                    }
                    next
                }
                ObligationState::AwaitingBalance { obligation, plan } => {
                    let repay = &plan.selection.repay;
                    let balance = self
                        .wallet
                        .fetch_wallet_token_balance(&self.config.wallet, &repay.mint)
                        .await;
                    match &balance {
                        Ok(0) => warn!(symbol = %repay.symbol, "Insufficient balance to liquidate obligation"),
                        Err(e) => error!(
                            symbol = %repay.symbol,
                            error = %e,
                            "Failed to read wallet balance; token account may not exist"
                        ),
                        Ok(_) => {}
                    }
                    on_balance(obligation, plan, balance)
                }
                ObligationState::Liquidating { obligation, plan, amount } => {
                    match self.submit(&obligation, &plan, amount).await {
                        Ok(()) => {
                            liquidations += 1;
                            match self.provider.fetch_obligation(&obligation.pubkey).await {
                                Ok(refreshed) if refreshed == obligation => {
                                    ObligationState::Toxic(SkipReason::NoProgress)
                                }
                                // Out of rounds: stop before reading the balance again.
                                Ok(refreshed) if liquidations >= self.config.max_rounds => {
                                    match evaluate(refreshed, snapshot) {
                                        ObligationState::AwaitingBalance { .. } => {
                                            ObligationState::Toxic(SkipReason::RoundLimit)
                                        }
                                        next => next,
                                    }
                                }
                                Ok(refreshed) => ObligationState::Evaluating(refreshed),
                                Err(e) => ObligationState::Failed(e),
                            }
                        }
                        Err(e) => ObligationState::Failed(e),
                    }
                }
                ObligationState::Healthy => {
                    debug!(liquidations, "Obligation is healthy");
                    break ObligationOutcome::Healthy;
                }
                ObligationState::Toxic(reason) => {
                    warn!(%reason, liquidations, "Skipping obligation");
                    break ObligationOutcome::Toxic(reason);
                }
                ObligationState::Failed(e) => {
                    error!(error = %e, liquidations, "Error liquidating obligation");
                    break ObligationOutcome::Failed(e.to_string());
                }
            };
        };

        ObligationReport { obligation: address, outcome, liquidations }
    }

    /// Submit one liquidation round for the planned repay/withdraw pair.
    async fn submit(
        &self,
        obligation: &Obligation,
        plan: &LiquidationPlan,
        amount: u64,
    ) -> Result<(), LiquidatorError> {
        let request = LiquidationRequest {
            wallet: self.config.wallet,
            market: self.config.market,
            obligation: obligation.pubkey,
            amount,
            repay_reserve: plan.selection.repay.reserve,
            repay_symbol: plan.selection.repay.symbol.clone(),
            withdraw_reserve: plan.selection.withdraw.reserve,
            withdraw_symbol: plan.selection.withdraw.symbol.clone(),
        };
        let signature = self.liquidator.submit_liquidation(&request).await?;
        info!(
            signature = %signature,
            amount,
            repay = %request.repay_symbol,
            withdraw = %request.withdraw_symbol,
            "Liquidation submitted"
        );
        Ok(())
    }
}
