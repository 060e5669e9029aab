//! In-memory collaborators and fixtures shared by unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;

use crate::collaborators::{
    LiquidationExecutor, LiquidationRequest, MarketSnapshotProvider, RedemptionExecutor,
    RedemptionRequest, WalletReader,
};
use crate::error::{LiquidatorError, Result};
use crate::model::{
    CollateralBalance, Obligation, ObligationCollateral, ObligationLiquidity, OraclePrice, Reserve,
};

pub fn reserve(symbol: &str, decimals: u8, ltv: u8, threshold: u8) -> Reserve {
    Reserve {
        pubkey: Pubkey::new_unique(),
        lending_market: Pubkey::default(),
        symbol: symbol.to_string(),
        liquidity_mint: Pubkey::new_unique(),
        mint_decimals: decimals,
        pyth_oracle: Pubkey::new_unique(),
        available_amount: 0,
        borrowed_amount: Decimal::ZERO,
        cumulative_borrow_rate: Decimal::ONE,
        collateral_mint: Pubkey::new_unique(),
        collateral_mint_total_supply: 0,
        loan_to_value_pct: ltv,
        liquidation_threshold_pct: threshold,
        liquidation_bonus_pct: 5,
    }
}

pub fn oracle(reserve: &Reserve, price: Decimal) -> OraclePrice {
    OraclePrice {
        mint: reserve.liquidity_mint,
        oracle: reserve.pyth_oracle,
        price,
    }
}

/// Obligation with collateral amounts per reserve and borrowed liquidity per reserve.
pub fn obligation(deposits: Vec<(&Reserve, u64)>, borrows: Vec<(&Reserve, Decimal)>) -> Obligation {
    Obligation {
        pubkey: Pubkey::new_unique(),
        lending_market: Pubkey::default(),
        owner: Pubkey::new_unique(),
        borrowed_value: Decimal::ZERO,
        unhealthy_borrow_value: Decimal::ZERO,
        deposits: deposits
            .into_iter()
            .map(|(r, amount)| ObligationCollateral {
                deposit_reserve: r.pubkey,
                deposited_amount: amount,
                market_value: Decimal::ZERO,
            })
            .collect(),
        borrows: borrows
            .into_iter()
            .map(|(r, amount)| ObligationLiquidity {
                borrow_reserve: r.pubkey,
                cumulative_borrow_rate: Decimal::ONE,
                borrowed_amount: amount,
                market_value: Decimal::ZERO,
            })
            .collect(),
    }
}

#[derive(Default)]
struct State {
    oracles: Vec<OraclePrice>,
    obligations: Vec<Obligation>,
    reserves: Vec<Reserve>,
    /// Snapshot fetches still to fail.
    snapshot_failures: usize,
    snapshots: usize,
    balances: HashMap<Pubkey, u64>,
    balance_reads: usize,
    refetch_queue: VecDeque<Obligation>,
    refetches: Vec<Pubkey>,
    failing_obligations: HashSet<Pubkey>,
    failing_reserves: HashSet<Pubkey>,
    liquidations: Vec<LiquidationRequest>,
    redemptions: Vec<RedemptionRequest>,
}

/// Scriptable stand-in for the chain that records every action submitted to it.
///
/// Balances are keyed by mint; a mint without a balance reads as an error.
/// Obligation re-fetches are served from a FIFO queue.
pub struct FakeChain {
    pub wallet: Pubkey,
    state: Mutex<State>,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self {
            wallet: Pubkey::new_unique(),
            state: Mutex::new(State::default()),
        }
    }
}

impl FakeChain {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn set_snapshot(&self, oracles: Vec<OraclePrice>, obligations: Vec<Obligation>, reserves: Vec<Reserve>) {
        let mut state = self.state();
        state.oracles = oracles;
        state.obligations = obligations;
        state.reserves = reserves;
    }

    pub fn fail_snapshot(&self) {
        self.fail_next_snapshots(usize::MAX);
    }

    pub fn fail_next_snapshots(&self, count: usize) {
        self.state().snapshot_failures = count;
    }

    /// Number of snapshot fetches attempted.
    pub fn snapshots(&self) -> usize {
        self.state().snapshots
    }

    pub fn balance_reads(&self) -> usize {
        self.state().balance_reads
    }

    pub fn set_balance(&self, mint: Pubkey, amount: u64) {
        self.state().balances.insert(mint, amount);
    }

    pub fn queue_refetch(&self, obligation: Obligation) {
        self.state().refetch_queue.push_back(obligation);
    }

    pub fn fail_liquidation(&self, obligation: Pubkey) {
        self.state().failing_obligations.insert(obligation);
    }

    pub fn fail_redemption(&self, reserve: Pubkey) {
        self.state().failing_reserves.insert(reserve);
    }

    pub fn liquidations(&self) -> Vec<LiquidationRequest> {
        self.state().liquidations.clone()
    }

    pub fn redemptions(&self) -> Vec<RedemptionRequest> {
        self.state().redemptions.clone()
    }

    pub fn refetches(&self) -> Vec<Pubkey> {
        self.state().refetches.clone()
    }
}

#[async_trait]
impl MarketSnapshotProvider for FakeChain {
    async fn fetch_oracle(&self, _market: &Pubkey) -> Result<Vec<OraclePrice>> {
        let mut state = self.state();
        state.snapshots += 1;
        if state.snapshot_failures > 0 {
            state.snapshot_failures -= 1;
            return Err(LiquidatorError::Network("connection refused".into()));
        }
        Ok(state.oracles.clone())
    }

    async fn fetch_obligations(&self, _market: &Pubkey) -> Result<Vec<Obligation>> {
        Ok(self.state().obligations.clone())
    }

    async fn fetch_reserves(&self, _market: &Pubkey) -> Result<Vec<Reserve>> {
        Ok(self.state().reserves.clone())
    }

    async fn fetch_obligation(&self, address: &Pubkey) -> Result<Obligation> {
        let mut state = self.state();
        state.refetches.push(*address);
        state
            .refetch_queue
            .pop_front()
            .ok_or(LiquidatorError::AccountNotFound(*address))
    }
}

#[async_trait]
impl WalletReader for FakeChain {
    async fn fetch_wallet_token_balance(&self, _wallet: &Pubkey, mint: &Pubkey) -> Result<u64> {
        let mut state = self.state();
        state.balance_reads += 1;
        state
            .balances
            .get(mint)
            .copied()
            .ok_or_else(|| LiquidatorError::Network(format!("no token account for {mint}")))
    }

    async fn fetch_collateral_balances(
        &self,
        _wallet: &Pubkey,
        reserves: &[Reserve],
    ) -> Result<Vec<CollateralBalance>> {
        let state = self.state();
        Ok(reserves
            .iter()
            .filter_map(|r| {
                state.balances.get(&r.collateral_mint).map(|amount| CollateralBalance {
                    reserve: r.pubkey,
                    symbol: r.symbol.clone(),
                    collateral_mint: r.collateral_mint,
                    amount: *amount,
                })
            })
            .collect())
    }
}

#[async_trait]
impl LiquidationExecutor for FakeChain {
    async fn submit_liquidation(&self, request: &LiquidationRequest) -> Result<String> {
        let mut state = self.state();
        state.liquidations.push(request.clone());
        if state.failing_obligations.contains(&request.obligation) {
            return Err(LiquidatorError::ActionExecution("custom program error: 0x1".into()));
        }
        Ok(format!("liquidation-{}", state.liquidations.len()))
    }
}

#[async_trait]
impl RedemptionExecutor for FakeChain {
    async fn submit_redemption(&self, request: &RedemptionRequest) -> Result<String> {
        let mut state = self.state();
        state.redemptions.push(request.clone());
        if state.failing_reserves.contains(&request.reserve) {
            return Err(LiquidatorError::ActionExecution("custom program error: 0x2".into()));
        }
        Ok(format!("redemption-{}", state.redemptions.len()))
    }
}
