use std::collections::HashMap;

use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use tracing::warn;

use crate::model::{Obligation, OraclePrice, PositionValue, Reserve};

/// Obligation valued against the current reserve and oracle snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshedObligation {
    pub deposited_value: Decimal,
    pub borrowed_value: Decimal,
    pub allowed_borrow_value: Decimal,
    pub unhealthy_borrow_value: Decimal,
    pub deposits: Vec<PositionValue>,
    pub borrows: Vec<PositionValue>,
}

impl RefreshedObligation {
    /// An obligation is liquidatable once its debt exceeds the unhealthy threshold.
    pub fn is_liquidatable(&self) -> bool {
        self.borrowed_value > self.unhealthy_borrow_value
    }
}

/// Recompute the value of an obligation from reserves and oracle prices.
///
/// Deposits or borrows whose reserve or price is missing are left out of
/// every total instead of failing the evaluation.
pub fn evaluate_obligation(
    obligation: &Obligation,
    reserves: &[Reserve],
    oracles: &[OraclePrice],
) -> RefreshedObligation {
    let reserves: HashMap<Pubkey, &Reserve> = reserves.iter().map(|r| (r.pubkey, r)).collect();
    let prices: HashMap<Pubkey, Decimal> = oracles.iter().map(|o| (o.mint, o.price)).collect();

    let mut refreshed = RefreshedObligation {
        deposited_value: Decimal::ZERO,
        borrowed_value: Decimal::ZERO,
        allowed_borrow_value: Decimal::ZERO,
        unhealthy_borrow_value: Decimal::ZERO,
        deposits: Vec::with_capacity(obligation.deposits.len()),
        borrows: Vec::with_capacity(obligation.borrows.len()),
    };

    for deposit in &obligation.deposits {
        let Some((reserve, price)) = lookup(&reserves, &prices, &deposit.deposit_reserve, obligation) else {
            continue;
        };
        let valued = Decimal::from(deposit.deposited_amount)
            .checked_div(reserve.collateral_exchange_rate())
            .and_then(|amount| market_value(amount, price, reserve.mint_decimals).map(|v| (amount, v)));
        let Some((amount, value)) = valued else {
            warn!(obligation = %obligation.pubkey, reserve = %reserve.pubkey, "Deposit valuation overflowed, skipping");
            continue;
        };

        let totals = deposit_totals(&refreshed, value, reserve);
        let Some((deposited, allowed, unhealthy)) = totals else {
            warn!(obligation = %obligation.pubkey, reserve = %reserve.pubkey, "Deposit totals overflowed, skipping");
            continue;
        };

        refreshed.deposited_value = deposited;
        refreshed.allowed_borrow_value = allowed;
        refreshed.unhealthy_borrow_value = unhealthy;
        refreshed.deposits.push(PositionValue {
            reserve: reserve.pubkey,
            mint: reserve.liquidity_mint,
            symbol: reserve.symbol.clone(),
            amount,
            market_value: value,
        });
    }

    for borrow in &obligation.borrows {
        let Some((reserve, price)) = lookup(&reserves, &prices, &borrow.borrow_reserve, obligation) else {
            continue;
        };
        let valued = accrue_interest(
            borrow.borrowed_amount,
            reserve.cumulative_borrow_rate,
            borrow.cumulative_borrow_rate,
        )
        .and_then(|amount| market_value(amount, price, reserve.mint_decimals).map(|v| (amount, v)));
        let Some((amount, value)) = valued else {
            warn!(obligation = %obligation.pubkey, reserve = %reserve.pubkey, "Borrow valuation overflowed, skipping");
            continue;
        };

        let Some(borrowed) = refreshed.borrowed_value.checked_add(value) else {
            warn!(obligation = %obligation.pubkey, reserve = %reserve.pubkey, "Borrow totals overflowed, skipping");
            continue;
        };

        refreshed.borrowed_value = borrowed;
        refreshed.borrows.push(PositionValue {
            reserve: reserve.pubkey,
            mint: reserve.liquidity_mint,
            symbol: reserve.symbol.clone(),
            amount,
            market_value: value,
        });
    }

    refreshed
}

/// Running deposit totals with one more position added, or `None` on overflow.
fn deposit_totals(refreshed: &RefreshedObligation, value: Decimal, reserve: &Reserve) -> Option<(Decimal, Decimal, Decimal)> {
    let deposited = refreshed.deposited_value.checked_add(value)?;
    let allowed = refreshed
        .allowed_borrow_value
        .checked_add(value.checked_mul(pct(reserve.loan_to_value_pct))?)?;
    let unhealthy = refreshed
        .unhealthy_borrow_value
        .checked_add(value.checked_mul(pct(reserve.liquidation_threshold_pct))?)?;
    Some((deposited, allowed, unhealthy))
}

fn lookup<'a>(
    reserves: &HashMap<Pubkey, &'a Reserve>,
    prices: &HashMap<Pubkey, Decimal>,
    reserve: &Pubkey,
    obligation: &Obligation,
) -> Option<(&'a Reserve, Decimal)> {
    let Some(reserve) = reserves.get(reserve).copied() else {
        warn!(obligation = %obligation.pubkey, reserve = %reserve, "Reserve missing from snapshot");
        return None;
    };
    let Some(price) = prices.get(&reserve.liquidity_mint).copied() else {
        warn!(obligation = %obligation.pubkey, symbol = %reserve.symbol, "No oracle price for reserve");
        return None;
    };
    Some((reserve, price))
}

/// Compound a borrow from the rate it was last accrued at to the reserve's current rate.
fn accrue_interest(borrowed: Decimal, reserve_rate: Decimal, obligation_rate: Decimal) -> Option<Decimal> {
    if obligation_rate.is_zero() || reserve_rate <= obligation_rate {
        return Some(borrowed);
    }
    borrowed.checked_mul(reserve_rate)?.checked_div(obligation_rate)
}

fn market_value(amount: Decimal, price: Decimal, decimals: u8) -> Option<Decimal> {
    let scale = Decimal::try_new(1, u32::from(decimals)).ok()?;
    amount.checked_mul(price)?.checked_mul(scale)
}

fn pct(value: u8) -> Decimal {
    Decimal::new(i64::from(value), 2)
}
