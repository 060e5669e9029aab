use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;

/// A borrower's position in a lending market, as last read from chain.
///
/// Never mutated locally: a new value is fetched each epoch and again after
/// every liquidation action.
#[derive(Debug, Clone, PartialEq)]
pub struct Obligation {
    pub pubkey: Pubkey,
    pub lending_market: Pubkey,
    pub owner: Pubkey,
    /// Borrowed value cached on chain at the last refresh.
    pub borrowed_value: Decimal,
    /// Unhealthy borrow value cached on chain at the last refresh.
    pub unhealthy_borrow_value: Decimal,
    pub deposits: Vec<ObligationCollateral>,
    pub borrows: Vec<ObligationLiquidity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObligationCollateral {
    pub deposit_reserve: Pubkey,
    /// Amount of reserve collateral tokens deposited.
    pub deposited_amount: u64,
    pub market_value: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObligationLiquidity {
    pub borrow_reserve: Pubkey,
    /// Reserve cumulative borrow rate when this borrow was last accrued.
    pub cumulative_borrow_rate: Decimal,
    /// Borrowed liquidity in base units, fractional.
    pub borrowed_amount: Decimal,
    pub market_value: Decimal,
}

/// Per-token pool of a lending market.
#[derive(Debug, Clone, PartialEq)]
pub struct Reserve {
    pub pubkey: Pubkey,
    pub lending_market: Pubkey,
    pub symbol: String,
    pub liquidity_mint: Pubkey,
    pub mint_decimals: u8,
    pub pyth_oracle: Pubkey,
    pub available_amount: u64,
    pub borrowed_amount: Decimal,
    pub cumulative_borrow_rate: Decimal,
    pub collateral_mint: Pubkey,
    pub collateral_mint_total_supply: u64,
    pub loan_to_value_pct: u8,
    pub liquidation_threshold_pct: u8,
    pub liquidation_bonus_pct: u8,
}

impl Reserve {
    /// Collateral tokens minted per unit of liquidity.
    ///
    /// Falls back to 1:1 while either the collateral supply or the total
    /// liquidity is empty.
    pub fn collateral_exchange_rate(&self) -> Decimal {
        let total_liquidity = Decimal::from(self.available_amount) + self.borrowed_amount;
        if self.collateral_mint_total_supply == 0 || total_liquidity.is_zero() {
            return Decimal::ONE;
        }
        Decimal::from(self.collateral_mint_total_supply)
            .checked_div(total_liquidity)
            .unwrap_or(Decimal::ONE)
    }
}

/// Oracle price sample for one liquidity mint, in quote currency per whole token.
#[derive(Debug, Clone, PartialEq)]
pub struct OraclePrice {
    pub mint: Pubkey,
    pub oracle: Pubkey,
    pub price: Decimal,
}

/// Liquidator's holding of one reserve's collateral token.
#[derive(Debug, Clone, PartialEq)]
pub struct CollateralBalance {
    pub reserve: Pubkey,
    pub symbol: String,
    pub collateral_mint: Pubkey,
    pub amount: u64,
}

/// A deposit or borrow valued against current reserve and oracle data.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionValue {
    pub reserve: Pubkey,
    pub mint: Pubkey,
    pub symbol: String,
    /// Liquidity amount in base units.
    pub amount: Decimal,
    pub market_value: Decimal,
}
