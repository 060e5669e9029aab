//! Decoding of lending program obligation and reserve accounts.
//!
//! Fixed point values on chain are wads: u128 scaled by 10^18.

use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;

use crate::error::{LiquidatorError, Result};
use crate::model::{Obligation, ObligationCollateral, ObligationLiquidity, Reserve};

pub const OBLIGATION_LEN: usize = 1300;
pub const RESERVE_LEN: usize = 619;

/// Offset of the lending market pubkey, shared by both account types.
pub const LENDING_MARKET_OFFSET: usize = 10;

const WAD_DECIMALS: u32 = 18;
const MAX_OBLIGATION_RESERVES: usize = 10;
const OBLIGATION_COLLATERAL_LEN: usize = 88;
const OBLIGATION_LIQUIDITY_LEN: usize = 112;

/// Little-endian reader over a fixed-layout account.
struct Reader<'a> {
    account: Pubkey,
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn bytes<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        self.data
            .get(offset..offset + N)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| LiquidatorError::decode(self.account, format!("read past end at {offset}")))
    }

    fn u8(&self, offset: usize) -> Result<u8> {
        Ok(self.bytes::<1>(offset)?[0])
    }

    fn u64(&self, offset: usize) -> Result<u64> {
        self.bytes(offset).map(u64::from_le_bytes)
    }

    fn pubkey(&self, offset: usize) -> Result<Pubkey> {
        self.bytes::<32>(offset).map(Pubkey::new_from_array)
    }

    fn wad(&self, offset: usize) -> Result<Decimal> {
        let raw = self.bytes(offset).map(u128::from_le_bytes)?;
        wad_to_decimal(raw).ok_or_else(|| LiquidatorError::decode(self.account, format!("wad overflow at {offset}")))
    }
}

/// Convert a wad to a decimal, dropping precision when the full value does not fit.
pub fn wad_to_decimal(raw: u128) -> Option<Decimal> {
    let raw = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(raw, WAD_DECIMALS)
        .or_else(|_| Decimal::try_from_i128_with_scale(raw / 1_000_000_000, WAD_DECIMALS - 9))
        .ok()
}

pub fn decode_obligation(pubkey: Pubkey, data: &[u8]) -> Result<Obligation> {
    if data.len() != OBLIGATION_LEN {
        return Err(LiquidatorError::decode(pubkey, format!("unexpected obligation size {}", data.len())));
    }
    let r = Reader { account: pubkey, data };
    if r.u8(0)? == 0 {
        return Err(LiquidatorError::decode(pubkey, "uninitialized obligation"));
    }

    let deposits_len = usize::from(r.u8(202)?);
    let borrows_len = usize::from(r.u8(203)?);
    if deposits_len + borrows_len > MAX_OBLIGATION_RESERVES {
        return Err(LiquidatorError::decode(
            pubkey,
            format!("{deposits_len} deposits and {borrows_len} borrows exceed the reserve limit"),
        ));
    }

    let mut offset = 204;
    let mut deposits = Vec::with_capacity(deposits_len);
    for _ in 0..deposits_len {
        deposits.push(ObligationCollateral {
            deposit_reserve: r.pubkey(offset)?,
            deposited_amount: r.u64(offset + 32)?,
            market_value: r.wad(offset + 40)?,
        });
        offset += OBLIGATION_COLLATERAL_LEN;
    }

    let mut borrows = Vec::with_capacity(borrows_len);
    for _ in 0..borrows_len {
        borrows.push(ObligationLiquidity {
            borrow_reserve: r.pubkey(offset)?,
            cumulative_borrow_rate: r.wad(offset + 32)?,
            borrowed_amount: r.wad(offset + 48)?,
            market_value: r.wad(offset + 64)?,
        });
        offset += OBLIGATION_LIQUIDITY_LEN;
    }

    Ok(Obligation {
        pubkey,
        lending_market: r.pubkey(LENDING_MARKET_OFFSET)?,
        owner: r.pubkey(42)?,
        borrowed_value: r.wad(90)?,
        unhealthy_borrow_value: r.wad(122)?,
        deposits,
        borrows,
    })
}

/// Decode a reserve account. The symbol is not stored on chain and is left empty.
pub fn decode_reserve(pubkey: Pubkey, data: &[u8]) -> Result<Reserve> {
    if data.len() != RESERVE_LEN {
        return Err(LiquidatorError::decode(pubkey, format!("unexpected reserve size {}", data.len())));
    }
    let r = Reader { account: pubkey, data };
    if r.u8(0)? == 0 {
        return Err(LiquidatorError::decode(pubkey, "uninitialized reserve"));
    }

    Ok(Reserve {
        pubkey,
        lending_market: r.pubkey(LENDING_MARKET_OFFSET)?,
        symbol: String::new(),
        liquidity_mint: r.pubkey(42)?,
        mint_decimals: r.u8(74)?,
        pyth_oracle: r.pubkey(107)?,
        available_amount: r.u64(171)?,
        borrowed_amount: r.wad(179)?,
        cumulative_borrow_rate: r.wad(195)?,
        collateral_mint: r.pubkey(227)?,
        collateral_mint_total_supply: r.u64(259)?,
        loan_to_value_pct: r.u8(300)?,
        liquidation_bonus_pct: r.u8(301)?,
        liquidation_threshold_pct: r.u8(302)?,
    })
}
