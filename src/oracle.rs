use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;

use crate::error::{LiquidatorError, Result};

const PYTH_MAGIC: u32 = 0xa1b2_c3d4;
const PYTH_PRICE_ACCOUNT: u32 = 3;
const PRICE_STATUS_TRADING: u32 = 1;

const EXPO_OFFSET: usize = 20;
const AGG_PRICE_OFFSET: usize = 208;
const AGG_STATUS_OFFSET: usize = 224;

/// Parse the aggregate price out of a Pyth price account.
///
/// Returns `Ok(None)` when the feed is not currently trading; callers treat
/// that the same as a missing price.
pub fn parse_pyth_price(account: Pubkey, data: &[u8]) -> Result<Option<Decimal>> {
    let read_u32 = |offset: usize| -> Result<u32> {
        data.get(offset..offset + 4)
            .and_then(|s| s.try_into().ok())
            .map(u32::from_le_bytes)
            .ok_or_else(|| LiquidatorError::decode(account, "price account too short"))
    };

    if read_u32(0)? != PYTH_MAGIC {
        return Err(LiquidatorError::decode(account, "not a pyth account"));
    }
    if read_u32(8)? != PYTH_PRICE_ACCOUNT {
        return Err(LiquidatorError::decode(account, "not a pyth price account"));
    }
    if read_u32(AGG_STATUS_OFFSET)? != PRICE_STATUS_TRADING {
        return Ok(None);
    }

    let expo = read_u32(EXPO_OFFSET)? as i32;
    let price = data
        .get(AGG_PRICE_OFFSET..AGG_PRICE_OFFSET + 8)
        .and_then(|s| s.try_into().ok())
        .map(i64::from_le_bytes)
        .ok_or_else(|| LiquidatorError::decode(account, "price account too short"))?;
    if price <= 0 {
        return Ok(None);
    }

    let value = if expo <= 0 {
        Decimal::try_new(price, expo.unsigned_abs()).ok()
    } else {
        Decimal::from(price).checked_mul(Decimal::from(10u64.checked_pow(expo as u32).unwrap_or(0)))
    };
    value
        .filter(|v| !v.is_zero())
        .map(Some)
        .ok_or_else(|| LiquidatorError::decode(account, format!("price {price}e{expo} out of range")))
}
