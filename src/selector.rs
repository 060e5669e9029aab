use crate::health::RefreshedObligation;
use crate::model::PositionValue;

/// Repay/withdraw pair chosen for one liquidation round.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub repay: PositionValue,
    pub withdraw: PositionValue,
}

/// Pick the borrow and the deposit with the highest market value.
///
/// Ties keep the first position encountered. Returns `None` when either side
/// is empty, which marks the obligation as not actionable.
pub fn select_positions(refreshed: &RefreshedObligation) -> Option<Selection> {
    let repay = highest_value(&refreshed.borrows)?;
    let withdraw = highest_value(&refreshed.deposits)?;
    Some(Selection {
        repay: repay.clone(),
        withdraw: withdraw.clone(),
    })
}

// `Iterator::max_by` keeps the last maximum, so fold with a strict comparison.
fn highest_value(positions: &[PositionValue]) -> Option<&PositionValue> {
    positions.iter().fold(None, |best, candidate| match best {
        Some(best) if candidate.market_value <= best.market_value => Some(best),
        _ => Some(candidate),
    })
}
