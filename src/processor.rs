use crate::models::{ChainRow, OptionChain, OptionDetail, Side};

/// Flatten a raw chain into CE/PE rows.
///
/// Never fails. Missing numbers default to zero, strike entries without an
/// integral strike are dropped, and an absent `records` block yields no rows.
pub fn normalize(chain: &OptionChain) -> Vec<ChainRow> {
    let Some(records) = chain.records.as_ref() else {
        return Vec::new();
    };
    let underlying = records.underlying_value;

    let mut rows = Vec::with_capacity(records.data.len() * 2);
    for entry in &records.data {
        let Some(strike) = entry.strike_price.and_then(integral_strike) else {
            continue;
        };

        if let Some(ce) = entry.call.as_ref().filter(|d| !d.is_empty()) {
            rows.push(to_row(Side::Call, strike, ce, underlying));
        }
        if let Some(pe) = entry.put.as_ref().filter(|d| !d.is_empty()) {
            rows.push(to_row(Side::Put, strike, pe, underlying));
        }
    }
    rows
}

fn to_row(side: Side, strike: i64, detail: &OptionDetail, underlying: Option<f64>) -> ChainRow {
    ChainRow {
        side,
        strike,
        open_interest: detail.open_interest.unwrap_or(0.0),
        change_in_oi: detail.change_in_oi.unwrap_or(0.0),
        volume: detail.total_traded_volume.unwrap_or(0.0),
        underlying,
    }
}

// Strikes that are not whole numbers can never sit on the ATM grid
fn integral_strike(strike: f64) -> Option<i64> {
    (strike.is_finite() && strike.fract() == 0.0).then_some(strike as i64)
}
