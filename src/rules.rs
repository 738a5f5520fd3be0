use crate::config::SignalParams;
use crate::models::{ChainRow, Side, Signal, SignalState};
use crate::trend::{Trend, TrendSource};
use serde::Serialize;

/// Directional lean of one indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Vote {
    #[serde(rename = "CE")]
    Call,
    #[serde(rename = "PE")]
    Put,
    #[serde(rename = "NEUTRAL")]
    Neutral,
}

/// Result of grading one chain snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub signal: Signal,
    pub reasons: Vec<String>,
    pub atm: i64,
    pub pcr: f64,
    pub ce_votes: usize,
    pub pe_votes: usize,
}

impl Verdict {
    fn no_data(reason: String, atm: i64) -> Self {
        Self {
            signal: Signal::NoData,
            reasons: vec![reason],
            atm,
            pcr: 0.0,
            ce_votes: 0,
            pe_votes: 0,
        }
    }

    pub fn into_state(self, timestamp: String) -> SignalState {
        SignalState {
            timestamp,
            signal: self.signal,
            atm: Some(self.atm),
            pcr: Some(self.pcr),
            ce_votes: self.ce_votes,
            pe_votes: self.pe_votes,
            reasons: self.reasons,
        }
    }
}

/// Grade a normalized chain.
///
/// Reasons are appended in evaluation order: context, volume, OI, COI,
/// PCR, trend, tally. The trend source is only consulted once an ATM
/// CE/PE pair has been found.
pub async fn decide<T: TrendSource>(rows: &[ChainRow], params: &SignalParams, trend: &T) -> Verdict {
    if rows.is_empty() {
        return Verdict::no_data("Option chain empty".to_string(), 0);
    }

    let Some(underlying) = rows.iter().filter_map(|r| r.underlying).find(|u| u.is_finite()) else {
        return Verdict::no_data("Underlying missing".to_string(), 0);
    };

    let atm = atm_strike(underlying, params.strike_step);
    let Some((ce, pe)) = atm_pair(rows, atm) else {
        return Verdict::no_data(format!("ATM {} missing", atm), atm);
    };

    let mut reasons = vec![
        format!("Underlying = {}", underlying),
        format!("ATM Strike = {}", atm),
    ];
    let mut votes = Vec::with_capacity(5);

    // Volume fight
    let (vote, reason) = compare(ce.volume, pe.volume, "Volume", "Volumes equal");
    votes.push(vote);
    reasons.push(reason);

    // OI fight
    let (vote, reason) = compare(ce.open_interest, pe.open_interest, "OI", "OI equal");
    votes.push(vote);
    reasons.push(reason);

    // COI fight
    let (vote, reason) = compare(ce.change_in_oi, pe.change_in_oi, "COI", "COI equal");
    votes.push(vote);
    reasons.push(reason);

    // PCR
    let pcr = put_call_ratio(ce.open_interest, pe.open_interest);
    reasons.push(format!("PCR = {:?}", pcr));
    votes.push(pcr_vote(pcr, params));

    let trend = trend.classify_trend().await;
    reasons.push(format!("Trend = {}", trend));
    match trend {
        Trend::Up => votes.push(Vote::Call),
        Trend::Down => votes.push(Vote::Put),
        Trend::Neutral => {}
    }

    let (ce_votes, pe_votes) = tally(&votes);
    reasons.push(format!("Votes → CE:{}, PE:{}", ce_votes, pe_votes));

    Verdict {
        signal: verdict(ce_votes, pe_votes, params.min_votes),
        reasons,
        atm,
        pcr,
        ce_votes,
        pe_votes,
    }
}

/// Nearest multiple of `step`; exact midpoints round to the even multiple.
pub fn atm_strike(underlying: f64, step: f64) -> i64 {
    ((underlying / step).round_ties_even() * step) as i64
}

/// First CE and first PE row at `atm`, if both exist
fn atm_pair(rows: &[ChainRow], atm: i64) -> Option<(&ChainRow, &ChainRow)> {
    let at_strike = |side: Side| rows.iter().find(|r| r.strike == atm && r.side == side);
    Some((at_strike(Side::Call)?, at_strike(Side::Put)?))
}

/// Strictly larger side wins the vote; a reason is produced either way.
pub fn compare(ce: f64, pe: f64, label: &str, equal_reason: &str) -> (Vote, String) {
    if pe > ce {
        (Vote::Put, format!("PE {label} > CE {label}"))
    } else if ce > pe {
        (Vote::Call, format!("CE {label} > PE {label}"))
    } else {
        (Vote::Neutral, equal_reason.to_string())
    }
}

/// PE OI / CE OI to two decimals, halves to even; 1.0 when CE OI is zero.
pub fn put_call_ratio(ce_oi: f64, pe_oi: f64) -> f64 {
    if ce_oi == 0.0 {
        return 1.0;
    }
    (pe_oi / ce_oi * 100.0).round_ties_even() / 100.0
}

pub fn pcr_vote(pcr: f64, params: &SignalParams) -> Vote {
    if pcr > params.pcr_upper {
        Vote::Call
    } else if pcr < params.pcr_lower {
        Vote::Put
    } else {
        Vote::Neutral
    }
}

pub fn tally(votes: &[Vote]) -> (usize, usize) {
    let ce = votes.iter().filter(|v| **v == Vote::Call).count();
    let pe = votes.iter().filter(|v| **v == Vote::Put).count();
    (ce, pe)
}

/// Majority with a floor: a lone indicator never produces a trade.
pub fn verdict(ce_votes: usize, pe_votes: usize, min_votes: usize) -> Signal {
    if ce_votes > pe_votes && ce_votes >= min_votes {
        Signal::BuyCe
    } else if pe_votes > ce_votes && pe_votes >= min_votes {
        Signal::BuyPe
    } else {
        Signal::NoTrade
    }
}
