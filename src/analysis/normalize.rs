use crate::analysis::formulas::PERCENT_DECIMALS;
use std::collections::BTreeMap;

/// `score` as a percentage of `grand_total`, rounded half-up to two
/// decimals. Scales once before rounding so no intermediate percent is
/// rounded twice.
pub fn share_percent(score: f64, grand_total: f64) -> f64 {
    let scale = 10f64.powi(PERCENT_DECIMALS);
    (score / grand_total * (100.0 * scale)).round() / scale
}

/// Each member's share of the grand total, as a percentage rounded to two
/// decimals. Rounding is per member, so the shares need not add up to
/// exactly 100.00.
pub fn equity_percents(totals: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let grand_total: f64 = totals.values().sum();
    if grand_total == 0.0 {
        return totals.keys().map(|id| (id.clone(), 0.0)).collect();
    }

    totals
        .iter()
        .map(|(id, score)| (id.clone(), share_percent(*score, grand_total)))
        .collect()
}
