/// Round to two decimal places for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fair decimal odds implied by a probability in percent.
pub fn probability_to_odds(probability_pct: f64) -> f64 {
    if probability_pct <= 0.0 {
        return 1000.0;
    }
    if probability_pct >= 100.0 {
        return 1.0;
    }
    100.0 / probability_pct
}
