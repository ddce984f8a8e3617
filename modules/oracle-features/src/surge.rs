//! Surge score: a fixed weighted sigmoid over four explainable components.
//!
//! ```text
//! logit = 0.9 * velocity_growth + 0.5 * z_spike + 0.4 * convergence - 0.6 * uncertainty_penalty
//! score = 1 / (1 + e^-logit)
//! ```
//!
//! The score is recomputable from its breakdown alone, so API consumers can
//! verify `score_pct` against the numbers they are shown.

use oracle_common::{ForecastPoint, SurgeBreakdown, SurgeScore};

use crate::timeseries::GROWTH_EPSILON;

pub const VELOCITY_GROWTH_WEIGHT: f64 = 0.9;
pub const Z_SPIKE_WEIGHT: f64 = 0.5;
pub const CONVERGENCE_WEIGHT: f64 = 0.4;
pub const UNCERTAINTY_WEIGHT: f64 = 0.6;

/// Penalty applied when no forecast interval is available.
pub const DEFAULT_UNCERTAINTY_PENALTY: f64 = 0.1;
pub const MAX_UNCERTAINTY_PENALTY: f64 = 2.0;

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub fn surge_logit(b: &SurgeBreakdown) -> f64 {
    VELOCITY_GROWTH_WEIGHT * b.velocity_growth
        + Z_SPIKE_WEIGHT * b.z_spike
        + CONVERGENCE_WEIGHT * b.convergence
        - UNCERTAINTY_WEIGHT * b.uncertainty_penalty
}

/// Round to one decimal place.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Score a breakdown. The breakdown is kept verbatim on the result.
pub fn surge_score(topic_id: &str, breakdown: SurgeBreakdown) -> SurgeScore {
    let logit = surge_logit(&breakdown);
    let score = if logit.is_nan() { 0.5 } else { sigmoid(logit) };
    SurgeScore {
        topic_id: topic_id.to_string(),
        score,
        score_pct: round1(100.0 * score),
        breakdown,
    }
}

/// Assemble a breakdown from raw metrics. Non-finite inputs become 0.
pub fn breakdown(
    velocity_growth: f64,
    z_spike: f64,
    convergence: f64,
    uncertainty_penalty: f64,
) -> SurgeBreakdown {
    SurgeBreakdown {
        velocity_growth: finite_or_zero(velocity_growth),
        z_spike: finite_or_zero(z_spike),
        convergence: finite_or_zero(convergence),
        uncertainty_penalty: finite_or_zero(uncertainty_penalty),
    }
}

/// Mean relative interval width across points that carry both bounds,
/// clamped to `[0, 2]`. Falls back to the default penalty when nothing is bounded.
pub fn uncertainty_penalty(curve: Option<&[ForecastPoint]>) -> f64 {
    let widths: Vec<f64> = curve
        .unwrap_or_default()
        .iter()
        .filter_map(|p| match (p.yhat_lower, p.yhat_upper) {
            (Some(lo), Some(hi)) => Some((hi - lo) / p.yhat.abs().max(GROWTH_EPSILON)),
            _ => None,
        })
        .filter(|w| w.is_finite())
        .collect();

    if widths.is_empty() {
        return DEFAULT_UNCERTAINTY_PENALTY;
    }
    let mean = widths.iter().sum::<f64>() / widths.len() as f64;
    mean.clamp(0.0, MAX_UNCERTAINTY_PENALTY)
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}
