//! Deterministic baseline forecaster.
//!
//! Fits a least-squares line and Holt's linear exponential smoothing to the
//! 7-day moving average of daily mentions and keeps whichever has the lower
//! in-sample MAE.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use oracle_common::{ForecastPoint, Metadata, TopicForecast};

use crate::timeseries::{linear_fit, mean, smooth, std_dev};

pub const MIN_POINTS: usize = 14;
pub const SMOOTHING_WINDOW: usize = 7;
pub const HOLT_ALPHA: f64 = 0.3;
pub const HOLT_BETA: f64 = 0.1;
const Z_95: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    LinearTrend,
    Holt,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::LinearTrend => "linear_trend",
            ModelType::Holt => "holt",
        }
    }
}

/// A fitted model: in-sample one-step predictions plus a way to extrapolate.
struct Fit {
    model: ModelType,
    fitted: Vec<f64>,
    params: Vec<(&'static str, f64)>,
    /// Level and per-step slope at the last observed point.
    level: f64,
    slope: f64,
}

impl Fit {
    fn predict(&self, step: u32) -> f64 {
        (self.level + self.slope * step as f64).max(0.0)
    }

    fn residuals<'a>(&'a self, series: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
        series.iter().zip(&self.fitted).map(|(y, f)| y - f)
    }

    fn mae(&self, series: &[f64]) -> f64 {
        let errs: Vec<f64> = self.residuals(series).map(f64::abs).collect();
        mean(&errs)
    }

    fn rmse(&self, series: &[f64]) -> f64 {
        let sq: Vec<f64> = self.residuals(series).map(|r| r * r).collect();
        mean(&sq).sqrt()
    }
}

fn fit_linear(series: &[f64]) -> Fit {
    let (slope, intercept) = linear_fit(series);
    let n = series.len();
    Fit {
        model: ModelType::LinearTrend,
        fitted: (0..n)
            .map(|i| (intercept + slope * i as f64).max(0.0))
            .collect(),
        params: vec![("intercept", intercept), ("slope", slope)],
        level: intercept + slope * (n.saturating_sub(1)) as f64,
        slope,
    }
}

fn fit_holt(series: &[f64]) -> Fit {
    let mut level = series[0];
    let mut trend = series.get(1).map(|y| y - series[0]).unwrap_or(0.0);
    let mut fitted = Vec::with_capacity(series.len());
    fitted.push(series[0]);

    for y in &series[1..] {
        fitted.push(level + trend);
        let prev_level = level;
        level = HOLT_ALPHA * y + (1.0 - HOLT_ALPHA) * (level + trend);
        trend = HOLT_BETA * (level - prev_level) + (1.0 - HOLT_BETA) * trend;
    }

    Fit {
        model: ModelType::Holt,
        fitted,
        params: vec![
            ("alpha", HOLT_ALPHA),
            ("beta", HOLT_BETA),
            ("level", level),
            ("trend", trend),
        ],
        level,
        slope: trend,
    }
}

fn metadata(pairs: &[(&str, f64)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Forecaster {
    pub min_points: usize,
    pub smoothing_window: usize,
}

impl Default for Forecaster {
    fn default() -> Self {
        Self {
            min_points: MIN_POINTS,
            smoothing_window: SMOOTHING_WINDOW,
        }
    }
}

impl Forecaster {
    /// Forecast `horizon_days` past `last_date` from daily totals (oldest first).
    /// Returns `None` when fewer than `min_points` days are available.
    pub fn forecast(
        &self,
        topic_id: &str,
        last_date: NaiveDate,
        totals: &[f64],
        horizon_days: u32,
        now: DateTime<Utc>,
    ) -> Option<TopicForecast> {
        if totals.len() < self.min_points || horizon_days == 0 {
            return None;
        }
        let series = smooth(totals, self.smoothing_window);
        let n = series.len() as f64;

        let linear = fit_linear(&series);
        let holt = fit_holt(&series);
        let (linear_mae, holt_mae) = (linear.mae(&series), holt.mae(&series));
        let best = if holt_mae < linear_mae { holt } else { linear };

        let mae = best.mae(&series);
        let rmse = best.rmse(&series);
        let spread = std_dev(&series);

        let forecast_curve: Vec<ForecastPoint> = (1..=horizon_days)
            .map(|h| {
                let yhat = best.predict(h);
                let half_width = Z_95 * rmse * (1.0 + h as f64 / n).sqrt();
                ForecastPoint {
                    date: last_date + Duration::days(h as i64),
                    yhat,
                    yhat_lower: Some((yhat - half_width).max(0.0)),
                    yhat_upper: Some(yhat + half_width),
                }
            })
            .collect();

        let confidence_score = if spread > 0.0 {
            (1.0 - mae / spread).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let growth_rate = match (forecast_curve.first(), forecast_curve.last()) {
            (Some(first), Some(last)) if first.yhat != 0.0 => (last.yhat - first.yhat) / first.yhat,
            _ => 0.0,
        };

        Some(TopicForecast {
            topic_id: topic_id.to_string(),
            horizon_days,
            forecast_curve,
            confidence_score,
            growth_rate,
            model_type: best.model.as_str().to_string(),
            model_params: metadata(&best.params),
            model_metrics: metadata(&[
                ("mae", mae),
                ("rmse", rmse),
                ("linear_trend_mae", linear_mae),
                ("holt_mae", holt_mae),
                ("n_points", n),
            ]),
            updated_at: now,
        })
    }
}
