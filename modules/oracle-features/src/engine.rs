//! Per-topic feature computation and surge snapshot assembly.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use oracle_common::{Source, SurgeScore, TopicFeatures, TopicForecast};

use crate::series::TopicSeries;
use crate::surge::{self, breakdown};
use crate::timeseries;

pub const DEFAULT_WINDOW: usize = 30;
/// Days of velocity/acceleration history carried on a snapshot.
pub const TREND_POINTS: usize = 14;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub velocity: f64,
    pub acceleration: f64,
}

/// Everything the API shows about a topic's current momentum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSnapshot {
    pub features: TopicFeatures,
    pub surge: SurgeScore,
    pub trend: Vec<TrendPoint>,
    /// Events per source over the trailing window.
    pub source_totals: BTreeMap<Source, u32>,
    pub mentions_in_window: u32,
}

impl TopicSnapshot {
    pub fn contributing_sources(&self) -> Vec<Source> {
        self.source_totals
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(source, _)| *source)
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureEngine {
    window: usize,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl FeatureEngine {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Features for the last day of the series.
    pub fn compute(&self, series: &TopicSeries) -> TopicFeatures {
        self.compute_at(series, series.len())
    }

    /// One row per date, each computed from the prefix ending on that date.
    pub fn history(&self, series: &TopicSeries) -> Vec<TopicFeatures> {
        (1..=series.len())
            .map(|end| self.compute_at(series, end))
            .collect()
    }

    /// Relative growth between the two halves of the trailing window.
    pub fn velocity_growth(&self, series: &TopicSeries) -> f64 {
        if series.len() < 2 {
            return 0.0;
        }
        timeseries::velocity_growth(&series.totals, self.window)
    }

    /// Latest features plus the surge score, using the forecast (if any) for
    /// the uncertainty penalty.
    pub fn snapshot(
        &self,
        series: &TopicSeries,
        forecast: Option<&TopicForecast>,
    ) -> TopicSnapshot {
        let features = self.compute(series);
        let penalty = surge::uncertainty_penalty(forecast.map(|f| f.forecast_curve.as_slice()));
        let surge = surge::surge_score(
            &series.topic_id,
            breakdown(
                self.velocity_growth(series),
                features.z_spike,
                features.convergence,
                penalty,
            ),
        );

        let n = series.len();
        let trend = (n.saturating_sub(TREND_POINTS) + 1..=n)
            .map(|end| {
                let f = self.compute_at(series, end);
                TrendPoint {
                    date: f.date,
                    velocity: f.velocity,
                    acceleration: f.acceleration,
                }
            })
            .collect();

        let source_totals: BTreeMap<Source, u32> = Source::ALL
            .iter()
            .map(|s| {
                let col = timeseries::trailing(&series.by_source[s.index()], self.window);
                (*s, col.iter().sum::<f64>() as u32)
            })
            .collect();
        let mentions_in_window =
            timeseries::trailing(&series.totals, self.window).iter().sum::<f64>() as u32;

        TopicSnapshot {
            features,
            surge,
            trend,
            source_totals,
            mentions_in_window,
        }
    }

    /// Features over `series[..end]`. An empty prefix is dated `as_of`.
    fn compute_at(&self, series: &TopicSeries, end: usize) -> TopicFeatures {
        let totals = &series.totals[..end];
        let sources = series.source_prefix(end);
        let date = if end == 0 {
            series.as_of
        } else {
            series.dates[end - 1]
        };

        let unique_sources = sources.iter().filter(|col| day_count(col) > 0).count() as u32;

        let convergence = timeseries::convergence(&sources, self.window);
        let (velocity, acceleration, z_spike) = if end < 2 {
            (0.0, 0.0, 0.0)
        } else {
            (
                timeseries::velocity(totals, self.window),
                timeseries::acceleration(totals, self.window),
                timeseries::z_spike(totals, self.window),
            )
        };

        TopicFeatures {
            topic_id: series.topic_id.clone(),
            date,
            mention_count_total: day_count(totals),
            mention_count_arxiv: day_count(sources[Source::Arxiv.index()]),
            mention_count_github: day_count(sources[Source::Github.index()]),
            mention_count_jobs: day_count(sources[Source::Jobs.index()]),
            mention_count_funding: day_count(sources[Source::Funding.index()]),
            magnitude_sum: if end == 0 { 0.0 } else { series.magnitudes[end - 1] },
            unique_sources,
            velocity,
            acceleration,
            z_spike,
            convergence,
        }
    }
}

/// Count on the last day of a column.
fn day_count(col: &[f64]) -> u32 {
    col.last().copied().unwrap_or(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_common::DailyCount;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 31).unwrap()
    }

    #[test]
    fn all_zero_series_scores_about_fifty() {
        let series = TopicSeries::from_totals("quiet", as_of(), vec![0.0; 60]);
        let snap = FeatureEngine::default().snapshot(&series, None);

        assert_eq!(snap.features.velocity, 0.0);
        assert_eq!(snap.features.acceleration, 0.0);
        assert_eq!(snap.features.z_spike, 0.0);
        // Only the default uncertainty penalty moves it off 50.
        assert!((snap.surge.score_pct - 50.0).abs() < 2.0);
        assert_eq!(snap.surge.score_pct, 48.5);
    }

    #[test]
    fn short_history_degrades_to_zero_metrics() {
        let series = TopicSeries::from_totals("new", as_of(), vec![7.0])
            .with_source(Source::Github, vec![7.0]);
        let f = FeatureEngine::default().compute(&series);

        assert_eq!(f.velocity, 0.0);
        assert_eq!(f.acceleration, 0.0);
        assert_eq!(f.z_spike, 0.0);
        assert_eq!(f.convergence, 0.25);
        assert_eq!(f.mention_count_total, 7);
    }

    #[test]
    fn empty_series_is_dated_as_of() {
        let series = TopicSeries::from_totals("none", as_of(), vec![]);
        let f = FeatureEngine::default().compute(&series);
        assert_eq!(f.date, as_of());
        assert_eq!(f.mention_count_total, 0);
    }

    #[test]
    fn rising_topic_scores_above_flat_topic() {
        let rising: Vec<f64> = (0..60).map(|i| 1.0 + i as f64 * 0.5).collect();
        let flat = vec![5.0; 60];
        let engine = FeatureEngine::default();

        let up = engine.snapshot(&TopicSeries::from_totals("up", as_of(), rising), None);
        let still = engine.snapshot(&TopicSeries::from_totals("flat", as_of(), flat), None);

        assert!(up.surge.breakdown.velocity_growth > 0.0);
        assert!(up.features.acceleration > 0.0);
        assert!(up.surge.score_pct > still.surge.score_pct);
    }

    #[test]
    fn history_has_one_row_per_day_matching_prefix() {
        let rows: Vec<DailyCount> = (1..=10)
            .map(|d| DailyCount {
                topic_id: "t".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 5, d).unwrap(),
                source: if d % 2 == 0 { Source::Arxiv } else { Source::Jobs },
                count: d,
                magnitude: d as f64,
            })
            .collect();
        let start = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        let series = TopicSeries::from_daily_counts("t", &rows, start, end);
        let engine = FeatureEngine::new(7);

        let history = engine.history(&series);
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].date, start);
        assert_eq!(history[9], engine.compute(&series));
        assert_eq!(history[3].mention_count_arxiv, 4);
        assert_eq!(history[3].mention_count_jobs, 0);
        assert_eq!(history[9].convergence, 0.5);
    }

    #[test]
    fn snapshot_carries_trend_and_sources() {
        let totals = vec![2.0; 40];
        let series = TopicSeries::from_totals("t", as_of(), totals.clone())
            .with_source(Source::Arxiv, totals.clone())
            .with_source(Source::Funding, vec![0.0; 40]);
        let snap = FeatureEngine::default().snapshot(&series, None);

        assert_eq!(snap.trend.len(), TREND_POINTS);
        assert_eq!(snap.trend.last().map(|t| t.date), Some(as_of()));
        assert_eq!(snap.contributing_sources(), vec![Source::Arxiv]);
        assert_eq!(snap.mentions_in_window, 60);
    }

    #[test]
    fn forecast_interval_feeds_uncertainty_penalty() {
        use crate::forecast::Forecaster;
        let totals: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 1.0 } else { 9.0 }).collect();
        let series = TopicSeries::from_totals("noisy", as_of(), totals.clone());
        let forecast = Forecaster::default()
            .forecast("noisy", as_of(), &totals, 30, chrono::Utc::now())
            .unwrap();

        let snap = FeatureEngine::default().snapshot(&series, Some(&forecast));
        assert_ne!(
            snap.surge.breakdown.uncertainty_penalty,
            surge::DEFAULT_UNCERTAINTY_PENALTY
        );
    }
}
