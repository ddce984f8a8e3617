//! Zero-filled daily series for one topic, built from aggregated counts.

use chrono::{Duration, NaiveDate};

use oracle_common::{DailyCount, Source};

/// Daily totals and per-source counts for one topic, one entry per calendar day.
///
/// `dates`, `totals`, `magnitudes` and every `by_source` column share the same
/// length and are ordered oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicSeries {
    pub topic_id: String,
    pub as_of: NaiveDate,
    pub dates: Vec<NaiveDate>,
    pub totals: Vec<f64>,
    pub by_source: [Vec<f64>; 4],
    pub magnitudes: Vec<f64>,
}

impl TopicSeries {
    /// Build the series covering `start..=as_of`. Days without rows are zero.
    /// Rows outside the range are ignored; repeated (date, source) rows are summed.
    pub fn from_daily_counts(
        topic_id: &str,
        rows: &[DailyCount],
        start: NaiveDate,
        as_of: NaiveDate,
    ) -> Self {
        let days = if start > as_of {
            0
        } else {
            (as_of - start).num_days() as usize + 1
        };

        let dates: Vec<NaiveDate> = (0..days)
            .map(|i| start + Duration::days(i as i64))
            .collect();
        let mut totals = vec![0.0; days];
        let mut magnitudes = vec![0.0; days];
        let mut by_source: [Vec<f64>; 4] = std::array::from_fn(|_| vec![0.0; days]);

        for row in rows {
            if row.topic_id != topic_id || row.date < start || row.date > as_of {
                continue;
            }
            let idx = (row.date - start).num_days() as usize;
            let count = row.count as f64;
            totals[idx] += count;
            magnitudes[idx] += row.magnitude;
            by_source[row.source.index()][idx] += count;
        }

        Self {
            topic_id: topic_id.to_string(),
            as_of,
            dates,
            totals,
            by_source,
            magnitudes,
        }
    }

    /// Series from bare daily totals ending at `as_of`, with no source attribution.
    pub fn from_totals(topic_id: &str, as_of: NaiveDate, totals: Vec<f64>) -> Self {
        let n = totals.len();
        let dates = (0..n)
            .map(|i| as_of - Duration::days((n - 1 - i) as i64))
            .collect();
        Self {
            topic_id: topic_id.to_string(),
            as_of,
            dates,
            by_source: std::array::from_fn(|_| vec![0.0; n]),
            magnitudes: vec![0.0; n],
            totals,
        }
    }

    /// Attach per-source columns. Panics in debug builds if lengths disagree.
    pub fn with_source(mut self, source: Source, counts: Vec<f64>) -> Self {
        debug_assert_eq!(counts.len(), self.totals.len());
        self.by_source[source.index()] = counts;
        self
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Per-source columns restricted to the first `end` days.
    pub fn source_prefix(&self, end: usize) -> Vec<&[f64]> {
        self.by_source.iter().map(|col| &col[..end]).collect()
    }
}
