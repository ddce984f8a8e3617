//! Leaderboard ordering, summary insights and alerts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use oracle_common::SurgeScore;

/// Default `score` threshold for emerging topics.
pub const EMERGING_THRESHOLD: f64 = 0.6;
pub const HIGH_SURGE: f64 = 0.8;
pub const LOW_CONFIDENCE: f64 = 0.4;
pub const HIGH_CONFIDENCE: f64 = 0.7;
pub const HIGH_GROWTH: f64 = 1.0;

/// One topic as seen by the ranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTopic {
    pub topic_id: String,
    pub name: String,
    pub surge: SurgeScore,
    pub confidence: Option<f64>,
    pub growth_rate: Option<f64>,
    pub model_type: Option<String>,
}

/// Order by `score_pct` descending, ties by `topic_id` ascending.
pub fn sort_leaderboard(entries: &mut [RankedTopic]) {
    entries.sort_by(|a, b| {
        b.surge
            .score_pct
            .total_cmp(&a.surge.score_pct)
            .then_with(|| a.topic_id.cmp(&b.topic_id))
    });
}

/// Ranked entries whose surge score reaches `threshold` (0..1).
pub fn emerging_topics(ranked: &[RankedTopic], threshold: f64) -> Vec<RankedTopic> {
    ranked
        .iter()
        .filter(|r| r.surge.score >= threshold)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingInsights {
    pub total_ranked: usize,
    pub avg_surge_score: f64,
    pub max_surge_score: f64,
    pub min_surge_score: f64,
    pub avg_confidence: f64,
    pub high_confidence_count: usize,
    pub high_surge_count: usize,
    pub top_topic: Option<String>,
    pub model_distribution: BTreeMap<String, usize>,
}

/// Summary statistics over an already sorted leaderboard. `None` when empty.
pub fn ranking_insights(ranked: &[RankedTopic]) -> Option<RankingInsights> {
    let top = ranked.first()?;
    let scores: Vec<f64> = ranked.iter().map(|r| r.surge.score).collect();
    let confidences: Vec<f64> = ranked.iter().map(|r| r.confidence.unwrap_or(0.0)).collect();

    let mut model_distribution = BTreeMap::new();
    for r in ranked {
        let model = r.model_type.clone().unwrap_or_else(|| "none".to_string());
        *model_distribution.entry(model).or_insert(0) += 1;
    }

    Some(RankingInsights {
        total_ranked: ranked.len(),
        avg_surge_score: scores.iter().sum::<f64>() / scores.len() as f64,
        max_surge_score: scores.iter().copied().fold(f64::MIN, f64::max),
        min_surge_score: scores.iter().copied().fold(f64::MAX, f64::min),
        avg_confidence: confidences.iter().sum::<f64>() / confidences.len() as f64,
        high_confidence_count: confidences.iter().filter(|c| **c > HIGH_CONFIDENCE).count(),
        high_surge_count: scores.iter().filter(|s| **s > HIGH_SURGE).count(),
        top_topic: Some(top.name.clone()),
        model_distribution,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighSurge,
    LowConfidence,
    HighGrowth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: Severity,
    pub topic_id: String,
    pub message: String,
    pub value: f64,
}

/// Alerts raised by the top-ranked topic.
pub fn ranking_alerts(ranked: &[RankedTopic]) -> Vec<RankingAlert> {
    let Some(top) = ranked.first() else {
        return Vec::new();
    };
    let mut alerts = Vec::new();

    if top.surge.score > HIGH_SURGE {
        alerts.push(RankingAlert {
            kind: AlertKind::HighSurge,
            severity: Severity::High,
            topic_id: top.topic_id.clone(),
            message: format!(
                "Topic '{}' has very high surge score: {:.2}",
                top.name, top.surge.score
            ),
            value: top.surge.score,
        });
    }

    if let Some(confidence) = top.confidence.filter(|c| *c < LOW_CONFIDENCE) {
        alerts.push(RankingAlert {
            kind: AlertKind::LowConfidence,
            severity: Severity::Medium,
            topic_id: top.topic_id.clone(),
            message: format!(
                "Topic '{}' has low forecast confidence: {:.2}",
                top.name, confidence
            ),
            value: confidence,
        });
    }

    if let Some(growth) = top.growth_rate.filter(|g| *g > HIGH_GROWTH) {
        alerts.push(RankingAlert {
            kind: AlertKind::HighGrowth,
            severity: Severity::High,
            topic_id: top.topic_id.clone(),
            message: format!(
                "Topic '{}' predicted to grow by {:.1}%",
                top.name,
                growth * 100.0
            ),
            value: growth,
        });
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surge::round1;
    use oracle_common::SurgeBreakdown;

    fn entry(id: &str, pct: f64) -> RankedTopic {
        RankedTopic {
            topic_id: id.to_string(),
            name: id.to_uppercase(),
            surge: SurgeScore {
                topic_id: id.to_string(),
                score: pct / 100.0,
                score_pct: round1(pct),
                breakdown: SurgeBreakdown::default(),
            },
            confidence: Some(0.8),
            growth_rate: Some(0.2),
            model_type: Some("linear_trend".to_string()),
        }
    }

    #[test]
    fn ties_break_on_topic_id() {
        let mut board = vec![entry("a", 72.9), entry("c", 85.0), entry("b", 85.0)];
        sort_leaderboard(&mut board);
        let order: Vec<(&str, f64)> = board
            .iter()
            .map(|e| (e.topic_id.as_str(), e.surge.score_pct))
            .collect();
        assert_eq!(order, vec![("b", 85.0), ("c", 85.0), ("a", 72.9)]);
    }

    #[test]
    fn emerging_filters_on_score() {
        let board = vec![entry("hot", 75.0), entry("warm", 60.0), entry("cold", 40.0)];
        let emerging = emerging_topics(&board, EMERGING_THRESHOLD);
        let ids: Vec<&str> = emerging.iter().map(|e| e.topic_id.as_str()).collect();
        assert_eq!(ids, vec!["hot", "warm"]);
    }

    #[test]
    fn insights_summarize_the_board() {
        let mut board = vec![entry("x", 90.0), entry("y", 50.0)];
        board[1].confidence = None;
        board[1].model_type = None;
        let insights = ranking_insights(&board).unwrap();

        assert_eq!(insights.total_ranked, 2);
        assert!((insights.avg_surge_score - 0.7).abs() < 1e-12);
        assert_eq!(insights.max_surge_score, 0.9);
        assert_eq!(insights.min_surge_score, 0.5);
        assert_eq!(insights.high_confidence_count, 1);
        assert_eq!(insights.high_surge_count, 1);
        assert_eq!(insights.top_topic.as_deref(), Some("X"));
        assert_eq!(insights.model_distribution.get("none"), Some(&1));
        assert!(ranking_insights(&[]).is_none());
    }

    #[test]
    fn alerts_fire_for_top_topic_only() {
        let mut top = entry("top", 85.0);
        top.confidence = Some(0.3);
        top.growth_rate = Some(1.5);
        let board = vec![top, entry("next", 95.0)];

        let kinds: Vec<AlertKind> = ranking_alerts(&board).iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![AlertKind::HighSurge, AlertKind::LowConfidence, AlertKind::HighGrowth]
        );
    }

    #[test]
    fn quiet_board_raises_no_alerts() {
        assert!(ranking_alerts(&[entry("calm", 55.0)]).is_empty());
        assert!(ranking_alerts(&[]).is_empty());
    }
}
