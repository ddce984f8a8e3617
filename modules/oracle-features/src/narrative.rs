//! Plain-text topic narratives and the markdown digest.

use chrono::NaiveDate;

use oracle_common::{Source, TopicForecast};

use crate::engine::TopicSnapshot;
use crate::ranking::{ranking_alerts, ranking_insights, RankedTopic};

/// Momentum tier by surge score (0..1).
pub fn momentum_tier(score: f64) -> &'static str {
    if score >= 0.8 {
        "exceptional momentum"
    } else if score >= 0.6 {
        "strong growth potential"
    } else if score >= 0.4 {
        "moderate interest"
    } else {
        "limited momentum"
    }
}

/// A short summary of one topic.
pub fn topic_narrative(
    name: &str,
    snapshot: &TopicSnapshot,
    forecast: Option<&TopicForecast>,
) -> String {
    let mut parts = vec![format!(
        "{} shows {} with a {:.1}% surge score.",
        name,
        momentum_tier(snapshot.surge.score),
        snapshot.surge.score_pct
    )];

    let growth = snapshot.surge.breakdown.velocity_growth;
    if snapshot.features.velocity > 0.0 {
        parts.push(format!(
            "Velocity is {:.1} mentions/day, {:+.1}% against the prior half-window.",
            snapshot.features.velocity,
            growth * 100.0
        ));
    }

    let active = snapshot.contributing_sources();
    if snapshot.features.convergence > 0.5 {
        let names: Vec<&str> = active.iter().map(Source::as_str).collect();
        parts.push(format!(
            "Multiple data sources ({}/{}: {}) indicate broad interest.",
            active.len(),
            Source::ALL.len(),
            names.join(", ")
        ));
    }

    if let Some(f) = forecast.filter(|f| f.growth_rate != 0.0) {
        parts.push(format!(
            "Forecast: {:+.1}% expected growth over the next {} days ({:.0}% confidence).",
            f.growth_rate * 100.0,
            f.horizon_days,
            f.confidence_score * 100.0
        ));
    }

    parts.join(" ")
}

/// Markdown digest of the top `limit` entries of a sorted leaderboard.
/// `narrative_for` maps a topic id to its narrative text.
pub fn digest_markdown<'a, F>(
    date: NaiveDate,
    ranked: &[RankedTopic],
    limit: usize,
    narrative_for: F,
) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut lines = vec![format!("# Oracle Weekly Digest - {date}"), String::new()];

    let top = &ranked[..ranked.len().min(limit)];
    if top.is_empty() {
        lines.push("No topics ranked yet.".to_string());
        return lines.join("\n");
    }

    lines.push("## Top Trending Topics".to_string());
    lines.push(String::new());
    for (i, r) in top.iter().enumerate() {
        lines.push(format!(
            "### {}. {} - Surge {:.1}%",
            i + 1,
            r.name,
            r.surge.score_pct
        ));
        lines.push(String::new());
        lines.push(
            narrative_for(&r.topic_id)
                .unwrap_or("(no narrative available)")
                .to_string(),
        );
        lines.push(String::new());
    }

    if let Some(insights) = ranking_insights(top) {
        lines.push("## Key Insights".to_string());
        lines.push(String::new());
        if insights.high_surge_count > 0 {
            lines.push(format!(
                "- {} topics show exceptional momentum (surge > 0.8)",
                insights.high_surge_count
            ));
        }
        if insights.high_confidence_count > 0 {
            lines.push(format!(
                "- {} forecasts have high confidence (> 0.7)",
                insights.high_confidence_count
            ));
        }
        if let Some(name) = insights.top_topic {
            lines.push(format!("- **{name}** leads the rankings"));
        }
        lines.push(String::new());
    }

    let alerts = ranking_alerts(top);
    if !alerts.is_empty() {
        lines.push("## Alerts".to_string());
        lines.push(String::new());
        for alert in alerts {
            lines.push(format!("- {}", alert.message));
        }
    }

    lines.join("\n")
}
