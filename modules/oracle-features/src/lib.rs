pub mod cache;
pub mod engine;
pub mod forecast;
pub mod narrative;
pub mod ranking;
pub mod series;
pub mod surge;
pub mod timeseries;

pub use cache::FeatureCache;
pub use engine::{FeatureEngine, TopicSnapshot, TrendPoint};
pub use forecast::{Forecaster, ModelType};
pub use ranking::{RankedTopic, RankingAlert, RankingInsights};
pub use series::TopicSeries;
pub use surge::{surge_score, uncertainty_penalty};
