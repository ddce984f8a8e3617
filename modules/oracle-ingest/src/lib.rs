pub mod clients;
pub mod error;
pub mod etl;
pub mod mock;
pub mod normalizer;
pub mod raw;
pub mod topic_mapper;

pub use clients::{ArxivClient, FundingClient, GithubClient, JobsFeedClient, SignalClient};
pub use error::{IngestError, Result};
pub use etl::{EtlReport, EtlRunner, SourceOutcome};
pub use mock::MockGenerator;
pub use normalizer::Normalizer;
pub use raw::{RawFundingRound, RawJob, RawPaper, RawRepo, RawSignal};
pub use topic_mapper::{load_catalog, TopicMapper};
