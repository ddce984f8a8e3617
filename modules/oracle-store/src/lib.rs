pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use traits::{EventPage, SignalStore, SourceStatus, StoreStats};
