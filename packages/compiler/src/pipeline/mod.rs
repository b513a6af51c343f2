//! Pipeline Engine (C11): the stage DAG, fingerprinting, session memo, and
//! cache I/O that drive every other component (§4.1).

pub mod cache;
pub mod session;
pub mod stage;

pub use cache::{CacheBlob, CacheLock, CacheMeta, InMemoryCache, PersistentCache};
pub use session::{Artifact, AotPlan, PipelineOptions, Session, StageRecord, StageSource, UsageReport};
pub use stage::StageKey;
