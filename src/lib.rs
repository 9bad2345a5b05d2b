//! Consolidated store for job-search results.
//!
//! Each search appends a record to the store's history and merges the jobs it
//! found into a single de-duplicated collection, persisted as one JSON file.

pub mod config;
pub mod error;
pub mod filters;
pub mod models;
pub mod provider;
pub mod store;
pub mod summary;

pub use config::{load_config, Config, ConfigError, CorruptFilePolicy};
pub use error::StoreError;
pub use models::{
    ConsolidatedStore, FilterSet, JobRecord, MergePolicy, SearchParams, SearchRecord,
};
pub use provider::{extract_job, run_search, FileProvider, JobProvider};
pub use store::{merge_stores, ConsolidationStore, LoadState, MergeOutcome, RecordOutcome};
pub use summary::{unique_keywords, Summary};
