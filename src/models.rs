use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::filters;

pub const DEFAULT_DATA_COVERAGE: &str = "Minimal - No duplicate fields";
pub const DEFAULT_EXPORT_VERSION: &str = "incremental_v8.0";

/// Current local time as an ISO-8601 string.
pub fn now_timestamp() -> String {
    chrono::Local::now().to_rfc3339()
}

/// Reads an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The whole persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedStore {
    pub metadata: StoreMetadata,
    pub search_history: Vec<SearchRecord>,
    pub jobs: Vec<JobRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub creation_date: String,
    pub last_updated: String,
    pub total_searches: usize,
    pub total_jobs: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data_coverage: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub export_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_info: Option<MergeInfo>,
}

/// Provenance written by a file merge: counts of both inputs before merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeInfo {
    pub merged_at: String,
    pub old_file_searches: usize,
    pub old_file_jobs: usize,
    pub new_file_searches: usize,
    pub new_file_jobs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub keywords: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub limit_requested: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub jobs_found: usize,
    pub search_timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub search_filters: SearchFilters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub experience_levels: FilterGroup,
    pub job_types: FilterGroup,
    pub remote_work: FilterGroup,
    pub time_posted: TimePosted,
    pub distance_miles: Option<u32>,
}

/// Raw filter codes next to their labels. Both are null when the filter was not applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterGroup {
    pub codes: Option<Vec<String>>,
    pub description: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimePosted {
    #[serde(alias = "codes")]
    pub seconds: Option<u64>,
    pub description: Option<String>,
}

/// One job posting. Only `id` is required; unknown fields are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "linkedin_postJob_url", default, deserialize_with = "null_as_default")]
    pub posting_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub listed_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub apply_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub workplace_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom_logo_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub job_state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub work_remote_allowed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub job_nature: String, // comma-joined job type labels of the search that found it
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }
}

/// Filters applied to one search. Empty lists and `None` mean "not applied".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub experience: Vec<String>,
    pub job_type: Vec<String>,
    pub remote: Vec<String>,
    pub listed_at: Option<u64>, // seconds
    pub distance: Option<u32>,  // miles
}

/// Parameters of one search invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub keywords: String,
    pub location: String,
    pub limit: u32,
    pub filters: FilterSet,
}

impl SearchParams {
    pub fn new(keywords: impl Into<String>, location: impl Into<String>, limit: u32) -> Self {
        Self {
            keywords: keywords.into(),
            location: location.into(),
            limit,
            filters: FilterSet::default(),
        }
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }
}

impl SearchFilters {
    pub fn from_filter_set(filters: &FilterSet) -> Self {
        Self {
            experience_levels: FilterGroup {
                codes: non_empty(&filters.experience),
                description: filters::describe_experience(&filters.experience),
            },
            job_types: FilterGroup {
                codes: non_empty(&filters.job_type),
                description: filters::describe_job_types(&filters.job_type),
            },
            remote_work: FilterGroup {
                codes: non_empty(&filters.remote),
                description: filters::describe_remote(&filters.remote),
            },
            time_posted: TimePosted {
                seconds: filters.listed_at.filter(|s| *s > 0),
                description: filters::describe_time_posted(filters.listed_at),
            },
            distance_miles: filters.distance,
        }
    }
}

impl SearchRecord {
    pub fn from_params(params: &SearchParams, jobs_found: usize, timestamp: String) -> Self {
        Self {
            keywords: params.keywords.clone(),
            location: params.location.clone(),
            limit_requested: params.limit,
            jobs_found,
            search_timestamp: timestamp,
            search_filters: SearchFilters::from_filter_set(&params.filters),
        }
    }
}

/// Which record survives when an incoming job has an identifier already in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    #[default]
    FirstWriteWins,
    LastWriteWins,
}

/// Result of merging a batch of jobs into a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    pub added: usize,
    pub duplicates: usize,
    pub updated: usize,
}

impl ConsolidatedStore {
    pub fn new(data_coverage: impl Into<String>, export_version: impl Into<String>) -> Self {
        let now = now_timestamp();
        Self {
            metadata: StoreMetadata {
                creation_date: now.clone(),
                last_updated: now,
                total_searches: 0,
                total_jobs: 0,
                data_coverage: data_coverage.into(),
                export_version: export_version.into(),
                merge_info: None,
            },
            search_history: Vec::new(),
            jobs: Vec::new(),
        }
    }

    /// Re-derives both counters from the collections. Returns true if either changed.
    pub fn recompute_totals(&mut self) -> bool {
        let searches = self.search_history.len();
        let jobs = self.jobs.len();
        let changed = self.metadata.total_searches != searches || self.metadata.total_jobs != jobs;
        self.metadata.total_searches = searches;
        self.metadata.total_jobs = jobs;
        changed
    }

    pub fn contains_job(&self, id: &str) -> bool {
        self.jobs.iter().any(|j| j.id == id)
    }

    pub fn get_job(&self, id: &str) -> Option<&JobRecord> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Merges `incoming` into `jobs` by identifier. New identifiers keep arrival order.
    ///
    /// Duplicates are counted whatever the policy; `updated` only counts
    /// replacements whose content actually differed.
    pub fn merge_jobs(&mut self, incoming: Vec<JobRecord>, policy: MergePolicy) -> MergeCounts {
        let mut index: HashMap<String, usize> = self
            .jobs
            .iter()
            .enumerate()
            .map(|(pos, job)| (job.id.clone(), pos))
            .collect();
        let mut counts = MergeCounts::default();

        for job in incoming {
            match index.get(&job.id) {
                Some(&pos) => {
                    counts.duplicates += 1;
                    if policy == MergePolicy::LastWriteWins && self.jobs[pos] != job {
                        self.jobs[pos] = job;
                        counts.updated += 1;
                    }
                }
                None => {
                    index.insert(job.id.clone(), self.jobs.len());
                    self.jobs.push(job);
                    counts.added += 1;
                }
            }
        }

        counts
    }
}

fn non_empty(codes: &[String]) -> Option<Vec<String>> {
    if codes.is_empty() {
        None
    } else {
        Some(codes.to_vec())
    }
}
