//! Read-side statistics. Everything here is derived from the document on
//! demand and never written back.

use std::collections::{BTreeSet, HashMap};

use crate::models::ConsolidatedStore;

const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub creation_date: String,
    pub last_updated: String,
    pub export_version: String,
    pub total_searches: usize,
    pub total_jobs: usize,
    /// Sum of `jobs_found` over the whole history.
    pub jobs_found: usize,
    pub duplicates_avoided: usize,
    /// Unique jobs per job found, in percent. `None` before anything was found.
    pub uniqueness_rate: Option<f64>,
    pub top_companies: Vec<(String, usize)>,
    pub top_keywords: Vec<(String, usize)>,
    pub top_locations: Vec<(String, usize)>,
}

impl Summary {
    pub fn from_store(store: &ConsolidatedStore) -> Self {
        let jobs_found: usize = store.search_history.iter().map(|s| s.jobs_found).sum();
        let total_jobs = store.jobs.len();

        let uniqueness_rate = if jobs_found > 0 {
            Some(total_jobs as f64 / jobs_found as f64 * 100.0)
        } else {
            None
        };

        Self {
            creation_date: store.metadata.creation_date.clone(),
            last_updated: store.metadata.last_updated.clone(),
            export_version: store.metadata.export_version.clone(),
            total_searches: store.search_history.len(),
            total_jobs,
            jobs_found,
            duplicates_avoided: jobs_found.saturating_sub(total_jobs),
            uniqueness_rate,
            top_companies: top_counts(store.jobs.iter().map(|j| j.company.as_str()), TOP_N),
            top_keywords: top_counts(store.search_history.iter().map(|s| s.keywords.as_str()), TOP_N),
            top_locations: top_counts(store.search_history.iter().map(|s| s.location.as_str()), TOP_N),
        }
    }

    pub fn average_jobs_per_search(&self) -> Option<f64> {
        if self.total_searches == 0 {
            None
        } else {
            Some(self.jobs_found as f64 / self.total_searches as f64)
        }
    }
}

/// Sorted, de-duplicated, non-empty keywords from the search history.
pub fn unique_keywords(store: &ConsolidatedStore) -> Vec<String> {
    store
        .search_history
        .iter()
        .map(|s| s.keywords.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Most frequent non-empty values, ties broken alphabetically.
fn top_counts<'a>(values: impl Iterator<Item = &'a str>, limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.map(str::trim).filter(|v| !v.is_empty()) {
        *counts.entry(value).or_default() += 1;
    }

    let mut sorted: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(limit);
    sorted
}
