use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{JobRecord, SearchParams};
use crate::store::{ConsolidationStore, RecordOutcome};

const JOB_VIEW_URL: &str = "https://www.linkedin.com/jobs/view";

// --- Provider trait ---

/// A source of raw job postings for a search.
pub trait JobProvider {
    fn search(&self, params: &SearchParams) -> Result<Vec<Value>>;
    fn name(&self) -> &str;
}

/// Runs one search against `provider` and records its results in `store`.
pub fn run_search(
    provider: &dyn JobProvider,
    store: &ConsolidationStore,
    params: &SearchParams,
) -> Result<RecordOutcome, StoreError> {
    info!(
        provider = provider.name(),
        keywords = %params.keywords,
        location = %params.location,
        limit = params.limit,
        "Running search"
    );

    let payloads = provider
        .search(params)
        .map_err(|e| StoreError::Provider(format!("{}: {:#}", provider.name(), e)))?;

    let mut jobs = Vec::with_capacity(payloads.len());
    for (index, payload) in payloads.iter().enumerate() {
        match extract_job(payload) {
            Some(job) => jobs.push(job),
            None => warn!(index, "Skipping job payload with no usable record"),
        }
    }
    debug!(payloads = payloads.len(), jobs = jobs.len(), "Extracted job records");

    store.record_search(jobs, params)
}

// --- Payload extraction ---

/// Normalizes one raw payload into a [`JobRecord`].
///
/// Accepts records that already carry an `id` as well as raw postings keyed by
/// `entityUrn`. Fields that are missing upstream stay empty. Returns `None`
/// only when no identifier can be derived.
pub fn extract_job(raw: &Value) -> Option<JobRecord> {
    let obj = raw.as_object()?;

    if let Some(id) = obj.get("id").and_then(id_string) {
        if id.is_empty() {
            return None;
        }
        let mut flat = raw.clone();
        flat["id"] = Value::String(id.clone());
        return match serde_json::from_value::<JobRecord>(flat) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!(id = %id, error = %e, "Skipping malformed job payload");
                None
            }
        };
    }

    let id = obj
        .get("entityUrn")
        .and_then(Value::as_str)
        .and_then(|urn| urn.rsplit(':').next())
        .map(str::trim)
        .filter(|id| !id.is_empty())?
        .to_string();

    let company = obj
        .get("companyDetails")
        .and_then(Value::as_object)
        .and_then(|details| {
            details
                .values()
                .find_map(|v| v.get("companyResolutionResult"))
        });

    Some(JobRecord {
        posting_url: format!("{}/{}/", JOB_VIEW_URL, id),
        title: str_field(raw, &["title"]),
        company: company.map(|c| str_field(c, &["name"])).unwrap_or_default(),
        company_url: company.map(|c| str_field(c, &["url"])).unwrap_or_default(),
        location: str_field(raw, &["formattedLocation"]),
        description: str_field(raw, &["description", "text"]),
        listed_at: obj
            .get("listedAt")
            .and_then(Value::as_i64)
            .map(format_listed_at)
            .unwrap_or_default(),
        apply_url: offsite_apply_url(raw),
        workplace_type: workplace_type(raw),
        custom_logo_url: company.map(logo_url).unwrap_or_default(),
        job_state: str_field(raw, &["jobState"]),
        work_remote_allowed: obj
            .get("workRemoteAllowed")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        id,
        ..Default::default()
    })
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(value: &Value, path: &[&str]) -> String {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Epoch milliseconds as `YYYY-MM-DD HH:MM:SS` (UTC). Zero means unknown.
fn format_listed_at(millis: i64) -> String {
    if millis == 0 {
        return String::new();
    }
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn workplace_type(raw: &Value) -> String {
    raw.get("workplaceTypesResolutionResults")
        .and_then(Value::as_object)
        .and_then(|results| {
            results
                .values()
                .find_map(|v| v.get("localizedName").and_then(Value::as_str))
        })
        .unwrap_or_default()
        .to_string()
}

fn offsite_apply_url(raw: &Value) -> String {
    raw.get("applyMethod")
        .and_then(Value::as_object)
        .and_then(|methods| {
            methods
                .iter()
                .find(|(kind, _)| kind.ends_with("OffsiteApply"))
                .and_then(|(_, method)| method.get("companyApplyUrl"))
                .and_then(Value::as_str)
        })
        .unwrap_or_default()
        .to_string()
}

/// The 400x400 artifact of the company logo, if present.
fn logo_url(company: &Value) -> String {
    let Some(image) = company
        .get("logo")
        .and_then(|logo| logo.get("image"))
        .and_then(Value::as_object)
        .and_then(|image| image.values().next())
    else {
        return String::new();
    };

    let root = image.get("rootUrl").and_then(Value::as_str).unwrap_or_default();
    let segment = image
        .get("artifacts")
        .and_then(Value::as_array)
        .and_then(|artifacts| {
            artifacts.iter().find(|a| {
                a.get("width").and_then(Value::as_u64) == Some(400)
                    && a.get("height").and_then(Value::as_u64) == Some(400)
            })
        })
        .and_then(|a| a.get("fileIdentifyingUrlPathSegment"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    if root.is_empty() || segment.is_empty() {
        String::new()
    } else {
        format!("{}{}", root, segment)
    }
}

// --- File provider ---

/// Serves payloads previously saved to disk: either a JSON array of payloads
/// or a consolidated document, whose `jobs` array is used.
#[derive(Debug)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl JobProvider for FileProvider {
    fn search(&self, _params: &SearchParams) -> Result<Vec<Value>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read payload file: {}", self.path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", self.path.display()))?;

        match value {
            Value::Array(items) => Ok(items),
            Value::Object(mut obj) => match obj.remove("jobs") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(anyhow!(
                    "Expected an array of jobs or an object with a \"jobs\" array in {}",
                    self.path.display()
                )),
            },
            _ => Err(anyhow!("Expected an array of jobs in {}", self.path.display())),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
