//! Search filter codes and their human-readable labels.
//!
//! Every mapping is total: a code without a known label is returned as-is.

/// Label for an experience level code ("1".."6").
pub fn experience_label(code: &str) -> &str {
    match code {
        "1" => "Internship",
        "2" => "Entry level",
        "3" => "Associate",
        "4" => "Mid-Senior level",
        "5" => "Director",
        "6" => "Executive",
        other => other,
    }
}

/// Label for a job type code ("F", "C", ...).
pub fn job_type_label(code: &str) -> &str {
    match code {
        "F" => "Full-time",
        "C" => "Contract",
        "P" => "Part-time",
        "T" => "Temporary",
        "I" => "Internship",
        "V" => "Volunteer",
        "O" => "Other",
        other => other,
    }
}

/// Label for a workplace type code ("1".."3").
pub fn remote_label(code: &str) -> &str {
    match code {
        "1" => "On-site",
        "2" => "Remote",
        "3" => "Hybrid",
        other => other,
    }
}

pub fn describe_experience(codes: &[String]) -> Option<Vec<String>> {
    describe(codes, experience_label)
}

pub fn describe_job_types(codes: &[String]) -> Option<Vec<String>> {
    describe(codes, job_type_label)
}

pub fn describe_remote(codes: &[String]) -> Option<Vec<String>> {
    describe(codes, remote_label)
}

/// Describes a "posted within" window given in seconds.
///
/// `None` and zero both mean no window was requested.
pub fn describe_time_posted(seconds: Option<u64>) -> Option<String> {
    let description = match seconds? {
        0 => return None,
        86_400 => "Last 24 hours".to_string(),
        604_800 => "Last week".to_string(),
        2_592_000 => "Last month".to_string(),
        7_776_000 => "Last 3 months".to_string(),
        n => format!("Last {} seconds", n),
    };
    Some(description)
}

/// Comma-joined job type labels, stamped on each job as its contract nature.
pub fn job_nature(job_types: &[String]) -> String {
    describe_job_types(job_types)
        .map(|labels| labels.join(", "))
        .unwrap_or_default()
}

fn describe(codes: &[String], label: fn(&str) -> &str) -> Option<Vec<String>> {
    if codes.is_empty() {
        return None;
    }
    Some(codes.iter().map(|c| label(c).to_string()).collect())
}
