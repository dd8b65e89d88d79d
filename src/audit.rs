//! Audit assembly.
//!
//! Builds the `AuditRecord` attached to every `run_queries` and `final_answer`
//! response: which SQL ran, what was shared with the LLM, and under which flags.
//! Report persistence itself is delegated to an external collaborator.

use chrono::{DateTime, Utc};

use crate::types::{AnalysisType, AuditRecord, PlannedQuery, TimePeriod};

/// Builds the `sharedWithAI` tag list for the given flags: `schema` and
/// `aggregates_only` are always present; `PII_redacted` and
/// `safe_mode_no_raw_rows` are conditional on the matching flag.
pub fn shared_with_ai_tags(privacy_mode: bool, safe_mode: bool) -> Vec<String> {
    let mut tags = vec!["schema".to_string(), "aggregates_only".to_string()];
    if privacy_mode {
        tags.push("PII_redacted".to_string());
    }
    if safe_mode {
        tags.push("safe_mode_no_raw_rows".to_string());
    }
    tags
}

/// Assembles an `AuditRecord` for the queries actually validated and emitted (or,
/// for a `final_answer`, the queries whose results produced the summary).
#[allow(clippy::too_many_arguments)]
pub fn build_audit_record(
    dataset_id: Option<String>,
    dataset_name: String,
    analysis_type: Option<AnalysisType>,
    time_period: Option<TimePeriod>,
    ai_assist: bool,
    safe_mode: bool,
    privacy_mode: bool,
    executed_queries: Vec<PlannedQuery>,
    generated_at: DateTime<Utc>,
) -> AuditRecord {
    AuditRecord {
        dataset_id,
        dataset_name,
        analysis_type,
        time_period,
        ai_assist,
        safe_mode,
        privacy_mode,
        executed_queries,
        generated_at,
        report_id: None,
        shared_with_ai: shared_with_ai_tags(privacy_mode, safe_mode),
    }
}
