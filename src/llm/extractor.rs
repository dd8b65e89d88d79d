//! LLM intent extractor.
//!
//! Assembles a single prompt describing the dataset catalog and the user's
//! message, calls the injected `LlmClient`, and parses the JSON-mode response
//! into the fixed `{analysis_type, time_period, metric, group_by, notes}` fields.

use serde::Deserialize;

use crate::llm::{LlmClient, Message};
use crate::types::{AnalysisType, DatasetCatalog, TimePeriod};

/// The parsed result of one extraction call. `analysis_type` is `None` when the
/// model could not classify the request or the response failed to parse — the
/// orchestrator treats that the same way, by falling back to a clarification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedIntent {
    pub analysis_type: Option<AnalysisType>,
    pub time_period: Option<TimePeriod>,
    pub metric: Option<String>,
    pub group_by: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    #[serde(default)]
    analysis_type: Option<String>,
    #[serde(default)]
    time_period: Option<String>,
    #[serde(default)]
    metric: Option<String>,
    #[serde(default)]
    group_by: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

fn system_prompt() -> String {
    let mut prompt = String::from(
        "You classify a user's analytics question into exactly one of five analysis \
         types and return a single JSON object with these keys: \
         analysis_type, time_period, metric, group_by, notes.\n\n\
         The five analysis types, one example question each:\n",
    );
    for (analysis_type, example) in [
        (AnalysisType::RowCount, "\"how many rows are in this dataset?\""),
        (AnalysisType::TopCategories, "\"what are the top regions by volume?\""),
        (AnalysisType::Trend, "\"how has revenue trended month over month?\""),
        (AnalysisType::Outliers, "\"are there any unusual transaction amounts?\""),
        (AnalysisType::DataQuality, "\"are there missing values or duplicates?\""),
    ] {
        prompt.push_str(&format!("- {}: {}\n", analysis_type.as_token(), example));
    }
    prompt.push_str(
        "\nRespond with exactly one JSON object. time_period, metric, and group_by are \
         null when not implied by the question. Keep notes short.",
    );
    prompt
}

fn catalog_summary(catalog: &DatasetCatalog) -> String {
    let columns: Vec<String> = catalog
        .columns
        .iter()
        .map(|c| format!("{} ({})", c.name, c.type_name))
        .collect();
    format!(
        "Dataset has {} rows. Columns: {}. Date columns: {}. Numeric columns: {}.",
        catalog.row_count,
        columns.join(", "),
        catalog.detected_date_columns.join(", "),
        catalog.detected_numeric_columns.join(", "),
    )
}

fn user_message(question: &str, catalog: &DatasetCatalog, safe_mode: bool, privacy_mode: bool) -> String {
    let mut message = format!("Question: {question}\n\n{}", catalog_summary(catalog));
    if privacy_mode {
        message.push_str("\n\nPrivacy mode is on: PII columns have already been redacted from this summary.");
    }
    if safe_mode {
        message.push_str("\n\nSafe mode is on: only aggregated results will ever be returned, never raw rows.");
    }
    message
}

/// Runs the extraction request against `client`, using the (already-redacted)
/// `catalog` the orchestrator passes in. Returns a default (all-`None`)
/// `ExtractedIntent` on any parse failure or missing `analysis_type`; the caller
/// decides how to recover, typically by falling back to a one-shot clarification.
pub async fn extract_intent(
    client: &dyn LlmClient,
    question: &str,
    catalog: &DatasetCatalog,
    safe_mode: bool,
    privacy_mode: bool,
) -> ExtractedIntent {
    let messages = vec![
        Message::system(system_prompt()),
        Message::user(user_message(question, catalog, safe_mode, privacy_mode)),
    ];

    let raw = match client.complete_json(&messages).await {
        Ok(text) => text,
        Err(_) => return ExtractedIntent::default(),
    };

    let parsed: RawIntent = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(_) => return ExtractedIntent::default(),
    };

    let analysis_type = parsed
        .analysis_type
        .as_deref()
        .and_then(AnalysisType::from_token);

    ExtractedIntent {
        analysis_type,
        time_period: parsed.time_period.as_deref().and_then(TimePeriod::from_token),
        metric: parsed.metric,
        group_by: parsed.group_by,
        notes: parsed.notes,
    }
}
