//! End-to-end scenarios and cross-cutting properties for the orchestration engine.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chat_orchestrator::config::EngineConfig;
use chat_orchestrator::llm::MockLlmClient;
use chat_orchestrator::privacy::redact_catalog;
use chat_orchestrator::router::route;
use chat_orchestrator::safety::validate_sql;
use chat_orchestrator::state::ConversationStateStore;
use chat_orchestrator::types::{
    AnalysisType, ColumnInfo, ColumnStats, DatasetCatalog, Intent, PiiColumn, QueryResultSet,
    TableData,
};
use chat_orchestrator::{CatalogProvider, ChatRequest, ChatResponse, Orchestrator, ReportStore, RequestFlags};

struct FixedCatalog(DatasetCatalog);

#[async_trait]
impl CatalogProvider for FixedCatalog {
    async fn catalog_for(&self, _dataset_id: &str) -> Option<DatasetCatalog> {
        Some(self.0.clone())
    }
}

struct NullReports;

#[async_trait]
impl ReportStore for NullReports {
    async fn save_report(
        &self,
        _dataset_id: &str,
        _dataset_name: &str,
        _conversation_id: &str,
        _original_question: &str,
        _final_answer: &str,
    ) -> chat_orchestrator::Result<Option<String>> {
        Ok(Some("report-xyz".to_string()))
    }
}

fn wide_catalog() -> DatasetCatalog {
    let mut basic_stats = HashMap::new();
    basic_stats.insert(
        "region".to_string(),
        ColumnStats {
            min: None,
            max: None,
            avg: None,
            null_pct: 0.0,
            approx_distinct: 5,
            samples: vec![],
        },
    );

    DatasetCatalog {
        columns: vec![
            ColumnInfo { name: "region".to_string(), type_name: "TEXT".to_string() },
            ColumnInfo { name: "created_at".to_string(), type_name: "DATE".to_string() },
            ColumnInfo { name: "amount".to_string(), type_name: "NUMERIC".to_string() },
        ],
        basic_stats,
        detected_date_columns: vec!["created_at".to_string()],
        detected_numeric_columns: vec!["amount".to_string()],
        pii_columns: vec![],
        row_count: 2000,
    }
}

fn request(conversation_id: &str, dataset_id: &str) -> ChatRequest {
    ChatRequest {
        dataset_id: dataset_id.to_string(),
        dataset_name: "Sales".to_string(),
        conversation_id: conversation_id.to_string(),
        message: None,
        intent: None,
        value: None,
        results_context: None,
        flags: RequestFlags {
            privacy_mode: true,
            safe_mode: false,
            ai_assist: false,
        },
    }
}

fn orchestrator(catalog: DatasetCatalog) -> Orchestrator {
    Orchestrator::new(
        Arc::new(ConversationStateStore::new()),
        EngineConfig::default(),
        Arc::new(FixedCatalog(catalog)),
        Arc::new(NullReports),
        Arc::new(MockLlmClient::new()),
    )
}

struct CapturingLlmClient {
    captured: std::sync::Mutex<Vec<String>>,
}

impl CapturingLlmClient {
    fn new() -> Self {
        Self { captured: std::sync::Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl chat_orchestrator::llm::LlmClient for CapturingLlmClient {
    async fn complete_json(
        &self,
        messages: &[chat_orchestrator::llm::Message],
    ) -> chat_orchestrator::Result<String> {
        for m in messages {
            self.captured.lock().unwrap().push(m.content.clone());
        }
        Ok(r#"{"analysis_type": "row_count"}"#.to_string())
    }
}

// High-confidence row count with AI off, then a results-return follow-up.
#[tokio::test]
async fn high_confidence_row_count_then_final_answer() {
    let engine = orchestrator(wide_catalog());

    let mut turn1 = request("s1", "ds1");
    turn1.message = Some("row count".to_string());
    let response = engine.process(turn1).await.unwrap();

    let (queries, audit) = match response {
        ChatResponse::RunQueries { queries, audit, .. } => (queries, audit),
        other => panic!("expected run_queries, got {other:?}"),
    };
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].name, "row_count");
    assert_eq!(queries[0].sql, "SELECT COUNT(*) AS row_count FROM data LIMIT 1");
    assert_eq!(
        audit.shared_with_ai,
        vec!["schema", "aggregates_only", "PII_redacted"]
    );

    let mut turn2 = request("s1", "ds1");
    turn2.results_context = Some(QueryResultSet {
        results: vec![TableData {
            name: "row_count".to_string(),
            columns: vec!["row_count".to_string()],
            rows: vec![vec![serde_json::json!(12345)]],
        }],
    });
    let response = engine.process(turn2).await.unwrap();
    match response {
        ChatResponse::FinalAnswer { summary_markdown, .. } => {
            assert!(summary_markdown.contains("12,345"));
        }
        other => panic!("expected final_answer, got {other:?}"),
    }
}

// Low confidence with AI off: first turn asks, second turn gives guidance.
#[tokio::test]
async fn low_confidence_asks_once_then_guides() {
    let engine = orchestrator(wide_catalog());

    let mut turn1 = request("s2", "ds1");
    turn1.message = Some("show me something".to_string());
    let response = engine.process(turn1).await.unwrap();
    match response {
        ChatResponse::NeedsClarification { intent, choices, .. } => {
            assert_eq!(intent, Intent::SetAnalysisType);
            assert_eq!(
                choices,
                vec![
                    "Trends over time",
                    "Top categories",
                    "Find outliers",
                    "Count rows",
                    "Check data quality",
                ]
            );
        }
        other => panic!("expected needs_clarification, got {other:?}"),
    }

    let mut turn2 = request("s2", "ds1");
    turn2.message = Some("something else".to_string());
    let response = engine.process(turn2).await.unwrap();
    match response {
        ChatResponse::FinalAnswer { summary_markdown, .. } => {
            assert!(!summary_markdown.is_empty());
        }
        other => panic!("expected final_answer, got {other:?}"),
    }
}

// Structured intents set over two turns, then "continue" runs the monthly trend plan.
#[tokio::test]
async fn structured_intent_then_continue() {
    let engine = orchestrator(wide_catalog());

    let mut set_type = request("s3", "ds1");
    set_type.intent = Some(Intent::SetAnalysisType);
    set_type.value = Some(serde_json::json!("Trends over time"));
    engine.process(set_type).await.unwrap();

    let mut set_period = request("s3", "ds1");
    set_period.intent = Some(Intent::SetTimePeriod);
    set_period.value = Some(serde_json::json!("Last month"));
    engine.process(set_period).await.unwrap();

    let mut cont = request("s3", "ds1");
    cont.message = Some("continue".to_string());
    let response = engine.process(cont).await.unwrap();
    match response {
        ChatResponse::RunQueries { queries, .. } => {
            assert_eq!(queries.len(), 1);
            assert_eq!(queries[0].name, "monthly_trend");
            assert!(queries[0].sql.contains("ORDER BY month"));
            assert!(queries[0].sql.contains("LIMIT 200"));
        }
        other => panic!("expected run_queries, got {other:?}"),
    }
}

// Privacy redaction renames and drops a PII column from every view.
#[test]
fn privacy_redaction_renames_pii_column() {
    let catalog = DatasetCatalog {
        columns: vec![
            ColumnInfo { name: "customer_email".to_string(), type_name: "TEXT".to_string() },
            ColumnInfo { name: "amount".to_string(), type_name: "NUMERIC".to_string() },
        ],
        basic_stats: {
            let mut m = HashMap::new();
            m.insert(
                "customer_email".to_string(),
                ColumnStats { min: None, max: None, avg: None, null_pct: 0.0, approx_distinct: 900, samples: vec![] },
            );
            m
        },
        detected_date_columns: vec![],
        detected_numeric_columns: vec!["amount".to_string()],
        pii_columns: vec![PiiColumn { name: "customer_email".to_string(), kind: "email".to_string() }],
        row_count: 1000,
    };

    let redacted = redact_catalog(&catalog, true);

    assert!(redacted.columns.iter().any(|c| c.name == "PII_EMAIL_1"));
    assert!(!redacted.columns.iter().any(|c| c.name == "customer_email"));
    assert!(!redacted.basic_stats.contains_key("customer_email"));
    assert!(!redacted.basic_stats.contains_key("PII_EMAIL_1"));
    assert!(redacted.detected_numeric_columns.contains(&"amount".to_string()));
}

// Trend summary states the literal period-over-period percentage change.
#[test]
fn trend_period_over_period_literal() {
    let results = QueryResultSet {
        results: vec![TableData {
            name: "monthly_trend".to_string(),
            columns: vec!["month".to_string(), "count".to_string()],
            rows: vec![
                vec![serde_json::json!("2026-05"), serde_json::json!(100)],
                vec![serde_json::json!("2026-06"), serde_json::json!(150)],
            ],
        }],
    };
    let (markdown, _) =
        chat_orchestrator::summarizer::summarize(Some(AnalysisType::Trend), &results, false).unwrap();
    assert!(markdown.contains("50.0% increase"));
    assert!(markdown.contains("2026-06"));
}

// Safe mode rejects a hand-crafted raw-row query outright.
#[test]
fn safe_mode_rejects_raw_row_query() {
    let result = validate_sql("SELECT * FROM data LIMIT 10", true);
    assert!(result.is_err());

    let result = validate_sql("SELECT customer_id, amount FROM data LIMIT 10", true);
    assert!(result.is_err());

    let result = validate_sql("SELECT COUNT(*) FROM data LIMIT 10", true);
    assert!(result.is_ok());
}

// Each clarification type is emitted at most once per conversation.
#[tokio::test]
async fn clarification_emitted_at_most_once() {
    let engine = orchestrator(wide_catalog());
    let mut seen_needs_clarification = 0;
    let mut seen_final_answer = 0;

    for msg in ["vague one", "vague two", "vague three"] {
        let mut turn = request("conv-clarify", "ds1");
        turn.message = Some(msg.to_string());
        match engine.process(turn).await.unwrap() {
            ChatResponse::NeedsClarification { .. } => seen_needs_clarification += 1,
            ChatResponse::FinalAnswer { .. } => seen_final_answer += 1,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    assert_eq!(seen_needs_clarification, 1);
    assert_eq!(seen_final_answer, 2);
}

// A non-empty results context never yields a clarification response.
#[tokio::test]
async fn results_context_never_needs_clarification() {
    let engine = orchestrator(wide_catalog());
    let mut turn = request("conv-results", "ds1");
    turn.results_context = Some(QueryResultSet {
        results: vec![TableData {
            name: "row_count".to_string(),
            columns: vec!["row_count".to_string()],
            rows: vec![vec![serde_json::json!(7)]],
        }],
    });
    let response = engine.process(turn).await.unwrap();
    assert!(!matches!(response, ChatResponse::NeedsClarification { .. }));
}

// Every emitted SQL statement passes the validator under its producing request's flags.
#[tokio::test]
async fn every_emitted_sql_passes_validation() {
    let engine = orchestrator(wide_catalog());
    for (msg, safe_mode) in [
        ("monthly trend last month", false),
        ("outliers", true),
        ("data quality", false),
    ] {
        let mut turn = request("conv-validate", "ds1");
        turn.message = Some(msg.to_string());
        turn.flags.safe_mode = safe_mode;
        if let ChatResponse::RunQueries { queries, .. } = engine.process(turn).await.unwrap() {
            for q in queries {
                assert!(validate_sql(&q.sql, safe_mode).is_ok(), "failed: {}", q.sql);
            }
        }
    }
}

// privacy_mode == true never lets a PII column name surface in the redacted catalog.
#[test]
fn privacy_mode_hides_pii_column_name() {
    let catalog = DatasetCatalog {
        columns: vec![ColumnInfo { name: "ssn".to_string(), type_name: "TEXT".to_string() }],
        basic_stats: HashMap::new(),
        detected_date_columns: vec![],
        detected_numeric_columns: vec![],
        pii_columns: vec![PiiColumn { name: "ssn".to_string(), kind: "ssn".to_string() }],
        row_count: 10,
    };
    let redacted = redact_catalog(&catalog, true);
    let serialized = serde_json::to_string(&redacted).unwrap();
    assert!(!serialized.contains("\"ssn\""));
}

// The sharedWithAI audit tags exactly mirror the request's privacy/safe-mode flags.
#[tokio::test]
async fn shared_with_ai_tags_mirror_flags() {
    let engine = orchestrator(wide_catalog());
    let mut turn = request("conv-audit", "ds1");
    turn.message = Some("row count".to_string());
    turn.flags.privacy_mode = false;
    turn.flags.safe_mode = true;
    if let ChatResponse::RunQueries { audit, .. } = engine.process(turn).await.unwrap() {
        assert_eq!(audit.shared_with_ai, vec!["schema", "aggregates_only", "safe_mode_no_raw_rows"]);
    } else {
        panic!("expected run_queries");
    }
}

// Repeating the same structured intent submission is idempotent.
#[tokio::test]
async fn repeated_structured_intent_is_idempotent() {
    let engine = orchestrator(wide_catalog());
    let mut last_state = None;
    for _ in 0..2 {
        let mut turn = request("conv-idempotent", "ds1");
        turn.intent = Some(Intent::SetAnalysisType);
        turn.value = Some(serde_json::json!("Count rows"));
        if let ChatResponse::IntentAcknowledged { state, .. } = engine.process(turn).await.unwrap() {
            last_state = Some(state);
        }
    }
    assert_eq!(last_state.unwrap().analysis_type, Some(AnalysisType::RowCount));
}

// The deterministic router is a pure function of the message text.
#[test]
fn router_is_pure() {
    let a = route("show me the monthly trend");
    let b = route("show me the monthly trend");
    assert_eq!(a, b);
}

// Every generated LIMIT is bounded by 10000.
#[test]
fn limit_never_exceeds_bound() {
    assert!(validate_sql("SELECT * FROM data LIMIT 20000", false).is_err());
    let validated = validate_sql("SELECT COUNT(*) FROM data", false).unwrap();
    assert!(validated.0.contains("LIMIT 1000"));
}

// The 2-sigma outlier threshold is reflected in both the emitted SQL and the summary text.
#[tokio::test]
async fn outlier_threshold_is_two_sigma() {
    let engine = orchestrator(wide_catalog());
    let mut turn = request("conv-outliers", "ds1");
    turn.message = Some("find outliers".to_string());
    turn.flags.safe_mode = true;
    if let ChatResponse::RunQueries { queries, .. } = engine.process(turn).await.unwrap() {
        assert!(queries[0].sql.contains("2") , "expected stddev multiplier in SQL");
    }

    let results = QueryResultSet {
        results: vec![TableData {
            name: "outliers_amount".to_string(),
            columns: vec!["column_name".to_string(), "outlier_count".to_string(), "mean".to_string(), "stddev".to_string()],
            rows: vec![vec![
                serde_json::json!("amount"),
                serde_json::json!(2),
                serde_json::json!(10.0),
                serde_json::json!(3.0),
            ]],
        }],
    };
    let (markdown, _) =
        chat_orchestrator::summarizer::summarize(Some(AnalysisType::Outliers), &results, true).unwrap();
    assert!(markdown.contains('\u{03c3}') || markdown.contains("2 "));
}

// Under safe mode, no column sample value ever reaches the LLM-bound prompt.
#[tokio::test]
async fn safe_mode_excludes_samples_from_llm_payload() {
    let mut catalog = wide_catalog();
    catalog.basic_stats.insert(
        "region".to_string(),
        ColumnStats {
            min: None,
            max: None,
            avg: None,
            null_pct: 0.0,
            approx_distinct: 5,
            samples: vec![serde_json::json!("needle-sample-value")],
        },
    );

    let llm_client = Arc::new(CapturingLlmClient::new());
    let mut config = EngineConfig::default();
    config.ai_mode = true;
    config.openai_api_key = Some("test-key".to_string());

    let engine = Orchestrator::new(
        Arc::new(ConversationStateStore::new()),
        config,
        Arc::new(FixedCatalog(catalog)),
        Arc::new(NullReports),
        llm_client.clone(),
    );

    let mut turn = request("conv-safe-llm", "ds1");
    turn.message = Some("can you tell me something interesting".to_string());
    turn.flags.ai_assist = true;
    turn.flags.safe_mode = true;
    engine.process(turn).await.unwrap();

    let captured = llm_client.captured.lock().unwrap();
    assert!(!captured.is_empty());
    for message in captured.iter() {
        assert!(!message.contains("needle-sample-value"));
    }
}

// final_answer is only ever returned with a non-empty results context, or an
// explicit guidance/misconfiguration message — never on any other path.
#[tokio::test]
async fn final_answer_only_on_results_or_explicit_message() {
    let engine = orchestrator(wide_catalog());

    // No results context, first low-confidence message in a fresh conversation:
    // expect a clarification, never a final answer.
    let mut turn = request("conv-final-answer", "ds1");
    turn.message = Some("vague".to_string());
    let response = engine.process(turn).await.unwrap();
    assert!(matches!(response, ChatResponse::NeedsClarification { .. }));

    // Second vague message: the engine has exhausted its one clarification, so it
    // must fall back to the guidance final answer, not silently invent one.
    let mut turn = request("conv-final-answer", "ds1");
    turn.message = Some("still vague".to_string());
    let response = engine.process(turn).await.unwrap();
    match response {
        ChatResponse::FinalAnswer { summary_markdown, .. } => {
            assert!(summary_markdown.contains("can't tell which analysis"));
        }
        other => panic!("expected guidance final_answer, got {other:?}"),
    }

    // A results context always routes straight to the summarizer's final_answer.
    let mut turn = request("conv-final-answer", "ds1");
    turn.results_context = Some(QueryResultSet {
        results: vec![TableData {
            name: "row_count".to_string(),
            columns: vec!["row_count".to_string()],
            rows: vec![vec![serde_json::json!(42)]],
        }],
    });
    let response = engine.process(turn).await.unwrap();
    assert!(matches!(response, ChatResponse::FinalAnswer { .. }));
}

// The summarizer's markdown always contains at least one literal value that
// also appears in the underlying result rows, so it can never be a canned
// restatement detached from the actual data.
#[test]
fn summary_is_fact_anchored_to_result_rows() {
    let results = QueryResultSet {
        results: vec![TableData {
            name: "top_categories".to_string(),
            columns: vec!["category".to_string(), "count".to_string()],
            rows: vec![
                vec![serde_json::json!("zzyzx-widgets"), serde_json::json!(500)],
                vec![serde_json::json!("other"), serde_json::json!(200)],
            ],
        }],
    };
    let (markdown, _) =
        chat_orchestrator::summarizer::summarize(Some(AnalysisType::TopCategories), &results, false)
            .unwrap();
    assert!(markdown.contains("zzyzx-widgets"));
}
