//! The orchestrator: the single `process(request) -> response` state machine.
//!
//! `process` dispatches a request to one sub-handler per request shape and
//! returns exactly one variant of a closed response enum. Everything in between
//! is synchronous state-in/state-out; the only await points are state read/write,
//! the LLM call, and report persistence.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::audit::build_audit_record;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::llm::{extract_intent, LlmClient};
use crate::planner;
use crate::privacy::redact_catalog;
use crate::router::route;
use crate::state::ConversationStateStore;
use crate::summarizer::summarize;
use crate::types::{
    AnalysisType, AuditRecord, ClarificationType, ConversationContext, ConversationState,
    DatasetCatalog, Intent, PlannedQuery, QueryResultSet, TableData, TimePeriod,
};

const ROUTER_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Read-only metadata lookup the core consumes but does not own.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn catalog_for(&self, dataset_id: &str) -> Option<DatasetCatalog>;
}

/// Best-effort report persistence, consumed after a `final_answer` is produced.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save_report(
        &self,
        dataset_id: &str,
        dataset_name: &str,
        conversation_id: &str,
        original_question: &str,
        final_answer: &str,
    ) -> Result<Option<String>>;
}

/// `X-Privacy-Mode`/`X-Safe-Mode`/`X-AI-Assist` resolution: body wins over headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestFlags {
    pub privacy_mode: bool,
    pub safe_mode: bool,
    pub ai_assist: bool,
}

impl RequestFlags {
    /// Resolves flags from header values (each `"on"`/`"off"` or absent) and body
    /// overrides; a `Some` body value always wins over its header counterpart.
    pub fn from_headers_and_body(
        header_privacy_mode: Option<&str>,
        header_safe_mode: Option<&str>,
        header_ai_assist: Option<&str>,
        body_privacy_mode: Option<bool>,
        body_safe_mode: Option<bool>,
        body_ai_assist: Option<bool>,
    ) -> Self {
        fn header_bool(value: Option<&str>) -> Option<bool> {
            value.map(|v| v.eq_ignore_ascii_case("on"))
        }

        Self {
            privacy_mode: body_privacy_mode
                .or_else(|| header_bool(header_privacy_mode))
                .unwrap_or(true),
            safe_mode: body_safe_mode.or_else(|| header_bool(header_safe_mode)).unwrap_or(false),
            ai_assist: body_ai_assist.or_else(|| header_bool(header_ai_assist)).unwrap_or(false),
        }
    }
}

/// One turn's request envelope.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub dataset_id: String,
    pub dataset_name: String,
    pub conversation_id: String,
    pub message: Option<String>,
    pub intent: Option<Intent>,
    pub value: Option<serde_json::Value>,
    pub results_context: Option<QueryResultSet>,
    pub flags: RequestFlags,
}

/// The four closed response shapes.
#[derive(Debug, Clone)]
pub enum ChatResponse {
    NeedsClarification {
        question: String,
        choices: Vec<String>,
        intent: Intent,
        allow_free_text: bool,
    },
    RunQueries {
        queries: Vec<PlannedQuery>,
        explanation: String,
        audit: AuditRecord,
    },
    FinalAnswer {
        summary_markdown: String,
        tables: Vec<TableData>,
        audit: AuditRecord,
    },
    IntentAcknowledged {
        intent: Intent,
        value: serde_json::Value,
        state: ConversationContext,
    },
}

pub struct Orchestrator {
    state_store: Arc<ConversationStateStore>,
    config: EngineConfig,
    catalog: Arc<dyn CatalogProvider>,
    reports: Arc<dyn ReportStore>,
    llm_client: Arc<dyn LlmClient>,
}

impl Orchestrator {
    pub fn new(
        state_store: Arc<ConversationStateStore>,
        config: EngineConfig,
        catalog: Arc<dyn CatalogProvider>,
        reports: Arc<dyn ReportStore>,
        llm_client: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            state_store,
            config,
            catalog,
            reports,
            llm_client,
        }
    }

    /// The engine's single public operation.
    pub async fn process(&self, request: ChatRequest) -> Result<ChatResponse> {
        if request.message.is_some() == request.intent.is_some() {
            return Err(EngineError::validation(
                "exactly one of message or intent is required",
            ));
        }
        if request.intent.is_some() && request.value.is_none() {
            return Err(EngineError::validation("intent requires a value"));
        }

        let now = Utc::now();
        let mut state = self.state_store.lock(&request.conversation_id).await;

        if state.dataset_id.is_none() {
            state.dataset_id = Some(request.dataset_id.clone());
            state.dataset_name = request.dataset_name.clone();
        }
        state.last_updated = now;

        if let Some(intent) = request.intent {
            let value = request.value.clone().expect("validated above");
            apply_structured_intent(&mut state, intent, &value)?;
            return Ok(ChatResponse::IntentAcknowledged {
                intent,
                value,
                state: state.context.clone(),
            });
        }

        if let Some(results) = request.results_context.as_ref() {
            if !results.is_empty() {
                return self.finalize_from_results(&mut state, &request, results, now).await;
            }
        }

        let message = request.message.clone().expect("validated above");
        state.message_count += 1;
        state.context.original_message = Some(message.clone());

        if let Some(response) = self.handle_message(&mut state, &message, &request, now).await? {
            return Ok(response);
        }

        self.run_plan(&mut state, &request, now).await
    }

    /// Runs the deterministic router, and the LLM fallback when warranted. Returns
    /// `Some(response)` when the turn must end here (a clarification or a guidance/
    /// misconfiguration answer); `None` when `context` is ready to plan from.
    async fn handle_message(
        &self,
        state: &mut ConversationState,
        message: &str,
        request: &ChatRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<ChatResponse>> {
        let is_continue = message.trim().eq_ignore_ascii_case("continue");

        if !is_continue {
            let routed = route(message);

            if routed.confidence >= ROUTER_CONFIDENCE_THRESHOLD {
                if let Some(analysis_type) = routed.analysis_type {
                    state.context.analysis_type = Some(analysis_type);
                }
                if let Some(time_period) = routed.time_period {
                    state.context.time_period = Some(time_period);
                }
            } else if !request.flags.ai_assist {
                if !state.context.has_asked(ClarificationType::SetAnalysisType) {
                    state.context.mark_asked(ClarificationType::SetAnalysisType);
                    return Ok(Some(needs_clarification_set_analysis_type()));
                }
                return Ok(Some(guidance_final_answer(state, request, now)));
            } else if self.config.ai_available() {
                let catalog = self.catalog.catalog_for(&request.dataset_id).await;
                let redacted_catalog = catalog
                    .map(|c| redact_catalog(&c, request.flags.privacy_mode))
                    .unwrap_or_else(empty_catalog);

                let extracted = extract_intent(
                    self.llm_client.as_ref(),
                    message,
                    &redacted_catalog,
                    request.flags.safe_mode,
                    request.flags.privacy_mode,
                )
                .await;

                if let Some(analysis_type) = extracted.analysis_type {
                    state.context.analysis_type = Some(analysis_type);
                }
                if let Some(time_period) = extracted.time_period {
                    state.context.time_period = Some(time_period);
                }
                if let Some(metric) = extracted.metric {
                    state.context.metric = Some(metric);
                }
                if let Some(group_by) = extracted.group_by {
                    state.context.grouping = Some(group_by);
                }
            } else {
                return Ok(Some(misconfiguration_final_answer(state, request, now)));
            }
        }

        if state.context.is_ready() {
            return Ok(None);
        }

        let clarification = if state.context.analysis_type.is_none() {
            ClarificationType::SetAnalysisType
        } else {
            ClarificationType::SetTimePeriod
        };

        if state.context.has_asked(clarification) {
            return Ok(Some(guidance_final_answer(state, request, now)));
        }
        state.context.mark_asked(clarification);

        Ok(Some(match clarification {
            ClarificationType::SetAnalysisType => needs_clarification_set_analysis_type(),
            ClarificationType::SetTimePeriod => needs_clarification_set_time_period(),
        }))
    }

    async fn finalize_from_results(
        &self,
        state: &mut ConversationState,
        request: &ChatRequest,
        results: &QueryResultSet,
        now: DateTime<Utc>,
    ) -> Result<ChatResponse> {
        let (summary_markdown, tables) =
            summarize(state.context.analysis_type, results, request.flags.safe_mode)?;

        let executed_queries: Vec<PlannedQuery> = results
            .results
            .iter()
            .map(|t| PlannedQuery {
                name: t.name.clone(),
                sql: String::new(),
            })
            .collect();

        let mut audit = build_audit_record(
            state.dataset_id.clone(),
            request.dataset_name.clone(),
            state.context.analysis_type,
            state.context.time_period.clone(),
            request.flags.ai_assist,
            request.flags.safe_mode,
            request.flags.privacy_mode,
            executed_queries,
            now,
        );

        let original_question = state.context.original_message.clone().unwrap_or_default();
        audit.report_id = match self
            .reports
            .save_report(
                &request.dataset_id,
                &request.dataset_name,
                &request.conversation_id,
                &original_question,
                &summary_markdown,
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "report persistence failed");
                None
            }
        };

        Ok(ChatResponse::FinalAnswer {
            summary_markdown,
            tables,
            audit,
        })
    }

    async fn run_plan(
        &self,
        state: &mut ConversationState,
        request: &ChatRequest,
        now: DateTime<Utc>,
    ) -> Result<ChatResponse> {
        let catalog = match self.catalog.catalog_for(&request.dataset_id).await {
            Some(c) => c,
            None => {
                return Ok(ChatResponse::NeedsClarification {
                    question: "This dataset hasn't been ingested yet, so there's nothing to analyze. Please connect a dataset first.".to_string(),
                    choices: vec![],
                    intent: Intent::SetAnalysisType,
                    allow_free_text: true,
                })
            }
        };

        let plan = planner::plan(&state.context, &catalog, request.flags.safe_mode)?;

        let audit = build_audit_record(
            state.dataset_id.clone(),
            request.dataset_name.clone(),
            state.context.analysis_type,
            state.context.time_period.clone(),
            request.flags.ai_assist,
            request.flags.safe_mode,
            request.flags.privacy_mode,
            plan.queries.clone(),
            now,
        );

        Ok(ChatResponse::RunQueries {
            queries: plan.queries,
            explanation: plan.explanation,
            audit,
        })
    }
}

fn empty_catalog() -> DatasetCatalog {
    DatasetCatalog {
        columns: vec![],
        basic_stats: std::collections::HashMap::new(),
        detected_date_columns: vec![],
        detected_numeric_columns: vec![],
        pii_columns: vec![],
        row_count: 0,
    }
}

fn apply_structured_intent(
    state: &mut ConversationState,
    intent: Intent,
    value: &serde_json::Value,
) -> Result<()> {
    match intent {
        Intent::SetAnalysisType => {
            let label = value
                .as_str()
                .ok_or_else(|| EngineError::validation("set_analysis_type value must be a string"))?;
            let analysis_type = AnalysisType::from_choice_label(label)
                .or_else(|| AnalysisType::from_token(label))
                .ok_or_else(|| {
                    EngineError::validation(format!("unrecognized analysis type: '{label}'"))
                })?;
            state.context.analysis_type = Some(analysis_type);
            state.context.mark_asked(ClarificationType::SetAnalysisType);
        }
        Intent::SetTimePeriod => {
            let label = value
                .as_str()
                .ok_or_else(|| EngineError::validation("set_time_period value must be a string"))?;
            let time_period = TimePeriod::from_choice_label(label)
                .or_else(|| TimePeriod::from_token(label))
                .ok_or_else(|| {
                    EngineError::validation(format!("unrecognized time period: '{label}'"))
                })?;
            state.context.time_period = Some(time_period);
            state.context.mark_asked(ClarificationType::SetTimePeriod);
        }
        Intent::SetMetric => {
            let column = value
                .as_str()
                .ok_or_else(|| EngineError::validation("set_metric value must be a string"))?;
            state.context.metric = Some(column.to_string());
        }
        Intent::SetGrouping => {
            let column = value
                .as_str()
                .ok_or_else(|| EngineError::validation("set_grouping value must be a string"))?;
            state.context.grouping = Some(column.to_string());
        }
    }

    Ok(())
}

fn needs_clarification_set_analysis_type() -> ChatResponse {
    ChatResponse::NeedsClarification {
        question: "What would you like to analyze?".to_string(),
        choices: AnalysisType::all_choices().iter().map(|s| s.to_string()).collect(),
        intent: Intent::SetAnalysisType,
        allow_free_text: false,
    }
}

fn needs_clarification_set_time_period() -> ChatResponse {
    ChatResponse::NeedsClarification {
        question: "What time period should this cover?".to_string(),
        choices: ["Last week", "Last month", "Last quarter", "Last year", "All time"]
            .into_iter()
            .map(String::from)
            .collect(),
        intent: Intent::SetTimePeriod,
        allow_free_text: false,
    }
}

fn guidance_final_answer(
    state: &ConversationState,
    request: &ChatRequest,
    now: DateTime<Utc>,
) -> ChatResponse {
    let audit = build_audit_record(
        state.dataset_id.clone(),
        request.dataset_name.clone(),
        state.context.analysis_type,
        state.context.time_period.clone(),
        request.flags.ai_assist,
        request.flags.safe_mode,
        request.flags.privacy_mode,
        vec![],
        now,
    );
    ChatResponse::FinalAnswer {
        summary_markdown: "I still can't tell which analysis to run. Try mentioning trends, \
            top categories, outliers, row counts, or data quality directly in your question."
            .to_string(),
        tables: vec![],
        audit,
    }
}

fn misconfiguration_final_answer(
    state: &ConversationState,
    request: &ChatRequest,
    now: DateTime<Utc>,
) -> ChatResponse {
    let audit = build_audit_record(
        state.dataset_id.clone(),
        request.dataset_name.clone(),
        state.context.analysis_type,
        state.context.time_period.clone(),
        request.flags.ai_assist,
        request.flags.safe_mode,
        request.flags.privacy_mode,
        vec![],
        now,
    );
    ChatResponse::FinalAnswer {
        summary_markdown: "AI assistance is enabled but no API key is configured, so I can't \
            interpret free-form questions right now. Try one of the structured analysis types \
            instead."
            .to_string(),
        tables: vec![],
        audit,
    }
}
