//! Core data types shared across the orchestration engine.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the five categories the deterministic router and SQL planner can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    RowCount,
    TopCategories,
    Trend,
    Outliers,
    DataQuality,
}

impl AnalysisType {
    /// Whether this analysis type requires `context.timePeriod` to be set before
    /// planning can proceed. Only `Trend` and `TopCategories` do; the rest are
    /// meaningful over the dataset's full history.
    pub fn requires_time_period(self) -> bool {
        matches!(self, Self::Trend | Self::TopCategories)
    }

    /// The fixed, ordered user-facing choice label for this analysis type.
    pub fn choice_label(self) -> &'static str {
        match self {
            Self::Trend => "Trends over time",
            Self::TopCategories => "Top categories",
            Self::Outliers => "Find outliers",
            Self::RowCount => "Count rows",
            Self::DataQuality => "Check data quality",
        }
    }

    /// The five user-facing choices, always in this order.
    pub fn all_choices() -> [&'static str; 5] {
        [
            Self::Trend.choice_label(),
            Self::TopCategories.choice_label(),
            Self::Outliers.choice_label(),
            Self::RowCount.choice_label(),
            Self::DataQuality.choice_label(),
        ]
    }

    /// Maps a user-facing choice label (from a structured intent value) to its type.
    pub fn from_choice_label(label: &str) -> Option<Self> {
        match label {
            "Trends over time" => Some(Self::Trend),
            "Top categories" => Some(Self::TopCategories),
            "Find outliers" => Some(Self::Outliers),
            "Count rows" => Some(Self::RowCount),
            "Check data quality" => Some(Self::DataQuality),
            _ => None,
        }
    }

    /// Maps the wire token (`"row_count"`, ...) to its type.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "row_count" => Some(Self::RowCount),
            "top_categories" => Some(Self::TopCategories),
            "trend" => Some(Self::Trend),
            "outliers" => Some(Self::Outliers),
            "data_quality" => Some(Self::DataQuality),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::RowCount => "row_count",
            Self::TopCategories => "top_categories",
            Self::Trend => "trend",
            Self::Outliers => "outliers",
            Self::DataQuality => "data_quality",
        }
    }
}

/// A normalized time-period token from the engine's closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    Last7Days,
    Last30Days,
    Last90Days,
    LastMonth,
    LastQuarter,
    LastYear,
    YearToDate,
    AllTime,
    /// `last_N_days` for an explicit N not covered by the fixed buckets above.
    LastNDays(u32),
}

impl TimePeriod {
    pub fn as_token(&self) -> String {
        match self {
            Self::Last7Days => "last_7_days".to_string(),
            Self::Last30Days => "last_30_days".to_string(),
            Self::Last90Days => "last_90_days".to_string(),
            Self::LastMonth => "last_month".to_string(),
            Self::LastQuarter => "last_quarter".to_string(),
            Self::LastYear => "last_year".to_string(),
            Self::YearToDate => "year_to_date".to_string(),
            Self::AllTime => "all_time".to_string(),
            Self::LastNDays(n) => format!("last_{n}_days"),
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "last_7_days" => Some(Self::Last7Days),
            "last_30_days" => Some(Self::Last30Days),
            "last_90_days" => Some(Self::Last90Days),
            "last_month" => Some(Self::LastMonth),
            "last_quarter" => Some(Self::LastQuarter),
            "last_year" => Some(Self::LastYear),
            "year_to_date" | "ytd" => Some(Self::YearToDate),
            "all_time" => Some(Self::AllTime),
            other => {
                let digits = other.strip_prefix("last_")?.strip_suffix("_days")?;
                digits.parse::<u32>().ok().map(Self::LastNDays)
            }
        }
    }

    /// Maps a user-facing choice label to its normalized token.
    pub fn from_choice_label(label: &str) -> Option<Self> {
        match label {
            "Last week" => Some(Self::Last7Days),
            "Last month" => Some(Self::LastMonth),
            "Last quarter" => Some(Self::LastQuarter),
            "Last year" => Some(Self::LastYear),
            "All time" => Some(Self::AllTime),
            _ => None,
        }
    }
}

/// Closed vocabulary of clarification types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationType {
    SetAnalysisType,
    SetTimePeriod,
}

impl ClarificationType {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::SetAnalysisType => "set_analysis_type",
            Self::SetTimePeriod => "set_time_period",
        }
    }
}

/// Structured intent kinds a caller may submit. Only the first two drive the state
/// machine; the others are accepted and stored but otherwise inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SetAnalysisType,
    SetTimePeriod,
    SetMetric,
    SetGrouping,
}

impl Intent {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "set_analysis_type" => Some(Self::SetAnalysisType),
            "set_time_period" => Some(Self::SetTimePeriod),
            "set_metric" => Some(Self::SetMetric),
            "set_grouping" => Some(Self::SetGrouping),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::SetAnalysisType => "set_analysis_type",
            Self::SetTimePeriod => "set_time_period",
            Self::SetMetric => "set_metric",
            Self::SetGrouping => "set_grouping",
        }
    }
}

/// Mutable per-conversation context accumulated across turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    pub analysis_type: Option<AnalysisType>,
    pub time_period: Option<TimePeriod>,
    pub metric: Option<String>,
    pub grouping: Option<String>,
    #[serde(default)]
    pub clarifications_asked: HashSet<ClarificationType>,
    pub original_message: Option<String>,
}

impl ConversationContext {
    /// Whether the context has everything the planner needs: an analysis type, and,
    /// if that type requires one, a time period.
    pub fn is_ready(&self) -> bool {
        match self.analysis_type {
            None => false,
            Some(analysis_type) => {
                !analysis_type.requires_time_period() || self.time_period.is_some()
            }
        }
    }

    pub fn has_asked(&self, clarification: ClarificationType) -> bool {
        self.clarifications_asked.contains(&clarification)
    }

    pub fn mark_asked(&mut self, clarification: ClarificationType) {
        self.clarifications_asked.insert(clarification);
    }
}

/// One record per `conversationId`, held in memory by the `ConversationStateStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub conversation_id: String,
    pub dataset_id: Option<String>,
    pub dataset_name: String,
    pub message_count: u64,
    pub context: ConversationContext,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ConversationState {
    /// Creates a fresh record for a conversation seen for the first time.
    pub fn new(conversation_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            dataset_id: None,
            dataset_name: String::new(),
            message_count: 0,
            context: ConversationContext::default(),
            created_at: now,
            last_updated: now,
        }
    }
}

/// Per-column basic statistics as supplied by the catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStats {
    pub min: Option<serde_json::Value>,
    pub max: Option<serde_json::Value>,
    pub avg: Option<f64>,
    pub null_pct: f64,
    pub approx_distinct: u64,
    pub samples: Vec<serde_json::Value>,
}

/// A single column description in a `DatasetCatalog`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// A PII column as detected by the (out-of-scope) ingest-time PII detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiColumn {
    pub name: String,
    pub kind: String,
}

/// Read-only metadata about a dataset, supplied by an external collaborator.
/// The orchestrator and planner treat this as immutable input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetCatalog {
    pub columns: Vec<ColumnInfo>,
    pub basic_stats: std::collections::HashMap<String, ColumnStats>,
    pub detected_date_columns: Vec<String>,
    pub detected_numeric_columns: Vec<String>,
    pub pii_columns: Vec<PiiColumn>,
    pub row_count: u64,
}

/// One named result table, as returned by the external query engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableData {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl TableData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A set of executed query results, supplied by the external query engine via
/// `resultsContext` on a follow-up turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResultSet {
    pub results: Vec<TableData>,
}

impl QueryResultSet {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty() || self.results.iter().all(|t| t.rows.is_empty())
    }
}

/// Name + SQL pair, as emitted by the planner or recorded in an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedQuery {
    pub name: String,
    pub sql: String,
}

/// The structured declaration of what crossed the process's trust boundary on
/// behalf of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub dataset_id: Option<String>,
    pub dataset_name: String,
    pub analysis_type: Option<AnalysisType>,
    pub time_period: Option<TimePeriod>,
    pub ai_assist: bool,
    pub safe_mode: bool,
    pub privacy_mode: bool,
    pub executed_queries: Vec<PlannedQuery>,
    pub generated_at: DateTime<Utc>,
    pub report_id: Option<String>,
    pub shared_with_ai: Vec<String>,
}
