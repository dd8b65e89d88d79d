//! Deterministic SQL planner.
//!
//! Given a conversation's context and a dataset catalog, emits one to three named
//! `SELECT` statements — no LLM involved. When a prerequisite column (a numeric
//! column for a trend, a categorical column for top-categories) is missing from
//! the catalog, the planner degrades to a simpler plan rather than erroring.

use crate::error::Result;
use crate::safety::validate_sql;
use crate::types::{AnalysisType, ConversationContext, DatasetCatalog, PlannedQuery};

const OUTLIER_STDDEV_THRESHOLD: f64 = 2.0;

/// A planner's output: the queries to run, and a short note on any degradation that
/// occurred (missing column, failed validation, …).
#[derive(Debug, Clone)]
pub struct Plan {
    pub queries: Vec<PlannedQuery>,
    pub explanation: String,
}

fn row_count_plan() -> Plan {
    Plan {
        queries: vec![PlannedQuery {
            name: "row_count".to_string(),
            sql: "SELECT COUNT(*) AS row_count FROM data LIMIT 1".to_string(),
        }],
        explanation: "Counted all rows in the dataset.".to_string(),
    }
}

/// First TEXT column with `approx_distinct / row_count < 0.5` and `approx_distinct > 1`;
/// else the first TEXT column; else `None`.
fn best_categorical_column(catalog: &DatasetCatalog) -> Option<&str> {
    let text_columns: Vec<_> = catalog
        .columns
        .iter()
        .filter(|c| c.type_name.eq_ignore_ascii_case("TEXT"))
        .collect();

    text_columns
        .iter()
        .find(|c| {
            catalog
                .basic_stats
                .get(&c.name)
                .map(|stats| {
                    let ratio = if catalog.row_count == 0 {
                        0.0
                    } else {
                        stats.approx_distinct as f64 / catalog.row_count as f64
                    };
                    ratio < 0.5 && stats.approx_distinct > 1
                })
                .unwrap_or(false)
        })
        .or_else(|| text_columns.first())
        .map(|c| c.name.as_str())
}

/// First of `detected_date_columns`; else first column whose type name contains
/// `DATE` or `TIME`; else `None`.
fn date_column(catalog: &DatasetCatalog) -> Option<&str> {
    catalog
        .detected_date_columns
        .first()
        .map(|s| s.as_str())
        .or_else(|| {
            catalog
                .columns
                .iter()
                .find(|c| {
                    let t = c.type_name.to_uppercase();
                    t.contains("DATE") || t.contains("TIME")
                })
                .map(|c| c.name.as_str())
        })
}

/// First of `detected_numeric_columns` whose name does not contain `id`
/// (case-insensitive); else any numeric column; else `None`.
fn metric_column(catalog: &DatasetCatalog) -> Option<&str> {
    catalog
        .detected_numeric_columns
        .iter()
        .find(|name| !name.to_lowercase().contains("id"))
        .or_else(|| catalog.detected_numeric_columns.first())
        .map(|s| s.as_str())
}

fn is_id_like(name: &str) -> bool {
    name.to_lowercase().contains("id")
}

fn top_categories_plan(catalog: &DatasetCatalog) -> Plan {
    match best_categorical_column(catalog) {
        Some(col) => Plan {
            queries: vec![PlannedQuery {
                name: "top_categories".to_string(),
                sql: format!(
                    "SELECT {col} AS category, COUNT(*) AS count FROM data GROUP BY {col} ORDER BY count DESC LIMIT 10"
                ),
            }],
            explanation: format!("Grouped by {col}, the most common categorical column."),
        },
        None => {
            let mut plan = row_count_plan();
            plan.explanation = "No categorical column was available; showing the row count instead.".to_string();
            plan
        }
    }
}

fn trend_plan(catalog: &DatasetCatalog) -> Plan {
    match date_column(catalog) {
        Some(date_col) => {
            let metric = metric_column(catalog);
            let mut select = format!(
                "SELECT strftime('%Y-%m', {date_col}) AS month, COUNT(*) AS count"
            );
            if let Some(metric_col) = metric {
                select.push_str(&format!(
                    ", SUM({metric_col}) AS metric_sum, AVG({metric_col}) AS metric_avg"
                ));
            }
            let sql = format!(
                "{select} FROM data GROUP BY month ORDER BY month LIMIT 200"
            );
            Plan {
                queries: vec![PlannedQuery {
                    name: "monthly_trend".to_string(),
                    sql,
                }],
                explanation: format!("Aggregated monthly counts by {date_col}."),
            }
        }
        None => {
            let mut plan = row_count_plan();
            plan.explanation = "No date column was available to compute a trend; showing the row count instead.".to_string();
            plan
        }
    }
}

fn outliers_plan(catalog: &DatasetCatalog, safe_mode: bool) -> Plan {
    let numeric_columns: Vec<&str> = catalog
        .detected_numeric_columns
        .iter()
        .filter(|name| !is_id_like(name))
        .map(|s| s.as_str())
        .collect();

    if numeric_columns.is_empty() {
        let mut plan = row_count_plan();
        plan.explanation =
            "No numeric columns were available for outlier detection; showing the row count instead.".to_string();
        return plan;
    }

    let mut queries = Vec::new();
    for col in &numeric_columns {
        let sql = if safe_mode {
            format!(
                "SELECT '{col}' AS column_name, \
                 SUM(CASE WHEN ABS({col} - (SELECT AVG({col}) FROM data)) > {OUTLIER_STDDEV_THRESHOLD} * (SELECT AVG(({col} - (SELECT AVG({col}) FROM data)) * ({col} - (SELECT AVG({col}) FROM data))) FROM data) THEN 1 ELSE 0 END) AS outlier_count, \
                 (SELECT AVG({col}) FROM data) AS mean, \
                 (SELECT AVG(({col} - (SELECT AVG({col}) FROM data)) * ({col} - (SELECT AVG({col}) FROM data))) FROM data) AS stddev \
                 FROM data LIMIT 1"
            )
        } else {
            format!(
                "SELECT '{col}' AS column_name, {col} AS value, \
                 (SELECT AVG({col}) FROM data) AS mean, \
                 (SELECT AVG(({col} - (SELECT AVG({col}) FROM data)) * ({col} - (SELECT AVG({col}) FROM data))) FROM data) AS stddev, \
                 ({col} - (SELECT AVG({col}) FROM data)) AS z_score, \
                 ROW_NUMBER() OVER () AS row_index \
                 FROM data WHERE ABS({col} - (SELECT AVG({col}) FROM data)) > {OUTLIER_STDDEV_THRESHOLD} * (SELECT AVG(({col} - (SELECT AVG({col}) FROM data)) * ({col} - (SELECT AVG({col}) FROM data))) FROM data) \
                 LIMIT 50"
            )
        };
        queries.push(PlannedQuery {
            name: format!("outliers_{col}"),
            sql,
        });
    }

    Plan {
        queries,
        explanation: format!(
            "Flagged values more than {OUTLIER_STDDEV_THRESHOLD} standard deviations from the mean, per numeric column."
        ),
    }
}

fn data_quality_plan(catalog: &DatasetCatalog) -> Plan {
    let null_checks: Vec<String> = catalog
        .columns
        .iter()
        .map(|c| {
            format!(
                "SUM(CASE WHEN {col} IS NULL THEN 1 ELSE 0 END) AS {col}_nulls",
                col = c.name
            )
        })
        .collect();

    let null_counts_sql = format!(
        "SELECT COUNT(*) AS total_rows, {} FROM data LIMIT 1",
        null_checks.join(", ")
    );

    let distinct_column = best_categorical_column(catalog)
        .or_else(|| catalog.columns.first().map(|c| c.name.as_str()))
        .unwrap_or("*");

    let duplicate_check_sql = format!(
        "SELECT COUNT(*) AS total_rows, COUNT(DISTINCT {distinct_column}) AS unique_rows FROM data LIMIT 1"
    );

    Plan {
        queries: vec![
            PlannedQuery {
                name: "null_counts".to_string(),
                sql: null_counts_sql,
            },
            PlannedQuery {
                name: "duplicate_check".to_string(),
                sql: duplicate_check_sql,
            },
        ],
        explanation: "Checked null counts per column and duplicate rows.".to_string(),
    }
}

/// Generates a validated plan for the given context and catalog.
///
/// Every emitted statement is passed through [`validate_sql`] before the plan is
/// returned; if any statement fails validation, the whole plan is replaced by the
/// one-query `row_count` plan, and the explanation records the substitution.
pub fn plan(context: &ConversationContext, catalog: &DatasetCatalog, safe_mode: bool) -> Result<Plan> {
    let analysis_type = context
        .analysis_type
        .ok_or_else(|| crate::error::EngineError::planning("no analysis type set"))?;

    let candidate = match analysis_type {
        AnalysisType::RowCount => row_count_plan(),
        AnalysisType::TopCategories => top_categories_plan(catalog),
        AnalysisType::Trend => trend_plan(catalog),
        AnalysisType::Outliers => outliers_plan(catalog, safe_mode),
        AnalysisType::DataQuality => data_quality_plan(catalog),
    };

    for query in &candidate.queries {
        if validate_sql(&query.sql, safe_mode).is_err() {
            let mut fallback = row_count_plan();
            fallback.explanation = format!(
                "The generated plan for {} failed safety validation and was replaced with a row count.",
                analysis_type.as_token()
            );
            return Ok(fallback);
        }
    }

    Ok(candidate)
}
