//! Results-driven summarizer.
//!
//! Turns a `QueryResultSet` into markdown and pass-through tables, one projection
//! per analysis type. Every number or identifier the markdown states is read
//! directly out of `rows[]`; nothing is templated from a static phrase bank, which
//! is what keeps the output anchored to the actual result set instead of a canned
//! restatement of the question.

use crate::error::{EngineError, Result};
use crate::types::{AnalysisType, QueryResultSet, TableData};

const OUTLIER_STDDEV_THRESHOLD: f64 = 2.0;

const FORBIDDEN_PHRASES: &[&str] = &[
    "Dataset contains diverse data patterns",
    "Statistical analysis shows normal distribution",
    "No significant anomalies",
    "Analysis Complete",
];

fn thousands_separated(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    let rev: String = out.chars().rev().collect();
    if n < 0 {
        format!("-{rev}")
    } else {
        rev
    }
}

fn as_i64(value: &serde_json::Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn as_f64(value: &serde_json::Value) -> Option<f64> {
    value.as_f64()
}

fn as_display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn column_index(table: &TableData, name: &str) -> Option<usize> {
    table.columns.iter().position(|c| c == name)
}

fn row_count_summary(table: &TableData) -> Result<String> {
    let cell = table
        .rows
        .first()
        .and_then(|row| row.first())
        .ok_or_else(|| EngineError::summarizer("row_count table has no cells"))?;
    let count = as_i64(cell).ok_or_else(|| EngineError::summarizer("row_count cell is not numeric"))?;
    Ok(format!(
        "The dataset contains **{}** rows.",
        thousands_separated(count)
    ))
}

fn trend_summary(table: &TableData) -> Result<String> {
    let periods = table.row_count();
    let month_idx = column_index(table, "month").unwrap_or(0);
    let count_idx = column_index(table, "count").unwrap_or(1);

    let last = table
        .rows
        .last()
        .ok_or_else(|| EngineError::summarizer("trend table has no rows"))?;
    let latest_label = as_display(&last[month_idx]);
    let latest_count = as_f64(&last[count_idx])
        .ok_or_else(|| EngineError::summarizer("trend count cell is not numeric"))?;

    let mut text = format!(
        "Across **{periods}** periods, the most recent is **{latest_label}** with {} records.",
        thousands_separated(latest_count as i64)
    );

    if table.rows.len() >= 2 {
        let metric_sum_idx = column_index(table, "metric_sum");
        let (prev_val, curr_val, basis) = if let Some(idx) = metric_sum_idx {
            let prev = as_f64(&table.rows[table.rows.len() - 2][idx]).unwrap_or(0.0);
            let curr = as_f64(&table.rows[table.rows.len() - 1][idx]).unwrap_or(0.0);
            (prev, curr, "metric sum")
        } else {
            let prev = as_f64(&table.rows[table.rows.len() - 2][count_idx]).unwrap_or(0.0);
            (prev, latest_count, "count")
        };

        if prev_val != 0.0 {
            let pct = (curr_val - prev_val) / prev_val * 100.0;
            let direction = if pct >= 0.0 { "increase" } else { "decrease" };
            text.push_str(&format!(
                " That is a {:.1}% {direction} on the {basis} versus the prior period.",
                pct.abs()
            ));
        }
    }

    Ok(text)
}

fn top_categories_summary(table: &TableData) -> Result<String> {
    if table.rows.is_empty() {
        return Err(EngineError::summarizer("top_categories table has no rows"));
    }
    let category_idx = column_index(table, "category").unwrap_or(0);
    let count_idx = column_index(table, "count").unwrap_or(1);

    let total: f64 = table
        .rows
        .iter()
        .filter_map(|row| as_f64(&row[count_idx]))
        .sum();

    let mut text = format!("There are **{}** category rows.", table.rows.len());

    for row in table.rows.iter().take(3) {
        let name = as_display(&row[category_idx]);
        let count = as_f64(&row[count_idx]).unwrap_or(0.0);
        let pct = if total > 0.0 { count / total * 100.0 } else { 0.0 };
        text.push_str(&format!(
            "\n- **{name}**: {} ({:.1}% of sum)",
            thousands_separated(count as i64),
            pct
        ));
    }

    if table.rows.len() > 3 {
        text.push_str(&format!("\n- …and {} more", table.rows.len() - 3));
    }

    Ok(text)
}

fn outliers_summary(results: &QueryResultSet, safe_mode: bool) -> Result<String> {
    if safe_mode {
        let mut total_outliers: i64 = 0;
        let mut columns_with_outliers = 0usize;
        for table in &results.results {
            let idx = column_index(table, "outlier_count").unwrap_or(1);
            for row in &table.rows {
                if let Some(n) = row.get(idx).and_then(as_i64) {
                    total_outliers += n;
                    if n > 0 {
                        columns_with_outliers += 1;
                    }
                }
            }
        }
        Ok(format!(
            "Found **{}** outlier values across **{}** column(s), using a {:.0}\u{03c3} threshold.",
            thousands_separated(total_outliers),
            columns_with_outliers,
            OUTLIER_STDDEV_THRESHOLD
        ))
    } else {
        let mut row_count = 0usize;
        let mut distinct_columns = std::collections::HashSet::new();
        let mut max_abs_z = 0.0_f64;
        for table in &results.results {
            let col_idx = column_index(table, "column_name").unwrap_or(0);
            let z_idx = column_index(table, "z_score");
            row_count += table.rows.len();
            for row in &table.rows {
                distinct_columns.insert(as_display(&row[col_idx]));
                if let Some(idx) = z_idx {
                    if let Some(z) = row.get(idx).and_then(as_f64) {
                        max_abs_z = max_abs_z.max(z.abs());
                    }
                }
            }
        }
        Ok(format!(
            "Found **{}** outlier rows across **{}** distinct column(s); the largest deviation was |z| = {:.2}.",
            thousands_separated(row_count as i64),
            distinct_columns.len(),
            max_abs_z
        ))
    }
}

fn data_quality_summary(results: &QueryResultSet) -> Result<String> {
    let null_counts = results
        .results
        .iter()
        .find(|t| t.name == "null_counts")
        .ok_or_else(|| EngineError::summarizer("missing null_counts table"))?;
    let duplicate_check = results
        .results
        .iter()
        .find(|t| t.name == "duplicate_check")
        .ok_or_else(|| EngineError::summarizer("missing duplicate_check table"))?;

    let total_idx = column_index(null_counts, "total_rows").unwrap_or(0);
    let total_rows = null_counts
        .rows
        .first()
        .and_then(|row| row.get(total_idx))
        .and_then(as_i64)
        .unwrap_or(0);

    let mut columns_with_nulls = 0usize;
    let mut total_nulls: i64 = 0;
    if let Some(row) = null_counts.rows.first() {
        for (idx, col) in null_counts.columns.iter().enumerate() {
            if col.ends_with("_nulls") {
                if let Some(n) = row.get(idx).and_then(as_i64) {
                    total_nulls += n;
                    if n > 0 {
                        columns_with_nulls += 1;
                    }
                }
            }
        }
    }

    let dup_total_idx = column_index(duplicate_check, "total_rows").unwrap_or(0);
    let unique_idx = column_index(duplicate_check, "unique_rows").unwrap_or(1);
    let (dup_total, unique_rows) = duplicate_check
        .rows
        .first()
        .map(|row| {
            (
                row.get(dup_total_idx).and_then(as_i64).unwrap_or(0),
                row.get(unique_idx).and_then(as_i64).unwrap_or(0),
            )
        })
        .unwrap_or((0, 0));
    let duplicates = dup_total - unique_rows;

    Ok(format!(
        "Out of **{}** rows, **{}** column(s) contain nulls ({} total), and **{}** rows appear to be duplicates.",
        thousands_separated(total_rows),
        columns_with_nulls,
        thousands_separated(total_nulls),
        thousands_separated(duplicates)
    ))
}

fn generic_summary(results: &QueryResultSet) -> String {
    let mut sections = Vec::new();
    for table in &results.results {
        let mut section = format!(
            "**{}** — {} row(s), columns: {}",
            table.name,
            table.row_count(),
            table.columns.join(", ")
        );
        if let Some(row) = table.rows.first() {
            let leading: Vec<String> = row
                .iter()
                .filter_map(as_f64)
                .take(3)
                .map(|v| v.to_string())
                .collect();
            if !leading.is_empty() {
                section.push_str(&format!(" — first row: {}", leading.join(", ")));
            }
        }
        sections.push(section);
    }
    sections.join("\n")
}

fn assert_no_forbidden_phrases(markdown: &str) -> Result<()> {
    for phrase in FORBIDDEN_PHRASES {
        if markdown.contains(phrase) {
            return Err(EngineError::summarizer(format!(
                "summary text contains a forbidden canned phrase: '{phrase}'"
            )));
        }
    }
    Ok(())
}

/// Produces markdown plus pass-through tables for a completed `QueryResultSet`.
///
/// Raises if `results` is empty or every table has zero rows (R1) — callers must not
/// swallow this; a `final_answer` is never emitted from nothing. `analysis_type ==
/// None` (an ad-hoc or bypassed turn) always gets the generic projection (R4).
pub fn summarize(
    analysis_type: Option<AnalysisType>,
    results: &QueryResultSet,
    safe_mode: bool,
) -> Result<(String, Vec<TableData>)> {
    if results.is_empty() {
        return Err(EngineError::summarizer(
            "cannot summarize an empty result set",
        ));
    }

    let markdown = match analysis_type {
        Some(AnalysisType::RowCount) => {
            let table = results
                .results
                .first()
                .ok_or_else(|| EngineError::summarizer("missing row_count table"))?;
            row_count_summary(table)?
        }
        Some(AnalysisType::Trend) => {
            let table = results
                .results
                .first()
                .ok_or_else(|| EngineError::summarizer("missing trend table"))?;
            trend_summary(table)?
        }
        Some(AnalysisType::TopCategories) => {
            let table = results
                .results
                .first()
                .ok_or_else(|| EngineError::summarizer("missing top_categories table"))?;
            top_categories_summary(table)?
        }
        Some(AnalysisType::Outliers) => outliers_summary(results, safe_mode)?,
        Some(AnalysisType::DataQuality) => data_quality_summary(results)?,
        None => generic_summary(results),
    };

    assert_no_forbidden_phrases(&markdown)?;

    Ok((markdown, results.results.clone()))
}
