//! SQL safety validator.
//!
//! A pure function gating every statement the planner emits (or, on the safe-mode
//! path, any ad-hoc SQL an LLM might propose) before it can be returned to the
//! caller: `SELECT`-only, a bounded `LIMIT`, no restricted keyword, and — under
//! safe mode — an aggregate function or `GROUP BY`. Anything that fails any rule
//! is rejected rather than repaired.

use regex::Regex;

use crate::error::{EngineError, Result};

const MAX_LIMIT: u64 = 10_000;
const DEFAULT_LIMIT: u64 = 1_000;

const RESTRICTED_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE", "CALL", "PRAGMA", "ATTACH", "DETACH", "COPY", "EXPORT",
];

const AGGREGATE_FUNCTIONS: &[&str] = &[
    "COUNT",
    "SUM",
    "AVG",
    "MIN",
    "MAX",
    "TOTAL",
    "GROUP_CONCAT",
    "STRING_AGG",
];

fn word_regex(word: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{word}\b")).expect("restricted keyword pattern is valid")
}

fn limit_regex() -> Regex {
    Regex::new(r"(?i)\bLIMIT\s+(\d+)").expect("LIMIT pattern is valid")
}

fn group_by_regex() -> Regex {
    Regex::new(r"(?i)\bGROUP\s+BY\b").expect("GROUP BY pattern is valid")
}

/// The validated, LIMIT-normalized SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSql(pub String);

/// Validates a single SQL statement against the engine's safety contract.
///
/// Rejects unless: the statement is a `SELECT`, it carries (or is given) a
/// `LIMIT N` with `N <= 10000`, it contains no restricted keyword as a whole
/// word, and — when `safe_mode` is set — it contains an aggregate function or a
/// `GROUP BY` clause. On success, a statement with no `LIMIT` clause has
/// `LIMIT 1000` appended.
pub fn validate_sql(sql: &str, safe_mode: bool) -> Result<ValidatedSql> {
    let trimmed = sql.trim();

    if !trimmed.to_uppercase().starts_with("SELECT") {
        return Err(EngineError::planning(
            "only SELECT statements may be executed",
        ));
    }

    for keyword in RESTRICTED_KEYWORDS {
        if word_regex(keyword).is_match(trimmed) {
            return Err(EngineError::planning(format!(
                "statement contains restricted keyword '{keyword}'"
            )));
        }
    }

    let normalized = match limit_regex().captures(trimmed) {
        Some(caps) => {
            let n: u64 = caps[1]
                .parse()
                .map_err(|_| EngineError::planning("LIMIT value is not a valid integer"))?;
            if n > MAX_LIMIT {
                return Err(EngineError::planning(format!(
                    "LIMIT {n} exceeds the maximum of {MAX_LIMIT}"
                )));
            }
            trimmed.to_string()
        }
        None => format!("{trimmed} LIMIT {DEFAULT_LIMIT}"),
    };

    if safe_mode {
        let has_aggregate = AGGREGATE_FUNCTIONS
            .iter()
            .any(|f| word_regex(f).is_match(&normalized));
        let has_group_by = group_by_regex().is_match(&normalized);
        if !has_aggregate && !has_group_by {
            return Err(EngineError::planning(
                "safe mode requires an aggregate function or GROUP BY clause",
            ));
        }
    }

    Ok(ValidatedSql(normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_select_is_accepted() {
        let result = validate_sql("SELECT COUNT(*) AS row_count FROM data LIMIT 1", false);
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_limit_gets_default_inserted() {
        let result = validate_sql("SELECT * FROM data", false).unwrap();
        assert!(result.0.contains("LIMIT 1000"));
    }

    #[test]
    fn test_limit_over_max_rejected() {
        let result = validate_sql("SELECT * FROM data LIMIT 20000", false);
        assert!(result.is_err());
    }

    #[test]
    fn test_non_select_rejected() {
        let result = validate_sql("DELETE FROM data", false);
        assert!(result.is_err());
    }

    #[test]
    fn test_restricted_keyword_inside_select_rejected() {
        let result = validate_sql(
            "SELECT * FROM data; DROP TABLE data; LIMIT 10",
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_restricted_keyword_requires_word_boundary() {
        // "created_at" contains no restricted keyword as a whole word.
        let result = validate_sql("SELECT created_at FROM data LIMIT 10", false);
        assert!(result.is_ok());
    }

    #[test]
    fn test_safe_mode_requires_aggregate_or_group_by() {
        let result = validate_sql("SELECT * FROM data LIMIT 10", true);
        assert!(result.is_err());

        let result = validate_sql("SELECT COUNT(*) FROM data LIMIT 10", true);
        assert!(result.is_ok());

        let result = validate_sql("SELECT category, COUNT(*) FROM data GROUP BY category LIMIT 10", true);
        assert!(result.is_ok());
    }

    #[test]
    fn test_case_insensitive_select_and_limit() {
        let result = validate_sql("select * from data limit 10", false);
        assert!(result.is_ok());
    }

    #[test]
    fn test_leading_whitespace_tolerated() {
        let result = validate_sql("   SELECT 1 LIMIT 1", false);
        assert!(result.is_ok());
    }
}
