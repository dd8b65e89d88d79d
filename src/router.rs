//! Deterministic intent router.
//!
//! A pure function over a free-text message: no I/O, no state, same input always
//! yields the same output. Each candidate analysis type owns a named group of
//! regex patterns with per-pattern weights; every group is scored against the
//! message and the highest-scoring group above the confidence floor wins.

use regex::Regex;

use crate::types::{AnalysisType, TimePeriod};

const STRONG_WEIGHT: f64 = 0.9;
const WEAK_WEIGHT: f64 = 0.55;
const MIN_CONFIDENCE: f64 = 0.5;

struct PatternGroup {
    analysis_type: AnalysisType,
    strong: &'static [&'static str],
    weak: &'static [&'static str],
}

fn pattern_groups() -> Vec<PatternGroup> {
    vec![
        PatternGroup {
            analysis_type: AnalysisType::RowCount,
            strong: &[
                r"row count",
                r"count (the )?rows",
                r"how many rows",
                r"total rows",
                r"record count",
            ],
            weak: &[r"\bcount\b", r"\btotal\b"],
        },
        PatternGroup {
            analysis_type: AnalysisType::Trend,
            strong: &[
                r"trend(s|ing)?",
                r"over time",
                r"monthly",
                r"weekly",
                r"week[- ]over[- ]week",
                r"month[- ]over[- ]month",
                r"\bwow\b",
                r"\bmom\b",
                r"daily",
                r"quarterly",
                r"yearly",
                r"time series",
            ],
            weak: &[r"\bspike\b"],
        },
        PatternGroup {
            analysis_type: AnalysisType::Outliers,
            strong: &[
                r"outlier(s)?",
                r"anomal(y|ies)",
                r"2 std( dev| standard deviations?)?",
                r"z[- ]?score",
                r"\bunusual\b",
                r"\babnormal\b",
            ],
            weak: &[],
        },
        PatternGroup {
            analysis_type: AnalysisType::TopCategories,
            strong: &[
                r"top (\d+|categories?)",
                r"breakdown by",
                r"grouped by",
                r"\bhighest\b",
                r"\branked\b",
            ],
            weak: &[],
        },
        PatternGroup {
            analysis_type: AnalysisType::DataQuality,
            strong: &[
                r"missing values",
                r"\bnulls\b",
                r"\bduplicates\b",
                r"data quality",
                r"check data",
                r"\bvalidate\b",
            ],
            weak: &[],
        },
    ]
}

fn time_period_patterns() -> Vec<(&'static str, TimePeriod)> {
    vec![
        (r"last\s+7\s+days", TimePeriod::Last7Days),
        (r"last\s+week", TimePeriod::Last7Days),
        (r"last\s+30\s+days", TimePeriod::Last30Days),
        (r"last\s+90\s+days", TimePeriod::Last90Days),
        (r"last\s+month", TimePeriod::LastMonth),
        (r"last\s+quarter", TimePeriod::LastQuarter),
        (r"last\s+year", TimePeriod::LastYear),
        (r"year\s+to\s+date|\bytd\b", TimePeriod::YearToDate),
        (r"all\s+time", TimePeriod::AllTime),
    ]
}

fn last_n_days_regex() -> Regex {
    Regex::new(r"(?i)last\s+(\d+)\s+days").expect("last_N_days pattern is valid")
}

/// The outcome of routing a message: a best-guess analysis type (if any cleared the
/// minimum confidence bar), an extracted time period (if any pattern matched), and
/// the aggregate confidence behind the analysis-type guess.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingResult {
    pub analysis_type: Option<AnalysisType>,
    pub time_period: Option<TimePeriod>,
    pub confidence: f64,
}

/// Classifies `message` into an analysis type, time period, and confidence.
///
/// Pure: the same `message` always yields the same result, independent of any
/// conversation state. Confidence below 0.5 is reported as `(None, _, 0.0)`; the
/// 0.8 dispatch threshold is the orchestrator's concern, not this function's.
pub fn route(message: &str) -> RoutingResult {
    let lower = message.to_lowercase();

    let mut best: Option<(AnalysisType, f64)> = None;
    for group in pattern_groups() {
        let mut score = 0.0_f64;
        for pattern in group.strong {
            if Regex::new(&format!(r"(?i){pattern}"))
                .expect("strong pattern is valid")
                .is_match(&lower)
            {
                score += STRONG_WEIGHT;
            }
        }
        for pattern in group.weak {
            if Regex::new(pattern)
                .expect("weak pattern is valid")
                .is_match(&lower)
            {
                score += WEAK_WEIGHT;
            }
        }
        let score = score.min(1.0);
        if score > 0.0 {
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((group.analysis_type, score)),
            }
        }
    }

    let time_period = last_n_days_regex()
        .captures(&lower)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .map(TimePeriod::LastNDays)
        .or_else(|| {
            time_period_patterns().into_iter().find_map(|(pattern, tp)| {
                Regex::new(&format!(r"(?i){pattern}"))
                    .expect("time period pattern is valid")
                    .is_match(&lower)
                    .then_some(tp)
            })
        });

    match best {
        Some((analysis_type, confidence)) if confidence >= MIN_CONFIDENCE => RoutingResult {
            analysis_type: Some(analysis_type),
            time_period,
            confidence,
        },
        _ => RoutingResult {
            analysis_type: None,
            time_period,
            confidence: 0.0,
        },
    }
}
