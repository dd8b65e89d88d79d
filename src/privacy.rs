//! Privacy redactor.
//!
//! Rewrites the catalog view shown to the LLM when `privacyMode` is enabled:
//! every PII column is renamed to an opaque `PII_<KIND>_<N>` placeholder and its
//! per-column stats are dropped, so no column name, sample value, or distribution
//! that could identify a person ever reaches an LLM prompt.

use std::collections::HashMap;

use crate::types::DatasetCatalog;

/// Redacts a catalog for LLM consumption. When `privacy_mode` is false this is a
/// pass-through clone. When true, every PII column is renamed to `PII_<KIND>_<n>`
/// everywhere it appears (the column list, `detected_date_columns`,
/// `detected_numeric_columns`), and its `basic_stats` entry and its entries in the
/// detected-column lists are dropped entirely rather than remapped. The original
/// catalog is untouched and remains available to the planner, which runs locally
/// and needs real column names to generate SQL.
pub fn redact_catalog(catalog: &DatasetCatalog, privacy_mode: bool) -> DatasetCatalog {
    if !privacy_mode || catalog.pii_columns.is_empty() {
        return catalog.clone();
    }

    let mut renamed: HashMap<String, String> = HashMap::new();
    let mut kind_counters: HashMap<String, u32> = HashMap::new();
    for pii in &catalog.pii_columns {
        let kind = pii.kind.to_uppercase();
        let counter = kind_counters.entry(kind.clone()).or_insert(0);
        *counter += 1;
        renamed.insert(pii.name.clone(), format!("PII_{kind}_{counter}"));
    }

    let columns = catalog
        .columns
        .iter()
        .map(|c| {
            let name = renamed.get(&c.name).cloned().unwrap_or_else(|| c.name.clone());
            crate::types::ColumnInfo {
                name,
                type_name: c.type_name.clone(),
            }
        })
        .collect();

    let basic_stats = catalog
        .basic_stats
        .iter()
        .filter(|(name, _)| !renamed.contains_key(*name))
        .map(|(name, stats)| (name.clone(), stats.clone()))
        .collect();

    let detected_date_columns = catalog
        .detected_date_columns
        .iter()
        .filter(|name| !renamed.contains_key(*name))
        .cloned()
        .collect();

    let detected_numeric_columns = catalog
        .detected_numeric_columns
        .iter()
        .filter(|name| !renamed.contains_key(*name))
        .cloned()
        .collect();

    DatasetCatalog {
        columns,
        basic_stats,
        detected_date_columns,
        detected_numeric_columns,
        pii_columns: Vec::new(),
        row_count: catalog.row_count,
    }
}
