//! Column mapping: source CSV headers to destination columns.

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::{DestinationColumn, ImportRecord};

/// A parsed import mapping.
///
/// Keys of the mapping JSON are source CSV headers, values are destination
/// column names. Source headers are matched case-insensitively against the
/// file's header row.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    /// (lower-cased source header, destination) pairs.
    entries: Vec<(String, DestinationColumn)>,
}

impl ColumnMapping {
    /// Parse a mapping from its JSON text.
    ///
    /// Entries targeting unsupported destinations are dropped with a warning.
    /// A mapping that resolves to zero supported destinations is a
    /// configuration error, not a "match nothing" request.
    pub fn parse(json: &str) -> AppResult<Self> {
        let value: JsonValue = serde_json::from_str(json)
            .map_err(|e| AppError::Mapping(format!("Mapping is not valid JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| AppError::Mapping("Mapping must be a JSON object".to_string()))?;

        let mut entries = Vec::new();
        for (source_header, destination) in object {
            let Some(destination) = destination.as_str() else {
                warn!(
                    "Mapping value for '{}' is not a string, dropping entry",
                    source_header
                );
                continue;
            };

            match DestinationColumn::parse(destination) {
                Some(column) => entries.push((source_header.trim().to_lowercase(), column)),
                None => warn!(
                    "Unsupported destination column '{}' (source '{}'), dropping entry",
                    destination, source_header
                ),
            }
        }

        if entries.is_empty() {
            return Err(AppError::Mapping(
                "Mapping resolves to zero supported destination columns".to_string(),
            ));
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a normalized record from one source row.
    ///
    /// `row` maps lower-cased source headers to raw values. Values are
    /// trimmed; empty-after-trim becomes None. Headers absent from the row
    /// contribute None.
    pub fn build_record(&self, source_id: String, row: &HashMap<String, String>) -> ImportRecord {
        let mut record = ImportRecord {
            source_id,
            ..Default::default()
        };

        for (source_header, column) in &self.entries {
            let value = row.get(source_header).and_then(|raw| normalize_value(raw));
            record.set(*column, value);
        }

        record
    }
}

/// Trim a raw field value; empty-after-trim is coerced to None.
pub fn normalize_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_drops_unsupported_destinations() {
        let mapping =
            ColumnMapping::parse(r#"{"Street": "voie", "City": "ville", "Notes": "comment"}"#)
                .unwrap();
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_parse_rejects_empty_mapping() {
        assert!(matches!(
            ColumnMapping::parse(r#"{"Notes": "comment"}"#),
            Err(AppError::Mapping(_))
        ));
        assert!(matches!(
            ColumnMapping::parse(r#"[1, 2]"#),
            Err(AppError::Mapping(_))
        ));
    }

    #[test]
    fn test_build_record_is_case_insensitive_and_trims() {
        let mapping =
            ColumnMapping::parse(r#"{"STREET": "voie", "City": "ville", "Zip": "cod_post"}"#)
                .unwrap();

        let record = mapping.build_record(
            "f.csv#2".to_string(),
            &row(&[("street", "  rue de la Paix "), ("city", ""), ("zip", "75002")]),
        );

        assert_eq!(record.voie.as_deref(), Some("rue de la Paix"));
        assert_eq!(record.ville, None);
        assert_eq!(record.cod_post.as_deref(), Some("75002"));
        assert!(record.has_mapped_value());
    }

    #[test]
    fn test_unmapped_row_has_no_value() {
        let mapping = ColumnMapping::parse(r#"{"Street": "voie"}"#).unwrap();
        let record = mapping.build_record("f.csv#3".to_string(), &row(&[("other", "x")]));
        assert!(!record.has_mapped_value());
    }
}
