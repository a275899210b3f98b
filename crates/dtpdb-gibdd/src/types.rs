//! Request and response types for the accident-card endpoint.
//!
//! The API has an unusual double-encoded wire format: the POST body is
//! `{"data": "<string>"}` where the string is itself a compact JSON document
//! describing the query, and the response mirrors it — `{"data": "<string>"}`
//! where the string decodes to `{"tab": [...]}`.

use serde::{Deserialize, Serialize};

/// Ordering clause inside a [`CardQuery`]; the service expects string-typed
/// numeric fields throughout.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOrder {
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(rename = "fieldName")]
    pub field_name: String,
}

/// Result filter inside a [`CardQuery`].
#[derive(Debug, Clone, Serialize)]
pub struct QueryFilter {
    #[serde(rename = "isSummary")]
    pub is_summary: bool,
}

/// A card-data query for one (region, district, month) cell.
///
/// Field order matters only for readability of logged payloads; the service
/// accepts any order. Serialized compactly and wrapped as the `data` string
/// of the request body by [`crate::GibddClient`].
#[derive(Debug, Clone, Serialize)]
pub struct CardQuery {
    /// Month selector, e.g. `["MONTHS:3.2024"]`.
    pub date: Vec<String>,
    #[serde(rename = "ParReg")]
    pub par_reg: String,
    pub order: QueryOrder,
    /// District identifier.
    pub reg: String,
    pub ind: String,
    /// Paging bounds, 1-based inclusive.
    pub st: String,
    pub en: String,
    pub fil: QueryFilter,
    #[serde(rename = "fieldNames")]
    pub field_names: Vec<String>,
}

impl CardQuery {
    /// Builds the standard query for one locality and month: date-ordered,
    /// first 1000 cards, with the fixed field projection the pipeline needs.
    #[must_use]
    pub fn for_month(region_id: &str, district_id: &str, year: i32, month: u32) -> Self {
        Self {
            date: vec![format!("MONTHS:{month}.{year}")],
            par_reg: region_id.to_owned(),
            order: QueryOrder {
                order_type: "1".to_owned(),
                field_name: "dat".to_owned(),
            },
            reg: district_id.to_owned(),
            ind: "1".to_owned(),
            st: "1".to_owned(),
            en: "1000".to_owned(),
            fil: QueryFilter { is_summary: false },
            field_names: ["dat", "time", "coordinates", "infoDtp"]
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
        }
    }
}

/// POST body: the query document serialized into the `data` string.
#[derive(Debug, Serialize)]
pub(crate) struct CardDataRequest {
    pub data: String,
}

/// Response envelope; `data` is a JSON-encoded string or absent entirely.
#[derive(Debug, Deserialize)]
pub(crate) struct CardDataEnvelope {
    #[serde(default)]
    pub data: Option<String>,
}

/// The document nested inside the envelope's `data` string.
#[derive(Debug, Deserialize)]
pub(crate) struct CardTable {
    #[serde(default)]
    pub tab: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_month_builds_expected_query() {
        let query = CardQuery::for_month("46", "46440", 2024, 3);
        assert_eq!(query.date, vec!["MONTHS:3.2024"]);
        assert_eq!(query.par_reg, "46");
        assert_eq!(query.reg, "46440");
        assert_eq!(query.st, "1");
        assert_eq!(query.en, "1000");
        assert_eq!(
            query.field_names,
            vec!["dat", "time", "coordinates", "infoDtp"]
        );
    }

    #[test]
    fn query_serializes_compactly_with_renamed_keys() {
        let query = CardQuery::for_month("46", "46440", 2024, 3);
        let encoded = serde_json::to_string(&query).expect("query should serialize");

        assert!(encoded.contains("\"date\":[\"MONTHS:3.2024\"]"), "{encoded}");
        assert!(encoded.contains("\"ParReg\":\"46\""), "{encoded}");
        assert!(
            encoded.contains("\"order\":{\"type\":\"1\",\"fieldName\":\"dat\"}"),
            "{encoded}"
        );
        assert!(encoded.contains("\"fil\":{\"isSummary\":false}"), "{encoded}");
        assert!(encoded.contains("\"fieldNames\":["), "{encoded}");
        assert!(!encoded.contains(' '), "compact encoding expected: {encoded}");
    }

    #[test]
    fn envelope_tolerates_missing_data_field() {
        let envelope: CardDataEnvelope =
            serde_json::from_str("{}").expect("empty envelope should parse");
        assert!(envelope.data.is_none());
    }

    #[test]
    fn card_table_defaults_to_empty_tab() {
        let table: CardTable = serde_json::from_str("{}").expect("empty table should parse");
        assert!(table.tab.is_empty());
    }
}
