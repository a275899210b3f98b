//! Normalization of raw accident-card payloads into domain records.
//!
//! [`normalize`] is a pure function over one buffered payload. It fails only
//! when the top-level shape is unrecoverable (not an object or array); every
//! field-level problem degrades to a neutral default instead, because a
//! single malformed field must never abort an otherwise-valid card.

use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;
use thiserror::Error;

use dtpdb_core::{NormalizedAccident, Provenance};

/// Source date format on accident cards, e.g. `"01.03.2024"`.
const CARD_DATE_FORMAT: &str = "%d.%m.%Y";
/// Source time format, e.g. `"14:35"`.
const CARD_TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The payload decodes to something other than an object or an array of
    /// objects. Nothing can be salvaged; the owning buffer row is bad data.
    #[error("payload is not an object or array of objects (found {found})")]
    MalformedPayload { found: &'static str },
}

/// Maps one raw payload to zero or more normalized accident records.
///
/// A payload holding a single object is treated as a one-element sequence;
/// an array is iterated element by element. Elements that are not objects,
/// or that lack a card identifier, are skipped with a warning — such cards
/// occasionally arrive without identifying data and are not actionable.
///
/// # Errors
///
/// Returns [`NormalizeError::MalformedPayload`] only when the top-level
/// shape is neither an object nor an array.
pub fn normalize(
    payload: &Value,
    provenance: &Provenance,
) -> Result<Vec<NormalizedAccident>, NormalizeError> {
    let elements: Vec<&Value> = match payload {
        Value::Object(_) => vec![payload],
        Value::Array(items) => items.iter().collect(),
        other => {
            return Err(NormalizeError::MalformedPayload {
                found: json_type_name(other),
            })
        }
    };

    let mut records = Vec::with_capacity(elements.len());
    for element in elements {
        let Value::Object(card) = element else {
            tracing::warn!(
                locality = %provenance.locality_name,
                "skipping card — element is not an object"
            );
            continue;
        };

        let Some(card_id) = card_identifier(card.get("KartId")) else {
            tracing::warn!(
                locality = %provenance.locality_name,
                "skipping card — no card identifier"
            );
            continue;
        };

        records.push(normalize_card(&card_id, element, provenance));
    }

    Ok(records)
}

/// Shapes one identified card into a [`NormalizedAccident`]. Field access is
/// entirely best-effort from here on.
fn normalize_card(card_id: &str, card: &Value, provenance: &Provenance) -> NormalizedAccident {
    let info = card.get("infoDtp").cloned().unwrap_or(Value::Null);

    let settlement = match info.get("n_p").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => name.to_owned(),
        _ => provenance.locality_name.clone(),
    };

    NormalizedAccident {
        card_id: card_id.to_owned(),
        region_id: provenance.region_id.clone(),
        district_id: provenance.district_id.clone(),
        row_num: parse_count(card.get("rowNum")),
        occurred_on: parse_card_date(card.get("date")),
        occurred_at: parse_card_time(card.get("Time")),
        district: text_or_empty(card.get("District")),
        accident_type: text_or_empty(card.get("DTP_V")),
        deaths: parse_count(card.get("POG")),
        injured: parse_count(card.get("RAN")),
        vehicle_count: parse_count(card.get("K_TS")),
        participant_count: parse_count(card.get("K_UCH")),
        emtp_number: text_or_empty(card.get("emtp_number")),
        settlement,
        street: text_or_empty(info.get("street")),
        house: text_or_empty(info.get("house")),
        road: text_or_empty(info.get("dor")),
        road_km: text_or_empty(info.get("km")),
        road_m: text_or_empty(info.get("m")),
        road_category: text_or_empty(info.get("k_ul")),
        road_class: text_or_empty(info.get("dor_z")),
        road_surface: text_or_empty(info.get("s_pch")),
        weather: text_or_empty(info.get("osv")),
        road_condition: text_or_empty(info.get("sdor")),
        lighting: text_or_empty(info.get("change_org_motion")),
        severity: text_or_empty(info.get("s_dtp")),
        latitude: parse_coord(info.get("COORD_W")),
        longitude: parse_coord(info.get("COORD_L")),
    }
}

/// Extracts a non-empty card identifier. The source usually sends a string,
/// occasionally a bare number.
fn card_identifier(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Best-effort integer coercion: JSON number or numeric string, else 0.
fn parse_count(value: Option<&Value>) -> i32 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<i32>().unwrap_or(0),
        _ => 0,
    }
}

/// Best-effort coordinate coercion: JSON number, or a string with either a
/// comma or a dot decimal separator (the source uses comma), else 0.0.
fn parse_coord(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().replace(',', ".").parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// String fields default to empty; bare numbers are rendered as text.
fn text_or_empty(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Parses a `"DD.MM.YYYY"` card date. Unparseable or absent values yield
/// `None`, never an error.
fn parse_card_date(value: Option<&Value>) -> Option<NaiveDate> {
    let s = value?.as_str()?;
    NaiveDate::parse_from_str(s.trim(), CARD_DATE_FORMAT).ok()
}

/// Parses an `"HH:MM"` card time. Unparseable or absent values yield `None`.
fn parse_card_time(value: Option<&Value>) -> Option<NaiveTime> {
    let s = value?.as_str()?;
    NaiveTime::parse_from_str(s.trim(), CARD_TIME_FORMAT).ok()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provenance() -> Provenance {
        Provenance {
            locality_name: "Лобня".to_string(),
            region_id: "46".to_string(),
            district_id: "46440".to_string(),
        }
    }

    #[test]
    fn single_object_yields_one_record() {
        let payload = json!({
            "KartId": "K1",
            "date": "01.03.2024",
            "Time": "14:35",
            "POG": 1,
            "RAN": "2",
            "infoDtp": {"COORD_W": "55,7", "COORD_L": "37.5"}
        });

        let records = normalize(&payload, &provenance()).expect("should normalize");
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.card_id, "K1");
        assert_eq!(r.occurred_on, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(r.occurred_at, NaiveTime::from_hms_opt(14, 35, 0));
        assert_eq!(r.deaths, 1);
        assert_eq!(r.injured, 2);
        assert!((r.latitude - 55.7).abs() < f64::EPSILON);
        assert!((r.longitude - 37.5).abs() < f64::EPSILON);
    }

    #[test]
    fn array_payload_yields_record_per_element() {
        let payload = json!([
            {"KartId": "K1"},
            {"KartId": "K2"}
        ]);

        let records = normalize(&payload, &provenance()).expect("should normalize");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].card_id, "K1");
        assert_eq!(records[1].card_id, "K2");
    }

    #[test]
    fn minimal_card_gets_neutral_defaults() {
        let payload = json!({"KartId": "K1"});

        let records = normalize(&payload, &provenance()).expect("should normalize");
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.deaths, 0);
        assert_eq!(r.injured, 0);
        assert_eq!(r.vehicle_count, 0);
        assert_eq!(r.participant_count, 0);
        assert_eq!(r.row_num, 0);
        assert!((r.latitude - 0.0).abs() < f64::EPSILON);
        assert!((r.longitude - 0.0).abs() < f64::EPSILON);
        assert_eq!(r.street, "");
        assert_eq!(r.accident_type, "");
        assert!(r.occurred_on.is_none());
        assert!(r.occurred_at.is_none());
    }

    #[test]
    fn settlement_falls_back_to_provenance_locality() {
        let payload = json!({"KartId": "K1"});
        let records = normalize(&payload, &provenance()).expect("should normalize");
        assert_eq!(records[0].settlement, "Лобня");

        let payload = json!({"KartId": "K2", "infoDtp": {"n_p": "Катюшки"}});
        let records = normalize(&payload, &provenance()).expect("should normalize");
        assert_eq!(records[0].settlement, "Катюшки");
    }

    #[test]
    fn element_without_card_id_is_skipped_not_an_error() {
        let payload = json!([
            {"KartId": "K1"},
            {"date": "01.03.2024"},
            {"KartId": ""}
        ]);

        let records = normalize(&payload, &provenance()).expect("should normalize");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].card_id, "K1");
    }

    #[test]
    fn numeric_card_id_is_accepted() {
        let payload = json!({"KartId": 123_456});
        let records = normalize(&payload, &provenance()).expect("should normalize");
        assert_eq!(records[0].card_id, "123456");
    }

    #[test]
    fn non_object_array_elements_are_skipped() {
        let payload = json!([{"KartId": "K1"}, "noise", 7]);
        let records = normalize(&payload, &provenance()).expect("should normalize");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn top_level_string_is_malformed() {
        let payload = json!("{\"KartId\": \"K1\"}");
        let result = normalize(&payload, &provenance());
        assert!(
            matches!(
                result,
                Err(NormalizeError::MalformedPayload { found: "string" })
            ),
            "got: {result:?}"
        );
    }

    #[test]
    fn top_level_number_is_malformed() {
        let payload = json!(42);
        let result = normalize(&payload, &provenance());
        assert!(matches!(
            result,
            Err(NormalizeError::MalformedPayload { found: "number" })
        ));
    }

    #[test]
    fn malformed_individual_fields_do_not_fail_the_card() {
        let payload = json!({
            "KartId": "K1",
            "POG": "many",
            "date": "not-a-date",
            "Time": "25:99",
            "infoDtp": {"COORD_W": "north", "COORD_L": {"nested": true}}
        });

        let records = normalize(&payload, &provenance()).expect("should normalize");
        let r = &records[0];
        assert_eq!(r.deaths, 0);
        assert!(r.occurred_on.is_none());
        assert!(r.occurred_at.is_none());
        assert!((r.latitude - 0.0).abs() < f64::EPSILON);
        assert!((r.longitude - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn comma_decimal_coordinates_are_parsed() {
        assert!((parse_coord(Some(&json!("55,71622"))) - 55.716_22).abs() < 1e-9);
        assert!((parse_coord(Some(&json!("37.5"))) - 37.5).abs() < 1e-9);
        assert!((parse_coord(Some(&json!(12.25))) - 12.25).abs() < 1e-9);
    }

    #[test]
    fn counts_coerce_numbers_and_numeric_strings() {
        assert_eq!(parse_count(Some(&json!(3))), 3);
        assert_eq!(parse_count(Some(&json!("4"))), 4);
        assert_eq!(parse_count(Some(&json!(" 5 "))), 5);
        assert_eq!(parse_count(Some(&json!("n/a"))), 0);
        assert_eq!(parse_count(None), 0);
    }

    #[test]
    fn provenance_identifiers_flow_through() {
        let payload = json!({"KartId": "K1"});
        let records = normalize(&payload, &provenance()).expect("should normalize");
        assert_eq!(records[0].region_id, "46");
        assert_eq!(records[0].district_id, "46440");
    }
}
