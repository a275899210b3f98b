//! Domain records shared between the normalizer and the persistence layer.

use chrono::{NaiveDate, NaiveTime};

/// Where a buffered payload came from: the locality whose fetch produced it.
///
/// Carried alongside each raw payload so normalization can fall back to the
/// configured settlement name when the source omits one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub locality_name: String,
    pub region_id: String,
    pub district_id: String,
}

/// A fully normalized accident card, ready for database persistence.
///
/// `card_id` is the source-assigned identifier and the deduplication key.
/// All other fields are best-effort: absent or malformed source data yields
/// `0`, `0.0`, `""`, or `None` rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAccident {
    pub card_id: String,
    pub region_id: String,
    pub district_id: String,
    pub row_num: i32,
    pub occurred_on: Option<NaiveDate>,
    pub occurred_at: Option<NaiveTime>,
    pub district: String,
    pub accident_type: String,
    pub deaths: i32,
    pub injured: i32,
    pub vehicle_count: i32,
    pub participant_count: i32,
    pub emtp_number: String,
    pub settlement: String,
    pub street: String,
    pub house: String,
    pub road: String,
    pub road_km: String,
    pub road_m: String,
    pub road_category: String,
    pub road_class: String,
    pub road_surface: String,
    pub lighting: String,
    pub weather: String,
    pub road_condition: String,
    pub severity: String,
    pub latitude: f64,
    pub longitude: f64,
}
