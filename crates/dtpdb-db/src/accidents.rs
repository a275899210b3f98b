//! Database operations for the normalized `accidents` table.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use dtpdb_core::NormalizedAccident;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `accidents` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccidentRow {
    pub id: i64,
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
    pub created_at: DateTime<Utc>,
}

/// Inserts a normalized accident, silently skipping duplicates.
///
/// `card_id` carries a unique constraint; `ON CONFLICT DO NOTHING` makes the
/// first successful insert win and treats any later insert of the same card
/// as already satisfied. Returns `true` when a row was written, `false` when
/// the card was already present.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails for a non-conflict reason.
pub async fn insert_accident_if_absent(
    pool: &PgPool,
    accident: &NormalizedAccident,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO accidents ( \
             card_id, region_id, district_id, row_num, occurred_on, occurred_at, \
             district, accident_type, deaths, injured, vehicle_count, participant_count, \
             emtp_number, settlement, street, house, road, road_km, road_m, \
             road_category, road_class, road_surface, lighting, weather, \
             road_condition, severity, latitude, longitude \
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
                   $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28) \
         ON CONFLICT (card_id) DO NOTHING",
    )
    .bind(&accident.card_id)
    .bind(&accident.region_id)
    .bind(&accident.district_id)
    .bind(accident.row_num)
    .bind(accident.occurred_on)
    .bind(accident.occurred_at)
    .bind(&accident.district)
    .bind(&accident.accident_type)
    .bind(accident.deaths)
    .bind(accident.injured)
    .bind(accident.vehicle_count)
    .bind(accident.participant_count)
    .bind(&accident.emtp_number)
    .bind(&accident.settlement)
    .bind(&accident.street)
    .bind(&accident.house)
    .bind(&accident.road)
    .bind(&accident.road_km)
    .bind(&accident.road_m)
    .bind(&accident.road_category)
    .bind(&accident.road_class)
    .bind(&accident.road_surface)
    .bind(&accident.lighting)
    .bind(&accident.weather)
    .bind(&accident.road_condition)
    .bind(&accident.severity)
    .bind(accident.latitude)
    .bind(accident.longitude)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns the accident with the given card identifier, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_accident_by_card_id(
    pool: &PgPool,
    card_id: &str,
) -> Result<Option<AccidentRow>, DbError> {
    let row = sqlx::query_as::<_, AccidentRow>(
        "SELECT id, card_id, region_id, district_id, row_num, occurred_on, occurred_at, \
                district, accident_type, deaths, injured, vehicle_count, participant_count, \
                emtp_number, settlement, street, house, road, road_km, road_m, \
                road_category, road_class, road_surface, lighting, weather, \
                road_condition, severity, latitude, longitude, created_at \
         FROM accidents \
         WHERE card_id = $1",
    )
    .bind(card_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Counts normalized accidents.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_accidents(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accidents")
        .fetch_one(pool)
        .await?;

    Ok(count)
}
