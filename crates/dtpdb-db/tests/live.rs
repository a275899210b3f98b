//! Live integration tests for dtpdb-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/dtpdb-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory. Run with `cargo test -- --ignored` and a reachable
//! `DATABASE_URL`.

use chrono::NaiveDate;
use sqlx::PgPool;

use dtpdb_core::NormalizedAccident;
use dtpdb_db::{
    complete_ingest_run, count_accidents, count_eligible, count_errored, count_total,
    create_ingest_run, enqueue, fail_ingest_run, get_accident_by_card_id, get_ingest_run,
    insert_accident_if_absent, mark_error, mark_processed, select_batch, start_ingest_run, DbError,
};

fn minimal_accident(card_id: &str) -> NormalizedAccident {
    NormalizedAccident {
        card_id: card_id.to_string(),
        region_id: "46".to_string(),
        district_id: "46440".to_string(),
        row_num: 0,
        occurred_on: NaiveDate::from_ymd_opt(2024, 3, 1),
        occurred_at: None,
        district: String::new(),
        accident_type: String::new(),
        deaths: 0,
        injured: 0,
        vehicle_count: 0,
        participant_count: 0,
        emtp_number: String::new(),
        settlement: "Лобня".to_string(),
        street: String::new(),
        house: String::new(),
        road: String::new(),
        road_km: String::new(),
        road_m: String::new(),
        road_category: String::new(),
        road_class: String::new(),
        road_surface: String::new(),
        lighting: String::new(),
        weather: String::new(),
        road_condition: String::new(),
        severity: String::new(),
        latitude: 55.7,
        longitude: 37.5,
    }
}

async fn enqueue_card(pool: &PgPool, payload: serde_json::Value) -> i64 {
    enqueue(pool, "Лобня", "46", "46440", &payload)
        .await
        .expect("enqueue should succeed")
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn select_batch_returns_oldest_eligible_first(pool: PgPool) {
    let first = enqueue_card(&pool, serde_json::json!({"KartId": "A"})).await;
    let second = enqueue_card(&pool, serde_json::json!({"KartId": "B"})).await;
    let third = enqueue_card(&pool, serde_json::json!({"KartId": "C"})).await;
    let fourth = enqueue_card(&pool, serde_json::json!({"KartId": "D"})).await;

    // Terminal rows must never be re-selected.
    mark_processed(&pool, second).await.expect("mark_processed");
    mark_error(&pool, third).await.expect("mark_error");

    let batch = select_batch(&pool, 2).await.expect("select_batch");
    let ids: Vec<i64> = batch.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first, fourth], "lowest eligible ids first");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn mark_processed_is_idempotent(pool: PgPool) {
    let id = enqueue_card(&pool, serde_json::json!({"KartId": "A"})).await;

    mark_processed(&pool, id).await.expect("first mark");
    let batch = select_batch(&pool, 10).await.expect("select_batch");
    assert!(batch.is_empty());

    // Second mark is a no-op, not an error, and the timestamp survives.
    mark_processed(&pool, id).await.expect("second mark");
    assert_eq!(count_eligible(&pool).await.expect("count"), 0);
    assert_eq!(count_total(&pool).await.expect("count"), 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn mark_error_excludes_row_and_is_idempotent(pool: PgPool) {
    let id = enqueue_card(&pool, serde_json::json!("broken")).await;

    mark_error(&pool, id).await.expect("first mark");
    mark_error(&pool, id).await.expect("second mark");

    assert!(select_batch(&pool, 10).await.expect("select").is_empty());
    assert_eq!(count_errored(&pool).await.expect("count"), 1);
    assert_eq!(count_eligible(&pool).await.expect("count"), 0);
}

// ---------------------------------------------------------------------------
// Accidents
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn insert_accident_dedupes_on_card_id(pool: PgPool) {
    let inserted = insert_accident_if_absent(&pool, &minimal_accident("K1"))
        .await
        .expect("first insert");
    assert!(inserted, "first insert writes a row");

    let inserted_again = insert_accident_if_absent(&pool, &minimal_accident("K1"))
        .await
        .expect("second insert");
    assert!(!inserted_again, "duplicate card id is skipped, not an error");

    assert_eq!(count_accidents(&pool).await.expect("count"), 1);

    let row = get_accident_by_card_id(&pool, "K1")
        .await
        .expect("lookup")
        .expect("row should exist");
    assert_eq!(row.occurred_on, NaiveDate::from_ymd_opt(2024, 3, 1));
    assert!((row.latitude - 55.7).abs() < f64::EPSILON);
}

// ---------------------------------------------------------------------------
// Ingest runs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn ingest_run_walks_the_status_lifecycle(pool: PgPool) {
    let run = create_ingest_run(&pool, "process", "cli")
        .await
        .expect("create");
    assert_eq!(run.status, "queued");

    start_ingest_run(&pool, run.id).await.expect("start");
    complete_ingest_run(&pool, run.id, 7).await.expect("complete");

    let row = get_ingest_run(&pool, run.id)
        .await
        .expect("get")
        .expect("run should exist");
    assert_eq!(row.status, "succeeded");
    assert_eq!(row.records_processed, 7);
    assert!(row.completed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres (DATABASE_URL)"]
async fn ingest_run_rejects_invalid_transitions(pool: PgPool) {
    let run = create_ingest_run(&pool, "fetch", "cli").await.expect("create");

    // Completing a run that never started must not silently succeed.
    let result = complete_ingest_run(&pool, run.id, 0).await;
    assert!(
        matches!(result, Err(DbError::InvalidRunTransition { .. })),
        "got: {result:?}"
    );

    start_ingest_run(&pool, run.id).await.expect("start");
    fail_ingest_run(&pool, run.id, "boom").await.expect("fail");

    let row = get_ingest_run(&pool, run.id)
        .await
        .expect("get")
        .expect("run should exist");
    assert_eq!(row.status, "failed");
    assert_eq!(row.error_message.as_deref(), Some("boom"));
}
