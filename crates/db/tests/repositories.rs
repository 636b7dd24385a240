//! Repository tests against a real PostgreSQL database.
//!
//! Run with `DATABASE_URL` pointing at a server the test harness may
//! create scratch databases on:
//! `cargo test -p sitewatch-db -- --ignored`.

use sitewatch_core::annotation::{AnnotationDetail, DetailValidation};
use sitewatch_core::geometry::BoundingBox;
use sitewatch_core::violation::{ScanState, ViolationSummary};
use sitewatch_db::models::annotated_image::CreateAnnotatedImage;
use sitewatch_db::models::image_result::CreateImageResult;
use sitewatch_db::repositories::{AnnotatedImageRepo, ImageResultRepo, JobRepo, JobScheduleRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_image(name: &str) -> CreateImageResult {
    CreateImageResult {
        image_path: format!("images/1700000000000/{name}"),
        image_name: name.to_string(),
    }
}

fn detail(is_valid: Option<bool>) -> AnnotationDetail {
    AnnotationDetail {
        is_valid,
        ..AnnotationDetail::new("no-helmet", "", BoundingBox::new(1.0, 1.0, 10.0, 10.0))
    }
}

fn new_annotation(owner: &str, name: &str, details: Vec<AnnotationDetail>) -> CreateAnnotatedImage {
    CreateAnnotatedImage {
        owner_id: owner.to_string(),
        image_name: name.to_string(),
        image_path: format!("images/1700000000000/{name}"),
        image_width: 1920,
        image_height: 1080,
        details,
    }
}

// ---------------------------------------------------------------------------
// image_results
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn new_images_are_unscanned(pool: PgPool) {
    let image = ImageResultRepo::create(&pool, &new_image("a.jpg")).await.unwrap();
    assert_eq!(image.scan_state(), ScanState::Unscanned);

    let unscanned = ImageResultRepo::list_unscanned(&pool).await.unwrap();
    assert_eq!(unscanned.len(), 1);
}

#[sqlx::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn mark_scanned_writes_once(pool: PgPool) {
    let image = ImageResultRepo::create(&pool, &new_image("a.jpg")).await.unwrap();
    let items = vec![ViolationSummary::new("no-helmet")];

    assert!(ImageResultRepo::mark_scanned(&pool, image.id, &items).await.unwrap());
    assert!(!ImageResultRepo::mark_scanned(&pool, image.id, &items).await.unwrap());

    let stored = ImageResultRepo::find_by_id(&pool, image.id).await.unwrap().unwrap();
    assert_eq!(stored.scan_state(), ScanState::Scanned(items));
    assert!(ImageResultRepo::list_unscanned(&pool).await.unwrap().is_empty());
}

#[sqlx::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn unannotated_images_exclude_owner_annotations(pool: PgPool) {
    ImageResultRepo::create(&pool, &new_image("a.jpg")).await.unwrap();
    ImageResultRepo::create(&pool, &new_image("b.jpg")).await.unwrap();
    AnnotatedImageRepo::create(&pool, &new_annotation("emp-1", "a.jpg", vec![detail(None)]))
        .await
        .unwrap();

    let for_owner = ImageResultRepo::list_unannotated_for_owner(&pool, "emp-1", None)
        .await
        .unwrap();
    assert_eq!(for_owner.len(), 1);
    assert_eq!(for_owner[0].image_name, "b.jpg");

    let for_other = ImageResultRepo::list_unannotated_for_owner(&pool, "emp-2", None)
        .await
        .unwrap();
    assert_eq!(for_other.len(), 2);

    let newest = ImageResultRepo::list_unannotated_for_owner(&pool, "emp-2", Some(1))
        .await
        .unwrap();
    assert_eq!(newest.len(), 1);
    assert_eq!(newest[0].image_name, "b.jpg");
}

// ---------------------------------------------------------------------------
// annotated_images
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn exists_by_key_is_scoped_to_owner(pool: PgPool) {
    AnnotatedImageRepo::create(&pool, &new_annotation("emp-1", "a.jpg", vec![detail(None)]))
        .await
        .unwrap();

    let path = "images/1700000000000/a.jpg";
    assert!(AnnotatedImageRepo::exists_by_key(&pool, "emp-1", "a.jpg", path).await.unwrap());
    assert!(!AnnotatedImageRepo::exists_by_key(&pool, "emp-2", "a.jpg", path).await.unwrap());
}

#[sqlx::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn list_pending_selects_unknown_details_only(pool: PgPool) {
    AnnotatedImageRepo::create(&pool, &new_annotation("emp-1", "a.jpg", vec![detail(Some(true))]))
        .await
        .unwrap();
    let pending = AnnotatedImageRepo::create(
        &pool,
        &new_annotation("emp-1", "b.jpg", vec![detail(Some(false)), detail(None)]),
    )
    .await
    .unwrap();

    let rows = AnnotatedImageRepo::list_pending(&pool).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, pending.id);
}

#[sqlx::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn update_details_rejects_stale_version(pool: PgPool) {
    let row = AnnotatedImageRepo::create(&pool, &new_annotation("emp-1", "a.jpg", vec![detail(None)]))
        .await
        .unwrap();

    let resolved = vec![detail(Some(true))];
    let updated = AnnotatedImageRepo::update_details(&pool, row.id, row.version, &resolved)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.version, row.version + 1);
    assert_eq!(updated.details.0, resolved);

    // Same stale version again: no write.
    let stale = AnnotatedImageRepo::update_details(&pool, row.id, row.version, &[detail(Some(false))])
        .await
        .unwrap();
    assert!(stale.is_none());
}

#[sqlx::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn validation_counts_and_listing(pool: PgPool) {
    AnnotatedImageRepo::create(&pool, &new_annotation("emp-1", "a.jpg", vec![detail(Some(true))]))
        .await
        .unwrap();
    AnnotatedImageRepo::create(
        &pool,
        &new_annotation("emp-1", "b.jpg", vec![detail(Some(true)), detail(Some(false))]),
    )
    .await
    .unwrap();
    AnnotatedImageRepo::create(&pool, &new_annotation("emp-2", "c.jpg", vec![detail(Some(false))]))
        .await
        .unwrap();

    let counts = AnnotatedImageRepo::validation_counts(&pool, "emp-1").await.unwrap();
    assert_eq!(counts.confirmed, 2);
    assert_eq!(counts.rejected, 1);

    let rejected = AnnotatedImageRepo::list_by_validation(&pool, "emp-1", DetailValidation::Rejected)
        .await
        .unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].image_name, "b.jpg");
}

// ---------------------------------------------------------------------------
// pipeline_jobs / job_schedules
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn only_one_job_is_active_at_a_time(pool: PgPool) {
    let first = JobRepo::enqueue(&pool, "scan_unlabeled", None).await.unwrap();
    JobRepo::enqueue(&pool, "validate_annotations", None).await.unwrap();

    let claimed = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(claimed.id, first.id);
    assert!(JobRepo::claim_next(&pool).await.unwrap().is_none());

    assert!(JobRepo::discard(&pool, claimed.id).await.unwrap());
    let second = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(second.job_kind, "validate_annotations");
}

#[sqlx::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn discard_active_clears_abandoned_jobs(pool: PgPool) {
    JobRepo::enqueue(&pool, "scan_unlabeled", None).await.unwrap();
    JobRepo::claim_next(&pool).await.unwrap().unwrap();

    assert_eq!(JobRepo::discard_active(&pool).await.unwrap(), 1);
    assert_eq!(JobRepo::count_waiting(&pool).await.unwrap(), 0);
}

#[sqlx::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn schedule_registration_is_deduplicated_by_name(pool: PgPool) {
    JobScheduleRepo::upsert(&pool, "process-unlabeled-images", "scan_unlabeled", 3600)
        .await
        .unwrap();
    let again = JobScheduleRepo::upsert(&pool, "process-unlabeled-images", "scan_unlabeled", 1800)
        .await
        .unwrap();
    assert_eq!(again.every_secs, 1800);

    let all = JobScheduleRepo::list(&pool).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[sqlx::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn claim_due_advances_next_run(pool: PgPool) {
    let schedule = JobScheduleRepo::upsert(&pool, "process-unlabeled-images", "scan_unlabeled", 60)
        .await
        .unwrap();

    let early = JobScheduleRepo::claim_due(&pool, chrono::Utc::now()).await.unwrap();
    assert!(early.is_empty());

    let due_at = schedule.next_run_at + chrono::Duration::seconds(1);
    let due = JobScheduleRepo::claim_due(&pool, due_at).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].next_run_at, due_at + chrono::Duration::seconds(60));

    assert!(JobScheduleRepo::claim_due(&pool, due_at).await.unwrap().is_empty());
}
