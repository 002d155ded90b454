//! Cancel, status transitions, and batch listings.

mod common;

use amend_core::batch::{BatchStatus, BatchView};
use amend_core::engine::BatchOutcome;
use amend_core::error::CoreError;
use amend_core::model::{BatchFilter, BatchOrder};
use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::{attrs, bulk_edit, harness, text, Harness};

async fn schedule(h: &Harness, in_hours: i64) -> BatchOutcome {
    let mut request = bulk_edit(&["e1"], attrs(&[("department", text("Eng"))]));
    request.scheduled_for = Some(Utc::now() + Duration::hours(in_hours));
    h.engine.submit(request).await.unwrap()
}

fn filter(view: BatchView) -> BatchFilter {
    BatchFilter {
        statuses: view.statuses().to_vec(),
        order: match view {
            BatchView::Scheduled => BatchOrder::ScheduledSoonest,
            BatchView::History => BatchOrder::NewestFirst,
        },
        limit: 50,
        offset: 0,
    }
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_scheduled_batch() {
    let h = harness();
    h.seed_departments().await;
    let scheduled = schedule(&h, 2).await;

    let cancelled = h.engine.cancel(scheduled.batch_id()).await.unwrap();

    assert_eq!(cancelled.status, BatchStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());
    assert_eq!(cancelled.scheduled_for, scheduled.batch.scheduled_for);
    assert_eq!(h.department("e1").await, text("Sales"));
}

#[tokio::test]
async fn cancelling_twice_is_rejected() {
    let h = harness();
    h.seed_departments().await;
    let scheduled = schedule(&h, 2).await;
    h.engine.cancel(scheduled.batch_id()).await.unwrap();

    let result = h.engine.cancel(scheduled.batch_id()).await;

    assert_matches!(result, Err(CoreError::InvalidState(msg)) if msg.contains("Cancelled"));
}

#[tokio::test]
async fn completed_batch_cannot_be_cancelled() {
    let h = harness();
    h.seed_departments().await;
    let applied = h
        .engine
        .submit(bulk_edit(&["e1"], attrs(&[("department", text("Eng"))])))
        .await
        .unwrap();

    let result = h.engine.cancel(applied.batch_id()).await;

    assert_matches!(result, Err(CoreError::InvalidState(_)));
    let batch = h.engine.get_batch(applied.batch_id()).await.unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);
}

#[tokio::test]
async fn cancel_unknown_batch_is_not_found() {
    let h = harness();

    let result = h.engine.cancel(12).await;

    assert_matches!(result, Err(CoreError::NotFound { id: 12, .. }));
}

#[tokio::test]
async fn storage_failure_during_cancel_surfaces() {
    let h = harness();
    h.seed_departments().await;
    let scheduled = schedule(&h, 2).await;
    h.changes.fail_status_updates(true).await;

    let result = h.engine.cancel(scheduled.batch_id()).await;

    assert_matches!(result, Err(CoreError::Storage(_)));
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scheduled_view_lists_soonest_first() {
    let h = harness();
    h.seed_departments().await;
    let later = schedule(&h, 5).await;
    let sooner = schedule(&h, 1).await;
    h.engine
        .submit(bulk_edit(&["e2"], attrs(&[("department", text("Eng"))])))
        .await
        .unwrap();

    let batches = h
        .engine
        .list_batches(&filter(BatchView::Scheduled))
        .await
        .unwrap();

    let ids: Vec<i64> = batches.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![sooner.batch_id(), later.batch_id()]);
}

#[tokio::test]
async fn history_view_excludes_pending_batches() {
    let h = harness();
    h.seed_departments().await;
    let scheduled = schedule(&h, 1).await;
    let applied = h
        .engine
        .submit(bulk_edit(&["e2"], attrs(&[("department", text("Eng"))])))
        .await
        .unwrap();
    let cancelled = schedule(&h, 3).await;
    h.engine.cancel(cancelled.batch_id()).await.unwrap();

    let batches = h
        .engine
        .list_batches(&filter(BatchView::History))
        .await
        .unwrap();

    let ids: Vec<i64> = batches.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![cancelled.batch_id(), applied.batch_id()]);
    assert!(!ids.contains(&scheduled.batch_id()));
}

#[tokio::test]
async fn listing_respects_limit_and_offset() {
    let h = harness();
    h.seed_departments().await;
    for _ in 0..3 {
        h.engine
            .submit(bulk_edit(&["e1"], attrs(&[("department", text("Eng"))])))
            .await
            .unwrap();
    }

    let page = h
        .engine
        .list_batches(&BatchFilter {
            statuses: vec![],
            order: BatchOrder::NewestFirst,
            limit: 2,
            offset: 1,
        })
        .await
        .unwrap();

    let ids: Vec<i64> = page.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![2, 1]);
}

#[tokio::test]
async fn logs_of_unknown_batch_is_not_found() {
    let h = harness();

    let result = h.engine.list_logs(3).await;

    assert_matches!(
        result,
        Err(CoreError::NotFound {
            entity: "ChangeBatch",
            id: 3
        })
    );
}
