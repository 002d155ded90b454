//! Submission tests: immediate apply, scheduled recording, validation.

mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use amend_core::batch::BatchStatus;
use amend_core::engine::{EngineConfig, SubmitBatch};
use amend_core::error::CoreError;
use amend_core::value::AttributeValue;
use assert_matches::assert_matches;
use chrono::Utc;
use common::{attrs, bulk_edit, harness, harness_with, text};

// ---------------------------------------------------------------------------
// Immediate path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn all_writes_succeed_completes_batch_with_logs() {
    let h = harness();
    h.seed_departments().await;

    let outcome = h
        .engine
        .submit(bulk_edit(&["e1", "e2"], attrs(&[("department", text("Eng"))])))
        .await
        .unwrap();

    assert_eq!(outcome.status(), BatchStatus::Completed);
    assert!(outcome.batch.completed_at.is_some());
    assert!(outcome.batch.scheduled_for.is_none());
    assert_eq!(outcome.batch.description, "Immediate bulk edit for 2 employees.");

    assert_eq!(outcome.logs.len(), 2);
    let e1 = &outcome.logs[0];
    assert_eq!(e1.entity_id, "e1");
    assert_eq!(e1.attribute_name, "department");
    assert_eq!(e1.old_value.as_deref(), Some("Sales"));
    assert_eq!(e1.new_value.as_deref(), Some("Eng"));
    let e2 = &outcome.logs[1];
    assert_eq!(e2.entity_id, "e2");
    assert_eq!(e2.old_value.as_deref(), Some("Marketing"));
    assert_eq!(e2.new_value.as_deref(), Some("Eng"));
    assert!(outcome.logs.iter().all(|l| l.batch_id == outcome.batch_id()));

    assert_eq!(h.department("e1").await, text("Eng"));
    assert_eq!(h.department("e2").await, text("Eng"));
}

#[tokio::test]
async fn one_failed_write_completes_with_errors_and_still_logs_it() {
    let h = harness();
    h.seed_departments().await;
    h.entities.fail_writes_for("e2").await;

    let outcome = h
        .engine
        .submit(bulk_edit(&["e1", "e2"], attrs(&[("department", text("Eng"))])))
        .await
        .unwrap();

    assert_eq!(outcome.status(), BatchStatus::CompletedWithErrors);
    assert_eq!(outcome.logs.len(), 2);
    assert_eq!(h.department("e1").await, text("Eng"));
    assert_eq!(h.department("e2").await, text("Marketing"));
}

#[tokio::test]
async fn every_write_failing_is_not_completed() {
    let h = harness();
    h.seed_departments().await;
    h.entities.fail_writes_for("e1").await;
    h.entities.fail_writes_for("e2").await;

    let outcome = h
        .engine
        .submit(bulk_edit(&["e1", "e2"], attrs(&[("department", text("Eng"))])))
        .await
        .unwrap();

    assert_eq!(outcome.status(), BatchStatus::CompletedWithErrors);
    assert_eq!(outcome.logs.len(), 2);
}

#[tokio::test]
async fn failed_read_records_unknown_old_value_and_still_writes() {
    let h = harness();
    h.seed_departments().await;
    h.entities.fail_reads_for("e1").await;

    let outcome = h
        .engine
        .submit(bulk_edit(&["e1"], attrs(&[("department", text("Eng"))])))
        .await
        .unwrap();

    assert_eq!(outcome.status(), BatchStatus::Completed);
    assert_eq!(outcome.logs[0].old_value, None);
    assert_eq!(outcome.logs[0].new_value.as_deref(), Some("Eng"));
    assert_eq!(h.department("e1").await, text("Eng"));
}

#[tokio::test]
async fn missing_entity_is_a_failed_write_with_unknown_old_value() {
    let h = harness();
    h.seed_departments().await;

    let outcome = h
        .engine
        .submit(bulk_edit(&["e1", "ghost"], attrs(&[("department", text("Eng"))])))
        .await
        .unwrap();

    assert_eq!(outcome.status(), BatchStatus::CompletedWithErrors);
    let ghost = outcome
        .logs
        .iter()
        .find(|l| l.entity_id == "ghost")
        .unwrap();
    assert_eq!(ghost.old_value, None);
}

#[tokio::test]
async fn slow_write_times_out_and_counts_as_failure() {
    let h = harness_with(common::fast_timeout());
    h.seed_departments().await;
    h.entities.delay_writes(Duration::from_millis(500)).await;

    let outcome = h
        .engine
        .submit(bulk_edit(&["e1"], attrs(&[("department", text("Eng"))])))
        .await
        .unwrap();

    assert_eq!(outcome.status(), BatchStatus::CompletedWithErrors);
    assert_eq!(outcome.logs.len(), 1);
}

#[tokio::test]
async fn different_changes_per_entity_are_logged_per_attribute() {
    let h = harness();
    h.entities
        .insert(
            "e1",
            attrs(&[
                ("department", text("Sales")),
                ("base_salary", Some(AttributeValue::integer(50000))),
            ]),
        )
        .await;
    h.entities
        .insert("e2", attrs(&[("job_title", text("Engineer"))]))
        .await;

    let mut changes = BTreeMap::new();
    changes.insert(
        "e1".to_string(),
        attrs(&[
            ("department", text("Eng")),
            ("base_salary", Some(AttributeValue::integer(65000))),
        ]),
    );
    changes.insert(
        "e2".to_string(),
        attrs(&[("job_title", text("Senior Engineer"))]),
    );
    let request = SubmitBatch {
        entity_ids: vec!["e1".into(), "e2".into()],
        changes,
        ..SubmitBatch::default()
    };

    let outcome = h.engine.submit(request).await.unwrap();

    assert_eq!(outcome.status(), BatchStatus::Completed);
    assert_eq!(outcome.logs.len(), 3);
    let salary = outcome
        .logs
        .iter()
        .find(|l| l.attribute_name == "base_salary")
        .unwrap();
    assert_eq!(salary.old_value.as_deref(), Some("50000"));
    assert_eq!(salary.new_value.as_deref(), Some("65000"));
    // Each entity gets a single coalesced write.
    assert_eq!(h.entities.write_count().await, 2);
}

#[tokio::test]
async fn null_value_clears_attribute_and_logs_null() {
    let h = harness();
    h.seed_departments().await;

    let outcome = h
        .engine
        .submit(bulk_edit(&["e1"], attrs(&[("department", None)])))
        .await
        .unwrap();

    assert_eq!(outcome.logs[0].old_value.as_deref(), Some("Sales"));
    assert_eq!(outcome.logs[0].new_value, None);
    assert_eq!(h.department("e1").await, None);
}

#[tokio::test]
async fn duplicate_entity_ids_are_applied_once() {
    let h = harness();
    h.seed_departments().await;

    let mut request = bulk_edit(&["e1"], attrs(&[("department", text("Eng"))]));
    request.entity_ids.push("e1".into());

    let outcome = h.engine.submit(request).await.unwrap();

    assert_eq!(outcome.logs.len(), 1);
    assert_eq!(outcome.batch.description, "Immediate bulk edit for 1 employee.");
    assert_eq!(h.entities.write_count().await, 1);
}

#[tokio::test]
async fn changes_for_unlisted_entities_are_ignored() {
    let h = harness();
    h.seed_departments().await;

    let mut request = bulk_edit(&["e1"], attrs(&[("department", text("Eng"))]));
    request
        .changes
        .insert("e2".into(), attrs(&[("department", text("Legal"))]));

    let outcome = h.engine.submit(request).await.unwrap();

    assert_eq!(outcome.logs.len(), 1);
    assert_eq!(h.department("e2").await, text("Marketing"));
}

#[tokio::test]
async fn log_append_failure_marks_batch_failed_and_returns_error() {
    let h = harness();
    h.seed_departments().await;
    h.changes.fail_log_appends(true).await;

    let result = h
        .engine
        .submit(bulk_edit(&["e1"], attrs(&[("department", text("Eng"))])))
        .await;

    assert_matches!(result, Err(CoreError::Storage(_)));
    let batch = h.engine.get_batch(1).await.unwrap();
    assert_eq!(batch.status, BatchStatus::Failed);
    // Entity writes are not rolled back.
    assert_eq!(h.department("e1").await, text("Eng"));
}

// ---------------------------------------------------------------------------
// Scheduled path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scheduled_submission_records_without_touching_entities() {
    let h = harness();
    h.seed_departments().await;
    let at = Utc::now() + chrono::Duration::days(1);

    let mut request = bulk_edit(&["e1", "e2"], attrs(&[("department", text("Eng"))]));
    request.scheduled_for = Some(at);
    request.submitter_id = Some(7);

    let outcome = h.engine.submit(request).await.unwrap();

    assert_eq!(outcome.status(), BatchStatus::Scheduled);
    assert_eq!(outcome.batch.scheduled_for, Some(at));
    assert_eq!(outcome.batch.completed_at, None);
    assert_eq!(outcome.batch.submitter_id, Some(7));
    assert_eq!(outcome.batch.description, "Scheduled bulk edit for 2 employees.");
    assert_eq!(outcome.logs.len(), 2);
    assert!(outcome.logs.iter().all(|l| l.old_value.is_none()));
    assert!(outcome
        .logs
        .iter()
        .all(|l| l.new_value.as_deref() == Some("Eng")));

    assert_eq!(h.entities.write_count().await, 0);
    assert_eq!(h.department("e1").await, text("Sales"));
}

#[tokio::test]
async fn scheduled_time_in_the_past_is_rejected() {
    let h = harness();
    h.seed_departments().await;

    let mut request = bulk_edit(&["e1"], attrs(&[("department", text("Eng"))]));
    request.scheduled_for = Some(Utc::now() - chrono::Duration::minutes(5));

    let result = h.engine.submit(request).await;

    assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("future"));
    assert_eq!(h.changes.batch_count().await, 0);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_entity_list_is_rejected() {
    let h = harness();

    let result = h.engine.submit(SubmitBatch::default()).await;

    assert_matches!(result, Err(CoreError::Validation(_)));
    assert_eq!(h.changes.batch_count().await, 0);
}

#[tokio::test]
async fn entity_without_changes_is_rejected_before_any_write() {
    let h = harness();
    h.seed_departments().await;

    let mut request = bulk_edit(&["e1"], attrs(&[("department", text("Eng"))]));
    request.entity_ids.push("e2".into());

    let result = h.engine.submit(request).await;

    assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("e2"));
    assert_eq!(h.entities.write_count().await, 0);
    assert_eq!(h.changes.batch_count().await, 0);
}

#[tokio::test]
async fn empty_change_map_is_rejected() {
    let h = harness();
    h.seed_departments().await;

    let result = h.engine.submit(bulk_edit(&["e1"], attrs(&[]))).await;

    assert_matches!(result, Err(CoreError::Validation(_)));
}

#[tokio::test]
async fn unknown_attribute_is_rejected() {
    let h = harness();
    h.seed_departments().await;

    let result = h
        .engine
        .submit(bulk_edit(
            &["e1"],
            attrs(&[("salary; DROP TABLE employees", text("0"))]),
        ))
        .await;

    assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("Unknown attribute"));
    assert_eq!(h.entities.write_count().await, 0);
}

#[tokio::test]
async fn oversized_batch_is_rejected() {
    let h = harness_with(EngineConfig {
        max_batch_size: 2,
        ..EngineConfig::default()
    });

    let result = h
        .engine
        .submit(bulk_edit(
            &["e1", "e2", "e3"],
            attrs(&[("department", text("Eng"))]),
        ))
        .await;

    assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("exceeds maximum"));
}
