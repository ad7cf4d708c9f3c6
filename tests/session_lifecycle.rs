mod test_support;

use std::sync::Arc;
use std::time::Duration;

use schedule_board::backend::{GROUP_LESSON_COLLECTION, LESSON_COLLECTION, TEACHER_COLLECTION};
use schedule_board::{RenderOutcome, ScheduleError};
use test_support::*;

#[tokio::test(start_paused = true)]
async fn mount_loads_and_subscribes_to_both_lesson_collections() {
    let service = seeded_service();
    let host = RecordingHost::default();
    let session = session(&service, &host);

    session.mount().await.unwrap();

    assert!(session.has_widget());
    assert_eq!(host.mount_count(), 1);
    assert_eq!(service.subscriber_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn rapid_date_changes_load_only_the_final_date() {
    let service = seeded_service();
    let host = RecordingHost::default();
    let session = session(&service, &host);
    session.mount().await.unwrap();
    assert_eq!(service.fetch_count(LESSON_COLLECTION), 1);

    for _ in 0..5 {
        session.change_date(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(service.fetch_count(LESSON_COLLECTION), 1);

    settle().await;

    let last_day = day() + chrono::Duration::days(5);
    assert_eq!(session.selected_date(), last_day);
    assert_eq!(service.fetch_count(LESSON_COLLECTION), 2);
    assert_eq!(host.shown().unwrap().date, last_day);
    assert_eq!(host.mount_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn realtime_change_reloads_the_board() {
    let service = seeded_service();
    let host = RecordingHost::default();
    let session = session(&service, &host);
    session.mount().await.unwrap();

    let delivered = service.insert_and_emit(LESSON_COLLECTION, math_lesson("l1", day(), "Room 1"));
    assert_eq!(delivered, 1);
    settle().await;

    let shown = host.shown().unwrap();
    let alice = &shown.rows[0];
    assert_eq!(schedule_board::display::render_grid_cell(&alice[1]), "Math\nSam\nRoom 1");
    assert_eq!(host.mount_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn events_and_navigation_share_one_reload() {
    let service = seeded_service();
    let host = RecordingHost::default();
    let session = session(&service, &host);
    session.mount().await.unwrap();

    service.emit(LESSON_COLLECTION, "update", math_lesson("l1", day(), "Room 1"));
    service.emit(GROUP_LESSON_COLLECTION, "delete", serde_json::json!({ "id": "g1" }));
    session.change_date(-1);
    service.emit(LESSON_COLLECTION, "create", math_lesson("l2", day(), "Room 2"));
    settle().await;

    assert_eq!(service.fetch_count(LESSON_COLLECTION), 2);
    assert_eq!(service.fetch_count(GROUP_LESSON_COLLECTION), 2);
    assert_eq!(host.shown().unwrap().date, day().pred_opt().unwrap());
}

#[tokio::test(start_paused = true)]
async fn failed_reload_keeps_the_board_and_tells_the_user() {
    let service = seeded_service();
    service.insert(LESSON_COLLECTION, math_lesson("l1", day(), "Room 1"));
    let host = RecordingHost::default();
    let session = session(&service, &host);
    session.mount().await.unwrap();
    let shown = host.shown();

    service.fail_collection(LESSON_COLLECTION);
    session.request_reload();
    settle().await;

    assert_eq!(host.shown(), shown);
    let expected = ScheduleError::fetch(LESSON_COLLECTION, "service unavailable");
    assert_eq!(host.notices(), vec![expected.user_message().to_string()]);

    service.recover(LESSON_COLLECTION);
    session.request_reload();
    settle().await;
    assert_eq!(service.fetch_count(LESSON_COLLECTION), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_initial_load_mounts_on_a_later_reload() {
    let service = seeded_service();
    service.fail_collection(TEACHER_COLLECTION);
    let host = RecordingHost::default();
    let session = session(&service, &host);

    session.mount().await.unwrap();
    assert!(!session.has_widget());
    assert_eq!(service.subscriber_count(), 2);

    service.recover(TEACHER_COLLECTION);
    service.emit(LESSON_COLLECTION, "create", math_lesson("l1", day(), "Room 1"));
    settle().await;

    assert!(session.has_widget());
    assert_eq!(host.mount_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn dispose_releases_widget_and_subscriptions() {
    let service = seeded_service();
    let host = RecordingHost::default();
    let session = session(&service, &host);
    session.mount().await.unwrap();

    session.dispose().await;
    session.dispose().await;

    assert!(session.is_disposed());
    assert!(!session.has_widget());
    assert_eq!(host.destroy_count(), 1);
    assert_eq!(service.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn dispose_survives_failed_unsubscribe_and_ignores_later_events() {
    let service = seeded_service();
    let host = RecordingHost::default();
    let session = session(&service, &host);
    session.mount().await.unwrap();

    service.fail_unsubscribe(true);
    session.dispose().await;
    assert!(session.is_disposed());

    service.emit(LESSON_COLLECTION, "create", math_lesson("l1", day(), "Room 1"));
    session.change_date(1);
    settle().await;

    assert_eq!(service.fetch_count(LESSON_COLLECTION), 1);
    assert_eq!(host.mount_count(), 1);
    assert_eq!(host.destroy_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn pending_reload_is_dropped_on_dispose() {
    let service = seeded_service();
    let host = RecordingHost::default();
    let session = session(&service, &host);
    session.mount().await.unwrap();

    session.change_date(1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.dispose().await;
    settle().await;

    assert_eq!(service.fetch_count(LESSON_COLLECTION), 1);
}

#[tokio::test]
async fn slower_earlier_load_is_dropped_as_stale() {
    let service = seeded_service();
    let gated = GatedService::new(Arc::clone(&service));
    let host = RecordingHost::default();
    let session = session_over(gated.clone() as _, &host);
    session.load_schedule().await.unwrap();

    let gate = gated.arm();
    let earlier = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.load_schedule().await }
    });
    gate.entered.notified().await;

    service.insert(LESSON_COLLECTION, math_lesson("l1", day(), "Room 1"));
    assert_eq!(session.load_schedule().await.unwrap().render, RenderOutcome::Updated);
    let rendered = host.events();

    gate.release.notify_one();
    let late = earlier.await.unwrap().unwrap();

    assert_eq!(late.render, RenderOutcome::Stale);
    assert_eq!(host.events(), rendered);
    assert_eq!(host.mount_count(), 1);
}

#[tokio::test]
async fn load_finishing_after_dispose_leaves_no_widget() {
    let service = seeded_service();
    let gated = GatedService::new(Arc::clone(&service));
    let host = RecordingHost::default();
    let session = session_over(gated.clone() as _, &host);

    let gate = gated.arm();
    let pending = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.load_schedule().await }
    });
    gate.entered.notified().await;
    session.dispose().await;
    gate.release.notify_one();

    let outcome = pending.await.unwrap().unwrap();

    assert_eq!(outcome.render, RenderOutcome::Disposed);
    assert!(host.events().is_empty());
    assert!(!session.has_widget());
}
