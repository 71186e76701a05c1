use shared::models::RoomOutcome;
use std::sync::Arc;
use std::time::Duration;
use studyroom_server::clock::ManualClock;
use studyroom_server::{RegistryError, RegistryOptions, RoomRegistry};

fn registry(options: RegistryOptions) -> (RoomRegistry, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    (RoomRegistry::with_clock(options, clock.clone()), clock)
}

#[tokio::test]
async fn pomodoro_session_counts_down_and_freezes() {
    let (registry, clock) = registry(RegistryOptions::default());
    let room = registry.create("host-1", Some(1500), None).await.unwrap();

    let snap = registry.get(&room.id).await.unwrap();
    assert_eq!(snap.remaining_seconds, 1500);
    assert!(!snap.running);

    registry.start(&room.id, "host-1").await.unwrap();
    clock.advance(Duration::from_secs(10));
    assert_eq!(registry.get(&room.id).await.unwrap().remaining_seconds, 1490);

    registry.stop(&room.id, "host-1").await.unwrap();
    let first = registry.get(&room.id).await.unwrap();
    let second = registry.get(&room.id).await.unwrap();
    assert_eq!(first.remaining_seconds, second.remaining_seconds);
    assert_eq!(first.remaining_seconds, 1490);
}

#[tokio::test]
async fn read_after_deadline_stops_the_timer() {
    let (registry, clock) = registry(RegistryOptions::default());
    let room = registry.create("host-1", Some(5), None).await.unwrap();
    registry.start(&room.id, "host-1").await.unwrap();

    clock.advance(Duration::from_secs(6));
    let snap = registry.get(&room.id).await.unwrap();
    assert!(!snap.running);
    assert_eq!(snap.remaining_seconds, 0);
}

#[tokio::test]
async fn titles_collide_ignoring_case_when_enforced() {
    let (registry, _) = registry(RegistryOptions {
        unique_titles: true,
        ..RegistryOptions::default()
    });
    registry.create("host-1", Some(60), Some("Math".into())).await.unwrap();
    assert_eq!(
        registry.create("host-2", Some(60), Some("math".into())).await,
        Err(RegistryError::DuplicateName)
    );
}

#[tokio::test]
async fn members_come_and_go_until_the_room_closes() {
    let (registry, clock) = registry(RegistryOptions::default());
    let room = registry.create("host-1", Some(1500), Some("Biology".into())).await.unwrap();

    registry.add_member(&room.id, "host-1").await.unwrap();
    registry.add_member(&room.id, "friend-1").await.unwrap();
    registry.add_member(&room.id, "friend-1").await.unwrap();
    registry.start(&room.id, "friend-1").await.unwrap();

    clock.advance(Duration::from_secs(60));
    let listed = registry.list().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].member_count, 2);
    assert_eq!(listed[0].remaining_seconds, 1440);

    let outcome = registry.remove_member(&room.id, "host-1").await.unwrap();
    assert!(matches!(outcome, RoomOutcome::Room(ref snap) if snap.running));

    let outcome = registry.remove_member(&room.id, "friend-1").await.unwrap();
    assert_eq!(outcome, RoomOutcome::deleted());
    assert_eq!(registry.get(&room.id).await, Err(RegistryError::NotFound));
    assert!(registry.list().await.is_empty());
}

#[tokio::test]
async fn observed_remaining_time_stays_within_bounds() {
    let (registry, clock) = registry(RegistryOptions::default());
    let room = registry.create("host-1", Some(30), None).await.unwrap();
    registry.start(&room.id, "host-1").await.unwrap();

    for step in 0..40 {
        clock.advance(Duration::from_millis(900));
        let snap = registry.get(&room.id).await.unwrap();
        assert!(snap.remaining_seconds <= snap.duration_seconds);
        if snap.running {
            assert!(snap.remaining_seconds > 0, "running room reported zero at step {step}");
        }
        if step == 10 {
            registry.stop(&room.id, "host-1").await.unwrap();
        }
        if step == 15 {
            registry.start(&room.id, "host-1").await.unwrap();
        }
    }
    assert!(!registry.get(&room.id).await.unwrap().running);
}
