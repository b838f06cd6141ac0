// tests/monitor_tests.rs

use std::sync::Arc;
use std::time::Duration;

use promobot_common::models::{Epoch, MAX_EPOCH};
use promobot_core::services::EpochMonitor;
use promobot_core::test_utils::memory::MemoryEpochRepository;
use promobot_core::Error;

fn epoch(id: i32, reward: i64, usage_quota: i64) -> Epoch {
    let mut e = Epoch::activate(id).expect("id within the reward table");
    e.reward = reward;
    e.usage_quota = usage_quota;
    e
}

async fn synced_monitor(seed: Epoch) -> (Arc<MemoryEpochRepository>, EpochMonitor) {
    let repo = Arc::new(MemoryEpochRepository::new());
    repo.seed(seed);
    let monitor = EpochMonitor::new(repo.clone());
    monitor.sync().await.expect("sync against seeded store");
    (repo, monitor)
}

/// Waits for the fire-and-forget persistence task to land an upsert
/// matching `pred`.
async fn wait_for_upsert(
    repo: &MemoryEpochRepository,
    pred: impl Fn(&Epoch) -> bool,
) -> Epoch {
    for _ in 0..100 {
        if let Some(found) = repo.upsert_attempts().into_iter().find(|e| pred(e)) {
            return found;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected upsert never attempted");
}

#[tokio::test]
async fn reserve_before_sync_fails() {
    let repo = Arc::new(MemoryEpochRepository::new());
    let monitor = EpochMonitor::new(repo);

    let err = monitor.reserve().await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)), "got {err:?}");
    let err = monitor.release().await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)), "got {err:?}");
}

#[tokio::test]
async fn sync_fails_internal_on_empty_store() {
    let repo = Arc::new(MemoryEpochRepository::new());
    let monitor = EpochMonitor::new(repo);

    let err = monitor.sync().await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)), "got {err:?}");
}

#[tokio::test]
async fn reserve_decrements_quota_and_pays_reward() {
    let (_repo, monitor) = synced_monitor(epoch(1, 1000, 3)).await;

    assert_eq!(monitor.reserve().await.unwrap(), 1000);
    assert_eq!(monitor.reserve().await.unwrap(), 1000);

    let current = monitor.describe(None, true).await.unwrap();
    assert_eq!(current.epoch_id, 1);
    assert_eq!(current.usage_quota, 1);
}

#[tokio::test]
async fn depleted_epoch_rolls_over_to_next_tier() {
    let (repo, monitor) = synced_monitor(epoch(1, 1000, 1)).await;

    assert_eq!(monitor.reserve().await.unwrap(), 1000);
    // Quota is now zero; the next reservation is served from epoch 2.
    assert_eq!(monitor.reserve().await.unwrap(), 900);

    let current = monitor.describe(None, true).await.unwrap();
    assert_eq!(current.epoch_id, 2);
    assert_eq!(current.usage_quota, 2000 - 1);

    // The depleted epoch was persisted asynchronously.
    let saved = wait_for_upsert(&repo, |e| e.epoch_id == 1).await;
    assert_eq!(saved.usage_quota, 0);
}

#[tokio::test]
async fn rollover_survives_persistence_failure() {
    let (repo, monitor) = synced_monitor(epoch(1, 1000, 1)).await;
    repo.set_fail_upserts(true);

    assert_eq!(monitor.reserve().await.unwrap(), 1000);
    // The failing save of the depleted epoch never blocks the caller.
    assert_eq!(monitor.reserve().await.unwrap(), 900);
    assert_eq!(monitor.reserve().await.unwrap(), 900);
}

#[tokio::test]
async fn terminal_epoch_exhaustion_is_not_found() {
    let (_repo, monitor) = synced_monitor(epoch(MAX_EPOCH, 600, 1)).await;

    assert_eq!(monitor.reserve().await.unwrap(), 600);
    for _ in 0..3 {
        let err = monitor.reserve().await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {err:?}");
    }
}

#[tokio::test]
async fn release_restores_quota() {
    let (_repo, monitor) = synced_monitor(epoch(2, 900, 5)).await;

    monitor.reserve().await.unwrap();
    monitor.reserve().await.unwrap();
    monitor.release().await.unwrap();

    let current = monitor.describe(None, true).await.unwrap();
    assert_eq!(current.usage_quota, 4);
}

#[tokio::test]
async fn flush_persists_only_when_dirty() {
    let (repo, monitor) = synced_monitor(epoch(1, 1000, 10)).await;

    // Clean state: nothing to persist.
    monitor.flush(false).await.unwrap();
    assert!(repo.upsert_attempts().is_empty());

    monitor.reserve().await.unwrap();
    monitor.flush(false).await.unwrap();
    let attempts = repo.upsert_attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].usage_quota, 9);

    // Dirty was cleared; a second plain flush is a no-op.
    monitor.flush(false).await.unwrap();
    assert_eq!(repo.upsert_attempts().len(), 1);

    // A forced flush always writes.
    monitor.flush(true).await.unwrap();
    assert_eq!(repo.upsert_attempts().len(), 2);
}

#[tokio::test]
async fn failed_flush_keeps_state_dirty() {
    let (repo, monitor) = synced_monitor(epoch(1, 1000, 10)).await;

    monitor.reserve().await.unwrap();
    repo.set_fail_upserts(true);
    assert!(monitor.flush(false).await.is_err());

    repo.set_fail_upserts(false);
    monitor.flush(false).await.unwrap();
    assert_eq!(repo.upsert_attempts().len(), 2);
    assert_eq!(repo.get(1).unwrap().usage_quota, 9);
}

#[tokio::test]
async fn reserve_during_in_flight_flush_stays_unsaved() {
    let (repo, monitor) = synced_monitor(epoch(1, 1000, 10)).await;
    let monitor = Arc::new(monitor);

    monitor.reserve().await.unwrap();
    repo.set_upsert_delay(Some(Duration::from_millis(100)));

    let flusher = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.flush(false).await })
    };
    // Let the flush snapshot quota 9 and block inside the upsert, then
    // mutate the state underneath it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    monitor.reserve().await.unwrap();
    flusher.await.unwrap().unwrap();

    assert_eq!(repo.get(1).unwrap().usage_quota, 9);

    // The second reservation is still unsaved, so a plain flush must
    // write it out.
    repo.set_upsert_delay(None);
    monitor.flush(false).await.unwrap();
    assert_eq!(repo.get(1).unwrap().usage_quota, 8);
    assert_eq!(repo.upsert_attempts().len(), 2);
}

#[tokio::test]
async fn describe_historical_and_out_of_range() {
    let (repo, monitor) = synced_monitor(epoch(3, 800, 100)).await;
    repo.seed(epoch(2, 900, 0));

    let past = monitor.describe(Some(2), false).await.unwrap();
    assert_eq!(past.epoch_id, 2);

    for bad in [0, MAX_EPOCH + 1, -4] {
        let err = monitor.describe(Some(bad), false).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "id {bad}: {err:?}");
    }
}

#[tokio::test]
async fn concurrent_reserves_never_oversubscribe_an_epoch() {
    let (_repo, monitor) = synced_monitor(epoch(4, 700, 50)).await;
    let monitor = Arc::new(monitor);

    let mut handles = Vec::new();
    for _ in 0..80 {
        let monitor = monitor.clone();
        handles.push(tokio::spawn(async move { monitor.reserve().await }));
    }

    let mut at_700 = 0;
    let mut at_600 = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(700) => at_700 += 1,
            Ok(600) => at_600 += 1,
            Ok(other) => panic!("unexpected reward {other}"),
            Err(e) => panic!("unexpected error {e:?}"),
        }
    }

    // Exactly the epoch-4 quota paid at 700; the rest rolled into epoch 5.
    assert_eq!(at_700, 50);
    assert_eq!(at_600, 30);

    let current = monitor.describe(None, true).await.unwrap();
    assert_eq!(current.epoch_id, 5);
    assert_eq!(current.usage_quota, 10000 - 30);
}
