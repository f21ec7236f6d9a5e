//! Integration tests for the SpikeController

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use spikeguard::{
    engine::{EpisodeResetPolicy, SpikeController, SpikeOutcome},
    models::{NotificationRequest, NotificationState},
    notification::{EmitterError, MessageComposer, MessageTemplates, NotificationEmitter},
    persistence::traits::EpisodeStore,
    test_helpers::{
        EpisodeBuilder, EventBuilder, FixedBaseline, InMemoryEpisodeStore, RecordingEmitter,
        create_test_preferences,
    },
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

const APP: i64 = 42;

struct Harness {
    controller: Arc<SpikeController>,
    baseline: Arc<FixedBaseline>,
    store: Arc<InMemoryEpisodeStore>,
    emitter: Arc<RecordingEmitter>,
}

fn noon(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
}

fn composer() -> MessageComposer {
    MessageComposer::new(MessageTemplates::default(), Url::parse("https://errors.example.com").unwrap())
        .unwrap()
}

fn harness_with(
    settings: &[(i64, NotificationState)],
    average: f64,
    today: u64,
    reset_policy: EpisodeResetPolicy,
) -> Harness {
    let baseline = Arc::new(FixedBaseline::new(average, today));
    let store = Arc::new(InMemoryEpisodeStore::new());
    let emitter = Arc::new(RecordingEmitter::new());
    let controller = Arc::new(SpikeController::new(
        Arc::new(create_test_preferences(APP, settings)),
        baseline.clone(),
        store.clone(),
        emitter.clone(),
        composer(),
        reset_policy,
    ));
    Harness { controller, baseline, store, emitter }
}

fn harness(settings: &[(i64, NotificationState)], average: f64, today: u64) -> Harness {
    harness_with(settings, average, today, EpisodeResetPolicy::default())
}

#[tokio::test]
async fn test_cold_start_never_spikes() {
    let h = harness(&[(1, NotificationState::Enabled)], 0.0, 10_000);

    let outcome =
        h.controller.on_report_added_at(&EventBuilder::new(APP).build(), noon(1)).await.unwrap();

    assert_eq!(outcome, SpikeOutcome::NoSpike);
    assert!(h.store.get_active(APP).await.unwrap().is_none());
    assert!(h.emitter.requests().await.is_empty());
}

#[tokio::test]
async fn test_low_baseline_boundary() {
    let h = harness(&[(1, NotificationState::Enabled)], 10.0, 19);
    let event = EventBuilder::new(APP).build();

    assert_eq!(h.controller.on_report_added_at(&event, noon(1)).await.unwrap(), SpikeOutcome::NoSpike);

    h.baseline.set_today(20);
    let outcome = h.controller.on_report_added_at(&event, noon(1)).await.unwrap();
    assert_eq!(outcome, SpikeOutcome::Notified { spike_count: 1, notified: vec![1] });
}

#[tokio::test]
async fn test_high_baseline_boundary() {
    let h = harness(&[(1, NotificationState::Enabled)], 25.0, 24);
    let event = EventBuilder::new(APP).build();

    assert_eq!(h.controller.on_report_added_at(&event, noon(1)).await.unwrap(), SpikeOutcome::NoSpike);

    h.baseline.set_today(25);
    assert!(matches!(
        h.controller.on_report_added_at(&event, noon(1)).await.unwrap(),
        SpikeOutcome::Notified { .. }
    ));
}

#[tokio::test]
async fn test_each_account_notified_once_per_episode() {
    let h = harness(&[(1, NotificationState::Enabled), (2, NotificationState::Enabled)], 10.0, 50);

    for i in 0..10 {
        let event = EventBuilder::new(APP).incident_id(i).application_name("Checkout").build();
        h.controller.on_report_added_at(&event, noon(1)).await.unwrap();
    }

    assert_eq!(h.emitter.recipients().await, vec![1, 2]);
    let episode = h.store.get_active(APP).await.unwrap().unwrap();
    assert_eq!(episode.spike_count, 10);
    assert_eq!(episode.notified_account_ids.iter().copied().collect::<Vec<_>>(), vec![1, 2]);

    let request = &h.emitter.requests().await[0];
    assert_eq!(request.subject, "Spike detected for Checkout (50 reports)");
    assert!(request.body.contains("https://errors.example.com/#/application/42"));
}

#[tokio::test]
async fn test_counter_only_counts_confirmed_spikes() {
    let h = harness(&[(1, NotificationState::Enabled)], 10.0, 0);
    let event = EventBuilder::new(APP).build();

    let mut confirmed = 0;
    for today in [5, 20, 19, 25, 3, 40, 41] {
        h.baseline.set_today(today);
        if let SpikeOutcome::Notified { .. } = h.controller.on_report_added_at(&event, noon(1)).await.unwrap() {
            confirmed += 1;
        }
    }

    assert_eq!(confirmed, 4);
    assert_eq!(h.store.get_active(APP).await.unwrap().unwrap().spike_count, 4);
    assert_eq!(h.emitter.requests().await.len(), 1);
}

#[tokio::test]
async fn test_no_subscribers_leaves_no_trace() {
    let h = harness(&[(1, NotificationState::Disabled), (2, NotificationState::Unset)], 10.0, 500);

    let outcome =
        h.controller.on_report_added_at(&EventBuilder::new(APP).build(), noon(1)).await.unwrap();

    assert_eq!(outcome, SpikeOutcome::NoSubscribers);
    assert!(h.store.list_active().await.unwrap().is_empty());
    assert!(h.emitter.requests().await.is_empty());
}

#[tokio::test]
async fn test_mixed_preferences_notify_enabled_only() {
    let h = harness(
        &[
            (1, NotificationState::Enabled),
            (2, NotificationState::Disabled),
            (3, NotificationState::Unset),
            (4, NotificationState::Enabled),
        ],
        10.0,
        30,
    );

    h.controller.on_report_added_at(&EventBuilder::new(APP).build(), noon(1)).await.unwrap();

    assert_eq!(h.emitter.recipients().await, vec![1, 4]);
    let episode = h.store.get_active(APP).await.unwrap().unwrap();
    assert!(!episode.has_account(2));
    assert!(!episode.has_account(3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_events_notify_exactly_once() {
    let h = harness(
        &[(1, NotificationState::Enabled), (2, NotificationState::Enabled), (3, NotificationState::Enabled)],
        10.0,
        100,
    );

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..50 {
        let controller = Arc::clone(&h.controller);
        tasks.spawn(async move {
            let event = EventBuilder::new(APP).incident_id(i).build();
            controller.on_report_added_at(&event, noon(1)).await.unwrap()
        });
    }
    while let Some(result) = tasks.join_next().await {
        assert!(matches!(result.unwrap(), SpikeOutcome::Notified { .. }));
    }

    assert_eq!(h.emitter.recipients().await, vec![1, 2, 3]);
    assert_eq!(h.store.get_active(APP).await.unwrap().unwrap().spike_count, 50);
}

/// Checks, at delivery time, that the recipient is already persisted.
struct PersistenceCheckingEmitter {
    store: Arc<InMemoryEpisodeStore>,
    observed: Mutex<Vec<(i64, bool)>>,
}

#[async_trait]
impl NotificationEmitter for PersistenceCheckingEmitter {
    async fn send(&self, request: NotificationRequest) -> Result<(), EmitterError> {
        let persisted = self
            .store
            .get_active(APP)
            .await
            .ok()
            .flatten()
            .is_some_and(|e| e.has_account(request.recipient_account_id));
        self.observed.lock().await.push((request.recipient_account_id, persisted));
        Ok(())
    }
}

#[tokio::test]
async fn test_recipients_are_persisted_before_notification() {
    let store = Arc::new(InMemoryEpisodeStore::new());
    let emitter = Arc::new(PersistenceCheckingEmitter { store: store.clone(), observed: Mutex::new(vec![]) });
    let controller = SpikeController::new(
        Arc::new(create_test_preferences(
            APP,
            &[(1, NotificationState::Enabled), (2, NotificationState::Enabled)],
        )),
        Arc::new(FixedBaseline::new(10.0, 30)),
        store.clone(),
        emitter.clone(),
        composer(),
        EpisodeResetPolicy::default(),
    );

    controller.on_report_added_at(&EventBuilder::new(APP).build(), noon(1)).await.unwrap();

    assert_eq!(*emitter.observed.lock().await, vec![(1, true), (2, true)]);
}

#[tokio::test]
async fn test_calendar_day_reset_notifies_again_next_day() {
    let h = harness(&[(1, NotificationState::Enabled)], 10.0, 30);
    let event = EventBuilder::new(APP).build();

    h.controller.on_report_added_at(&event, noon(1)).await.unwrap();
    h.controller.on_report_added_at(&event, noon(1)).await.unwrap();
    let outcome = h.controller.on_report_added_at(&event, noon(2)).await.unwrap();

    assert_eq!(outcome, SpikeOutcome::Notified { spike_count: 1, notified: vec![1] });
    assert_eq!(h.emitter.requests().await.len(), 2);
    assert_eq!(h.store.get_active(APP).await.unwrap().unwrap().created_at, noon(2));
}

#[tokio::test]
async fn test_inactivity_reset() {
    let h = harness_with(
        &[(1, NotificationState::Enabled)],
        10.0,
        30,
        EpisodeResetPolicy::Inactivity { idle_secs: Duration::from_secs(3600) },
    );
    let event = EventBuilder::new(APP).build();
    let start = noon(1);

    h.controller.on_report_added_at(&event, start).await.unwrap();
    // Each spike keeps the episode alive.
    h.controller.on_report_added_at(&event, start + chrono::Duration::minutes(50)).await.unwrap();
    h.controller.on_report_added_at(&event, start + chrono::Duration::minutes(100)).await.unwrap();
    assert_eq!(h.emitter.requests().await.len(), 1);

    h.controller.on_report_added_at(&event, start + chrono::Duration::minutes(161)).await.unwrap();
    assert_eq!(h.emitter.requests().await.len(), 2);
}

#[tokio::test]
async fn test_never_reset_keeps_episode() {
    let h = harness_with(&[(1, NotificationState::Enabled)], 10.0, 30, EpisodeResetPolicy::Never);
    let event = EventBuilder::new(APP).build();

    h.controller.on_report_added_at(&event, noon(1)).await.unwrap();
    let outcome = h.controller.on_report_added_at(&event, noon(20)).await.unwrap();

    assert_eq!(outcome, SpikeOutcome::Notified { spike_count: 2, notified: vec![] });
    assert_eq!(h.emitter.requests().await.len(), 1);
}

#[tokio::test]
async fn test_sweeper_retires_expired_episodes() {
    let h = harness(&[], 10.0, 0);
    let yesterday = Utc::now() - chrono::Duration::days(1);
    h.store.insert(EpisodeBuilder::new(1).created_at(yesterday).notified(&[5]).build()).await;
    h.store.insert(EpisodeBuilder::new(2).build()).await;

    let token = CancellationToken::new();
    let sweeper = {
        let controller = Arc::clone(&h.controller);
        let token = token.clone();
        tokio::spawn(async move {
            controller.run_retirement_sweeper(Duration::from_millis(10), token).await;
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();
    tokio::time::timeout(Duration::from_secs(2), sweeper).await.unwrap().unwrap();

    assert!(h.store.get_active(1).await.unwrap().is_none());
    assert!(h.store.get_active(2).await.unwrap().is_some());
}

#[tokio::test]
async fn test_sweeper_with_zero_interval_keeps_running() {
    let h = harness(&[], 10.0, 0);
    h.store
        .insert(EpisodeBuilder::new(1).created_at(Utc::now() - chrono::Duration::days(1)).build())
        .await;

    let token = CancellationToken::new();
    let sweeper = {
        let controller = Arc::clone(&h.controller);
        let token = token.clone();
        tokio::spawn(async move {
            controller.run_retirement_sweeper(Duration::ZERO, token).await;
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();
    tokio::time::timeout(Duration::from_secs(2), sweeper).await.unwrap().unwrap();

    assert!(h.store.get_active(1).await.unwrap().is_none());
}
