use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use vattenvakt_config::VattenvaktConfig;
use vattenvakt_core::model::Reading;
use vattenvakt_core::time::{Clock, VirtualClock};
use vattenvakt_engine::{ChannelNotifier, LoggingNotifier, Runtime};
use vattenvakt_storage::{JsonFilePersistence, MemoryPersistence, ThresholdUpdate};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
}

fn config() -> VattenvaktConfig {
    let mut config = VattenvaktConfig::default();
    config.simulation.seed = Some(42);
    config.simulation.history_hours = 48;
    config
}

async fn build(clock: &VirtualClock) -> Runtime {
    Runtime::build(
        config(),
        Arc::new(clock.clone()),
        Arc::new(LoggingNotifier),
        Arc::new(MemoryPersistence::new()),
    )
    .await
    .unwrap()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vattenvakt-e2e-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[tokio::test]
async fn three_ticks_grow_every_series_by_three() {
    let clock = VirtualClock::new(start());
    let runtime = build(&clock).await;
    let store = runtime.store().clone();
    assert_eq!(store.region_ids().len(), 4);

    let before: Vec<usize> = store
        .region_ids()
        .iter()
        .map(|id| store.len(id).unwrap())
        .collect();

    for _ in 0..3 {
        clock.advance(Duration::from_secs(10));
        runtime.broadcaster().tick().unwrap();
    }

    for (id, before) in store.region_ids().iter().zip(before) {
        let series = store.snapshot(id).unwrap();
        assert_eq!(series.len(), before + 3, "{id}");
        assert!(
            series.windows(2).all(|w| w[0].timestamp < w[1].timestamp),
            "{id} not strictly increasing"
        );
        assert_eq!(series.last().unwrap().timestamp, clock.now());
    }
    assert_eq!(runtime.metrics().readings_published.get(), 12);
    let exposition = runtime.metrics().gather_metrics().unwrap();
    assert!(exposition.contains(r#"vattenvakt_tick_duration_seconds_count{task="broadcast"} 3"#));
}

#[tokio::test]
async fn injected_high_reading_fires_once_and_persists() {
    let dir = scratch_dir("fires");
    let path = dir.join("thresholds.json");
    let clock = VirtualClock::new(start());
    let (notifier, mut alerts) = ChannelNotifier::new();

    let runtime = Runtime::build(
        config(),
        Arc::new(clock.clone()),
        Arc::new(notifier),
        Arc::new(JsonFilePersistence::new(&path)),
    )
    .await
    .unwrap();
    let service = runtime.service();

    service
        .configure_threshold(
            ThresholdUpdate::new("chn-central")
                .limit(9.0)
                .notify_target(Some("ops@example.org".into())),
        )
        .await
        .unwrap();
    runtime
        .store()
        .append(
            "chn-central",
            Reading {
                timestamp: clock.now(),
                water_level: 9.5,
                temperature: 21.0,
                conductivity: 910.0,
            },
        )
        .unwrap();

    let report = runtime.monitor().tick().await;
    assert_eq!(report.fired.len(), 1);
    assert_eq!(report.fired[0].region_id, "chn-central");

    let alert = alerts.recv().await.unwrap();
    assert_eq!(alert.water_level, 9.5);
    assert_eq!(alert.limit, 9.0);
    assert_eq!(alert.reading_at, clock.now());
    assert_eq!(alert.fired_at, clock.now());
    assert_eq!(
        service.thresholds()["chn-central"].last_fired_at,
        Some(clock.now())
    );

    // A second runtime over the same file sees the firing.
    let reloaded = Runtime::build(
        config(),
        Arc::new(clock.clone()),
        Arc::new(LoggingNotifier),
        Arc::new(JsonFilePersistence::new(&path)),
    )
    .await
    .unwrap();
    let persisted = reloaded.thresholds().get("chn-central").unwrap();
    assert_eq!(persisted.limit, Some(9.0));
    assert_eq!(persisted.last_fired_at, Some(start()));

    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn cooldown_gates_repeat_alerts() {
    let clock = VirtualClock::new(start());
    let runtime = build(&clock).await;
    let service = runtime.service();
    service
        .configure_threshold(
            ThresholdUpdate::new("chn-central")
                .limit(-100.0)
                .notify_target(Some("ops@example.org".into())),
        )
        .await
        .unwrap();

    assert_eq!(runtime.monitor().tick().await.fired.len(), 1);

    clock.advance(Duration::from_secs(30 * 60));
    runtime.broadcaster().tick().unwrap();
    let report = runtime.monitor().tick().await;
    assert!(report.fired.is_empty());
    assert_eq!(report.cooling_down, vec!["chn-central".to_string()]);

    clock.advance(Duration::from_secs(60 * 60));
    runtime.broadcaster().tick().unwrap();
    let report = runtime.monitor().tick().await;
    assert_eq!(report.fired.len(), 1);
    assert_eq!(
        service.thresholds()["chn-central"].last_fired_at,
        Some(start() + chrono::Duration::minutes(90))
    );
    assert_eq!(runtime.metrics().alerts_fired.get(), 2);
    let exposition = runtime.metrics().gather_metrics().unwrap();
    assert!(exposition.contains(r#"vattenvakt_tick_duration_seconds_count{task="monitor"} 3"#));
    assert!(exposition.contains(r#"vattenvakt_tick_duration_seconds_count{task="broadcast"} 2"#));
}

#[tokio::test]
async fn subscriber_sees_catch_up_then_every_region() {
    let clock = VirtualClock::new(start());
    let runtime = build(&clock).await;
    let service = runtime.service();
    let latest = service.latest(None).unwrap();

    let mut subscription = service.subscribe();
    clock.advance(Duration::from_secs(10));
    runtime.broadcaster().tick().unwrap();

    assert_eq!(subscription.recv().await.unwrap(), latest);
    let mut regions = Vec::new();
    for _ in 0..4 {
        regions.push(subscription.recv().await.unwrap().region_id);
    }
    assert_eq!(regions, vec!["chn-central", "blr-north", "hyd-west", "mum-coastal"]);
    assert_eq!(runtime.metrics().subscribers.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn spawned_loops_tick_on_schedule_and_stop() {
    let clock = VirtualClock::new(start());
    let handle = Runtime::start(
        config(),
        Arc::new(clock.clone()),
        Arc::new(LoggingNotifier),
        Arc::new(MemoryPersistence::new()),
    )
    .await
    .unwrap();
    let metrics = handle.metrics().clone();

    // Nothing happens before the first full period.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(metrics.broadcast_ticks.get(), 0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(metrics.broadcast_ticks.get(), 3);
    assert_eq!(metrics.monitor_ticks.get(), 0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(metrics.broadcast_ticks.get(), 6);
    assert_eq!(metrics.monitor_ticks.get(), 1);

    handle.stop();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(metrics.broadcast_ticks.get(), 6);
    assert_eq!(metrics.monitor_ticks.get(), 1);

    handle.join().await.unwrap();
}
