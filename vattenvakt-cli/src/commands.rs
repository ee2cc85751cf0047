use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use blake3::Hasher;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn};

use vattenvakt_config::VattenvaktConfig;
use vattenvakt_core::model::{Publication, Region};
use vattenvakt_core::regions::{self, DEFAULT_NEAREST_LIMIT, DEFAULT_NEAREST_RADIUS_KM};
use vattenvakt_core::time::{SystemClock, VirtualClock};
use vattenvakt_engine::{LoggingNotifier, Runtime};
use vattenvakt_storage::{JsonFilePersistence, MemoryPersistence, ThresholdStore, ThresholdUpdate};

/// Start of simulated time, so equal seeds give equal digests.
const SIMULATION_EPOCH_SECS: i64 = 1_704_067_200;

#[derive(Parser)]
#[command(name = "vattenvakt", version, about)]
pub struct Cli {
    /// Configuration file; defaults to config/vattenvakt.yaml when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream simulated telemetry and evaluate thresholds until Ctrl-C
    Run,
    /// Drive the engine on a virtual clock and print a digest of the final state
    Simulate(SimulateArgs),
    /// Inspect or edit the per-region alert configuration
    Thresholds {
        #[command(subcommand)]
        action: ThresholdsCommand,
    },
    /// List regions, optionally ordered by distance from a point
    Regions(RegionsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Broadcaster ticks to run
    #[arg(long, default_value_t = 10)]
    pub ticks: usize,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Fail unless the final digest equals this value
    #[arg(long)]
    pub validate_hash: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ThresholdsCommand {
    List,
    Set(SetArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SetArgs {
    #[arg(long)]
    pub region: String,
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<f64>,
    #[arg(long, conflicts_with = "clear_email")]
    pub email: Option<String>,
    /// Remove the notification target
    #[arg(long)]
    pub clear_email: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RegionsArgs {
    /// Reference point as `LAT,LNG`
    #[arg(long, allow_hyphen_values = true)]
    pub near: Option<String>,
    #[arg(long, default_value_t = DEFAULT_NEAREST_LIMIT)]
    pub limit: usize,
    #[arg(long, default_value_t = DEFAULT_NEAREST_RADIUS_KM)]
    pub radius_km: f64,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<VattenvaktConfig> {
    let config = match path {
        Some(path) => VattenvaktConfig::load_from_path(path)?,
        None => VattenvaktConfig::load()?,
    };
    Ok(config)
}

pub async fn run_command(command: Commands, config: VattenvaktConfig) -> anyhow::Result<()> {
    match command {
        Commands::Run => run(config).await,
        Commands::Simulate(args) => {
            let outcome = simulate(config, &args).await?;
            print_outcome(&outcome);
            if let Some(expected) = args.validate_hash {
                if expected != outcome.digest {
                    bail!(
                        "state digest mismatch: expected {}, got {}",
                        expected,
                        outcome.digest
                    );
                }
            }
            Ok(())
        }
        Commands::Thresholds { action } => thresholds(config, action).await,
        Commands::Regions(args) => list_regions(&config.simulation.region_models(), &args),
    }
}

async fn run(config: VattenvaktConfig) -> anyhow::Result<()> {
    let persistence = Arc::new(JsonFilePersistence::new(&config.storage.thresholds_path));
    let handle = Runtime::start(
        config,
        Arc::new(SystemClock),
        Arc::new(LoggingNotifier),
        persistence,
    )
    .await?;

    let mut subscription = handle.service().subscribe();
    let feed = tokio::spawn(async move {
        while let Some(publication) = subscription.recv().await {
            info!(
                region = %publication.region_id,
                timestamp = %publication.reading.timestamp,
                water_level = publication.reading.water_level,
                temperature = publication.reading.temperature,
                conductivity = publication.reading.conductivity,
                "reading"
            );
        }
    });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("shutdown requested");
        }
        _ = handle.halted() => warn!("runtime halted on a fatal error"),
    }

    let metrics = handle.metrics().clone();
    feed.abort();
    handle.shutdown().await?;
    info!(
        published = metrics.readings_published.get(),
        alerts = metrics.alerts_fired.get(),
        "stopped"
    );
    debug!("final metrics\n{}", metrics.gather_metrics()?);
    Ok(())
}

pub struct SimulationOutcome {
    pub latest: Vec<Publication>,
    pub alerts_fired: usize,
    pub digest: String,
}

/// Runs `ticks` broadcaster ticks on a virtual clock, with a monitor tick
/// each time a monitor period has elapsed. Thresholds are read from the
/// configured file but never written back.
pub async fn simulate(
    mut config: VattenvaktConfig,
    args: &SimulateArgs,
) -> anyhow::Result<SimulationOutcome> {
    config.simulation.seed = Some(args.seed);
    let broadcast_period = config.broadcast.interval();
    let monitor_period = config.monitor.interval();

    let existing = ThresholdStore::load(Arc::new(JsonFilePersistence::new(
        &config.storage.thresholds_path,
    )))
    .await
    .snapshot();
    let epoch = DateTime::<Utc>::from_timestamp(SIMULATION_EPOCH_SECS, 0)
        .ok_or_else(|| anyhow!("simulation epoch out of range"))?;
    let clock = VirtualClock::new(epoch);

    let runtime = Runtime::build(
        config,
        Arc::new(clock.clone()),
        Arc::new(LoggingNotifier),
        Arc::new(MemoryPersistence::with_entries(existing)),
    )
    .await?;

    let mut since_monitor = Duration::ZERO;
    let mut alerts_fired = 0;
    for _ in 0..args.ticks {
        clock.advance(broadcast_period);
        runtime.broadcaster().tick()?;

        since_monitor += broadcast_period;
        while since_monitor >= monitor_period {
            since_monitor -= monitor_period;
            alerts_fired += runtime.monitor().tick().await.fired.len();
        }
    }

    let store = runtime.store();
    let mut hasher = Hasher::new();
    let mut latest = Vec::with_capacity(store.region_ids().len());
    for region_id in store.region_ids() {
        hasher.update(region_id.as_bytes());
        for reading in store.snapshot(region_id)? {
            hasher.update(&reading.timestamp.timestamp_millis().to_le_bytes());
            hasher.update(&reading.water_level.to_bits().to_le_bytes());
            hasher.update(&reading.temperature.to_bits().to_le_bytes());
            hasher.update(&reading.conductivity.to_bits().to_le_bytes());
        }
        if let Some(reading) = store.latest(region_id)? {
            latest.push(Publication::new(region_id.as_str(), reading));
        }
    }

    Ok(SimulationOutcome {
        latest,
        alerts_fired,
        digest: hex::encode(hasher.finalize().as_bytes()),
    })
}

fn print_outcome(outcome: &SimulationOutcome) {
    for publication in &outcome.latest {
        let reading = &publication.reading;
        println!(
            "{:<14} {}  level={:>6.2} m  temp={:>5.1} C  cond={:>7.2} uS/cm",
            publication.region_id,
            reading.timestamp.to_rfc3339(),
            reading.water_level,
            reading.temperature,
            reading.conductivity
        );
    }
    println!("alerts fired: {}", outcome.alerts_fired);
    println!("state digest: {}", outcome.digest);
}

async fn thresholds(config: VattenvaktConfig, action: ThresholdsCommand) -> anyhow::Result<()> {
    let persistence = Arc::new(JsonFilePersistence::new(&config.storage.thresholds_path));
    let store = ThresholdStore::load(persistence).await;

    match action {
        ThresholdsCommand::List => {
            println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
        }
        ThresholdsCommand::Set(args) => {
            regions::find_region(&config.simulation.region_models(), &args.region)?;
            let notify_target = match (args.email, args.clear_email) {
                (_, true) => Some(None),
                (Some(email), false) => Some(Some(email)),
                (None, false) => None,
            };
            let entry = store
                .configure_persisted(ThresholdUpdate {
                    region_id: args.region,
                    limit: args.limit,
                    notify_target,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
    }
    Ok(())
}

fn list_regions(regions: &[Region], args: &RegionsArgs) -> anyhow::Result<()> {
    match &args.near {
        None => {
            for region in regions {
                println!(
                    "{:<14} {:<20} {:>9.4} {:>9.4}",
                    region.id, region.name, region.lat, region.lng
                );
            }
        }
        Some(point) => {
            let (lat, lng) = parse_point(point)?;
            for near in regions::nearest_regions(regions, lat, lng, args.limit, args.radius_km)? {
                println!(
                    "{:<14} {:<20} {:>8.2} km",
                    near.region.id, near.region.name, near.distance_km
                );
            }
        }
    }
    Ok(())
}

fn parse_point(raw: &str) -> anyhow::Result<(f64, f64)> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("expected LAT,LNG, got '{raw}'"))?;
    let lat = lat
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid latitude '{lat}'"))?;
    let lng = lng
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid longitude '{lng}'"))?;
    Ok((lat, lng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vattenvakt_storage::ThresholdPersistence;

    fn quick_config() -> VattenvaktConfig {
        let mut config = VattenvaktConfig::default();
        config.simulation.history_hours = 24;
        config.storage.thresholds_path = std::env::temp_dir()
            .join(format!("vattenvakt-cli-{}-absent", std::process::id()))
            .join("thresholds.json");
        config
    }

    fn args(ticks: usize, seed: u64) -> SimulateArgs {
        SimulateArgs {
            ticks,
            seed,
            validate_hash: None,
        }
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["vattenvakt", "simulate", "--ticks", "5"]).unwrap();
        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.ticks, 5);
                assert_eq!(args.seed, 42);
            }
            _ => panic!("expected simulate"),
        }

        let cli = Cli::try_parse_from([
            "vattenvakt",
            "--config",
            "custom.yaml",
            "thresholds",
            "set",
            "--region",
            "chn-central",
            "--limit",
            "9.5",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Thresholds {
                action: ThresholdsCommand::Set(SetArgs { limit: Some(l), .. })
            } if l == 9.5
        ));

        assert!(Cli::try_parse_from([
            "vattenvakt",
            "thresholds",
            "set",
            "--region",
            "x",
            "--email",
            "a@b.c",
            "--clear-email"
        ])
        .is_err());
    }

    #[test]
    fn point_parsing() {
        assert_eq!(parse_point("13.08, 80.27").unwrap(), (13.08, 80.27));
        assert_eq!(parse_point("-33.9,18.4").unwrap(), (-33.9, 18.4));
        assert!(parse_point("13.08").is_err());
        assert!(parse_point("north,80").is_err());
    }

    #[tokio::test]
    async fn simulation_digest_is_deterministic() {
        let a = simulate(quick_config(), &args(12, 42)).await.unwrap();
        let b = simulate(quick_config(), &args(12, 42)).await.unwrap();
        let c = simulate(quick_config(), &args(12, 43)).await.unwrap();

        assert_eq!(a.digest, b.digest);
        assert_ne!(a.digest, c.digest);
        assert_eq!(a.digest.len(), 64);
        assert_eq!(a.latest.len(), 4);
        assert_eq!(a.alerts_fired, 0);
    }

    #[tokio::test]
    async fn thresholds_set_writes_the_file() {
        let dir = std::env::temp_dir().join(format!("vattenvakt-cli-{}-set", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mut config = quick_config();
        config.storage.thresholds_path = dir.join("thresholds.json");

        let set = SetArgs {
            region: "hyd-west".into(),
            limit: Some(6.5),
            email: Some("ops@example.org".into()),
            clear_email: false,
        };
        thresholds(config.clone(), ThresholdsCommand::Set(set))
            .await
            .unwrap();

        let saved = JsonFilePersistence::new(&config.storage.thresholds_path)
            .load()
            .await
            .unwrap();
        assert_eq!(saved["hyd-west"].limit, Some(6.5));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn thresholds_set_fails_when_the_file_cannot_be_written() {
        let dir = std::env::temp_dir().join(format!("vattenvakt-cli-{}-blocked", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let mut config = quick_config();
        config.storage.thresholds_path = blocker.join("thresholds.json");

        let set = SetArgs {
            region: "hyd-west".into(),
            limit: Some(6.5),
            email: None,
            clear_email: false,
        };
        let err = thresholds(config, ThresholdsCommand::Set(set))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not saved"), "{err}");
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn simulation_survives_an_unreadable_thresholds_file() {
        let dir = std::env::temp_dir().join(format!("vattenvakt-cli-{}-corrupt", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut config = quick_config();
        config.storage.thresholds_path = dir.join("thresholds.json");
        std::fs::write(&config.storage.thresholds_path, b"{ not json").unwrap();

        let outcome = simulate(config, &args(3, 42)).await.unwrap();
        assert_eq!(outcome.latest.len(), 4);
        assert_eq!(outcome.alerts_fired, 0);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn simulation_advances_the_virtual_clock() {
        let outcome = simulate(quick_config(), &args(6, 1)).await.unwrap();
        let expected = DateTime::<Utc>::from_timestamp(SIMULATION_EPOCH_SECS + 60, 0).unwrap();
        assert!(outcome
            .latest
            .iter()
            .all(|p| p.reading.timestamp == expected));
    }
}
