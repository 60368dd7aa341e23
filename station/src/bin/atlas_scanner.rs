//! Onsite Atlas scanner station.
//!
//! Scans attendee QR codes against the Atlas backend from a camera decoder
//! or from codes typed (or piped) on stdin, and lists abstracts of an event.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use onsite_atlas::abstracts::{AbstractService, AbstractStatus, AbstractSummary};
use onsite_atlas::api::{AtlasApi, HttpAtlasApi};
use onsite_atlas::cache::TtlCache;
use onsite_atlas::camera::{CameraDevice, CommandCamera};
use onsite_atlas::certificates::DirectoryCertificateSink;
use onsite_atlas::scanner::{ScanSource, ScannerAction};
use onsite_atlas::types::{EventId, ResourceOptionId, ResourceType, ScanResult, ScannerMode};
use onsite_atlas::{Config, ScannerStation, StationDeps, StationOptions};
use atlas_core::environment::SystemClock;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);
const CAMERA_WATCH_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Parser)]
#[command(name = "atlas-scanner", version, about = "Onsite Atlas resource scanner station")]
struct Cli {
    /// Event being staffed
    #[arg(long, env = "ATLAS_EVENT_ID")]
    event: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan codes and record redemptions
    Scan {
        /// Resource type handed out: food, kits, certificates, certificatePrinting
        #[arg(long = "type", default_value = "food")]
        resource_type: ResourceType,

        /// Option to record against; the first configured option otherwise
        #[arg(long)]
        option: Option<String>,

        /// Read codes from the camera decoder instead of stdin
        #[arg(long)]
        camera: bool,
    },

    /// List abstracts submitted to the event
    Abstracts {
        /// Only abstracts with this status (submitted, under-review, approved, rejected)
        #[arg(long, value_parser = parse_status)]
        status: Option<AbstractStatus>,
    },
}

fn parse_status(input: &str) -> Result<AbstractStatus, String> {
    AbstractStatus::ALL
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(input.trim()))
        .ok_or_else(|| format!("unknown status `{input}`"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    config.validate()?;
    let cli = Cli::parse();
    let event = EventId::new(cli.event.trim());

    let api: Arc<dyn AtlasApi> = Arc::new(HttpAtlasApi::new(
        config.api.base_url.clone(),
        config.api.token.clone(),
        config.api.timeout(),
    )?);
    tracing::info!(base_url = %config.api.base_url, %event, "Configuration loaded");

    match cli.command {
        Command::Scan {
            resource_type,
            option,
            camera,
        } => scan(&config, api, event, resource_type, option, camera).await,
        Command::Abstracts { status } => abstracts(&config, api, &event, status).await,
    }
}

async fn scan(
    config: &Config,
    api: Arc<dyn AtlasApi>,
    event: EventId,
    resource_type: ResourceType,
    option: Option<String>,
    use_camera: bool,
) -> anyhow::Result<()> {
    let Some(camera) = CommandCamera::from_command_line(&config.scanner.camera_command) else {
        bail!("ATLAS_CAMERA_COMMAND is empty");
    };
    let camera: Arc<dyn CameraDevice> = Arc::new(camera);

    let mut options = StationOptions::from_config(config);
    options.mode = if use_camera {
        ScannerMode::Camera
    } else {
        ScannerMode::Manual
    };

    let station = ScannerStation::new(
        StationDeps {
            api,
            camera,
            certificates: Arc::new(DirectoryCertificateSink::new(config.certificates.output_dir.clone())),
            clock: Arc::new(SystemClock),
        },
        options,
    );

    station
        .configure(
            event.clone(),
            resource_type,
            option.map(ResourceOptionId::new),
            SETTLE_TIMEOUT,
        )
        .await
        .context("configuring the scan station")?;

    let (selected, error) = station
        .state(|s| (s.selected().cloned(), s.options_error.clone()))
        .await;
    if let Some(error) = error {
        eprintln!("Warning: resource options could not be loaded: {error}");
    }
    match &selected {
        Some(option) => eprintln!("Scanning {} for {event}: {}", resource_type.label(), option.name),
        None => eprintln!("No {} option available for {event}", resource_type.label()),
    }

    let printer = {
        let mut actions = station.subscribe();
        tokio::spawn(async move {
            loop {
                match actions.recv().await {
                    Ok(ScannerAction::ScanCompleted { outcome, source, .. }) => {
                        print_result(&outcome.result, source);
                    },
                    Ok(ScannerAction::CertificateDelivered { location, .. }) => {
                        println!("  certificate: {location} (print in landscape orientation)");
                    },
                    Ok(ScannerAction::CertificateFailed { error, .. }) => println!("  certificate failed: {error}"),
                    Ok(_) => {},
                    Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Result printer lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    };

    if use_camera {
        station.send(ScannerAction::StartScanning).await?;
        eprintln!("Camera scanning; press Ctrl-C to stop");
        tokio::select! {
            signal = tokio::signal::ctrl_c() => signal.context("waiting for Ctrl-C")?,
            banner = camera_error(&station) => {
                eprintln!("{banner}");
                eprintln!("Re-run without --camera to type codes.");
            },
        }
    } else {
        eprintln!("Type or paste codes, one per line; end with Ctrl-D");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let outcome = station.submit_manual(line, SETTLE_TIMEOUT).await?;
            tracing::debug!(kind = ?outcome.result.kind, "Manual scan finished");
        }
        // Let certificate generation and refreshes finish
        station.wait_until_idle(SETTLE_TIMEOUT).await.ok();
    }

    let recorded = station.state(|s| s.scans_recorded).await;
    station.shutdown(Some(Duration::from_secs(5))).await?;
    printer.abort();
    eprintln!("{recorded} redemption(s) recorded");
    Ok(())
}

/// Resolves once the station reports the camera unusable
async fn camera_error(station: &ScannerStation) -> String {
    let mut ticks = tokio::time::interval(CAMERA_WATCH_INTERVAL);
    loop {
        ticks.tick().await;
        if let Some(banner) = station.state(|s| s.camera_error.clone()).await {
            return banner;
        }
    }
}

fn print_result(result: &ScanResult, source: ScanSource) {
    let mark = if result.success { "OK  " } else { "FAIL" };
    let via = match source {
        ScanSource::Camera(session) => session.to_string(),
        ScanSource::Manual => "manual".to_string(),
    };
    let who = result
        .registration
        .as_ref()
        .map(|r| format!(" {}", r.display_name()))
        .unwrap_or_default();
    println!("[{mark}] ({via}) {}{who}: {}", result.code, result.message);
    if let Some(details) = &result.details {
        println!("       {details}");
    }
}

async fn abstracts(
    config: &Config,
    api: Arc<dyn AtlasApi>,
    event: &EventId,
    status: Option<AbstractStatus>,
) -> anyhow::Result<()> {
    let clock = Arc::new(SystemClock);
    let service = AbstractService::new(
        api,
        Arc::new(TtlCache::new(config.cache.capacity, config.cache.ttl(), clock.clone())),
        Arc::new(TtlCache::new(config.cache.capacity, config.cache.ttl(), clock)),
    );

    let settings = service.settings(event).await.context("loading abstract settings")?;
    let all = service.list(event).await.context("loading abstracts")?;
    let summary = AbstractSummary::of(&all);

    println!(
        "{} abstract(s): {} submitted, {} under review, {} approved, {} rejected",
        summary.total(),
        summary.submitted,
        summary.under_review,
        summary.approved,
        summary.rejected
    );

    let shown = match status {
        Some(status) => service.by_status(event, status).await?,
        None => all.as_ref().clone(),
    };
    for item in &shown {
        let category = item.category_name(&settings).unwrap_or_else(|| "-".to_string());
        println!("{:<13} {:<24} {}", item.status.as_str(), category, item.title);
    }
    Ok(())
}
