use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use stream_source::{CaptureBackend, CaptureOptions, MockBackend, StreamOptions, StreamSource};
use tracing::{error, info};
use wall_config::{load_config, WallConfig};

mod wall;
use wall::Wall;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    Mock,
    Opencv,
}

#[derive(Parser, Debug)]
#[command(
    name = "mvw",
    version,
    about = "Multi-source video wall: keeps every stream alive and polls the latest frames"
)]
struct Cli {
    /// Wall configuration (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Extra source identifier (device index, file or URL); may be repeated
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Capture backend
    #[arg(long, value_enum, default_value_t = Backend::Mock)]
    backend: Backend,

    /// Surface size the grid is laid out on, as WIDTHxHEIGHT
    #[arg(long, default_value = "1920x1080")]
    surface: String,

    /// Render tick in milliseconds (overrides the config)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration_s: Option<u64>,

    /// Print tile status as JSON lines with every summary
    #[arg(long)]
    json: bool,
}

const SUMMARY_EVERY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => WallConfig::default(),
    };
    let mut identifiers = config
        .identifiers()
        .context("building source identifiers")?;
    identifiers.extend(cli.sources.iter().cloned());
    if identifiers.is_empty() {
        return Err(anyhow::anyhow!(
            "no sources: pass --config with a sources list or --source"
        ));
    }

    let surface = parse_surface(&cli.surface)?;
    let tick = Duration::from_millis(cli.tick_ms.unwrap_or(config.tick_ms).max(1));
    let options = stream_options(&config);

    info!(
        sources = identifiers.len(),
        backend = ?cli.backend,
        tick_ms = tick.as_millis() as u64,
        "mvw starting"
    );

    match cli.backend {
        Backend::Mock => {
            let make = || MockBackend::new(640, 360).read_delay(Duration::from_millis(40));
            run(build_sources(&identifiers, make, &options), surface, tick, &cli).await
        }
        Backend::Opencv => {
            #[cfg(feature = "opencv")]
            {
                let make = || stream_source::OpenCvBackend;
                run(build_sources(&identifiers, make, &options), surface, tick, &cli).await
            }
            #[cfg(not(feature = "opencv"))]
            {
                Err(anyhow::anyhow!("OpenCV backend not enabled at compile time"))
            }
        }
    }
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn parse_surface(spec: &str) -> Result<(u32, u32)> {
    let (w, h) = spec
        .split_once('x')
        .ok_or_else(|| anyhow::anyhow!("surface must be WIDTHxHEIGHT, e.g. 1920x1080"))?;
    let width: u32 = w.trim().parse().map_err(|_| anyhow::anyhow!("invalid width"))?;
    let height: u32 = h.trim().parse().map_err(|_| anyhow::anyhow!("invalid height"))?;
    if width == 0 || height == 0 {
        return Err(anyhow::anyhow!("surface must be non-empty"));
    }
    Ok((width, height))
}

fn stream_options(config: &WallConfig) -> StreamOptions {
    let settings = &config.stream;
    StreamOptions {
        capture: CaptureOptions {
            buffer_depth: settings.buffer_depth,
            open_timeout: settings.open_timeout_ms.map(Duration::from_millis),
            read_timeout: settings.read_timeout_ms.map(Duration::from_millis),
        },
        reopen_threshold: settings.reopen_threshold,
        retry_delay: Duration::from_millis(settings.retry_delay_ms),
    }
}

fn build_sources<B: CaptureBackend>(
    identifiers: &[String],
    make: impl Fn() -> B,
    options: &StreamOptions,
) -> Vec<StreamSource<B>> {
    identifiers
        .iter()
        .map(|id| StreamSource::with_options(id.clone(), make(), options.clone()))
        .collect()
}

async fn run<B: CaptureBackend>(
    sources: Vec<StreamSource<B>>,
    surface: (u32, u32),
    tick: Duration,
    cli: &Cli,
) -> Result<()> {
    let mut wall = Wall::new(sources, surface);
    info!(
        tiles = wall.len(),
        rows = wall.grid().rows,
        columns = wall.grid().columns,
        "wall ready"
    );

    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut summary_at = tokio::time::Instant::now() + SUMMARY_EVERY;
    let deadline = cli
        .duration_s
        .map(|s| tokio::time::Instant::now() + Duration::from_secs(s));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let summary = wall.tick();
                let now = tokio::time::Instant::now();
                if now >= summary_at {
                    summary_at = now + SUMMARY_EVERY;
                    info!(video = summary.video, no_video = summary.placeholder, "wall summary");
                    if cli.json {
                        for status in wall.status() {
                            match serde_json::to_string(&status) {
                                Ok(line) => println!("{line}"),
                                Err(e) => error!("status serialization failed: {e}"),
                            }
                        }
                    }
                }
                if deadline.is_some_and(|d| now >= d) {
                    info!("duration elapsed");
                    break;
                }
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    error!("ctrl-c handler failed: {e}");
                }
                info!("interrupted");
                break;
            }
        }
    }

    info!("shutting down streams");
    tokio::task::spawn_blocking(move || wall.shutdown())
        .await
        .context("joining shutdown task")?;
    info!("mvw stopped");
    Ok(())
}
