//! huewatch command-line front end.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use time::OffsetDateTime;
use tracing::debug;

use huewatch_core::{
    get_app_data_dir, load_colors, load_coords, parse_region, save_colors, save_coords, ColorSpec,
    ScreenSampler, WatchConfig, WatchEvent, WatchState, Watcher,
};
use huewatch_platform::{native_sampler, save_region, SoundAlert, StubSampler};

/// Sound file picked up from the app data directory when `--sound` is
/// not given. Played only if it exists.
const DEFAULT_SOUND_FILE: &str = "alert.mp3";

#[derive(Parser, Debug)]
#[command(
    name = "huewatch",
    version,
    about = "Alert when a screen region or pixel turns a configured color"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a region or point list and alert on color matches
    Watch(WatchArgs),
    /// Persist coordinate and color text for later runs
    Save(SaveArgs),
    /// Capture the configured region once and write it to an image file
    Snapshot(SnapshotArgs),
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Screen region as x/y/width/height
    #[arg(long, conflicts_with = "points")]
    region: Option<String>,

    /// File with one x/y point per line
    #[arg(long)]
    points: Option<PathBuf>,

    /// Extra target colors or hex prefixes, comma separated (region mode)
    #[arg(long)]
    colors: Option<String>,

    /// Target color for point mode (e.g. "#123456")
    #[arg(long, requires = "points")]
    color: Option<String>,

    /// Poll interval in milliseconds (default: 1000 region, 5000 points)
    #[arg(long)]
    interval: Option<u64>,

    /// Sound file played on a match
    #[arg(long)]
    sound: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Use the stub sampler instead of real screen capture
    #[arg(long, hide = true)]
    stub: bool,
}

#[derive(Args, Debug)]
struct SaveArgs {
    /// Coordinate text (region line or point lines)
    #[arg(long)]
    coords: String,

    /// Color text, comma separated specs
    #[arg(long, default_value = "")]
    colors: String,
}

#[derive(Args, Debug)]
struct SnapshotArgs {
    /// Screen region as x/y/width/height (default: saved coordinates)
    #[arg(long)]
    region: Option<String>,

    /// Output file; format follows the extension (default: timestamped bmp)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Use the stub sampler instead of real screen capture
    #[arg(long, hide = true)]
    stub: bool,
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "huewatch=info,huewatch_core=info,huewatch_platform=info".into()
            }),
        )
        .try_init();
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Watch(args) => run_watch(args),
        Commands::Save(args) => run_save(args),
        Commands::Snapshot(args) => run_snapshot(args),
    }
}

fn run_watch(args: WatchArgs) -> Result<()> {
    let config = build_config(&args)?;
    let sampler = pick_sampler(args.stub);
    let sound = args
        .sound
        .clone()
        .or_else(|| Some(get_app_data_dir().join(DEFAULT_SOUND_FILE)));
    let sink = Arc::new(SoundAlert::new(sound));

    let mut watcher = Watcher::new(sampler, sink);
    watcher
        .start(config)
        .context("could not start watch session")?;

    let stop = watcher
        .stop_signal()
        .context("watch session has no stop handle")?;
    ctrlc::set_handler(move || stop.request()).context("could not install Ctrl-C handler")?;

    loop {
        if let Some(event) = watcher.recv_timeout(Duration::from_millis(250)) {
            print_event(&event, args.json);
        }
        if matches!(watcher.state(), WatchState::Stopped | WatchState::Failed) {
            break;
        }
    }
    // drain whatever the loop emitted on its way out
    while let Some(event) = watcher.try_recv() {
        print_event(&event, args.json);
    }

    match watcher.wait() {
        WatchState::Stopped => Ok(()),
        WatchState::Failed => bail!("watch session failed: screen capture error"),
        other => bail!("watch session ended unexpectedly in state {:?}", other),
    }
}

fn build_config(args: &WatchArgs) -> Result<WatchConfig> {
    let mut config = if let Some(path) = &args.points {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("could not read point list {}", path.display()))?;
        let spec = args
            .color
            .as_deref()
            .ok_or_else(|| anyhow!("point mode needs --color"))?;
        let target =
            ColorSpec::parse(spec).ok_or_else(|| anyhow!("invalid color spec '{}'", spec))?;
        WatchConfig::points_from_text(&text, target)?
    } else {
        let coord_text = match &args.region {
            Some(text) => text.clone(),
            None => load_coords()
                .ok_or_else(|| anyhow!("no saved coordinates; pass --region or run 'huewatch save'"))?,
        };
        let color_text = match &args.colors {
            Some(text) => text.clone(),
            None => load_colors().unwrap_or_default(),
        };
        WatchConfig::region_from_text(&coord_text, &color_text)?
    };

    if let Some(ms) = args.interval {
        config = config.with_interval(Duration::from_millis(ms));
    }
    Ok(config)
}

fn pick_sampler(stub: bool) -> Arc<dyn ScreenSampler> {
    if stub {
        Arc::new(StubSampler)
    } else {
        native_sampler()
    }
}

fn print_event(event: &WatchEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{}", line);
        }
        return;
    }
    match event {
        WatchEvent::MatchFound(detection) => println!("{}", detection.message()),
        WatchEvent::CaptureRetry { attempt, message } => {
            eprintln!("capture failed (attempt {}): {}", attempt, message)
        }
        WatchEvent::Error { message } => eprintln!("error: {}", message),
        WatchEvent::StateChanged { old, new } => debug!(?old, ?new, "state changed"),
    }
}

fn run_save(args: SaveArgs) -> Result<()> {
    let coords_path = save_coords(&args.coords)?;
    let colors_path = save_colors(&args.colors)?;
    println!("saved {}", coords_path.display());
    println!("saved {}", colors_path.display());
    Ok(())
}

fn run_snapshot(args: SnapshotArgs) -> Result<()> {
    let coord_text = match &args.region {
        Some(text) => text.clone(),
        None => load_coords()
            .ok_or_else(|| anyhow!("no saved coordinates; pass --region or run 'huewatch save'"))?,
    };
    let region = parse_region(&coord_text)?;
    let out = args.out.clone().unwrap_or_else(default_snapshot_name);

    let sampler = pick_sampler(args.stub);
    save_region(sampler.as_ref(), &region, &out)?;
    println!("{}", out.display());
    Ok(())
}

fn default_snapshot_name() -> PathBuf {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let fmt = time::macros::format_description!("[hour][minute][second][subsecond digits:3]");
    let stamp = now.format(fmt).unwrap_or_else(|_| "now".into());
    PathBuf::from(format!("snapshot_{}.bmp", stamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_watch_region_and_points_conflict() {
        let result = Cli::try_parse_from([
            "huewatch",
            "watch",
            "--region",
            "0/0/10/10",
            "--points",
            "points.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_watch_point_mode_args() {
        let cli = Cli::try_parse_from([
            "huewatch",
            "watch",
            "--points",
            "points.txt",
            "--color",
            "#123456",
            "--interval",
            "250",
        ])
        .unwrap();
        match cli.command {
            Commands::Watch(args) => {
                assert_eq!(args.points, Some(PathBuf::from("points.txt")));
                assert_eq!(args.color.as_deref(), Some("#123456"));
                assert_eq!(args.interval, Some(250));
            }
            _ => panic!("expected watch subcommand"),
        }
    }
}
