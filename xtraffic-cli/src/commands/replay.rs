//! `xtraffic replay`: run a recording through the pipeline.
//!
//! Simulated time starts at the first record and advances by a fixed step
//! per frame. Reports are released a configurable buffer period ahead of
//! simulated time, the way live channels deliver data ahead of the
//! rendered time. Instance states are written to stdout as JSON lines.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Args;
use serde_json::json;
use tracing::{debug, info};
use xtraffic::collaborators::NoAirports;
use xtraffic::geo::{Position, M_PER_FT};
use xtraffic::registry::TrackRegistry;
use xtraffic::report::{ReplayChannel, ReplaySource};

use crate::error::CliError;
use crate::render::{FlatTerrain, LinearFactory};
use crate::runner::CliRunner;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Recording in JSON lines
    pub file: PathBuf,

    /// Viewer latitude in decimal degrees
    #[arg(long, default_value = "0.0")]
    pub viewer_lat: f64,

    /// Viewer longitude in decimal degrees
    #[arg(long, default_value = "0.0")]
    pub viewer_lon: f64,

    /// Simulated seconds per frame
    #[arg(long, default_value = "1.0")]
    pub step: f64,

    /// Seconds reports are released ahead of simulated time
    #[arg(long, default_value = "60.0")]
    pub buffer: f64,

    /// Real-time pause between frames in milliseconds (0 runs flat out)
    #[arg(long, default_value = "0")]
    pub frame_ms: u64,

    /// Write instance states every N frames
    #[arg(long, default_value = "10")]
    pub print_every: u64,

    /// Terrain elevation in meters
    #[arg(long, default_value = "0.0")]
    pub elevation: f64,

    /// Channel definition as ID:NAME:PRIORITY, repeatable
    #[arg(long = "channel", value_parser = parse_channel)]
    pub channels: Vec<ReplayChannel>,
}

fn parse_channel(s: &str) -> Result<ReplayChannel, String> {
    let mut parts = s.splitn(3, ':');
    let (Some(id), Some(name), Some(priority)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("'{}' is not ID:NAME:PRIORITY", s));
    };
    let id = id.trim().parse().map_err(|_| format!("invalid channel id '{}'", id))?;
    let priority = priority
        .trim()
        .parse()
        .map_err(|_| format!("invalid priority '{}'", priority))?;
    Ok(ReplayChannel::new(id, name.trim(), priority))
}

pub fn run(args: ReplayArgs, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("replay");

    let mut source = ReplaySource::open(&args.file).map_err(|error| CliError::Recording {
        path: args.file.clone(),
        error,
    })?;
    for channel in &args.channels {
        source = source.with_channel(Arc::new(channel.clone()));
    }
    let Some(start) = source.next_ts() else {
        info!("Recording is empty");
        return Ok(());
    };

    let viewer = Position::new(args.viewer_lat, args.viewer_lon, Some(0.0), start);
    let terrain = FlatTerrain {
        elevation_m: args.elevation,
    };
    let mut registry = TrackRegistry::new(
        runner.config().clone(),
        Arc::new(NoAirports),
        runner.models().clone(),
        Arc::new(LinearFactory::new(viewer.clone())),
    )
    .map_err(CliError::Startup)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::SignalHandler(e.to_string()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut sim_time = start;
    let mut frame: u64 = 0;

    while !shutdown.load(Ordering::SeqCst) {
        source.set_horizon(sim_time + args.buffer);
        registry.pump_attributes(&mut source);
        registry.pump_positions(&mut source);

        let report = registry.frame(sim_time, &viewer, &terrain);
        if report != Default::default() {
            debug!(
                sim_time,
                created = report.created,
                evicted = report.evicted,
                removed = report.removed,
                "Maintenance"
            );
        }

        if args.print_every > 0 && frame % args.print_every == 0 {
            write_states(&mut out, &registry, sim_time).map_err(CliError::Output)?;
        }

        if source.is_exhausted() && registry.is_empty() {
            break;
        }

        frame += 1;
        sim_time += args.step;
        if args.frame_ms > 0 {
            thread::sleep(Duration::from_millis(args.frame_ms));
        }
    }

    registry.shutdown();
    info!(frames = frame, sim_time, "Replay finished");
    Ok(())
}

/// One JSON line per instance.
fn write_states(out: &mut impl Write, registry: &TrackRegistry, sim_time: f64) -> io::Result<()> {
    for key in registry.keys() {
        let Some(handle) = registry.get(&key) else {
            continue;
        };
        let Some(state) = handle.instance_state() else {
            continue;
        };
        let statics = handle.statics();
        let label = key.to_string();
        let line = json!({
            "sim_time": sim_time,
            "key": label,
            "id": statics.ac_id(&label),
            "route": statics.flight_route(),
            "lat": state.present.lat,
            "lon": state.present.lon,
            "alt_ft": state.present.alt_m.map(|m| m / M_PER_FT),
            "track": state.track,
            "speed_kt": state.speed_kt(),
            "vsi_ft": state.vsi_ft(),
            "on_ground": state.on_ground,
            "phase": state.phase.to_string(),
            "buffered": handle.len(),
        });
        writeln!(out, "{}", line)?;
    }
    Ok(())
}
