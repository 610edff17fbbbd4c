//! splatcam playback CLI
//!
//! Loads splat scenes (or generates synthetic ones), plays their camera
//! trajectories against a virtual clock and reports or exports the result.

use clap::Parser;
use splatcam_core::{
    load_scene, prepare_scene, LoadedScene, LoopMode, PathType, PlayerConfig, TrajectoryParams,
    ViewerSession,
};
use splatcam_env::FileSource;
use splatcam_sim::{PlaybackRunner, RunConfig, RunReport, SimError, SyntheticScene};
use std::path::Path;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// splatcam trajectory playback CLI
#[derive(Parser, Debug)]
#[command(name = "splatcam-sim")]
#[command(about = "Generate and play camera trajectories for Gaussian splat scenes", long_about = None)]
struct Args {
    /// PLY scene files; a synthetic scene is generated when none are given
    #[arg(short, long)]
    input: Vec<String>,

    /// Seed for synthetic scenes and tick jitter
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Splats in the synthetic scene
    #[arg(long, default_value = "5000")]
    splats: usize,

    /// Path type (swipe, shake, rotate, rotate_forward, dolly, all);
    /// defaults to the one in --params
    #[arg(short, long)]
    path_type: Option<String>,

    /// JSON file with trajectory parameters
    #[arg(long)]
    params: Option<String>,

    /// Trajectory frames per second
    #[arg(long, default_value = "30")]
    fps: f32,

    /// Render ticks per second
    #[arg(long, default_value = "60")]
    render_hz: f64,

    /// End-of-path behavior (wrap, once)
    #[arg(long = "loop", default_value = "wrap")]
    loop_mode: String,

    /// Virtual seconds to play each trajectory
    #[arg(short, long, default_value = "4")]
    duration: f64,

    /// Relative render tick jitter in [0, 1)
    #[arg(long, default_value = "0")]
    jitter: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the recorded playback to a JSON file
    #[arg(long)]
    export: Option<String>,
}

/// One scene played with one path type.
struct RunResult {
    scene: String,
    path_type: PathType,
    report: RunReport,
}

fn parse_loop_mode(s: &str) -> Result<LoopMode, SimError> {
    match s {
        "wrap" => Ok(LoopMode::Wrap),
        "once" => Ok(LoopMode::Once),
        other => Err(SimError::invalid(format!("Unknown loop mode: {}", other))),
    }
}

fn base_params(args: &Args) -> Result<TrajectoryParams, SimError> {
    match &args.params {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Ok(TrajectoryParams::from_json(&json)?)
        }
        None => Ok(TrajectoryParams::default()),
    }
}

fn path_types(args: &Args, params: &TrajectoryParams) -> Result<Vec<PathType>, SimError> {
    match args.path_type.as_deref() {
        None => Ok(vec![params.path_type]),
        Some("all") => Ok(PathType::all()),
        Some(name) => Ok(vec![name.parse().map_err(SimError::InvalidArgument)?]),
    }
}

/// Splits a path into a source root and a single-component locator.
fn source_for(input: &str) -> Result<(FileSource, String), SimError> {
    let path = Path::new(input);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| SimError::invalid(format!("not a file path: {}", input)))?;
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => ".".into(),
    };
    Ok((FileSource::new(root), name))
}

async fn load_inputs(args: &Args) -> Result<Vec<(String, LoadedScene)>, SimError> {
    if args.input.is_empty() {
        let label = format!("synthetic:{}", args.seed);
        let bytes = SyntheticScene::new(args.seed)
            .with_splats(args.splats)
            .to_ply_bytes();
        info!("Generated {} ({} splats, {} bytes)", label, args.splats, bytes.len());
        return Ok(vec![(label, prepare_scene(&bytes))]);
    }

    let mut scenes = Vec::with_capacity(args.input.len());
    for input in &args.input {
        let (source, locator) = source_for(input)?;
        let scene = load_scene(&source, &locator).await?;
        debug!(
            "{}: {} splats, metadata={}, depth=({:.3}, {:.3}, {:.3})",
            input,
            scene.splat_count,
            scene.metadata.present,
            scene.depth.near,
            scene.depth.focus,
            scene.depth.far
        );
        scenes.push((input.clone(), scene));
    }
    Ok(scenes)
}

async fn run(args: &Args) -> Result<Vec<RunResult>, SimError> {
    let params = base_params(args)?;
    let paths = path_types(args, &params)?;
    let player_config = PlayerConfig {
        playback_rate_hz: args.fps,
        loop_mode: parse_loop_mode(&args.loop_mode)?,
        ..Default::default()
    };
    let run_config = RunConfig {
        render_hz: args.render_hz,
        duration_secs: args.duration,
        jitter: args.jitter,
        seed: args.seed,
    };
    run_config.validate()?;

    let scenes = load_inputs(args).await?;
    if args.export.is_some() && scenes.len() * paths.len() > 1 {
        return Err(SimError::invalid("--export only supports a single scene and path type"));
    }

    let mut results = Vec::new();
    for (label, scene) in &scenes {
        for path_type in &paths {
            let mut session = ViewerSession::new(
                TrajectoryParams {
                    path_type: *path_type,
                    ..params.clone()
                },
                player_config.clone(),
            );
            let token = session.begin_load();
            session.apply_load(token, scene.clone());

            let mut runner = PlaybackRunner::new(run_config.clone())?;
            let report = runner.run(&mut session, label);

            if let Some(export_path) = &args.export {
                report.export.write_to_file(export_path)?;
                info!("Exported {} frames to {}", report.export.frames.len(), export_path);
            }

            results.push(RunResult {
                scene: label.clone(),
                path_type: *path_type,
                report,
            });
        }
    }
    Ok(results)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("splatcam playback v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let results = match run(&args).await {
        Ok(results) => results,
        Err(e) => {
            error!("✗ {}", e);
            std::process::exit(1);
        }
    };

    let total = results.len();
    let failed: Vec<&RunResult> = results.iter().filter(|r| !r.report.passed()).collect();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed.len(),
            "failed": failed.len(),
            "results": results.iter().map(|r| {
                let summary = r.report.export.summary.as_ref();
                serde_json::json!({
                    "scene": r.scene,
                    "path_type": r.path_type.name(),
                    "passed": r.report.passed(),
                    "frames": r.report.export.path.len(),
                    "frames_visited": r.report.frames_visited,
                    "ticks": r.report.ticks,
                    "rendered": r.report.rendered,
                    "final_state": r.report.final_state,
                    "depth": summary.map(|s| s.depth),
                    "offset": summary.map(|s| s.offset),
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        for r in &results {
            if r.report.passed() {
                info!(
                    "✓ {} [{}] {} frames, {} visited in {} ticks",
                    r.scene,
                    r.path_type,
                    r.report.export.path.len(),
                    r.report.frames_visited,
                    r.report.ticks
                );
            } else {
                error!("✗ {} [{}] produced no trajectory", r.scene, r.path_type);
            }
        }

        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed.is_empty() {
            info!("✅ All {} runs produced a trajectory", total);
        } else {
            error!("❌ {}/{} runs produced no trajectory", failed.len(), total);
        }
    }

    if !failed.is_empty() {
        std::process::exit(1);
    }
}
