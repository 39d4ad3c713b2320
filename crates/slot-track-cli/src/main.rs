use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, LevelFilter};

use slot_track::{
    parse_slot_coords, ArtifactWriter, DebugSinks, DirFrameSource, FrameSource, ReplayEstimator,
    Tracker, TrackerConfig, TriMesh, Visualizer,
};

/// Track a rigid object across an RGB-D frame sequence and derive
/// camera-frame poses for its slots.
#[derive(Parser, Debug)]
#[command(name = "slot-track", version, about)]
struct Args {
    /// Scene directory: rgb/, depth/, masks/ and cam_K.txt.
    #[arg(long)]
    scene_dir: PathBuf,

    /// Object mesh (.obj), used for the debug overlay and mesh export.
    #[arg(long)]
    mesh_file: PathBuf,

    /// Directory of recorded object poses to replay through the
    /// estimator seam.
    #[arg(long)]
    poses_dir: PathBuf,

    /// Slot coordinates as a JSON list of [x, y] pairs in the object frame.
    #[arg(
        long,
        default_value = "[[-0.07,-0.06], [0.07,-0.06], [0.07,0.06], [-0.07,0.06]]"
    )]
    slot_coords: String,

    /// Refinement iterations for registration.
    #[arg(long, default_value_t = 5)]
    est_refine_iter: usize,

    /// Refinement iterations per tracking update.
    #[arg(long, default_value_t = 2)]
    track_refine_iter: usize,

    /// Debug level: 1 overlay, 2 also persist overlays, 3 also export the
    /// transformed mesh and scene cloud.
    #[arg(long, default_value_t = 1)]
    debug: u8,

    /// Output root for poses and debug artifacts.
    #[arg(long, default_value = "debug")]
    debug_dir: PathBuf,

    /// Keep previous contents of the debug dir instead of clearing it.
    #[arg(long)]
    keep_debug_dir: bool,

    /// Log verbosity.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _ = slot_track_core::init_with_level(args.log_level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            let mut source = std::error::Error::source(err.as_ref());
            while let Some(cause) = source {
                error!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let slots = parse_slot_coords(&args.slot_coords)?;
    let mesh = TriMesh::load_obj(&args.mesh_file)?;
    let source = DirFrameSource::open(&args.scene_dir)?;
    let estimator = ReplayEstimator::open(&args.poses_dir)?;
    info!(
        "scene {} with {} frames, {} slots",
        args.scene_dir.display(),
        source.frame_count(),
        slots.len()
    );

    let writer = if args.keep_debug_dir {
        ArtifactWriter::create(&args.debug_dir)?
    } else {
        ArtifactWriter::clear_and_create(&args.debug_dir)?
    };

    let sinks = DebugSinks::from_level(args.debug);
    let mut vis = if sinks.any() {
        Some(Visualizer::new(
            sinks,
            *source.intrinsics(),
            mesh,
            &args.debug_dir,
        )?)
    } else {
        None
    };

    let config = TrackerConfig {
        register_iterations: args.est_refine_iter,
        track_iterations: args.track_refine_iter,
        ..TrackerConfig::default()
    };
    let mut tracker = Tracker::new(source, estimator, slots, config);
    let summary = tracker.run(&writer, vis.as_mut())?;

    info!(
        "done: {} frames processed, {} skipped, last id {}",
        summary.frames_processed,
        summary.frames_skipped,
        summary.last_frame_id.as_deref().unwrap_or("-")
    );
    Ok(())
}
