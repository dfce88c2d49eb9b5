use clap::Parser;
use log::{error, info};
use smplh_retarget::retarget_core::{
    codec::{
        motion_npz::{ClipSummary, MotionNpzCodec},
        retargeted_npz::RetargetedNpzWriter,
    },
    common::{retarget_options::RetargetOptions, types::AlignMode},
    pipeline::{
        batch::{discover_inputs, BatchRunner, CancelToken},
        clip::ClipPipeline,
    },
};
use smplh_retarget::retarget_utils::logging::{setup_logger, LogLevel};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = "Retargets AMASS SMPL-H npz clips onto a fixed rest pose, one output npz per clip")]
struct Args {
    /// Input npz file, or a folder searched recursively for npz files
    #[arg(required_unless_present = "export_target_rest")]
    input: Option<PathBuf>,
    /// Custom target reference (npz with J_ABSOLUTE, or json). Falls back to
    /// the built-in A-pose when missing or invalid.
    #[arg(short, long)]
    target: Option<PathBuf>,
    /// Output folder. Defaults to the folder of each input.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Process at most this many files
    #[arg(short, long)]
    limit: Option<usize>,
    /// JSON file with retarget options. Flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// none, translate or override
    #[arg(long)]
    align: Option<AlignMode>,
    /// JSON pose file frame 0 is overridden with instead of the target rest
    /// pose (only with --align override)
    #[arg(long)]
    json_pose: Option<PathBuf>,
    /// Do not correct for differing rest bone directions
    #[arg(long)]
    no_basis_correction: bool,
    /// Unit scale applied to a custom target, 0.01 for centimetres
    #[arg(long)]
    reference_scale: Option<f64>,
    /// Also write world joint positions
    #[arg(long)]
    positions: bool,
    /// Print a JSON summary of every input instead of retargeting
    #[arg(long)]
    inspect: bool,
    /// Write the target rest pose as a single frame target_reference.npz
    #[arg(long)]
    export_target_rest: bool,
    /// Process files one after the other
    #[arg(long)]
    sequential: bool,
    #[arg(long, default_value = "info")]
    log_level: LogLevel,
}

fn load_options(args: &Args) -> Result<RetargetOptions, String> {
    let mut options = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
            RetargetOptions::from_json_str(&text).map_err(|e| format!("invalid config {}: {e}", path.display()))?
        }
        None => RetargetOptions::default(),
    };
    if let Some(align) = args.align {
        options.align_mode = align;
    }
    if let Some(pose) = &args.json_pose {
        options.first_frame_pose = Some(pose.clone());
    }
    if args.no_basis_correction {
        options.rest_basis_correction = false;
    }
    if let Some(scale) = args.reference_scale {
        options.reference_scale = scale;
    }
    if args.positions {
        options.write_joint_positions = true;
    }
    Ok(options)
}

fn inspect(files: &[PathBuf], default_frame_rate: f32) -> i32 {
    let mut failed = 0;
    for path in files {
        match MotionNpzCodec::from_file(path, default_frame_rate) {
            Ok(clip) => match serde_json::to_string_pretty(&ClipSummary::from_clip(&clip)) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    error!("{}: {e}", path.display());
                    failed += 1;
                }
            },
            Err(e) => {
                error!("{}: {e}", path.display());
                failed += 1;
            }
        }
    }
    i32::from(failed > 0)
}

fn run(args: &Args) -> i32 {
    let options = match load_options(args) {
        Ok(options) => options,
        Err(msg) => {
            error!("{msg}");
            return 2;
        }
    };

    let files = match &args.input {
        Some(input) => match discover_inputs(input, args.limit) {
            Ok(files) => files,
            Err(e) => {
                error!("{e}");
                return 2;
            }
        },
        None => Vec::new(),
    };

    if args.inspect {
        return inspect(&files, options.default_frame_rate);
    }

    let pipeline = match ClipPipeline::smplh(args.target.as_deref(), options) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("cannot build the skeletons: {e}");
            return 2;
        }
    };

    if args.export_target_rest {
        let dir = args.output.clone().unwrap_or_else(|| PathBuf::from("."));
        let mut writer = RetargetedNpzWriter::new(&dir);
        match pipeline.export_target_rest_pose(&mut writer) {
            Ok(assembled) => {
                if let Some(path) = assembled.location {
                    println!("- Exported target rest pose to {}", path.display());
                }
            }
            Err(e) => {
                error!("exporting the target rest pose failed: {e}");
                return 1;
            }
        }
        if files.is_empty() {
            return 0;
        }
    }

    if files.is_empty() {
        info!("no npz files found");
        return 0;
    }
    info!("found {} npz file(s) to process", files.len());

    let mut runner = BatchRunner::new(pipeline).with_parallel_clips(!args.sequential);
    if let Some(input) = args.input.as_deref().filter(|input| input.is_dir()) {
        runner = runner.with_input_root(input);
    }
    let summary = runner.run(&files, args.output.as_deref(), &CancelToken::new());
    println!(
        "- Processed {} file(s): {} succeeded, {} failed",
        summary.processed, summary.succeeded, summary.failed
    );
    for failure in &summary.failures {
        println!("  {} ({}): {}", failure.path.display(), failure.reason.stage, failure.reason.message);
    }
    summary.exit_code()
}

fn main() {
    let args = Args::parse();
    setup_logger(args.log_level, None);
    std::process::exit(run(&args));
}
