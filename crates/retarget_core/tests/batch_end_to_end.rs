use approx::assert_relative_eq;
use ndarray as nd;
use retarget_core::{
    codec::{
        motion_npz::MotionNpzCodec,
        reference::ReferenceCodec,
        retargeted_npz::load_retargeted_npz,
    },
    common::{
        animation::MotionClip,
        rest_pose::Skeleton,
        retarget_options::RetargetOptions,
        types::AlignMode,
        validation::{validate_retargeted, BONE_LENGTH_TOLERANCE_M},
    },
    error::{InputError, PipelineError, ReferenceError, SinkError},
    pipeline::{
        batch::{discover_inputs, BatchRunner, CancelToken},
        clip::{ClipPipeline, ClipStage, Step},
    },
};
use retarget_utils::vector::{UnitQuaterniond, Vector3d};
use std::path::{Path, PathBuf};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("retarget_core_e2e_{}_{name}", std::process::id()));
    std::fs::remove_dir_all(&dir).ok();
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn motion(name: &str, num_frames: usize, num_joints: usize, seed: u64) -> MotionClip {
    let mut state = seed | 1;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state % 20_000) as f64 / 20_000.0 - 0.5
    };
    let poses = nd::Array3::from_shape_simple_fn((num_frames, num_joints, 3), &mut next);
    let trans = nd::Array2::from_shape_fn((num_frames, 3), |(f, c)| 0.4 + 0.02 * f as f64 * (c as f64 + 1.0));
    MotionClip::new_from_matrices(poses, trans, 120.0, Some(nd::Array1::zeros(16)), name).unwrap()
}

fn write_motion(dir: &Path, clip: &MotionClip) -> PathBuf {
    let path = dir.join(format!("{}.npz", clip.name));
    MotionNpzCodec::to_file(clip, &path).unwrap();
    path
}

#[test]
fn batch_writes_valid_clips_and_reports_bad_ones() {
    let input = scratch("in");
    let output = scratch("out");
    std::fs::create_dir_all(input.join("nested")).unwrap();
    write_motion(&input, &motion("walk", 12, 52, 7));
    write_motion(&input.join("nested"), &motion("jump", 9, 52, 11));
    write_motion(&input, &motion("body_only", 4, 22, 13));

    let files = discover_inputs(&input, None).unwrap();
    assert_eq!(files.len(), 3);

    let runner = BatchRunner::new(ClipPipeline::smplh(None, RetargetOptions::default()).unwrap());
    let summary = runner.run(&files, Some(&output), &CancelToken::new());
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.exit_code(), 1);
    assert!(summary.failures[0].path.ends_with("body_only.npz"));
    assert_eq!(summary.failures[0].reason.stage, Step::Load);

    let target = Skeleton::smplh_target().unwrap();
    let reference_root = target.rest.root_position(&target.tree);
    for name in ["walk", "jump"] {
        let written = output.join(format!("{name}_retargeted.npz"));
        assert!(written.exists(), "{} missing", written.display());
        let clip = load_retargeted_npz(&written).unwrap();
        assert_eq!(clip.num_joints(), 52);
        assert!((clip.frame_rate - 120.0).abs() < f32::EPSILON);

        let report = validate_retargeted(&clip, &target, Some(&reference_root), true).unwrap();
        assert!(report.max_bone_length_error < BONE_LENGTH_TOLERANCE_M, "{report:?}");
        assert!(report.passed, "{name}: {report:?}");
    }

    // outputs are never rediscovered as inputs
    assert_eq!(discover_inputs(&output, None).unwrap().len(), 0);

    std::fs::remove_dir_all(&input).ok();
    std::fs::remove_dir_all(&output).ok();
}

#[test]
fn outputs_land_next_to_inputs_without_out_dir() {
    let dir = scratch("beside");
    let input = write_motion(&dir, &motion("spin", 5, 52, 3));
    let runner = BatchRunner::new(ClipPipeline::smplh(None, RetargetOptions::default()).unwrap()).with_parallel_clips(false);
    let report = runner.process_file(&input, None).unwrap();
    match report.stage {
        ClipStage::Assembled(assembled) => assert_eq!(assembled.location, Some(dir.join("spin_retargeted.npz"))),
        other => panic!("unexpected stage {other:?}"),
    }
    assert!(input.exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn custom_reference_in_centimetres_is_used() {
    let dir = scratch("reference");
    let target = Skeleton::smplh_target().unwrap();
    let lifted = target.rest.scaled(100.0);
    let reference = dir.join("lifted.npz");
    ReferenceCodec::to_npz(&lifted, &target.tree, &reference).unwrap();

    let options = RetargetOptions {
        reference_scale: 0.01,
        ..RetargetOptions::default()
    };
    let pipeline = ClipPipeline::smplh(Some(&reference), options).unwrap();
    assert!(pipeline.reference_fallback().is_none());
    assert_relative_eq!(pipeline.reference_root(), target.rest.root_position(&target.tree), epsilon = 1e-9);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn broken_reference_falls_back_to_a_pose() {
    let dir = scratch("broken_reference");
    let reference = dir.join("broken.npz");
    std::fs::write(&reference, b"garbage").unwrap();
    let pipeline = ClipPipeline::smplh(Some(&reference), RetargetOptions::default()).unwrap();
    assert!(matches!(pipeline.reference_fallback(), Some(ReferenceError::Unreadable(_))));
    assert_relative_eq!(pipeline.reference_root(), Vector3d::new(0.0, 0.0, 0.95636375), epsilon = 1e-9);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn translate_only_keeps_first_frame_motion() {
    let options = RetargetOptions {
        align_mode: AlignMode::TranslateRoot,
        reference_root: Some([1.0, 2.0, 3.0]),
        ..RetargetOptions::default()
    };
    let pipeline = ClipPipeline::smplh(None, options).unwrap();
    let source = motion("turn", 4, 52, 5);
    let processed = pipeline.process_clip(&source).unwrap();
    let frames = &processed.clip.frames;
    assert_relative_eq!(frames[0].root_position, Vector3d::new(1.0, 2.0, 3.0), epsilon = 1e-9);
    assert!(frames[0].local_rotations.iter().any(|q| q.angle_to(&UnitQuaterniond::identity()) > 1e-3));

    let step = source.root_translation(3) - source.root_translation(0);
    assert_relative_eq!(frames[3].root_position - frames[0].root_position, step, epsilon = 1e-9);
}

#[test]
fn wrong_joint_count_is_an_input_error() {
    let pipeline = ClipPipeline::smplh(None, RetargetOptions::default()).unwrap();
    let err = pipeline.process_clip(&motion("hands_missing", 2, 22, 9)).err().unwrap();
    assert!(matches!(err, PipelineError::Input(InputError::WrongJointCount { expected: 52, got: 22 })));
}

fn same_stem_in_two_folders(name: &str) -> (PathBuf, Vec<PathBuf>) {
    let input = scratch(name);
    for (sub, frames, seed) in [("a", 5, 21), ("b", 9, 23)] {
        std::fs::create_dir_all(input.join(sub)).unwrap();
        write_motion(&input.join(sub), &motion("walk", frames, 52, seed));
    }
    let files = discover_inputs(&input, None).unwrap();
    assert_eq!(files.len(), 2);
    (input, files)
}

#[test]
fn same_stem_outputs_mirror_input_folders() {
    let (input, files) = same_stem_in_two_folders("mirror_in");
    let output = scratch("mirror_out");
    let runner = BatchRunner::new(ClipPipeline::smplh(None, RetargetOptions::default()).unwrap()).with_input_root(&input);
    let summary = runner.run(&files, Some(&output), &CancelToken::new());
    assert_eq!((summary.succeeded, summary.failed), (2, 0));

    for (sub, frames) in [("a", 5), ("b", 9)] {
        let written = output.join(sub).join("walk_retargeted.npz");
        assert_eq!(load_retargeted_npz(&written).unwrap().num_frames(), frames, "{}", written.display());
    }
    assert!(!output.join("walk_retargeted.npz").exists());
    std::fs::remove_dir_all(&input).ok();
    std::fs::remove_dir_all(&output).ok();
}

#[test]
fn colliding_outputs_fail_the_later_file() {
    let (input, files) = same_stem_in_two_folders("collide_in");
    let output = scratch("collide_out");
    let runner = BatchRunner::new(ClipPipeline::smplh(None, RetargetOptions::default()).unwrap());
    let summary = runner.run(&files, Some(&output), &CancelToken::new());
    assert_eq!((summary.processed, summary.succeeded, summary.failed), (2, 1, 1));
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(summary.failures[0].path, files[1]);
    assert_eq!(summary.failures[0].reason.stage, Step::Assemble);

    // the first file's output is intact
    let written = output.join("walk_retargeted.npz");
    assert_eq!(load_retargeted_npz(&written).unwrap().num_frames(), 5);

    let dup = SinkError::DuplicateOutput {
        path: written.clone(),
        first: files[0].clone(),
    };
    assert!(summary.failures[0].reason.message.contains(&dup.to_string()));
    std::fs::remove_dir_all(&input).ok();
    std::fs::remove_dir_all(&output).ok();
}
