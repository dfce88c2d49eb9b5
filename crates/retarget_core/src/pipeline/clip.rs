use crate::{
    codec::{
        pose_json::{load_pose_or_rest, LoadedPose},
        reference::load_reference_or_default,
        retargeted_npz::{AnimationSink, AssembledClip},
    },
    common::{
        alignment::{align_retargeted_start, canonical_rest_rotations, detect_rest_mismatch, override_first_frame, RestPoseMismatch},
        animation::MotionClip,
        fk::compute_fk_axis_angle,
        rest_pose::Skeleton,
        retarget::{RetargetedClip, RetargetedFrame, Retargeter},
        retarget_options::RetargetOptions,
        validation::{validate_retargeted, ValidationReport},
    },
    error::{InputError, PipelineError, PipelineResult, ReferenceError, RetargetResult, StructuralResult},
};
use log::{debug, info, warn};
use ndarray as nd;
use retarget_utils::vector::Vector3d;
use std::{path::Path, sync::Arc, time::Instant};
use strum_macros::Display;

/// Step of the per clip pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Step {
    Load,
    Fk,
    Retarget,
    Align,
    Assemble,
}

/// Where a clip stopped and why
#[derive(Clone, Debug, PartialEq)]
pub struct FailureReason {
    pub stage: Step,
    pub frame: Option<usize>,
    pub joint: Option<usize>,
    pub message: String,
}

impl FailureReason {
    pub fn from_error(err: &PipelineError) -> Self {
        let stage = match err {
            PipelineError::Input(_) | PipelineError::Reference(_) | PipelineError::Cancelled => Step::Load,
            PipelineError::Structural(_) => Step::Fk,
            PipelineError::Retarget(_) => Step::Retarget,
            PipelineError::Align(_) => Step::Align,
            PipelineError::Sink(_) => Step::Assemble,
        };
        let (frame, joint) = err.location();
        Self {
            stage,
            frame,
            joint,
            message: err.to_string(),
        }
    }
}

/// Furthest point a clip reached
#[derive(Clone, Debug, PartialEq)]
pub enum ClipStage {
    Loaded,
    FkApplied,
    Retargeted,
    Aligned,
    Assembled(AssembledClip),
    Failed(FailureReason),
}

/// Worst rest bone disagreement between the skeletons a clip was retargeted
/// across
#[derive(Clone, Debug, PartialEq)]
pub struct RestMismatchNote {
    pub worst_joint: usize,
    pub worst_joint_name: String,
    pub worst_deg: f64,
    /// bones over the tolerance
    pub offending: usize,
    /// rest basis correction was off while frame 0 was overridden, so the
    /// jump from frame 0 to frame 1 shows
    pub seam_visible: bool,
}

#[derive(Clone, Debug)]
pub struct ClipReport {
    pub name: String,
    pub frames: usize,
    pub stage: ClipStage,
    pub validation: Option<ValidationReport>,
    pub rest_mismatch: Option<RestMismatchNote>,
    pub elapsed_secs: f32,
}

impl ClipReport {
    pub fn failed(name: &str, err: &PipelineError) -> Self {
        Self {
            name: name.to_owned(),
            frames: 0,
            stage: ClipStage::Failed(FailureReason::from_error(err)),
            validation: None,
            rest_mismatch: None,
            elapsed_secs: 0.0,
        }
    }
    pub fn is_failed(&self) -> bool {
        matches!(self.stage, ClipStage::Failed(_))
    }
}

pub struct ProcessedClip {
    pub clip: RetargetedClip,
    pub report: ClipReport,
}

/// Source and target skeletons, the retargeter built from them and the
/// options. Built once and shared read-only by every clip of a batch.
pub struct ClipPipeline {
    source: Skeleton,
    target: Skeleton,
    retargeter: Retargeter,
    options: RetargetOptions,
    reference_root: Vector3d,
    mismatch: RestPoseMismatch,
    mismatch_note: Option<RestMismatchNote>,
    reference_fallback: Option<ReferenceError>,
    first_frame: LoadedPose,
}

impl ClipPipeline {
    /// # Errors
    /// ``LengthMismatch`` when the two skeletons have different joint counts
    pub fn new(source: Skeleton, target: Skeleton, options: RetargetOptions) -> StructuralResult<Self> {
        target.tree.check_len("source skeleton", source.num_joints())?;
        let retargeter = Retargeter::new(Arc::clone(&target.tree), &source.offsets, &target.offsets, &options)?;
        let reference_root = options
            .reference_root
            .map_or_else(|| target.rest.root_position(&target.tree), Vector3d::from);

        let mismatch = detect_rest_mismatch(&target.tree, &source.offsets, &target.offsets, options.mismatch_tolerance_deg);
        let mismatch_note = mismatch
            .worst_joint()
            .filter(|_| mismatch.is_mismatched())
            .map(|(joint, deg)| RestMismatchNote {
                worst_joint: joint,
                worst_joint_name: target.tree.name(joint).to_owned(),
                worst_deg: deg,
                offending: mismatch.offending.len(),
                seam_visible: !options.rest_basis_correction && options.align_mode.overrides_first_frame(),
            });
        if let Some(note) = &mismatch_note {
            warn!(
                "rest poses of {} and {} disagree on {} bones (worst {} at {:.1} deg)",
                source.rest.name, target.rest.name, note.offending, note.worst_joint_name, note.worst_deg
            );
            if note.seam_visible {
                warn!("rest basis correction is off and frame 0 is overridden, the seam between frame 0 and frame 1 will be visible");
            }
        }

        let first_frame = if options.align_mode.overrides_first_frame() {
            load_pose_or_rest(options.first_frame_pose.as_deref(), &target.tree)
        } else {
            if let Some(path) = &options.first_frame_pose {
                warn!("align mode {} keeps frame 0, ignoring pose file {}", options.align_mode, path.display());
            }
            load_pose_or_rest(None, &target.tree)
        };

        Ok(Self {
            source,
            target,
            retargeter,
            options,
            reference_root,
            mismatch,
            mismatch_note,
            reference_fallback: None,
            first_frame,
        })
    }

    /// SMPL-H T-pose source onto the reference at ``reference`` or the
    /// built-in A-pose. A rejected reference does not fail the pipeline, it is
    /// kept in ``reference_fallback``.
    ///
    /// # Errors
    /// Only if the built-in skeleton data is broken
    pub fn smplh(reference: Option<&Path>, options: RetargetOptions) -> StructuralResult<Self> {
        let source = Skeleton::smplh_source()?;
        let loaded = load_reference_or_default(reference, &source.tree, options.reference_scale);
        let target = Skeleton::new(Arc::clone(&source.tree), loaded.rest)?;
        let mut pipeline = Self::new(source, target, options)?;
        pipeline.reference_fallback = loaded.fallback;
        Ok(pipeline)
    }

    pub fn source(&self) -> &Skeleton {
        &self.source
    }
    pub fn target(&self) -> &Skeleton {
        &self.target
    }
    pub fn options(&self) -> &RetargetOptions {
        &self.options
    }
    pub fn reference_root(&self) -> Vector3d {
        self.reference_root
    }
    pub fn rest_mismatch(&self) -> &RestPoseMismatch {
        &self.mismatch
    }
    pub fn reference_fallback(&self) -> Option<&ReferenceError> {
        self.reference_fallback.as_ref()
    }
    /// Recorded in every clip report, ``None`` when the rest poses agree
    pub fn rest_mismatch_note(&self) -> Option<&RestMismatchNote> {
        self.mismatch_note.as_ref()
    }
    /// Rotations frame 0 is overridden with
    pub fn first_frame_pose(&self) -> &LoadedPose {
        &self.first_frame
    }

    fn retarget_frames(&self, clip: &MotionClip) -> RetargetResult<Vec<RetargetedFrame>> {
        let retarget_one = |idx: usize| {
            let pose = clip.get_pose_at_idx(idx);
            self.retargeter.retarget_frame(&pose.rotations(), &pose.translation(), idx)
        };

        #[cfg(feature = "parallel")]
        {
            if self.options.parallel_frames {
                use rayon::iter::{IntoParallelIterator, ParallelIterator};
                return (0..clip.num_frames()).into_par_iter().map(retarget_one).collect();
            }
        }
        (0..clip.num_frames()).map(retarget_one).collect()
    }

    /// Retargets and aligns ``clip``. Each call works only from its arguments
    /// and the shared skeletons, so clips can be processed in any order.
    ///
    /// # Errors
    /// ``Input`` when the clip does not have one pose per joint, ``Retarget``
    /// with the failing frame and joint, ``Structural`` for mismatched arrays
    pub fn process_clip(&self, clip: &MotionClip) -> PipelineResult<ProcessedClip> {
        let start = Instant::now();
        let num_joints = self.target.num_joints();
        clip.check_joint_count(num_joints)?;
        if clip.num_frames() == 0 {
            return Err(InputError::EmptyClip.into());
        }
        debug!("{}: {:?}", clip.name, ClipStage::Loaded);

        let first = compute_fk_axis_angle(
            &clip.per_frame_joint_poses.index_axis(nd::Axis(0), 0),
            &clip.root_translation(0),
            &self.source.offsets,
            &self.source.tree,
        )?;
        debug!(
            "{}: {:?}, source root starts at {:?}",
            clip.name,
            ClipStage::FkApplied,
            first.positions[self.source.tree.root()].as_slice()
        );

        let mut retargeted = RetargetedClip {
            frames: self.retarget_frames(clip)?,
            frame_rate: clip.frame_rate,
            source_name: clip.name.clone(),
        };
        debug!("{}: {:?}", clip.name, ClipStage::Retargeted);

        let align_mode = self.options.align_mode;
        if align_mode.translates() {
            retargeted = align_retargeted_start(&retargeted, &self.reference_root);
        }
        if align_mode.overrides_first_frame() {
            retargeted = override_first_frame(&retargeted, &self.first_frame.rotations).map_err(PipelineError::Align)?;
        }
        let stage = if align_mode.translates() {
            ClipStage::Aligned
        } else {
            ClipStage::Retargeted
        };

        let validation = validate_retargeted(
            &retargeted,
            &self.target,
            align_mode.translates().then_some(&self.reference_root),
            align_mode.overrides_first_frame() && self.first_frame.is_rest_pose(),
        )
        .map_err(PipelineError::Align)?;
        debug!("{}: validation {validation:?}", clip.name);
        if !validation.passed {
            warn!(
                "{}: validation failed, bone length error {:.2e} m at joint {} frame {}",
                clip.name, validation.max_bone_length_error, validation.worst_joint, validation.worst_frame
            );
        }

        Ok(ProcessedClip {
            report: ClipReport {
                name: clip.name.clone(),
                frames: retargeted.num_frames(),
                stage,
                validation: Some(validation),
                rest_mismatch: self.mismatch_note.clone(),
                elapsed_secs: start.elapsed().as_secs_f32(),
            },
            clip: retargeted,
        })
    }

    /// ``process_clip`` followed by handing the result to ``sink``
    ///
    /// # Errors
    /// As ``process_clip``, plus ``Sink`` errors
    pub fn run(&self, clip: &MotionClip, sink: &mut dyn AnimationSink) -> PipelineResult<ClipReport> {
        let ProcessedClip { clip: retargeted, mut report } = self.process_clip(clip)?;
        let assembled = sink.assemble(&retargeted, &self.target)?;
        info!(
            "{}: {} frames retargeted in {:.2}s",
            report.name, report.frames, report.elapsed_secs
        );
        report.stage = ClipStage::Assembled(assembled);
        Ok(report)
    }

    /// Hands ``sink`` a single frame clip of the target skeleton standing in
    /// its rest pose at the reference root
    ///
    /// # Errors
    /// ``Sink`` errors
    pub fn export_target_rest_pose(&self, sink: &mut dyn AnimationSink) -> PipelineResult<AssembledClip> {
        let clip = RetargetedClip {
            frames: vec![RetargetedFrame {
                local_rotations: canonical_rest_rotations(self.target.num_joints()),
                root_position: self.reference_root,
            }],
            frame_rate: self.options.default_frame_rate,
            source_name: self.target.rest.name.clone(),
        };
        Ok(sink.assemble_rest_pose(&clip, &self.target)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::retargeted_npz::CollectingSink,
        common::{retarget::RetargetedFrame, types::AlignMode},
        error::{RetargetError, StructuralError},
    };
    use approx::assert_relative_eq;
    use retarget_utils::vector::UnitQuaterniond;

    fn random_clip(num_frames: usize, num_joints: usize) -> MotionClip {
        let mut state = 0x2545_f491_4f6c_dd1d_u64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 10_000) as f64 / 10_000.0 - 0.5
        };
        let poses = nd::Array3::from_shape_simple_fn((num_frames, num_joints, 3), &mut next);
        let trans = nd::Array2::from_shape_fn((num_frames, 3), |(f, c)| 0.05 * f as f64 + c as f64);
        MotionClip::new_from_matrices(poses, trans, 30.0, None, "random").unwrap()
    }

    fn pipeline(options: RetargetOptions) -> ClipPipeline {
        ClipPipeline::smplh(None, options).unwrap()
    }

    #[test]
    fn default_pipeline_aligns_and_overrides() {
        let pipeline = pipeline(RetargetOptions::default());
        assert!(pipeline.rest_mismatch().is_mismatched());
        let processed = pipeline.process_clip(&random_clip(6, 52)).unwrap();
        let report = processed.report.validation.unwrap();
        assert!(report.passed, "{report:?}");

        let clip = processed.clip;
        assert_eq!(clip.num_frames(), 6);
        assert_relative_eq!(clip.frames[0].root_position, pipeline.reference_root(), epsilon = 1e-9);
        assert!(clip.frames[0].local_rotations.iter().all(|q| *q == UnitQuaterniond::identity()));
        assert!(clip.frames[1].local_rotations.iter().any(|q| q.angle() > 1e-3));
    }

    #[test]
    fn no_alignment_keeps_source_root() {
        let options = RetargetOptions {
            align_mode: AlignMode::None,
            parallel_frames: false,
            ..RetargetOptions::default()
        };
        let pipeline = pipeline(options);
        let motion = random_clip(3, 52);
        let processed = pipeline.process_clip(&motion).unwrap();
        let expected = motion.root_world_position(2, &pipeline.source().offsets.offset(0));
        assert_relative_eq!(processed.clip.frames[2].root_position, expected, epsilon = 1e-9);
        assert_eq!(processed.report.stage, ClipStage::Retargeted);
        assert!(processed.report.validation.unwrap().root_alignment_error_mm.is_none());
    }

    #[test]
    fn report_carries_rest_mismatch() {
        let pipeline = pipeline(RetargetOptions::default());
        let report = pipeline.process_clip(&random_clip(2, 52)).unwrap().report;
        assert_eq!(report.stage, ClipStage::Aligned);
        let note = report.rest_mismatch.unwrap();
        let (joint, deg) = pipeline.rest_mismatch().worst_joint().unwrap();
        assert_eq!(note.worst_joint, joint);
        assert_relative_eq!(note.worst_deg, deg);
        assert_eq!(note.worst_joint_name, pipeline.target().tree.name(joint));
        assert!(note.offending > 0);
        assert!(!note.seam_visible);
    }

    #[test]
    fn seam_is_flagged_only_without_correction_and_with_override() {
        let uncorrected = |align_mode| {
            pipeline(RetargetOptions {
                rest_basis_correction: false,
                align_mode,
                ..RetargetOptions::default()
            })
        };
        let overridden = uncorrected(AlignMode::OverrideFirstFrame);
        assert!(overridden.rest_mismatch_note().unwrap().seam_visible);
        let translated = uncorrected(AlignMode::TranslateRoot);
        assert!(!translated.rest_mismatch_note().unwrap().seam_visible);
    }

    #[test]
    fn pose_file_replaces_first_frame() {
        let path = std::env::temp_dir().join(format!("retarget_core_clip_pose_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"bones": {"L_Elbow": {"pose": {"rotation_euler": [0.0, 0.0, 0.5]}}}}"#).unwrap();
        let pipeline = pipeline(RetargetOptions {
            first_frame_pose: Some(path.clone()),
            ..RetargetOptions::default()
        });
        assert!(!pipeline.first_frame_pose().is_rest_pose());
        let elbow = pipeline.target().tree.index_of("L_Elbow").unwrap();
        let processed = pipeline.process_clip(&random_clip(3, 52)).unwrap();
        let first = &processed.clip.frames[0].local_rotations;
        assert_relative_eq!(first[elbow].angle(), 0.5, epsilon = 1e-9);
        assert!(first.iter().enumerate().all(|(j, q)| j == elbow || *q == UnitQuaterniond::identity()));
        let validation = processed.report.validation.unwrap();
        assert!(validation.first_frame_pose_error_mm.is_none());
        assert!(validation.passed, "{validation:?}");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_pose_file_keeps_rest_first_frame() {
        let pipeline = pipeline(RetargetOptions {
            first_frame_pose: Some(std::env::temp_dir().join("retarget_core_no_such_pose.json")),
            ..RetargetOptions::default()
        });
        assert!(pipeline.first_frame_pose().is_rest_pose());
        assert!(matches!(pipeline.first_frame_pose().fallback, Some(ReferenceError::NotFound(_))));
        let processed = pipeline.process_clip(&random_clip(2, 52)).unwrap();
        assert!(processed.clip.frames[0].local_rotations.iter().all(|q| *q == UnitQuaterniond::identity()));
    }

    #[test]
    fn parallel_and_sequential_frames_agree() {
        let motion = random_clip(8, 52);
        let par = pipeline(RetargetOptions::default()).process_clip(&motion).unwrap();
        let seq = pipeline(RetargetOptions {
            parallel_frames: false,
            ..RetargetOptions::default()
        })
        .process_clip(&motion)
        .unwrap();
        assert_eq!(par.clip.frames, seq.clip.frames);
    }

    #[test]
    fn wrong_joint_count_fails_at_load() {
        let err = pipeline(RetargetOptions::default())
            .process_clip(&random_clip(2, 22))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Input(InputError::WrongJointCount { expected: 52, got: 22 })));
        let reason = FailureReason::from_error(&err);
        assert_eq!(reason.stage, Step::Load);
        assert!(ClipReport::failed("x", &err).is_failed());
    }

    #[test]
    fn retarget_failure_keeps_location() {
        let err = PipelineError::from(RetargetError::NonFiniteDirection { joint: 16, frame: 12 });
        let reason = FailureReason::from_error(&err);
        assert_eq!(reason.stage, Step::Retarget);
        assert_eq!((reason.frame, reason.joint), (Some(12), Some(16)));

        let err = PipelineError::Align(StructuralError::LengthMismatch {
            what: "canonical rotations",
            expected: 52,
            got: 22,
        });
        assert_eq!(FailureReason::from_error(&err).stage, Step::Align);
    }

    #[test]
    fn run_and_export_reach_the_sink() {
        let pipeline = pipeline(RetargetOptions::default());
        let mut sink = CollectingSink::default();
        let report = pipeline.run(&random_clip(2, 52), &mut sink).unwrap();
        assert!(matches!(report.stage, ClipStage::Assembled(_)));

        let rest = pipeline.export_target_rest_pose(&mut sink).unwrap();
        assert_eq!(rest.frames, 1);
        assert_eq!(sink.clips.len(), 2);
        let frame: &RetargetedFrame = &sink.clips[1].frames[0];
        let fk = frame
            .world_positions(&pipeline.target().offsets, &pipeline.target().tree)
            .unwrap();
        for joint in 0..52 {
            assert_relative_eq!(fk.positions[joint], pipeline.target().rest.position(joint), epsilon = 1e-9);
        }
    }
}
