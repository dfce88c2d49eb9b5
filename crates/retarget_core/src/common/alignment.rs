use super::{
    animation::MotionClip,
    kinematic_tree::KinematicTree,
    pose_parts::PosePart,
    rest_pose::OffsetTable,
    retarget::RetargetedClip,
};
use crate::{
    error::{StructuralError, StructuralResult},
    smpl_h::{smpl_h, smpl_h_pose_parts::PosePartRanges},
};
use enum_map::EnumMap;
use retarget_utils::{
    numerical::{angle_between, ROTATION_EPSILON},
    vector::{UnitQuaterniond, Vector3d},
};

/// The single translation that moves the first root sample onto
/// ``reference``
pub fn start_offset(root_frame0: &Vector3d, reference: &Vector3d) -> Vector3d {
    reference - root_frame0
}

/// Shifts every frame of ``clip`` by one constant so the root of frame 0
/// lands on ``reference_root``. Relative motion is untouched and aligning an
/// aligned clip again changes nothing.
pub fn align_start(clip: &MotionClip, root_offset: &Vector3d, reference_root: &Vector3d) -> MotionClip {
    let shift = start_offset(&clip.root_world_position(0, root_offset), reference_root);
    let mut aligned = clip.clone();
    aligned.translate(&shift);
    aligned
}

/// ``align_start`` for retargeted output, whose root positions are already in
/// world space
pub fn align_retargeted_start(clip: &RetargetedClip, reference_root: &Vector3d) -> RetargetedClip {
    let mut aligned = clip.clone();
    if let Some(first) = clip.frames.first() {
        let shift = start_offset(&first.root_position, reference_root);
        for frame in &mut aligned.frames {
            frame.root_position += shift;
        }
    }
    aligned
}

/// Local rotations of the target rest pose: identity everywhere
pub fn canonical_rest_rotations(num_joints: usize) -> Vec<UnitQuaterniond> {
    vec![UnitQuaterniond::identity(); num_joints]
}

/// Replaces the rotations of frame 0 by ``canonical`` and leaves every later
/// frame as it was. The root position of frame 0 is kept.
///
/// # Errors
/// ``LengthMismatch`` when ``canonical`` does not have one rotation per joint
pub fn override_first_frame(clip: &RetargetedClip, canonical: &[UnitQuaterniond]) -> StructuralResult<RetargetedClip> {
    let mut overridden = clip.clone();
    if let Some(first) = overridden.frames.first_mut() {
        if first.local_rotations.len() != canonical.len() {
            return Err(StructuralError::LengthMismatch {
                what: "canonical rotations",
                expected: first.local_rotations.len(),
                got: canonical.len(),
            });
        }
        first.local_rotations = canonical.to_vec();
    }
    Ok(overridden)
}

/// Angles between the rest bone directions of two skeletons
#[derive(Clone, Debug)]
pub struct RestPoseMismatch {
    pub per_joint_deg: Vec<f64>,
    /// joints over the tolerance
    pub offending: Vec<usize>,
    pub per_part_max_deg: EnumMap<PosePart, f64>,
    pub tolerance_deg: f64,
}

impl RestPoseMismatch {
    pub fn is_mismatched(&self) -> bool {
        !self.offending.is_empty()
    }
    /// Largest angle and its joint, ``None`` for an empty tree
    pub fn worst_joint(&self) -> Option<(usize, f64)> {
        self.per_joint_deg
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Compares the direction of every bone in ``source`` with the same bone in
/// ``target``. Zero-length bones have no direction and report 0. Per part
/// maxima are only filled in for the SMPL-H tree.
pub fn detect_rest_mismatch(tree: &KinematicTree, source: &OffsetTable, target: &OffsetTable, tolerance_deg: f64) -> RestPoseMismatch {
    let per_joint_deg: Vec<f64> = (0..tree.num_joints())
        .map(|joint| {
            if tree.parent(joint).is_none() || source.bone_length(joint) < ROTATION_EPSILON || target.bone_length(joint) < ROTATION_EPSILON {
                0.0
            } else {
                angle_between(&source.offset(joint), &target.offset(joint)).to_degrees()
            }
        })
        .collect();
    let offending = per_joint_deg
        .iter()
        .enumerate()
        .filter_map(|(joint, deg)| (*deg > tolerance_deg).then_some(joint))
        .collect();

    let mut per_part_max_deg: EnumMap<PosePart, f64> = EnumMap::default();
    if tree.num_joints() == smpl_h::NUM_JOINTS {
        let parts = PosePartRanges::smpl_h();
        for (joint, deg) in per_joint_deg.iter().enumerate() {
            if let Some(part) = parts.part_of_joint(joint) {
                per_part_max_deg[part] = per_part_max_deg[part].max(*deg);
            }
        }
    }

    RestPoseMismatch {
        per_joint_deg,
        offending,
        per_part_max_deg,
        tolerance_deg,
    }
}
