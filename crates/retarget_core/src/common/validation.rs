use super::{retarget::RetargetedClip, rest_pose::Skeleton};
use crate::error::StructuralResult;
use retarget_utils::vector::Vector3d;
use serde::Serialize;

pub const BONE_LENGTH_TOLERANCE_M: f64 = 1e-6;
pub const ROOT_ALIGNMENT_TOLERANCE_MM: f64 = 0.1;
pub const FIRST_FRAME_TOLERANCE_MM: f64 = 1.0;

/// Acceptance checks on a retargeted clip
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationReport {
    /// largest ``| |X_i - X_parent| - |offset_i| |`` over all frames, metres
    pub max_bone_length_error: f64,
    pub worst_joint: usize,
    pub worst_frame: usize,
    /// distance of the first root sample from the reference, millimetres
    pub root_alignment_error_mm: Option<f64>,
    /// largest distance of a frame 0 joint from the target rest pose placed
    /// at the frame 0 root, millimetres
    pub first_frame_pose_error_mm: Option<f64>,
    pub passed: bool,
}

/// Runs FK on every frame of ``clip`` against ``target`` and measures bone
/// lengths. Root alignment is only checked when ``reference_root`` is given
/// and the frame 0 pose only when ``expect_rest_first_frame`` is set.
///
/// # Errors
/// ``LengthMismatch`` when the clip does not match the target skeleton
pub fn validate_retargeted(
    clip: &RetargetedClip,
    target: &Skeleton,
    reference_root: Option<&Vector3d>,
    expect_rest_first_frame: bool,
) -> StructuralResult<ValidationReport> {
    let tree = &*target.tree;
    let mut report = ValidationReport::default();

    for (frame_idx, frame) in clip.frames.iter().enumerate() {
        let fk = frame.world_positions(&target.offsets, tree)?;
        for joint in 0..tree.num_joints() {
            let Some(parent) = tree.parent(joint) else { continue };
            let length = (fk.positions[joint] - fk.positions[parent]).norm();
            let err = (length - target.offsets.bone_length(joint)).abs();
            if err > report.max_bone_length_error {
                report.max_bone_length_error = err;
                report.worst_joint = joint;
                report.worst_frame = frame_idx;
            }
        }
        if frame_idx == 0 && expect_rest_first_frame {
            let shift = frame.root_position - target.rest.root_position(tree);
            let worst = (0..tree.num_joints())
                .map(|j| (fk.positions[j] - (target.rest.position(j) + shift)).norm())
                .fold(0.0, f64::max);
            report.first_frame_pose_error_mm = Some(worst * 1000.0);
        }
    }

    if let (Some(reference), Some(first)) = (reference_root, clip.frames.first()) {
        report.root_alignment_error_mm = Some((first.root_position - reference).norm() * 1000.0);
    }

    report.passed = report.max_bone_length_error < BONE_LENGTH_TOLERANCE_M
        && report.root_alignment_error_mm.map_or(true, |e| e < ROOT_ALIGNMENT_TOLERANCE_MM)
        && report.first_frame_pose_error_mm.map_or(true, |e| e < FIRST_FRAME_TOLERANCE_MM);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{
        alignment::canonical_rest_rotations,
        retarget::RetargetedFrame,
    };
    use retarget_utils::vector::UnitQuaterniond;

    #[test]
    fn rest_clip_passes_every_check() {
        let target = Skeleton::smplh_target().unwrap();
        let root = target.rest.root_position(&target.tree);
        let clip = RetargetedClip {
            frames: vec![
                RetargetedFrame {
                    local_rotations: canonical_rest_rotations(52),
                    root_position: root,
                };
                2
            ],
            frame_rate: 30.0,
            source_name: "rest".into(),
        };
        let report = validate_retargeted(&clip, &target, Some(&root), true).unwrap();
        assert!(report.passed, "{report:?}");
        assert!(report.first_frame_pose_error_mm.unwrap() < 1e-6);
        assert!(report.root_alignment_error_mm.unwrap() < 1e-6);
    }

    #[test]
    fn misplaced_root_and_bent_first_frame_fail() {
        let target = Skeleton::smplh_target().unwrap();
        let root = target.rest.root_position(&target.tree);
        let mut rotations = canonical_rest_rotations(52);
        rotations[16] = UnitQuaterniond::from_euler_angles(0.0, 0.5, 0.0);
        let clip = RetargetedClip {
            frames: vec![RetargetedFrame {
                local_rotations: rotations,
                root_position: root + Vector3d::new(0.01, 0.0, 0.0),
            }],
            frame_rate: 30.0,
            source_name: "bent".into(),
        };
        let report = validate_retargeted(&clip, &target, Some(&root), true).unwrap();
        assert!(!report.passed);
        assert!((report.root_alignment_error_mm.unwrap() - 10.0).abs() < 1e-6);
        assert!(report.first_frame_pose_error_mm.unwrap() > 1.0);
        assert!(report.max_bone_length_error < BONE_LENGTH_TOLERANCE_M);
    }
}
