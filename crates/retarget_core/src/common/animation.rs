use super::pose::PoseFrame;
use crate::error::{InputError, InputResult};
use core::time::Duration;
use ndarray as nd;
use retarget_utils::vector::{vec_from_view_d, Vector3d};

/// An ordered sequence of pose frames at a fixed rate. Every clip owns its
/// arrays; nothing is shared or reused between clips.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionClip {
    pub per_frame_joint_poses: nd::Array3<f64>,
    pub per_frame_root_trans: nd::Array2<f64>,
    pub frame_rate: f32,
    /// body shape coefficients, carried along but never used to guess bone
    /// lengths
    pub shape_parameters: Option<nd::Array1<f64>>,
    pub name: String,
}

impl MotionClip {
    /// # Errors
    /// Will return `Err` when the arrays have the wrong shape, cover different
    /// numbers of frames, are empty or hold NaN/infinite values, or when the
    /// frame rate is not positive
    pub fn new_from_matrices(
        per_frame_joint_poses: nd::Array3<f64>,
        per_frame_root_trans: nd::Array2<f64>,
        frame_rate: f32,
        shape_parameters: Option<nd::Array1<f64>>,
        name: &str,
    ) -> InputResult<Self> {
        let (nr_frames, _, nr_coords) = per_frame_joint_poses.dim();
        if nr_coords != 3 {
            return Err(InputError::WrongShape {
                key: "poses",
                got: per_frame_joint_poses.shape().to_vec(),
                expected: "(frames, joints, 3)".to_owned(),
            });
        }
        if per_frame_root_trans.ncols() != 3 {
            return Err(InputError::WrongShape {
                key: "trans",
                got: per_frame_root_trans.shape().to_vec(),
                expected: "(frames, 3)".to_owned(),
            });
        }
        if nr_frames != per_frame_root_trans.nrows() {
            return Err(InputError::FrameCountMismatch {
                poses: nr_frames,
                trans: per_frame_root_trans.nrows(),
            });
        }
        if nr_frames == 0 {
            return Err(InputError::EmptyClip);
        }
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(InputError::InvalidFrameRate(frame_rate));
        }
        for (frame, poses) in per_frame_joint_poses.outer_iter().enumerate() {
            if let Some(joint) = poses.outer_iter().position(|v| v.iter().any(|x| !x.is_finite())) {
                return Err(InputError::NonFinite {
                    key: "poses",
                    frame,
                    joint: Some(joint),
                });
            }
        }
        if let Some(frame) = per_frame_root_trans
            .outer_iter()
            .position(|v| v.iter().any(|x| !x.is_finite()))
        {
            return Err(InputError::NonFinite {
                key: "trans",
                frame,
                joint: None,
            });
        }
        Ok(Self {
            per_frame_joint_poses,
            per_frame_root_trans,
            frame_rate,
            shape_parameters,
            name: name.to_owned(),
        })
    }

    /// # Errors
    /// ``WrongJointCount`` when the clip does not drive ``expected`` joints
    pub fn check_joint_count(&self, expected: usize) -> InputResult<()> {
        if self.num_joints() == expected {
            Ok(())
        } else {
            Err(InputError::WrongJointCount {
                expected,
                got: self.num_joints(),
            })
        }
    }

    pub fn num_frames(&self) -> usize {
        self.per_frame_joint_poses.dim().0
    }
    pub fn num_joints(&self) -> usize {
        self.per_frame_joint_poses.dim().1
    }
    /// Duration of the clip
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f32(self.num_frames() as f32 / self.frame_rate)
    }
    /// Get pose at a certain frame ID
    pub fn get_pose_at_idx(&self, idx: usize) -> PoseFrame {
        let joint_poses = self.per_frame_joint_poses.index_axis(nd::Axis(0), idx).to_owned();
        let global_trans = self.per_frame_root_trans.index_axis(nd::Axis(0), idx).to_owned();
        PoseFrame::new(joint_poses, global_trans)
    }
    pub fn root_translation(&self, idx: usize) -> Vector3d {
        vec_from_view_d(&self.per_frame_root_trans.row(idx))
    }
    /// World position of the root at ``idx``: its rest offset plus the
    /// frame's translation. The root rotation never moves the root itself.
    pub fn root_world_position(&self, idx: usize, root_offset: &Vector3d) -> Vector3d {
        root_offset + self.root_translation(idx)
    }
    /// Shift each frame of the clip by the same translation vector
    pub fn translate(&mut self, translation: &Vector3d) {
        let t = nd::arr1(translation.as_slice());
        for mut row in self.per_frame_root_trans.rows_mut() {
            row += &t;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(frames: usize, joints: usize) -> MotionClip {
        MotionClip::new_from_matrices(nd::Array3::zeros((frames, joints, 3)), nd::Array2::zeros((frames, 3)), 30.0, None, "test").unwrap()
    }

    #[test]
    fn rejects_malformed_clips() {
        let err = MotionClip::new_from_matrices(nd::Array3::zeros((4, 2, 3)), nd::Array2::zeros((3, 3)), 30.0, None, "x").unwrap_err();
        assert!(matches!(err, InputError::FrameCountMismatch { poses: 4, trans: 3 }));
        let err = MotionClip::new_from_matrices(nd::Array3::zeros((0, 2, 3)), nd::Array2::zeros((0, 3)), 30.0, None, "x").unwrap_err();
        assert!(matches!(err, InputError::EmptyClip));
        let err = MotionClip::new_from_matrices(nd::Array3::zeros((1, 2, 3)), nd::Array2::zeros((1, 3)), 0.0, None, "x").unwrap_err();
        assert!(matches!(err, InputError::InvalidFrameRate(_)));

        let mut poses = nd::Array3::zeros((5, 4, 3));
        poses[[3, 2, 1]] = f64::NAN;
        let err = MotionClip::new_from_matrices(poses, nd::Array2::zeros((5, 3)), 30.0, None, "x").unwrap_err();
        assert!(matches!(
            err,
            InputError::NonFinite {
                key: "poses",
                frame: 3,
                joint: Some(2)
            }
        ));
    }

    #[test]
    fn duration_and_joint_count() {
        let c = clip(60, 52);
        assert_eq!(c.duration(), Duration::from_secs(2));
        assert!(c.check_joint_count(52).is_ok());
        assert!(matches!(c.check_joint_count(24), Err(InputError::WrongJointCount { expected: 24, got: 52 })));
    }

    #[test]
    fn translate_moves_every_frame_equally() {
        let mut c = clip(3, 2);
        c.per_frame_root_trans[[1, 0]] = 1.0;
        c.translate(&Vector3d::new(0.5, 0.0, -1.0));
        assert_eq!(c.root_translation(0), Vector3d::new(0.5, 0.0, -1.0));
        assert_eq!(c.root_translation(1), Vector3d::new(1.5, 0.0, -1.0));
        assert_eq!(c.get_pose_at_idx(2).translation(), Vector3d::new(0.5, 0.0, -1.0));
        assert_eq!(c.root_world_position(2, &Vector3d::new(0.0, 0.0, 1.0)), Vector3d::new(0.5, 0.0, 0.0));
    }
}
