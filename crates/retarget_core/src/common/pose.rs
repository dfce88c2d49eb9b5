use super::rotation::decode_frame;
use ndarray as nd;
use retarget_utils::vector::{vec_from_view_d, Matrix3d, Vector3d};
/// One immutable sample of a clip: an axis-angle vector per joint and the
/// root translation
#[derive(Clone, Debug, PartialEq)]
pub struct PoseFrame {
    pub joint_poses: nd::Array2<f64>,
    pub global_trans: nd::Array1<f64>,
}
impl PoseFrame {
    pub fn new(joint_poses: nd::Array2<f64>, global_trans: nd::Array1<f64>) -> Self {
        Self { joint_poses, global_trans }
    }
    pub fn num_active_joints(&self) -> usize {
        self.joint_poses.dim().0
    }
    pub fn translation(&self) -> Vector3d {
        vec_from_view_d(&self.global_trans.view())
    }
    pub fn rotations(&self) -> Vec<Matrix3d> {
        decode_frame(&self.joint_poses.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn frame_decodes_its_joints() {
        let pose = PoseFrame::new(array![[0.0, 0.0, 0.0], [std::f64::consts::FRAC_PI_2, 0.0, 0.0]], array![0.0, 1.0, 0.5]);
        assert_eq!(pose.num_active_joints(), 2);
        assert_relative_eq!(pose.translation(), Vector3d::new(0.0, 1.0, 0.5));
        let rotations = pose.rotations();
        assert_relative_eq!(rotations[0], Matrix3d::identity());
        assert_relative_eq!(rotations[1] * Vector3d::z(), -Vector3d::y(), epsilon = 1e-12);
    }
}
