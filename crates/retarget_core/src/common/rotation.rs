//! Axis-angle rotation codec. Rotations are right-handed and counter-clockwise
//! positive; the host boundary exchanges unit quaternions, never Euler angles.
use nalgebra as na;
use ndarray as nd;
use retarget_utils::{
    numerical::{matrix_to_quaternion, quaternion_to_axis_angle, rodrigues},
    vector::{Matrix3d, UnitQuaterniond, Vector3d},
};

/// Rotation matrix of an axis-angle vector, identity below ``1e-6`` rad
pub fn decode(axis_angle: &Vector3d) -> Matrix3d {
    rodrigues(axis_angle)
}

pub fn decode_rotation(axis_angle: &Vector3d) -> na::Rotation3<f64> {
    na::Rotation3::from_matrix_unchecked(decode(axis_angle))
}

/// Decodes every row of an ``(N, 3)`` frame of axis-angle vectors
pub fn decode_frame(joint_poses: &nd::ArrayView2<f64>) -> Vec<Matrix3d> {
    joint_poses
        .outer_iter()
        .map(|row| decode(&Vector3d::new(row[0], row[1], row[2])))
        .collect()
}

pub fn to_quaternion(rot: &Matrix3d) -> UnitQuaterniond {
    matrix_to_quaternion(rot)
}

pub fn to_axis_angle(q: &UnitQuaterniond) -> Vector3d {
    quaternion_to_axis_angle(q)
}
