use super::{kinematic_tree::KinematicTree, rest_pose::OffsetTable, rotation::decode_frame};
use crate::error::StructuralResult;
use nalgebra as na;
use ndarray as nd;
use retarget_utils::vector::{array_from_vecs_d, Matrix3d, Matrix4d, Vector3d};

/// World space result of one forward kinematics pass
#[derive(Clone, Debug)]
pub struct FkFrame {
    pub positions: Vec<Vector3d>,
    pub global_rotations: Vec<Matrix3d>,
}

impl FkFrame {
    /// World positions as an ``(N, 3)`` array
    pub fn positions_array(&self) -> nd::Array2<f64> {
        array_from_vecs_d(&self.positions)
    }
    pub fn num_joints(&self) -> usize {
        self.positions.len()
    }
}

fn local_transform(rot: &Matrix3d, translation: &Vector3d) -> Matrix4d {
    let mut tf = Matrix4d::identity();
    tf.fixed_view_mut::<3, 3>(0, 0).copy_from(rot);
    tf.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    tf
}

/// Chains the local ``[R_i | offset_i]`` transforms from the root down.
/// The root translation is added to the root's own offset, so a root resting
/// at ``(0, 0, 1)`` moved by ``(0, 1, 0)`` lands at ``(0, 1, 1)``, and the
/// root rotation turns its children about the root's world position.
///
/// # Errors
/// ``LengthMismatch`` when ``rotations`` or ``offsets`` do not cover the tree
pub fn compute_fk(
    rotations: &[Matrix3d],
    root_translation: &Vector3d,
    offsets: &OffsetTable,
    tree: &KinematicTree,
) -> StructuralResult<FkFrame> {
    tree.check_len("joint rotations", rotations.len())?;
    tree.check_len("offsets", offsets.len())?;

    let n = tree.num_joints();
    // parents come before children, so one ascending sweep is enough
    let mut transform_chain: Vec<Matrix4d> = Vec::with_capacity(n);
    for (joint, rot) in rotations.iter().enumerate() {
        let tf = match tree.parent(joint) {
            None => local_transform(rot, &(offsets.offset(joint) + root_translation)),
            Some(p) => transform_chain[p] * local_transform(rot, &offsets.offset(joint)),
        };
        transform_chain.push(tf);
    }

    let positions = transform_chain
        .iter()
        .map(|tf| tf.fixed_view::<3, 1>(0, 3).into_owned())
        .collect();
    let global_rotations = transform_chain
        .iter()
        .map(|tf| tf.fixed_view::<3, 3>(0, 0).into_owned())
        .collect();
    Ok(FkFrame { positions, global_rotations })
}

/// Same as ``compute_fk`` for an ``(N, 3)`` frame of axis-angle vectors
///
/// # Errors
/// ``LengthMismatch`` when the frame does not cover the tree
pub fn compute_fk_axis_angle(
    joint_poses: &nd::ArrayView2<f64>,
    root_translation: &Vector3d,
    offsets: &OffsetTable,
    tree: &KinematicTree,
) -> StructuralResult<FkFrame> {
    let rotations = decode_frame(joint_poses);
    compute_fk(&rotations, root_translation, offsets, tree)
}

/// Unit quaternion variant used on retargeted output
///
/// # Errors
/// ``LengthMismatch`` when the rotations do not cover the tree
pub fn compute_fk_quaternions(
    rotations: &[na::UnitQuaternion<f64>],
    root_translation: &Vector3d,
    offsets: &OffsetTable,
    tree: &KinematicTree,
) -> StructuralResult<FkFrame> {
    let rotations: Vec<Matrix3d> = rotations.iter().map(|q| q.to_rotation_matrix().into_inner()).collect();
    compute_fk(&rotations, root_translation, offsets, tree)
}

/// Identity rotation pass, which reproduces the rest pose the offsets were
/// derived from
///
/// # Errors
/// ``LengthMismatch`` when the offsets do not cover the tree
pub fn rest_positions(offsets: &OffsetTable, tree: &KinematicTree) -> StructuralResult<nd::Array2<f64>> {
    let rotations = vec![Matrix3d::identity(); tree.num_joints()];
    Ok(compute_fk(&rotations, &Vector3d::zeros(), offsets, tree)?.positions_array())
}
