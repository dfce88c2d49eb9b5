use super::{
    fk::{compute_fk, compute_fk_quaternions, FkFrame},
    kinematic_tree::KinematicTree,
    rest_pose::OffsetTable,
    retarget_options::RetargetOptions,
    types::LeafPolicy,
};
use crate::error::{RetargetError, RetargetResult, StructuralResult};
use log::debug;
use nalgebra as na;
use ndarray as nd;
use retarget_utils::{
    numerical::{best_twist_angle, matrix_to_quaternion, rotation_between, ROTATION_EPSILON},
    vector::{all_finite_d, quat_to_xyzw, Matrix3d, UnitQuaterniond, Vector3d},
};
use std::sync::Arc;

/// Precomputed per joint data. ``aim_child`` is the child whose bone sets
/// the joint's direction, ``rest_correction`` takes the target rest bones onto
/// the source rest bones.
#[derive(Clone, Debug)]
struct JointPlan {
    aim_child: Option<usize>,
    rest_correction: Matrix3d,
}

/// One retargeted sample: local rotations valid for the target offsets plus
/// the root's world position
#[derive(Clone, Debug, PartialEq)]
pub struct RetargetedFrame {
    pub local_rotations: Vec<UnitQuaterniond>,
    pub root_position: Vector3d,
}

impl RetargetedFrame {
    /// Root translation to feed FK on ``target`` so the root lands on
    /// ``root_position``
    pub fn fk_translation(&self, target: &OffsetTable, tree: &KinematicTree) -> Vector3d {
        self.root_position - target.offset(tree.root())
    }

    /// World joint positions on the target skeleton
    ///
    /// # Errors
    /// ``LengthMismatch`` when the frame does not match the target
    pub fn world_positions(&self, target: &OffsetTable, tree: &KinematicTree) -> StructuralResult<FkFrame> {
        compute_fk_quaternions(&self.local_rotations, &self.fk_translation(target, tree), target, tree)
    }
}

/// A whole retargeted clip, owned and independent of any other clip
#[derive(Clone, Debug)]
pub struct RetargetedClip {
    pub frames: Vec<RetargetedFrame>,
    pub frame_rate: f32,
    pub source_name: String,
}

impl RetargetedClip {
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }
    pub fn num_joints(&self) -> usize {
        self.frames.first().map_or(0, |f| f.local_rotations.len())
    }
    /// ``(F, N, 4)`` local rotations as ``xyzw`` quaternions
    pub fn local_rotations_array(&self) -> nd::Array3<f64> {
        let mut arr = nd::Array3::<f64>::zeros((self.num_frames(), self.num_joints(), 4));
        for (f, frame) in self.frames.iter().enumerate() {
            for (j, q) in frame.local_rotations.iter().enumerate() {
                arr.slice_mut(nd::s![f, j, ..]).assign(&nd::arr1(quat_to_xyzw(q).as_slice()));
            }
        }
        arr
    }
    /// ``(F, 3)`` root world positions
    pub fn root_positions_array(&self) -> nd::Array2<f64> {
        let mut arr = nd::Array2::<f64>::zeros((self.num_frames(), 3));
        for (f, frame) in self.frames.iter().enumerate() {
            arr.row_mut(f).assign(&nd::arr1(frame.root_position.as_slice()));
        }
        arr
    }
}

/// Rotation-only retargeting from a source skeleton onto a target skeleton
/// with the same hierarchy but different bone lengths and rest directions.
/// Bones are re-aimed, never stretched: every output bone keeps the exact
/// length of its target offset.
#[derive(Clone, Debug)]
pub struct Retargeter {
    tree: Arc<KinematicTree>,
    source: OffsetTable,
    target: OffsetTable,
    leaf_policy: LeafPolicy,
    plans: Vec<JointPlan>,
}

impl Retargeter {
    /// # Errors
    /// ``LengthMismatch`` when either offset table does not cover the tree
    pub fn new(tree: Arc<KinematicTree>, source: &OffsetTable, target: &OffsetTable, options: &RetargetOptions) -> StructuralResult<Self> {
        tree.check_len("source offsets", source.len())?;
        tree.check_len("target offsets", target.len())?;

        let plans = (0..tree.num_joints())
            .map(|joint| {
                let usable: Vec<usize> = tree
                    .children_by_preference(joint)
                    .into_iter()
                    .filter(|c| source.bone_length(*c) > ROTATION_EPSILON && target.bone_length(*c) > ROTATION_EPSILON)
                    .collect();
                let aim_child = usable.first().copied();
                let rest_correction = match aim_child {
                    Some(c) if options.rest_basis_correction => rest_basis_correction(c, &usable[1..], source, target),
                    _ => Matrix3d::identity(),
                };
                JointPlan { aim_child, rest_correction }
            })
            .collect();

        Ok(Self {
            tree,
            source: source.clone(),
            target: target.clone(),
            leaf_policy: options.leaf_policy,
            plans,
        })
    }

    pub fn tree(&self) -> &KinematicTree {
        &self.tree
    }
    pub fn target_offsets(&self) -> &OffsetTable {
        &self.target
    }
    pub fn source_offsets(&self) -> &OffsetTable {
        &self.source
    }
    /// Child each joint is aimed along, ``None`` for joints without a usable
    /// bone
    pub fn aim_child(&self, joint: usize) -> Option<usize> {
        self.plans[joint].aim_child
    }
    pub fn rest_correction(&self, joint: usize) -> UnitQuaterniond {
        matrix_to_quaternion(&self.plans[joint].rest_correction)
    }

    /// Retargets one frame given its source local rotations and root
    /// translation. ``frame_index`` only labels errors.
    ///
    /// # Errors
    /// ``Structural`` when the rotation count is wrong, ``NonFiniteTranslation``
    /// and ``NonFiniteDirection`` when NaN or infinite values would reach the
    /// output
    pub fn retarget_frame(&self, source_rotations: &[Matrix3d], source_translation: &Vector3d, frame_index: usize) -> RetargetResult<RetargetedFrame> {
        if !all_finite_d(source_translation) {
            return Err(RetargetError::NonFiniteTranslation { frame: frame_index });
        }
        let tree = &*self.tree;
        let source_fk = compute_fk(source_rotations, source_translation, &self.source, tree)?;

        let n = tree.num_joints();
        let mut globals: Vec<Matrix3d> = Vec::with_capacity(n);
        let mut local_rotations: Vec<UnitQuaterniond> = Vec::with_capacity(n);
        for joint in 0..n {
            let parent_global = tree.parent(joint).map_or_else(Matrix3d::identity, |p| globals[p]);
            let global = match self.plans[joint].aim_child {
                Some(c) => {
                    let intended = source_fk.positions[c] - source_fk.positions[joint];
                    if !all_finite_d(&intended) {
                        return Err(RetargetError::NonFiniteDirection { joint, frame: frame_index });
                    }
                    let candidate = source_fk.global_rotations[joint] * self.plans[joint].rest_correction;
                    let current = candidate * self.target.offset(c);
                    let fix = rotation_between(&current, &intended).to_rotation_matrix().into_inner();
                    fix * candidate
                }
                None => match self.leaf_policy {
                    LeafPolicy::InheritParent => parent_global,
                    LeafPolicy::CopySource => parent_global * source_rotations[joint],
                },
            };
            if global.iter().any(|x| !x.is_finite()) {
                return Err(RetargetError::NonFiniteDirection { joint, frame: frame_index });
            }
            local_rotations.push(matrix_to_quaternion(&(parent_global.transpose() * global)));
            globals.push(global);
        }

        Ok(RetargetedFrame {
            local_rotations,
            root_position: source_fk.positions[tree.root()],
        })
    }

    /// Retargets an ``(N, 3)`` frame of axis-angle vectors
    ///
    /// # Errors
    /// Same as ``retarget_frame``
    pub fn retarget_axis_angle_frame(
        &self,
        joint_poses: &nd::ArrayView2<f64>,
        source_translation: &Vector3d,
        frame_index: usize,
    ) -> RetargetResult<RetargetedFrame> {
        let rotations = super::rotation::decode_frame(joint_poses);
        self.retarget_frame(&rotations, source_translation, frame_index)
    }
}

/// Rotation taking the target rest bones of ``joint`` onto its source rest
/// bones: a swing aligning the aim child, then the twist about it that best
/// fits the remaining children.
fn rest_basis_correction(aim_child: usize, others: &[usize], source: &OffsetTable, target: &OffsetTable) -> Matrix3d {
    let source_dir = source.offset(aim_child);
    let swing = rotation_between(&target.offset(aim_child), &source_dir);
    let pairs: Vec<(Vector3d, Vector3d)> = others
        .iter()
        .map(|c| (swing * target.offset(*c), source.offset(*c)))
        .collect();
    let axis = na::Unit::new_normalize(source_dir);
    let twist = na::UnitQuaternion::from_axis_angle(&axis, best_twist_angle(&axis, &pairs));
    debug!("rest correction child {aim_child}: swing {:.3} rad, twist {:.3} rad", swing.angle(), twist.angle());
    (twist * swing).to_rotation_matrix().into_inner()
}

/// Stateless form of ``Retargeter::retarget_frame`` taking every input
/// explicitly. Runs without rest basis correction, so each target bone is
/// aimed purely along the source FK direction.
///
/// # Errors
/// ``Structural`` when ``target_offsets`` or ``source_rotations`` do not match
/// ``tree``, otherwise as ``Retargeter::retarget_frame``
pub fn retarget_frame_raw(
    source_rotations: &[Matrix3d],
    source_translation: &Vector3d,
    source_offsets: &OffsetTable,
    target_offsets: &OffsetTable,
    tree: Arc<KinematicTree>,
    frame_index: usize,
) -> RetargetResult<RetargetedFrame> {
    tree.check_len("source rotations", source_rotations.len())?;
    let options = RetargetOptions {
        rest_basis_correction: false,
        ..Default::default()
    };
    let retargeter = Retargeter::new(tree, source_offsets, target_offsets, &options)?;
    retargeter.retarget_frame(source_rotations, source_translation, frame_index)
}
