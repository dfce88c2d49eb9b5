use super::kinematic_tree::KinematicTree;
use crate::{
    error::{StructuralError, StructuralResult},
    smpl_h::rest_poses,
};
use ndarray as nd;
use retarget_utils::vector::{vec_from_array_d, Vector3d};
use std::sync::Arc;

/// Absolute joint positions of a skeleton at rest, one row per joint
#[derive(Clone, Debug, PartialEq)]
pub struct RestPose {
    pub name: String,
    pub positions: nd::Array2<f64>,
}

impl RestPose {
    /// # Errors
    /// ``LengthMismatch`` when ``positions`` is not ``(num_joints, 3)`` and
    /// ``NonFiniteRest`` for NaN or infinite coordinates
    pub fn new(name: &str, positions: nd::Array2<f64>, tree: &KinematicTree) -> StructuralResult<Self> {
        if positions.ncols() != 3 {
            return Err(StructuralError::LengthMismatch {
                what: "rest pose coordinates per joint",
                expected: 3,
                got: positions.ncols(),
            });
        }
        tree.check_len("rest pose joints", positions.nrows())?;
        if let Some(joint) = positions
            .outer_iter()
            .position(|row| row.iter().any(|x| !x.is_finite()))
        {
            return Err(StructuralError::NonFiniteRest { joint });
        }
        Ok(Self {
            name: name.to_owned(),
            positions,
        })
    }

    pub fn from_fixed(name: &str, positions: &[[f64; 3]]) -> Self {
        let flat: Vec<f64> = positions.iter().flatten().copied().collect();
        let positions = nd::Array2::from_shape_vec((positions.len(), 3), flat).unwrap_or_else(|_| nd::Array2::zeros((0, 3)));
        Self {
            name: name.to_owned(),
            positions,
        }
    }

    /// Template T-pose the source mocap rotations are authored against
    pub fn smplh_t_pose() -> Self {
        Self::from_fixed("smplh_t_pose", &rest_poses::T_POSE_J_ABSOLUTE)
    }

    /// Canonical A-pose, the default retargeting target
    pub fn smplh_a_pose() -> Self {
        Self::from_fixed("smplh_a_pose", &rest_poses::A_POSE_J_ABSOLUTE)
    }

    pub fn num_joints(&self) -> usize {
        self.positions.nrows()
    }

    pub fn position(&self, joint: usize) -> Vector3d {
        vec_from_array_d(&self.positions, joint)
    }

    pub fn root_position(&self, tree: &KinematicTree) -> Vector3d {
        self.position(tree.root())
    }

    #[must_use]
    pub fn scaled(&self, scale: f64) -> Self {
        Self {
            name: self.name.clone(),
            positions: &self.positions * scale,
        }
    }
}

/// Bone vectors in the parent's rest frame: ``offset[i] = rest[i] -
/// rest[parent(i)]`` and ``offset[root] = rest[root]``
#[derive(Clone, Debug, PartialEq)]
pub struct OffsetTable {
    pub offsets: nd::Array2<f64>,
}

impl OffsetTable {
    /// # Errors
    /// ``LengthMismatch`` when the rest pose does not cover the tree
    pub fn from_rest_pose(rest: &RestPose, tree: &KinematicTree) -> StructuralResult<Self> {
        tree.check_len("rest pose joints", rest.num_joints())?;
        let mut offsets = rest.positions.clone();
        for joint in 0..tree.num_joints() {
            if let Some(p) = tree.parent(joint) {
                let parent_row = rest.positions.row(p);
                let mut row = offsets.row_mut(joint);
                row -= &parent_row;
            }
        }
        Ok(Self { offsets })
    }

    /// # Errors
    /// ``LengthMismatch`` when ``offsets`` is not ``(num_joints, 3)``
    pub fn from_offsets(offsets: nd::Array2<f64>, tree: &KinematicTree) -> StructuralResult<Self> {
        if offsets.ncols() != 3 {
            return Err(StructuralError::LengthMismatch {
                what: "offset coordinates per joint",
                expected: 3,
                got: offsets.ncols(),
            });
        }
        tree.check_len("offsets", offsets.nrows())?;
        Ok(Self { offsets })
    }

    pub fn len(&self) -> usize {
        self.offsets.nrows()
    }
    pub fn is_empty(&self) -> bool {
        self.offsets.nrows() == 0
    }
    pub fn offset(&self, joint: usize) -> Vector3d {
        vec_from_array_d(&self.offsets, joint)
    }
    pub fn bone_length(&self, joint: usize) -> f64 {
        self.offset(joint).norm()
    }
}

/// Load-once bundle of a hierarchy, its rest pose and offsets. Cheap to clone
/// and safe to share across worker threads.
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub tree: Arc<KinematicTree>,
    pub rest: RestPose,
    pub offsets: OffsetTable,
}

impl Skeleton {
    /// # Errors
    /// Propagates rest pose validation failures
    pub fn new(tree: Arc<KinematicTree>, rest: RestPose) -> StructuralResult<Self> {
        let rest = RestPose::new(&rest.name, rest.positions, &tree)?;
        let offsets = OffsetTable::from_rest_pose(&rest, &tree)?;
        Ok(Self { tree, rest, offsets })
    }

    /// SMPL-H tree on the template T-pose
    ///
    /// # Errors
    /// Never for the built-in data
    pub fn smplh_source() -> StructuralResult<Self> {
        Self::new(Arc::new(KinematicTree::smpl_h()), RestPose::smplh_t_pose())
    }

    /// SMPL-H tree on the canonical A-pose
    ///
    /// # Errors
    /// Never for the built-in data
    pub fn smplh_target() -> StructuralResult<Self> {
        Self::new(Arc::new(KinematicTree::smpl_h()), RestPose::smplh_a_pose())
    }

    pub fn num_joints(&self) -> usize {
        self.tree.num_joints()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn chain() -> KinematicTree {
        KinematicTree::new(vec![None, Some(0), Some(1)], vec!["a".into(), "b".into(), "c".into()]).unwrap()
    }

    #[test]
    fn offsets_are_relative_to_parent() {
        let tree = chain();
        let rest = RestPose::new("chain", array![[1.0, 0.0, 0.0], [1.0, 2.0, 0.0], [1.0, 2.0, 3.0]], &tree).unwrap();
        let table = OffsetTable::from_rest_pose(&rest, &tree).unwrap();
        assert_eq!(table.offset(0), Vector3d::new(1.0, 0.0, 0.0));
        assert_eq!(table.offset(1), Vector3d::new(0.0, 2.0, 0.0));
        assert_eq!(table.offset(2), Vector3d::new(0.0, 0.0, 3.0));
        assert_relative_eq!(table.bone_length(2), 3.0);
    }

    #[test]
    fn rejects_wrong_shape_and_nan() {
        let tree = chain();
        assert!(RestPose::new("short", nd::Array2::zeros((2, 3)), &tree).is_err());
        let mut bad = nd::Array2::zeros((3, 3));
        bad[[1, 2]] = f64::NAN;
        assert_eq!(RestPose::new("nan", bad, &tree).unwrap_err(), StructuralError::NonFiniteRest { joint: 1 });
    }

    #[test]
    fn builtin_rest_poses_fit_the_smpl_h_tree() {
        let source = Skeleton::smplh_source().unwrap();
        let target = Skeleton::smplh_target().unwrap();
        assert_eq!(source.offsets.len(), 52);
        assert_eq!(target.offsets.len(), 52);
        // A-pose pelvis sits at hip height on a Z-up axis
        assert_relative_eq!(target.rest.root_position(&target.tree).z, 0.95636375);
        for skeleton in [&source, &target] {
            let spine = skeleton.offsets.bone_length(3);
            assert!(spine > 0.05 && spine < 0.15, "{}: spine is {spine}m", skeleton.rest.name);
        }
    }
}
