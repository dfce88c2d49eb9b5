use crate::{
    common::{alignment::canonical_rest_rotations, kinematic_tree::KinematicTree},
    error::{ReferenceError, ReferenceResult},
};
use log::{info, warn};
use nalgebra as na;
use retarget_utils::{numerical::ROTATION_EPSILON, vector::UnitQuaterniond};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
};

/// Local rotation of one bone. ``rotation_quaternion`` is ``[w, x, y, z]`` and
/// wins over ``rotation_euler`` (radians, ``XYZ`` order only).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BonePoseJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_quaternion: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_euler: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_mode: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoneEntryJson {
    #[serde(default)]
    pub pose: Option<BonePoseJson>,
}

/// Pose file layout: ``{"bones": {"L_Shoulder": {"pose": {...}}, ...}}``.
/// Other keys (locations, world matrices) are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseJson {
    #[serde(default)]
    pub bones: BTreeMap<String, BoneEntryJson>,
}

impl BonePoseJson {
    fn rotation(&self, bone: &str) -> ReferenceResult<Option<UnitQuaterniond>> {
        if let Some([w, x, y, z]) = self.rotation_quaternion {
            let q = na::Quaternion::new(w, x, y, z);
            if !q.coords.iter().all(|c| c.is_finite()) || q.norm() < ROTATION_EPSILON {
                return Err(ReferenceError::Unreadable(format!("bone {bone}: degenerate rotation_quaternion")));
            }
            return Ok(Some(UnitQuaterniond::from_quaternion(q)));
        }
        if let Some([x, y, z]) = self.rotation_euler {
            match self.rotation_mode.as_deref() {
                None | Some("XYZ") => {}
                Some(mode) => {
                    return Err(ReferenceError::Unreadable(format!("bone {bone}: unsupported rotation mode {mode}")));
                }
            }
            if ![x, y, z].iter().all(|a| a.is_finite()) {
                return Err(ReferenceError::Unreadable(format!("bone {bone}: non-finite rotation_euler")));
            }
            // XYZ: x applied first, then y, then z
            return Ok(Some(UnitQuaterniond::from_euler_angles(x, y, z)));
        }
        Ok(None)
    }
}

impl PoseJson {
    /// One local rotation per joint of ``tree``. Joints the file does not
    /// list stay at identity, bones unknown to the tree are skipped with a
    /// warning.
    ///
    /// # Errors
    /// ``MissingKey("bones")`` when no bone is listed, ``Unreadable`` for a
    /// rotation that cannot be used
    pub fn to_rotations(&self, tree: &KinematicTree) -> ReferenceResult<Vec<UnitQuaterniond>> {
        if self.bones.is_empty() {
            return Err(ReferenceError::MissingKey("bones"));
        }
        let mut rotations = canonical_rest_rotations(tree.num_joints());
        let mut applied = 0;
        for (name, entry) in &self.bones {
            let Some(joint) = tree.index_of(name) else {
                warn!("pose file lists unknown bone '{name}', skipped");
                continue;
            };
            if let Some(rotation) = entry.pose.as_ref().map(|p| p.rotation(name)).transpose()?.flatten() {
                rotations[joint] = rotation;
                applied += 1;
            }
        }
        info!("pose file sets {applied} of {} joints", tree.num_joints());
        Ok(rotations)
    }

    /// # Errors
    /// ``NotFound`` for a missing file, ``Unreadable`` for IO or JSON errors
    pub fn from_file(path: &Path) -> ReferenceResult<Self> {
        if !path.exists() {
            return Err(ReferenceError::NotFound(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|e| ReferenceError::Unreadable(format!("{}: {e}", path.display())))?;
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| ReferenceError::Unreadable(e.to_string()))
    }
}

/// Rotations frame 0 is overridden with, and where they came from
#[derive(Debug)]
pub struct LoadedPose {
    pub rotations: Vec<UnitQuaterniond>,
    /// the pose file in use, ``None`` for the target rest pose
    pub source: Option<PathBuf>,
    pub fallback: Option<ReferenceError>,
}

impl LoadedPose {
    pub fn is_rest_pose(&self) -> bool {
        self.source.is_none()
    }
}

/// The pose at ``path`` or, without a path or when it cannot be used, the
/// target rest pose (identity everywhere) with a warning
pub fn load_pose_or_rest(path: Option<&Path>, tree: &KinematicTree) -> LoadedPose {
    let rest = || canonical_rest_rotations(tree.num_joints());
    let Some(path) = path else {
        return LoadedPose {
            rotations: rest(),
            source: None,
            fallback: None,
        };
    };
    match PoseJson::from_file(path).and_then(|pose| pose.to_rotations(tree)) {
        Ok(rotations) => {
            info!("frame 0 will use the pose in {}", path.display());
            LoadedPose {
                rotations,
                source: Some(path.to_path_buf()),
                fallback: None,
            }
        }
        Err(err) => {
            warn!("pose file {} rejected ({err}), frame 0 keeps the target rest pose", path.display());
            LoadedPose {
                rotations: rest(),
                source: None,
                fallback: Some(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use retarget_utils::vector::Vector3d;
    use std::f64::consts::FRAC_PI_2;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("retarget_core_pose_json_{}_{name}", std::process::id()))
    }

    #[test]
    fn listed_bones_are_set_and_others_stay_identity() {
        let tree = KinematicTree::smpl_h();
        let json = r#"{"bones": {
            "L_Shoulder": {"pose": {"rotation_quaternion": [0.7071067811865476, 0.0, 0.0, 0.7071067811865476], "location": [0, 0, 0]}},
            "R_Elbow": {"pose": {"rotation_euler": [1.5707963267948966, 0.0, 0.0], "rotation_mode": "XYZ"}},
            "Tail": {"pose": {"rotation_euler": [0.1, 0.0, 0.0]}},
            "Head": {}
        }}"#;
        let pose: PoseJson = serde_json::from_str(json).unwrap();
        let rotations = pose.to_rotations(&tree).unwrap();
        assert_eq!(rotations.len(), 52);

        let shoulder = tree.index_of("L_Shoulder").unwrap();
        assert_relative_eq!(rotations[shoulder].angle(), FRAC_PI_2, epsilon = 1e-9);
        assert_relative_eq!(rotations[shoulder] * Vector3d::x(), Vector3d::y(), epsilon = 1e-9);
        let elbow = tree.index_of("R_Elbow").unwrap();
        assert_relative_eq!(rotations[elbow] * Vector3d::y(), Vector3d::z(), epsilon = 1e-9);
        let touched = [shoulder, elbow];
        for (joint, q) in rotations.iter().enumerate() {
            if !touched.contains(&joint) {
                assert_eq!(*q, UnitQuaterniond::identity(), "joint {joint}");
            }
        }
    }

    #[test]
    fn unusable_pose_files_are_errors() {
        let tree = KinematicTree::smpl_h();
        let empty: PoseJson = serde_json::from_str("{}").unwrap();
        assert!(matches!(empty.to_rotations(&tree), Err(ReferenceError::MissingKey("bones"))));
        let zero: PoseJson = serde_json::from_str(r#"{"bones": {"Pelvis": {"pose": {"rotation_quaternion": [0, 0, 0, 0]}}}}"#).unwrap();
        assert!(zero.to_rotations(&tree).is_err());
        let zyx: PoseJson = serde_json::from_str(r#"{"bones": {"Pelvis": {"pose": {"rotation_euler": [0, 0, 1], "rotation_mode": "ZYX"}}}}"#).unwrap();
        assert!(zyx.to_rotations(&tree).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_rest() {
        let tree = KinematicTree::smpl_h();
        let loaded = load_pose_or_rest(Some(&temp_path("missing.json")), &tree);
        assert!(loaded.is_rest_pose());
        assert!(matches!(loaded.fallback, Some(ReferenceError::NotFound(_))));
        assert!(loaded.rotations.iter().all(|q| *q == UnitQuaterniond::identity()));

        let path = temp_path("wave.json");
        std::fs::write(&path, r#"{"bones": {"L_Wrist": {"pose": {"rotation_quaternion": [0.0, 1.0, 0.0, 0.0]}}}}"#).unwrap();
        let loaded = load_pose_or_rest(Some(&path), &tree);
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
        assert!(loaded.fallback.is_none());
        assert_relative_eq!(loaded.rotations[20].angle(), std::f64::consts::PI, epsilon = 1e-9);
        std::fs::remove_file(&path).ok();
    }
}
