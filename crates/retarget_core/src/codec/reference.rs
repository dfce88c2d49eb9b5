use crate::{
    common::{
        kinematic_tree::KinematicTree,
        rest_pose::{OffsetTable, RestPose},
    },
    error::{ReferenceError, ReferenceResult, SinkError, SinkResult},
};
use log::{info, warn};
use ndarray as nd;
use ndarray_npy::{NpzReader, NpzWriter};
use retarget_utils::io::FileType;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{Read, Seek},
    path::Path,
};

/// Largest disagreement tolerated between stored offsets and the offsets
/// derived from the stored absolute positions, in file units
const OFFSET_CONSISTENCY_TOLERANCE: f64 = 1e-4;

/// JSON layout of a reference skeleton
#[derive(Debug, Serialize, Deserialize)]
pub struct ReferenceJson {
    #[serde(default)]
    pub joint_names: Option<Vec<String>>,
    pub absolute_joint_positions: Vec<[f64; 3]>,
}

/// Loads and stores custom target rest poses, either as an npz archive with
/// ``J_ABSOLUTE`` (and optionally ``SMPL_OFFSETS``) or as JSON
pub struct ReferenceCodec;

fn read_positions<R: Read + Seek>(npz: &mut NpzReader<R>, key: &'static str) -> ReferenceResult<nd::Array2<f64>> {
    match npz.by_name::<nd::OwnedRepr<f64>, nd::Ix2>(key) {
        Ok(arr) => Ok(arr),
        Err(err_f64) => npz
            .by_name::<nd::OwnedRepr<f32>, nd::Ix2>(key)
            .map(|arr| arr.mapv(f64::from))
            .map_err(|_| ReferenceError::Unreadable(format!("{key}: {err_f64}"))),
    }
}

fn check_joint_count(tree: &KinematicTree, got: usize) -> ReferenceResult<()> {
    if got == tree.num_joints() {
        Ok(())
    } else {
        Err(ReferenceError::WrongJointCount {
            expected: tree.num_joints(),
            got,
        })
    }
}

impl ReferenceCodec {
    /// Picks the loader from the file extension
    ///
    /// # Errors
    /// ``NotFound`` for a missing file, ``UnsupportedFormat`` for anything but
    /// npz and json, and the loader's own errors
    pub fn from_path(path: &Path, tree: &KinematicTree, scale: f64) -> ReferenceResult<RestPose> {
        if !path.exists() {
            return Err(ReferenceError::NotFound(path.to_path_buf()));
        }
        match FileType::from_path(path) {
            FileType::Npz => Self::from_npz(path, tree, scale),
            FileType::Json => Self::from_json(path, tree, scale),
            FileType::Unknown => Err(ReferenceError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// # Errors
    /// ``Unreadable`` for a broken archive, ``MissingKey`` without
    /// ``J_ABSOLUTE``, ``WrongJointCount``, ``InconsistentOffsets`` when
    /// ``SMPL_OFFSETS`` disagrees with ``J_ABSOLUTE``, and rest pose
    /// validation errors
    pub fn from_npz(path: &Path, tree: &KinematicTree, scale: f64) -> ReferenceResult<RestPose> {
        let file = File::open(path).map_err(|e| ReferenceError::Unreadable(format!("{}: {e}", path.display())))?;
        let mut npz = NpzReader::new(file).map_err(|e| ReferenceError::Unreadable(e.to_string()))?;
        let names = npz.names().map_err(|e| ReferenceError::Unreadable(e.to_string()))?;
        let has = |key: &str| names.iter().any(|n| n == key || n.strip_suffix(".npy") == Some(key));
        if !has("J_ABSOLUTE") {
            return Err(ReferenceError::MissingKey("J_ABSOLUTE"));
        }
        let check_offsets = has("SMPL_OFFSETS");

        let positions = read_positions(&mut npz, "J_ABSOLUTE")?;
        check_joint_count(tree, positions.nrows())?;
        let rest = RestPose::new(&stem_name(path), positions, tree)?;

        if check_offsets {
            let stored = read_positions(&mut npz, "SMPL_OFFSETS")?;
            check_joint_count(tree, stored.nrows())?;
            let derived = OffsetTable::from_rest_pose(&rest, tree)?;
            for (joint, (a, b)) in stored.outer_iter().zip(derived.offsets.outer_iter()).enumerate() {
                if a.iter().zip(b.iter()).any(|(x, y)| (x - y).abs() > OFFSET_CONSISTENCY_TOLERANCE) {
                    return Err(ReferenceError::InconsistentOffsets { joint });
                }
            }
        }
        Ok(rest.scaled(scale))
    }

    /// # Errors
    /// ``Unreadable`` for IO or JSON errors, ``WrongJointCount``,
    /// ``NameMismatch`` when the listed names differ from the tree's, and
    /// rest pose validation errors
    pub fn from_json(path: &Path, tree: &KinematicTree, scale: f64) -> ReferenceResult<RestPose> {
        let file = File::open(path).map_err(|e| ReferenceError::Unreadable(format!("{}: {e}", path.display())))?;
        let reader = std::io::BufReader::new(file);
        let parsed: ReferenceJson = serde_json::from_reader(reader).map_err(|e| ReferenceError::Unreadable(e.to_string()))?;
        Self::from_reference_json(parsed, &stem_name(path), tree, scale)
    }

    /// # Errors
    /// As ``ReferenceCodec::from_json`` minus the IO part
    pub fn from_reference_json(parsed: ReferenceJson, name: &str, tree: &KinematicTree, scale: f64) -> ReferenceResult<RestPose> {
        check_joint_count(tree, parsed.absolute_joint_positions.len())?;
        if let Some(names) = &parsed.joint_names {
            check_joint_count(tree, names.len())?;
            if let Some(joint) = (0..names.len()).find(|j| names[*j] != tree.name(*j)) {
                return Err(ReferenceError::NameMismatch {
                    joint,
                    expected: tree.name(joint).to_owned(),
                    got: names[joint].clone(),
                });
            }
        }
        let rest = RestPose::from_fixed(name, &parsed.absolute_joint_positions);
        let rest = RestPose::new(&rest.name, rest.positions, tree)?;
        Ok(rest.scaled(scale))
    }

    /// Writes ``J_ABSOLUTE`` and ``SMPL_OFFSETS`` for ``rest``
    ///
    /// # Errors
    /// ``Io`` when the file cannot be created, ``Npz`` when encoding fails
    pub fn to_npz(rest: &RestPose, tree: &KinematicTree, path: &Path) -> SinkResult<()> {
        let offsets = OffsetTable::from_rest_pose(rest, tree).map_err(|e| SinkError::Npz(e.to_string()))?;
        let file = File::create(path).map_err(|source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let npz_err = |e: ndarray_npy::WriteNpzError| SinkError::Npz(e.to_string());
        let mut npz = NpzWriter::new_compressed(file);
        npz.add_array("J_ABSOLUTE", &rest.positions).map_err(npz_err)?;
        npz.add_array("SMPL_OFFSETS", &offsets.offsets).map_err(npz_err)?;
        npz.finish().map_err(npz_err)?;
        Ok(())
    }

    /// JSON form of ``rest`` with the tree's joint names
    pub fn to_json(rest: &RestPose, tree: &KinematicTree) -> ReferenceJson {
        ReferenceJson {
            joint_names: Some(tree.names().to_vec()),
            absolute_joint_positions: rest.positions.outer_iter().map(|r| [r[0], r[1], r[2]]).collect(),
        }
    }
}

fn stem_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("reference")
        .to_owned()
}

/// Target rest pose actually in use, and the reason the requested reference
/// was rejected when the built-in one had to stand in
#[derive(Debug)]
pub struct LoadedReference {
    pub rest: RestPose,
    pub fallback: Option<ReferenceError>,
}

impl LoadedReference {
    pub fn used_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Loads the custom reference at ``path`` or falls back to the built-in
/// A-pose. A fallback is logged as a warning and reported in the result so
/// callers can tell the two apart.
pub fn load_reference_or_default(path: Option<&Path>, tree: &KinematicTree, scale: f64) -> LoadedReference {
    let Some(path) = path else {
        return LoadedReference {
            rest: RestPose::smplh_a_pose(),
            fallback: None,
        };
    };
    match ReferenceCodec::from_path(path, tree, scale) {
        Ok(rest) => {
            info!("using target reference {}", path.display());
            LoadedReference { rest, fallback: None }
        }
        Err(err) => {
            warn!("target reference {} rejected ({err}), using default target (A-pose)", path.display());
            LoadedReference {
                rest: RestPose::smplh_a_pose(),
                fallback: Some(err),
            }
        }
    }
}
