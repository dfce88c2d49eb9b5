use crate::{
    common::{
        rest_pose::Skeleton,
        retarget::{RetargetedClip, RetargetedFrame},
    },
    error::{InputError, InputResult, SinkError, SinkResult},
};
use log::info;
use ndarray as nd;
use ndarray_npy::{NpzReader, NpzWriter};
use retarget_utils::vector::{quat_from_xyzw, Vector3d, Vector4d};
use std::{
    fs::File,
    io::{Seek, Write},
    path::{Path, PathBuf},
};

pub const OUTPUT_SUFFIX: &str = "_retargeted";
/// File stem of the exported target rest pose
pub const REST_POSE_STEM: &str = "target_reference";

/// ``<dir>/<clip_name>_retargeted.npz``
pub fn output_file(dir: &Path, clip_name: &str) -> PathBuf {
    dir.join(format!("{clip_name}{OUTPUT_SUFFIX}.npz"))
}

/// What a sink did with a clip
#[derive(Clone, Debug, PartialEq)]
pub struct AssembledClip {
    pub name: String,
    pub frames: usize,
    pub location: Option<PathBuf>,
}

/// Receives finished clips and turns them into whatever the host consumes.
/// Implementations own their output and never write back into the input.
pub trait AnimationSink {
    /// # Errors
    /// Implementation specific, reported per clip
    fn assemble(&mut self, clip: &RetargetedClip, target: &Skeleton) -> SinkResult<AssembledClip>;

    /// The single frame rest pose of ``target``. Sinks that name their
    /// outputs keep it apart from retargeted clips.
    ///
    /// # Errors
    /// As ``assemble``
    fn assemble_rest_pose(&mut self, clip: &RetargetedClip, target: &Skeleton) -> SinkResult<AssembledClip> {
        self.assemble(clip, target)
    }
}

/// Keeps every clip in memory, for embedding and tests
#[derive(Default, Debug)]
pub struct CollectingSink {
    pub clips: Vec<RetargetedClip>,
}
impl AnimationSink for CollectingSink {
    fn assemble(&mut self, clip: &RetargetedClip, _target: &Skeleton) -> SinkResult<AssembledClip> {
        self.clips.push(clip.clone());
        Ok(AssembledClip {
            name: clip.source_name.clone(),
            frames: clip.num_frames(),
            location: None,
        })
    }
}

/// Writes each clip to ``<out_dir>/<name>_retargeted.npz`` with the target
/// skeleton it is meant to be played on
#[derive(Clone, Debug)]
pub struct RetargetedNpzWriter {
    out_dir: PathBuf,
    write_joint_positions: bool,
    protected: Vec<PathBuf>,
}

impl RetargetedNpzWriter {
    pub fn new(out_dir: &Path) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
            write_joint_positions: false,
            protected: Vec::new(),
        }
    }
    /// Also store world joint positions as ``jointPositions``
    #[must_use]
    pub fn with_joint_positions(mut self, enabled: bool) -> Self {
        self.write_joint_positions = enabled;
        self
    }
    /// Refuse to write over ``path``
    #[must_use]
    pub fn protecting(mut self, path: &Path) -> Self {
        self.protected.push(path.to_path_buf());
        self
    }
    pub fn output_path(&self, clip_name: &str) -> PathBuf {
        output_file(&self.out_dir, clip_name)
    }

    /// # Errors
    /// ``Npz`` when an array cannot be encoded or the clip does not fit the
    /// target
    pub fn write_to_npz<W: Write + Seek>(&self, clip: &RetargetedClip, target: &Skeleton, npz: &mut NpzWriter<W>) -> SinkResult<()> {
        let npz_err = |e: ndarray_npy::WriteNpzError| SinkError::Npz(e.to_string());
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let frame_count = clip.num_frames() as i32;
        npz.add_array("frameCount", &nd::Array0::<i32>::from_elem((), frame_count))
            .map_err(npz_err)?;
        npz.add_array("frameRate", &nd::Array0::<f32>::from_elem((), clip.frame_rate))
            .map_err(npz_err)?;
        npz.add_array("jointParents", &nd::Array1::from(target.tree.parent_ids()))
            .map_err(npz_err)?;
        npz.add_array("restOffsets", &target.offsets.offsets).map_err(npz_err)?;
        npz.add_array("restPositions", &target.rest.positions).map_err(npz_err)?;
        npz.add_array("localRotations", &clip.local_rotations_array()).map_err(npz_err)?;
        npz.add_array("rootPositions", &clip.root_positions_array()).map_err(npz_err)?;
        if self.write_joint_positions {
            let n = target.num_joints();
            let mut positions = nd::Array3::<f64>::zeros((clip.num_frames(), n, 3));
            for (f, frame) in clip.frames.iter().enumerate() {
                let fk = frame
                    .world_positions(&target.offsets, &target.tree)
                    .map_err(|e| SinkError::Npz(e.to_string()))?;
                positions.index_axis_mut(nd::Axis(0), f).assign(&fk.positions_array());
            }
            npz.add_array("jointPositions", &positions).map_err(npz_err)?;
        }
        Ok(())
    }
}

impl RetargetedNpzWriter {
    fn write_file(&self, clip: &RetargetedClip, target: &Skeleton, path: PathBuf) -> SinkResult<AssembledClip> {
        if self.protected.iter().any(|p| p == &path) {
            return Err(SinkError::WouldOverwriteInput(path));
        }
        std::fs::create_dir_all(&self.out_dir).map_err(|source| SinkError::Io {
            path: self.out_dir.clone(),
            source,
        })?;
        let file = File::create(&path).map_err(|source| SinkError::Io { path: path.clone(), source })?;
        let mut npz = NpzWriter::new_compressed(file);
        self.write_to_npz(clip, target, &mut npz)?;
        npz.finish().map_err(|e| SinkError::Npz(e.to_string()))?;
        info!("wrote {} frames to {}", clip.num_frames(), path.display());
        Ok(AssembledClip {
            name: clip.source_name.clone(),
            frames: clip.num_frames(),
            location: Some(path),
        })
    }
}

impl AnimationSink for RetargetedNpzWriter {
    fn assemble(&mut self, clip: &RetargetedClip, target: &Skeleton) -> SinkResult<AssembledClip> {
        self.write_file(clip, target, self.output_path(&clip.source_name))
    }
    /// Written to ``<out_dir>/target_reference.npz``
    fn assemble_rest_pose(&mut self, clip: &RetargetedClip, target: &Skeleton) -> SinkResult<AssembledClip> {
        self.write_file(clip, target, self.out_dir.join(format!("{REST_POSE_STEM}.npz")))
    }
}

/// Reads a file written by ``RetargetedNpzWriter`` back into a clip
///
/// # Errors
/// ``Io`` and ``Npz`` for unreadable files, ``MissingKey`` and ``WrongShape``
/// for files of another layout
pub fn load_retargeted_npz(path: &Path) -> InputResult<RetargetedClip> {
    let file = File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut npz = NpzReader::new(file).map_err(|e| InputError::Npz(e.to_string()))?;
    let rotations: nd::Array3<f64> = npz.by_name("localRotations").map_err(|_| InputError::MissingKey("localRotations"))?;
    let roots: nd::Array2<f64> = npz.by_name("rootPositions").map_err(|_| InputError::MissingKey("rootPositions"))?;
    let frame_rate: nd::Array0<f32> = npz.by_name("frameRate").map_err(|_| InputError::MissingKey("frameRate"))?;
    if rotations.dim().2 != 4 || roots.ncols() != 3 || roots.nrows() != rotations.dim().0 {
        return Err(InputError::WrongShape {
            key: "localRotations",
            got: rotations.shape().to_vec(),
            expected: "(frames, joints, 4) with matching (frames, 3) roots".to_owned(),
        });
    }
    let frames = rotations
        .outer_iter()
        .zip(roots.outer_iter())
        .map(|(rots, root)| RetargetedFrame {
            local_rotations: rots
                .outer_iter()
                .map(|q| quat_from_xyzw(&Vector4d::new(q[0], q[1], q[2], q[3])))
                .collect(),
            root_position: Vector3d::new(root[0], root[1], root[2]),
        })
        .collect();
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("clip");
    Ok(RetargetedClip {
        frames,
        frame_rate: frame_rate.into_scalar(),
        source_name: stem.strip_suffix(OUTPUT_SUFFIX).unwrap_or(stem).to_owned(),
    })
}
