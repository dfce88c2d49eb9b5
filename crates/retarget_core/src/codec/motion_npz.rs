use crate::{
    common::animation::MotionClip,
    error::{InputError, InputResult, SinkError, SinkResult},
};
use log::debug;
use ndarray as nd;
use ndarray_npy::{NpzReader, NpzWriter};
use serde::Serialize;
use std::{
    fs::File,
    io::{Cursor, Read, Seek, Write},
    path::Path,
};

const FRAME_RATE_KEYS: [&str; 3] = ["mocap_framerate", "mocap_frame_rate", "frameRate"];

/// Reader and writer for AMASS style motion archives: ``poses`` as ``(F,
/// 3N)`` or ``(F, N, 3)`` axis-angle values, ``trans`` as ``(F, 3)``, and the
/// optional ``mocap_framerate`` and ``betas``. Both ``f64`` and ``f32``
/// arrays are accepted.
pub struct MotionNpzCodec;

fn has_key(names: &[String], key: &str) -> bool {
    names.iter().any(|n| n == key || n.strip_suffix(".npy") == Some(key))
}

fn read_any<R: Read + Seek>(npz: &mut NpzReader<R>, key: &'static str) -> InputResult<nd::ArrayD<f64>> {
    match npz.by_name::<nd::OwnedRepr<f64>, nd::IxDyn>(key) {
        Ok(arr) => Ok(arr),
        Err(err_f64) => npz
            .by_name::<nd::OwnedRepr<f32>, nd::IxDyn>(key)
            .map(|arr| arr.mapv(f64::from))
            .map_err(|_| InputError::Npz(format!("{key}: {err_f64}"))),
    }
}

impl MotionNpzCodec {
    /// # Errors
    /// ``Io`` when the file cannot be opened, otherwise as
    /// ``MotionNpzCodec::from_reader``
    pub fn from_file(path: &Path, default_frame_rate: f32) -> InputResult<MotionClip> {
        let file = File::open(path).map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("clip");
        Self::from_reader(file, name, default_frame_rate)
    }

    /// # Errors
    /// As ``MotionNpzCodec::from_reader``
    pub fn from_buf(buf: &[u8], name: &str, default_frame_rate: f32) -> InputResult<MotionClip> {
        Self::from_reader(Cursor::new(buf), name, default_frame_rate)
    }

    /// # Errors
    /// ``Npz`` for an unreadable archive, ``MissingKey`` without ``poses`` or
    /// ``trans``, ``WrongShape`` for arrays of the wrong rank, and every
    /// validation error of ``MotionClip::new_from_matrices``
    pub fn from_reader<R: Read + Seek>(reader: R, name: &str, default_frame_rate: f32) -> InputResult<MotionClip> {
        let mut npz = NpzReader::new(reader).map_err(|e| InputError::Npz(e.to_string()))?;
        let names = npz.names().map_err(|e| InputError::Npz(e.to_string()))?;
        debug!("npz names is {names:?}");

        if !has_key(&names, "poses") {
            return Err(InputError::MissingKey("poses"));
        }
        if !has_key(&names, "trans") {
            return Err(InputError::MissingKey("trans"));
        }

        let poses = read_any(&mut npz, "poses")?;
        let poses_shape = poses.shape().to_vec();
        let per_frame_joint_poses = match poses_shape.as_slice() {
            &[nr_frames, nr_values] if nr_values % 3 == 0 => poses
                .into_shape_with_order((nr_frames, nr_values / 3, 3))
                .map_err(|e| InputError::Npz(format!("poses: {e}")))?,
            &[_, _, 3] => poses
                .into_dimensionality::<nd::Ix3>()
                .map_err(|e| InputError::Npz(format!("poses: {e}")))?,
            _ => {
                return Err(InputError::WrongShape {
                    key: "poses",
                    got: poses.shape().to_vec(),
                    expected: "(frames, 3 * joints) or (frames, joints, 3)".to_owned(),
                })
            }
        };

        let trans = read_any(&mut npz, "trans")?;
        let trans_shape = trans.shape().to_vec();
        let per_frame_root_trans = trans.into_dimensionality::<nd::Ix2>().map_err(|_| InputError::WrongShape {
            key: "trans",
            got: trans_shape,
            expected: "(frames, 3)".to_owned(),
        })?;

        let mut frame_rate = default_frame_rate;
        for key in FRAME_RATE_KEYS {
            if has_key(&names, key) {
                let arr = read_any(&mut npz, key)?;
                if let Some(fps) = arr.iter().next() {
                    #[allow(clippy::cast_possible_truncation)]
                    let fps = *fps as f32;
                    frame_rate = fps;
                }
                break;
            }
        }

        let shape_parameters = if has_key(&names, "betas") {
            let betas = read_any(&mut npz, "betas")?;
            Some(betas.iter().copied().collect::<nd::Array1<f64>>())
        } else {
            None
        };

        MotionClip::new_from_matrices(per_frame_joint_poses, per_frame_root_trans, frame_rate, shape_parameters, name)
    }

    /// Writes ``clip`` in the same layout it is read from, ``poses`` flattened
    /// to ``(F, 3N)``
    ///
    /// # Errors
    /// ``Io`` when the file cannot be created, ``Npz`` when encoding fails
    pub fn to_file(clip: &MotionClip, path: &Path) -> SinkResult<()> {
        let file = File::create(path).map_err(|source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut npz = NpzWriter::new_compressed(file);
        Self::write_to_npz(clip, &mut npz)?;
        npz.finish().map_err(|e| SinkError::Npz(e.to_string()))?;
        Ok(())
    }

    /// # Errors
    /// ``Npz`` when an array cannot be encoded
    pub fn write_to_npz<W: Write + Seek>(clip: &MotionClip, npz: &mut NpzWriter<W>) -> SinkResult<()> {
        let (nr_frames, nr_joints, _) = clip.per_frame_joint_poses.dim();
        let flat = clip
            .per_frame_joint_poses
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((nr_frames, nr_joints * 3))
            .map_err(|e| SinkError::Npz(e.to_string()))?;
        let npz_err = |e: ndarray_npy::WriteNpzError| SinkError::Npz(e.to_string());
        npz.add_array("poses", &flat).map_err(npz_err)?;
        npz.add_array("trans", &clip.per_frame_root_trans).map_err(npz_err)?;
        npz.add_array("mocap_framerate", &nd::Array0::<f64>::from_elem((), f64::from(clip.frame_rate)))
            .map_err(npz_err)?;
        if let Some(betas) = &clip.shape_parameters {
            npz.add_array("betas", betas).map_err(npz_err)?;
        }
        Ok(())
    }
}

/// Quick facts about a clip, printed by the inspector
#[derive(Clone, Debug, Serialize)]
pub struct ClipSummary {
    pub name: String,
    pub frames: usize,
    pub joints: usize,
    pub frame_rate: f32,
    pub duration_secs: f32,
    pub has_shape_parameters: bool,
    /// per axis range covered by the root translation
    pub root_extent: [f64; 3],
    pub first_root_translation: [f64; 3],
}

impl ClipSummary {
    pub fn from_clip(clip: &MotionClip) -> Self {
        let mut root_extent = [0.0; 3];
        for (axis, extent) in root_extent.iter_mut().enumerate() {
            let column = clip.per_frame_root_trans.column(axis);
            let min = column.iter().copied().fold(f64::INFINITY, f64::min);
            let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            *extent = max - min;
        }
        let first = clip.root_translation(0);
        Self {
            name: clip.name.clone(),
            frames: clip.num_frames(),
            joints: clip.num_joints(),
            frame_rate: clip.frame_rate,
            duration_secs: clip.duration().as_secs_f32(),
            has_shape_parameters: clip.shape_parameters.is_some(),
            root_extent,
            first_root_translation: [first.x, first.y, first.z],
        }
    }
}
