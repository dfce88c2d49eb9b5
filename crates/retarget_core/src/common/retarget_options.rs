use super::types::{AlignMode, LeafPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options for retargeting and aligning clips. Every field has a default so a
/// partial JSON file only overrides what it names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetargetOptions {
    pub align_mode: AlignMode,
    /// world position the first root sample is moved to, defaults to the
    /// target rest pose root
    pub reference_root: Option<[f64; 3]>,
    pub rest_basis_correction: bool,
    pub leaf_policy: LeafPolicy,
    pub mismatch_tolerance_deg: f64,
    pub default_frame_rate: f32,
    pub write_joint_positions: bool,
    pub parallel_frames: bool,
    /// unit conversion for a custom reference, 0.01 for centimetres
    pub reference_scale: f64,
    /// JSON pose file frame 0 is overridden with instead of the target rest
    /// pose
    pub first_frame_pose: Option<PathBuf>,
}
impl Default for RetargetOptions {
    fn default() -> Self {
        Self {
            align_mode: AlignMode::default(),
            reference_root: None,
            rest_basis_correction: true,
            leaf_policy: LeafPolicy::default(),
            mismatch_tolerance_deg: 5.0,
            default_frame_rate: 60.0,
            write_joint_positions: false,
            parallel_frames: true,
            reference_scale: 1.0,
            first_frame_pose: None,
        }
    }
}
impl RetargetOptions {
    /// # Errors
    /// Will return `Err` if the JSON is malformed or has fields of the wrong type
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
