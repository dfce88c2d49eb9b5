pub mod motion_npz;
pub mod pose_json;
pub mod reference;
pub mod retargeted_npz;
