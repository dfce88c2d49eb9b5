pub mod alignment;
pub mod animation;
pub mod fk;
pub mod kinematic_tree;
pub mod metadata;
pub mod pose;
pub mod pose_parts;
pub mod rest_pose;
pub mod retarget;
pub mod retarget_options;
pub mod rotation;
pub mod types;
pub mod validation;
