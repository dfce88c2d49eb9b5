pub mod rest_poses;
pub mod smpl_h;
pub mod smpl_h_pose_parts;
