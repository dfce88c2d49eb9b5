use super::pose_parts::PosePart;
use crate::smpl_h::smpl_h;
use enum_map::EnumMap;
use std::ops::Range;

/// Everything the rest of the crate needs to know about the SMPL-H hierarchy,
/// in one place
#[derive(Clone, Debug)]
pub struct SmplhMetadata {
    pub num_body_joints: usize,
    pub num_hand_joints: usize,
    pub num_joints: usize,
    pub parts2jointranges: EnumMap<PosePart, Range<usize>>,
    pub joint_parents: Vec<i32>,
    pub joint_names: Vec<String>,
    /// ``(joint, child)`` pairs aimed along ``child`` instead of the first child
    pub preferred_children: Vec<(usize, usize)>,
}

pub fn smplh_metadata() -> SmplhMetadata {
    let mut parts2jointranges: EnumMap<PosePart, Range<usize>> = EnumMap::default();
    let body_start = 1;
    let left_start = body_start + smpl_h::NUM_BODY_JOINTS;
    let right_start = left_start + smpl_h::NUM_HAND_JOINTS;
    parts2jointranges[PosePart::RootTranslation] = 0..0;
    parts2jointranges[PosePart::RootRotation] = 0..body_start;
    parts2jointranges[PosePart::Body] = body_start..left_start;
    parts2jointranges[PosePart::LeftHand] = left_start..right_start;
    parts2jointranges[PosePart::RightHand] = right_start..right_start + smpl_h::NUM_HAND_JOINTS;

    SmplhMetadata {
        num_body_joints: smpl_h::NUM_BODY_JOINTS,
        num_hand_joints: smpl_h::NUM_HAND_JOINTS,
        num_joints: smpl_h::NUM_JOINTS,
        parts2jointranges,
        joint_parents: smpl_h::PARENT_ID_PER_JOINT.to_vec(),
        joint_names: smpl_h::JOINT_NAMES.map(std::string::ToString::to_string).to_vec(),
        preferred_children: vec![(smpl_h::PELVIS, smpl_h::SPINE1)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_tables_agree() {
        let meta = smplh_metadata();
        assert_eq!(meta.num_joints, 1 + meta.num_body_joints + 2 * meta.num_hand_joints);
        assert_eq!(meta.joint_parents.len(), meta.num_joints);
        assert_eq!(meta.joint_names.len(), meta.num_joints);
        assert_eq!(meta.parts2jointranges[PosePart::RightHand].end, meta.num_joints);
        assert_eq!(meta.parts2jointranges[PosePart::LeftHand], 22..37);
        assert_eq!(meta.joint_names[0], "Pelvis");
    }
}
