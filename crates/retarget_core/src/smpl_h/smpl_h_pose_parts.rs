use crate::common::{metadata::smplh_metadata, pose_parts::PosePart};
use enum_map::EnumMap;
use std::ops::Range;
pub struct PosePartRanges {
    pub parts2jointranges: EnumMap<PosePart, Range<usize>>,
}
impl PosePartRanges {
    /// Joint ranges of the SMPL-H tree. ``RootTranslation`` owns no joint
    /// rotation and keeps an empty range.
    pub fn smpl_h() -> Self {
        Self {
            parts2jointranges: smplh_metadata().parts2jointranges,
        }
    }
    /// Part a joint belongs to, ``None`` past the end of the tree
    pub fn part_of_joint(&self, joint: usize) -> Option<PosePart> {
        self.parts2jointranges
            .iter()
            .find(|(part, range)| *part != PosePart::RootTranslation && range.contains(&joint))
            .map(|(part, _)| part)
    }
}
