use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// Enum for pose parts, for chunking
#[derive(Eq, PartialEq, Copy, Clone, Hash, Debug, Enum, EnumIter, Display, Serialize, Deserialize)]
pub enum PosePart {
    RootTranslation,
    RootRotation,
    Body,
    LeftHand,
    RightHand,
}
