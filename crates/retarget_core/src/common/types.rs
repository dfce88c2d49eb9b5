use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// How the start of a retargeted clip is pinned to the reference
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Display, EnumString, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlignMode {
    /// leave the trajectory where the source put it
    None,
    /// shift all frames so the first root position matches the reference
    #[strum(serialize = "translate", serialize = "translate_root")]
    TranslateRoot,
    /// translate, then also replace the first frame's rotations by the
    /// target rest pose
    #[default]
    #[strum(serialize = "override", serialize = "override_first_frame")]
    OverrideFirstFrame,
}

impl AlignMode {
    pub fn translates(self) -> bool {
        self != Self::None
    }
    pub fn overrides_first_frame(self) -> bool {
        self == Self::OverrideFirstFrame
    }
}

/// Orientation given to joints that have no bone to aim
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Display, EnumString, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeafPolicy {
    /// identity local rotation, the joint follows its parent
    #[default]
    InheritParent,
    /// keep the source clip's local rotation
    CopySource,
}
