pub const NUM_BODY_JOINTS: usize = 21;
pub const NUM_HAND_JOINTS: usize = 15;
/// pelvis + body + two hands
pub const NUM_JOINTS: usize = 1 + NUM_BODY_JOINTS + 2 * NUM_HAND_JOINTS;

pub const PELVIS: usize = 0;
pub const SPINE1: usize = 3;

#[rustfmt::skip]
pub const PARENT_ID_PER_JOINT: [i32; NUM_JOINTS] = [
    -1, 0, 0, 0, 1, 2, 3, 4, 5, 6,
    7, 8, 9, 9, 9, 12, 13, 14, 16, 17,
    18, 19, 20, 22, 23, 20, 25, 26, 20, 28,
    29, 20, 31, 32, 20, 34, 35, 21, 37, 38,
    21, 40, 41, 21, 43, 44, 21, 46, 47, 21,
    49, 50,
];

pub const JOINT_NAMES: [&str; NUM_JOINTS] = [
    "Pelvis",
    "L_Hip",
    "R_Hip",
    "Spine1",
    "L_Knee",
    "R_Knee",
    "Spine2",
    "L_Ankle",
    "R_Ankle",
    "Spine3",
    "L_Foot",
    "R_Foot",
    "Neck",
    "L_Collar",
    "R_Collar",
    "Head",
    "L_Shoulder",
    "R_Shoulder",
    "L_Elbow",
    "R_Elbow",
    "L_Wrist",
    "R_Wrist",
    "L_Hand_0",
    "L_Hand_1",
    "L_Hand_2",
    "L_Hand_3",
    "L_Hand_4",
    "L_Hand_5",
    "L_Hand_6",
    "L_Hand_7",
    "L_Hand_8",
    "L_Hand_9",
    "L_Hand_10",
    "L_Hand_11",
    "L_Hand_12",
    "L_Hand_13",
    "L_Hand_14",
    "R_Hand_0",
    "R_Hand_1",
    "R_Hand_2",
    "R_Hand_3",
    "R_Hand_4",
    "R_Hand_5",
    "R_Hand_6",
    "R_Hand_7",
    "R_Hand_8",
    "R_Hand_9",
    "R_Hand_10",
    "R_Hand_11",
    "R_Hand_12",
    "R_Hand_13",
    "R_Hand_14",
];
