//! Built-in rest poses for the SMPL-H tree, absolute joint positions in
//! metres.
use super::smpl_h::NUM_JOINTS;

/// Template T-pose of the SMPL-H body model (Y up). Mocap rotations of
/// AMASS-style clips are authored relative to this pose.
#[rustfmt::skip]
pub const T_POSE_J_ABSOLUTE: [[f64; 3]; NUM_JOINTS] = [
    [-0.001795, -0.223333, 0.028219],
    [0.067725, -0.314740, 0.021404],
    [-0.069466, -0.313855, 0.023899],
    [-0.004328, -0.114370, 0.001523],
    [0.102001, -0.689938, 0.016908],
    [-0.107756, -0.696424, 0.015049],
    [0.001159, 0.020810, 0.002615],
    [0.088406, -1.087899, -0.026785],
    [-0.091982, -1.094839, -0.027263],
    [0.002616, 0.073732, 0.028040],
    [0.114764, -1.143690, 0.092503],
    [-0.117354, -1.142983, 0.096085],
    [-0.000162, 0.287603, -0.014817],
    [0.081461, 0.195482, -0.006050],
    [-0.079143, 0.192565, -0.010575],
    [0.004990, 0.352572, 0.036532],
    [0.172438, 0.225951, -0.014918],
    [-0.175155, 0.225116, -0.019719],
    [0.432050, 0.213179, -0.042374],
    [-0.428897, 0.211787, -0.041119],
    [0.681284, 0.222165, -0.043545],
    [-0.684196, 0.219560, -0.046679],
    [0.783767, 0.213183, -0.022054],
    [0.815568, 0.216115, -0.018788],
    [0.837963, 0.214387, -0.018140],
    [0.791063, 0.216050, -0.044867],
    [0.821578, 0.217270, -0.048936],
    [0.845128, 0.215785, -0.052425],
    [0.765890, 0.208316, -0.084165],
    [0.781693, 0.207917, -0.094992],
    [0.797572, 0.206667, -0.105123],
    [0.779095, 0.213415, -0.067855],
    [0.806930, 0.215059, -0.072228],
    [0.829592, 0.213672, -0.078705],
    [0.723217, 0.202218, -0.017008],
    [0.740918, 0.203986, 0.007192],
    [0.762150, 0.200379, 0.022060],
    [-0.783494, 0.210911, -0.022044],
    [-0.815675, 0.213810, -0.019676],
    [-0.837971, 0.212032, -0.020059],
    [-0.791352, 0.214082, -0.045896],
    [-0.821700, 0.215536, -0.050057],
    [-0.844837, 0.214110, -0.053971],
    [-0.767226, 0.205917, -0.086044],
    [-0.782858, 0.205594, -0.097170],
    [-0.798573, 0.204555, -0.107284],
    [-0.779985, 0.211294, -0.069581],
    [-0.807581, 0.213016, -0.074152],
    [-0.829999, 0.211622, -0.081116],
    [-0.722013, 0.199415, -0.016553],
    [-0.739452, 0.200249, 0.007932],
    [-0.760794, 0.195263, 0.022366],
];

/// Canonical A-pose every retargeted clip is played back on (Z up, pelvis
/// at hip height above the origin).
#[rustfmt::skip]
pub const A_POSE_J_ABSOLUTE: [[f64; 3]; NUM_JOINTS] = [
    [0.00000000, 0.00000000, 0.95636375],
    [0.09724527, 0.00660794, 0.93460052],
    [-0.09724524, 0.00660784, 0.93460037],
    [0.00000126, -0.00956927, 1.03547203],
    [0.13950833, -0.00007977, 0.52078457],
    [-0.13944020, -0.00008468, 0.52077759],
    [0.00000127, -0.02365802, 1.07423111],
    [0.18257202, 0.04773808, 0.07635051],
    [-0.18260323, 0.04769928, 0.07635861],
    [0.00000123, -0.01277968, 1.20297935],
    [0.20961849, -0.09616167, 0.03404962],
    [-0.20956547, -0.09623543, 0.03413755],
    [0.00000234, 0.03741064, 1.51219604],
    [0.06068380, 0.02859792, 1.43648727],
    [-0.06068113, 0.02859793, 1.43648758],
    [0.00000434, 0.02432668, 1.59778992],
    [0.17985998, 0.06678337, 1.42715332],
    [-0.17988436, 0.06679042, 1.42733200],
    [0.35942127, 0.08611701, 1.21508385],
    [-0.35972816, 0.08599963, 1.21549110],
    [0.53440182, -0.01038988, 1.08006729],
    [-0.53496372, -0.01064539, 1.08092247],
    [0.54241528, -0.04178918, 1.06884377],
    [0.55032654, -0.09581092, 1.03894287],
    [0.55313934, -0.11209120, 1.01510323],
    [0.59889046, -0.07512047, 1.03089867],
    [0.61269665, -0.08790076, 0.99314255],
    [0.61713825, -0.09295045, 0.96733658],
    [0.60585987, -0.05284940, 1.02643631],
    [0.62577339, -0.06474179, 0.98564201],
    [0.63113697, -0.07000604, 0.95845779],
    [0.60393665, -0.03197578, 1.02040756],
    [0.62391304, -0.03999388, 0.98390793],
    [0.62802330, -0.04344587, 0.96006828],
    [0.60068771, -0.01140531, 1.01079140],
    [0.61835476, -0.01399195, 0.98379326],
    [0.62499237, -0.01609506, 0.96577065],
    [-0.54298100, -0.04205809, 1.06974464],
    [-0.55091496, -0.09612849, 1.03993752],
    [-0.55377033, -0.11243772, 1.01611938],
    [-0.59952194, -0.07547348, 1.03197510],
    [-0.61345390, -0.08830379, 0.99428230],
    [-0.61798855, -0.09340141, 0.96850243],
    [-0.60652172, -0.05321231, 1.02751076],
    [-0.62656696, -0.06515790, 0.98679680],
    [-0.63202854, -0.07048355, 0.95964432],
    [-0.60463154, -0.03234254, 1.02145844],
    [-0.62469059, -0.04039888, 0.98501869],
    [-0.62886223, -0.04387187, 0.96119324],
    [-0.60143600, -0.01177774, 1.01182289],
    [-0.61915257, -0.01442941, 0.98486671],
    [-0.62583908, -0.01657710, 0.96686638],
];
