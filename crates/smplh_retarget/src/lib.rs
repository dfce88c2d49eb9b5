#![deny(missing_docs)]
//! ## Crate Items Overview
//!
//! This section provides quick links to the main items of smplh-retarget.
//!
//! ### Modules
//! - [`retarget_core`](crate::retarget_core) - Kinematic tree, forward
//!   kinematics, retargeting, alignment and the npz codecs.
//! - [`retarget_utils`](crate::retarget_utils) - Rotation helpers, file type
//!   detection and logger setup.
//!
//! ## Binaries
//! The `smplh-retarget` command in `demos/retarget_npz` runs the batch
//! pipeline over a file or a folder of AMASS archives.
pub use retarget_core;
pub use retarget_utils;
