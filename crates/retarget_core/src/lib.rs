#![allow(clippy::module_inception)]
//! Forward kinematics and retargeting core for SMPL-H motion clips.
//!
//! The kinematic tree, rest poses and offset tables are built once and
//! shared read-only; every clip and every frame is processed from explicit
//! inputs with no state carried over between them.
pub mod codec;
pub mod common;
pub mod error;
pub mod pipeline;
pub mod smpl_h;
