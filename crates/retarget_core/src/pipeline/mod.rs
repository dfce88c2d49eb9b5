pub mod batch;
pub mod clip;
