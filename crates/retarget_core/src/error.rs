use std::path::PathBuf;
use thiserror::Error;

/// Malformed hierarchy or arrays that do not line up with it
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StructuralError {
    #[error("the kinematic tree has no joints")]
    Empty,
    #[error("{parents} parents but {names} joint names")]
    NameCountMismatch { parents: usize, names: usize },
    #[error("the kinematic tree has no root joint")]
    NoRoot,
    #[error("the kinematic tree has several roots: {0:?}")]
    MultipleRoots(Vec<usize>),
    #[error("joint {joint} has out of range parent {parent}")]
    ParentOutOfRange { joint: usize, parent: i64 },
    #[error("joint {joint} is its own ancestor")]
    Cycle { joint: usize },
    #[error("joint {joint} is listed before its parent {parent}")]
    ParentAfterChild { joint: usize, parent: usize },
    #[error("{what}: expected {expected} entries, got {got}")]
    LengthMismatch { what: &'static str, expected: usize, got: usize },
    #[error("rest pose position of joint {joint} is not finite")]
    NonFiniteRest { joint: usize },
}

/// Problems with an input clip. Never fatal for a batch, only for the clip
#[derive(Debug, Error)]
pub enum InputError {
    #[error("could not open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not read npz archive: {0}")]
    Npz(String),
    #[error("missing required array '{0}'")]
    MissingKey(&'static str),
    #[error("array '{key}' has shape {got:?}, expected {expected}")]
    WrongShape { key: &'static str, got: Vec<usize>, expected: String },
    #[error("clip has {got} joints, the skeleton has {expected}")]
    WrongJointCount { expected: usize, got: usize },
    #[error("clip has {poses} pose frames but {trans} translation frames")]
    FrameCountMismatch { poses: usize, trans: usize },
    #[error("clip has no frames")]
    EmptyClip,
    #[error("non-finite value in '{key}' at frame {frame}, joint {joint:?}")]
    NonFinite { key: &'static str, frame: usize, joint: Option<usize> },
    #[error("frame rate {0} is not positive")]
    InvalidFrameRate(f32),
}

/// A custom target reference that cannot be used. The pipeline falls back to
/// the built-in rest pose when it sees one of these.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference file {0} does not exist")]
    NotFound(PathBuf),
    #[error("unsupported reference format for {0}")]
    UnsupportedFormat(PathBuf),
    #[error("could not read reference: {0}")]
    Unreadable(String),
    #[error("reference is missing '{0}'")]
    MissingKey(&'static str),
    #[error("reference has {got} joints, expected {expected}")]
    WrongJointCount { expected: usize, got: usize },
    #[error("reference joint names do not match the skeleton at joint {joint}: '{got}' instead of '{expected}'")]
    NameMismatch { joint: usize, expected: String, got: String },
    #[error("reference offsets disagree with its absolute positions at joint {joint}")]
    InconsistentOffsets { joint: usize },
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Per-frame retargeting failure
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RetargetError {
    #[error("non-finite bone direction at joint {joint}, frame {frame}")]
    NonFiniteDirection { joint: usize, frame: usize },
    #[error("non-finite root translation at frame {frame}")]
    NonFiniteTranslation { frame: usize },
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Failure of an output sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not encode npz archive: {0}")]
    Npz(String),
    #[error("refusing to overwrite the input clip {0}")]
    WouldOverwriteInput(PathBuf),
    #[error("{path} is already the output of {first}")]
    DuplicateOutput { path: PathBuf, first: PathBuf },
}

/// Everything that can stop a single clip on its way through the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Retarget(#[from] RetargetError),
    /// structural failure while aligning or checking the retargeted clip
    #[error("alignment: {0}")]
    Align(StructuralError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Frame and joint the failure points at, when it is that specific
    pub fn location(&self) -> (Option<usize>, Option<usize>) {
        match self {
            Self::Retarget(RetargetError::NonFiniteDirection { joint, frame }) => (Some(*frame), Some(*joint)),
            Self::Retarget(RetargetError::NonFiniteTranslation { frame }) => (Some(*frame), None),
            Self::Input(InputError::NonFinite { frame, joint, .. }) => (Some(*frame), *joint),
            _ => (None, None),
        }
    }
}

pub type StructuralResult<T> = Result<T, StructuralError>;
pub type InputResult<T> = Result<T, InputError>;
pub type ReferenceResult<T> = Result<T, ReferenceError>;
pub type RetargetResult<T> = Result<T, RetargetError>;
pub type SinkResult<T> = Result<T, SinkError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
