//! Error type shared by the refinement engine.
//!
//! Configuration mistakes and persistence failures surface as `RefineError`.
//! Protocol violations inside the grid (asking a subtree for a scale it never
//! held) are logged and answered with an empty result instead.
use crate::driver::DriverState;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, RefineError>;

#[derive(Debug, thiserror::Error)]
pub enum RefineError {
    #[error("Invalid scale {0}: scale must be finite and positive")]
    InvalidScale(f64),

    #[error("Scale already set to {0}; refusing to recompute it")]
    ScaleAlreadySet(f64),

    #[error("Scale has not been set")]
    ScaleNotSet,

    #[error("Operation `{op}` is not allowed in state {state:?}")]
    InvalidState { op: &'static str, state: DriverState },

    #[error("Invalid parameter `{name}`: {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("Domain bounds are empty or not finite")]
    InvalidBounds,

    #[error("Input point set is empty")]
    EmptyInput,

    #[error("Cell {cell} already holds a block at scale index {scale_index}")]
    LevelOccupied { cell: usize, scale_index: usize },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode tokens for {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },

    #[error("Failed to decode tokens from {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("Token file {} has unsupported format tag {found:#x}", path.display())]
    FormatMismatch { path: PathBuf, found: u32 },
}

impl RefineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
