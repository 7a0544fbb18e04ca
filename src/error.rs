use std::path::PathBuf;
use thiserror::Error;

pub type IslResult<T> = Result<T, IslError>;

/// Failures surfaced by plan building and publication.
#[derive(Debug, Error)]
pub enum IslError {
    #[error("nothing to translate: input is empty")]
    EmptyInput,

    #[error("no sign asset could be resolved for \"{text}\"")]
    NoContent { text: String },

    #[error("cannot decode asset {path}: {reason}")]
    UnreadableAsset { path: PathBuf, reason: String },

    #[error("no images to synthesize")]
    NoImages,

    #[error("no frames could be decoded from any input video")]
    NoVideos,

    #[error("failed to write output {path}: {reason}")]
    Output { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl IslError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::UnreadableAsset {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn output(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Output {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for failures caused by the request text rather than the system.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::EmptyInput | Self::NoContent { .. })
    }
}
