#![deny(clippy::all)]

//! Text to Indian Sign Language video.
//!
//! Text is resolved against a directory of pre-recorded sign clips and
//! letter/digit images (whole sentence first, then per word, then spelled
//! out) and the pieces are stitched into one MP4.

pub mod config;
pub mod error;
pub mod sign_video;

#[cfg(feature = "node")]
mod node;

pub use config::Settings;
pub use error::{IslError, IslResult};
pub use sign_video::plan::CascadeEngine;
pub use sign_video::publish::{PublicationRegistry, Publisher};
pub use sign_video::resolver::AssetResolver;
pub use sign_video::translator::{Publication, Translator};
pub use sign_video::{AssemblyPlan, AssetCategory, Pacing, Segment, Timing};
