//! Shared foundations for the framechain workspace.
//!
//! Error taxonomy, identifier types, segment arithmetic, ffmpeg wrappers
//! and the object storage boundary. Nothing here knows about HTTP, the
//! generation provider or persistence.

pub mod error;
pub mod ffmpeg;
pub mod generation;
pub mod storage;
pub mod types;
