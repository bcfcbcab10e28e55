//! Client for the remote video generation task service.
//!
//! [`TaskClient`] is the seam the pipeline depends on; [`ArkClient`] talks
//! to the hosted content-generation API over HTTP.

pub mod ark;
pub mod client;
pub mod error;
pub mod types;

pub use ark::{ArkClient, ProviderConfig};
pub use client::TaskClient;
pub use error::ProviderError;
pub use types::{SegmentRequest, TaskId, TaskSnapshot, TaskStatus};
