//! Domain model structs and DTOs.
//!
//! Entity structs serialize straight into API responses; `New*` structs
//! are the validated inputs for creating them.

pub mod catalog;
pub mod job;
pub mod status;
