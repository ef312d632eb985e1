#![forbid(unsafe_code)]
//! Coordinates, filesystem helpers, and the transport seam for Quarry.

pub mod artifact;
pub mod error;
pub mod fs;
pub mod maven;
pub mod transport;
