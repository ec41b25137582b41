//! Core type definitions shared by the Warden crates.
//!
//! This crate defines the small, dependency-light pieces every other crate
//! relies on:
//! - [`ClaimId`]: the UUID v6 identifier carried by licenses, attestations,
//!   signing keys and revocation entries
//! - [`ErrorKind`]: the coarse error taxonomy exposed by every error enum
//! - [`persist`]: file writes with explicit permission bits

mod ids;
mod kind;
pub mod persist;

pub use ids::{ClaimId, IdError};
pub use kind::ErrorKind;
