//! Stackup core types: condition model, version snapshots, and the
//! resume-step decision engine.
//!
//! Everything here is pure data and pure functions. Cluster access lives in
//! `stackup-store`; the polling loop and the imperative operations live in
//! `stackup-ops`.

#![forbid(unsafe_code)]

pub mod conditions;
pub mod resume;
pub mod version;

use serde::{Deserialize, Serialize};

/// Errors suitable for transport across process boundaries.
///
/// Store implementations collapse their failures into `NotFound` vs
/// `Transport`; `Invalid` rejects bad inputs before any cluster call;
/// `Cancelled` is reserved for caller-initiated aborts and is never produced
/// by a timeout (a timeout is a successful [`version::WaitOutcome`]).
#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
pub enum Error {
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
}

pub type Result<T> = std::result::Result<T, Error>;
