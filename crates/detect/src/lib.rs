//! Object detection behind a single-flight admission gate.
//!
//! The detector itself is an external collaborator reached through the
//! [`Detector`] trait. [`GatedDetector`] is the only handle the rest of the
//! system gets: it serializes every invocation through one process-wide
//! [`AdmissionGate`] so at most one detection runs at any instant, while
//! callers are free to do their own I/O concurrently.

pub mod command;
pub mod error;
pub mod gate;
pub mod types;

pub use {
    command::CommandDetector,
    error::{Error, Result},
    gate::{AdmissionGate, GatePermit, GatedDetector},
    types::{DetectionJob, DetectionResult, Detector},
};
