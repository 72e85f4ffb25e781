//! Test recorder - record the HTTP traffic of a web application as
//! replayable test cassettes
//!
//! A middleware records every incoming request/response pair into its own
//! cassette, together with the outgoing calls made while handling it. Tests
//! replay the incoming request with the outgoing calls served from the
//! recording.

#![deny(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod cassette;
pub mod config;
pub mod error;
pub mod middleware;
pub mod recording;
pub mod replay;
pub mod settings;

pub use error::{RecorderError, Result};
