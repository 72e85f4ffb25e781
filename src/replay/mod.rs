//! Replaying recorded incoming requests against the system under test

mod client;
mod harness;

pub use client::{ClientOptions, ClientRequest, TestClient};
pub use harness::{ReplayHarness, ReplayOptions};

/// Outgoing record mode used when replaying: replay only, fail on anything
/// unrecorded
pub const DEFAULT_REPLAY_MODE: crate::cassette::RecordMode = crate::cassette::RecordMode::None;
