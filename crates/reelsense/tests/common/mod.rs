//! Shared test utilities for reelsense integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs against a temp directory and database
//! - Scriptable fakes for the media toolchain, transcriber and analyzer

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::TestHarness;
