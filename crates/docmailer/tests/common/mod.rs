//! Shared test utilities for docmailer integration tests.

pub mod harness;

pub use harness::{sheet_xml, wait_for, RecordingMailer, TestHarness};
