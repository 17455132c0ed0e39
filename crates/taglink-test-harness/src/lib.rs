//! taglink-test-harness: Test utilities and mock transports for taglink.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the protocol engine and reader drivers without requiring real RFID
//! hardware. Expectations are scripted request/response pairs; silent
//! expectations and pre-loaded unsolicited traffic cover the timeout and
//! push-classification scenarios.

pub mod mock;

pub use mock::MockTransport;
