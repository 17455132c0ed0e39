//! taglink-core: Core traits, types, and error definitions for taglink.
//!
//! This crate defines the reader-family-agnostic abstractions that all
//! taglink backends implement. Applications depend on these types without
//! pulling in any specific reader driver.
//!
//! # Key types
//!
//! - [`Reader`] -- the unified trait for controlling any RFID reader
//! - [`Transport`] -- byte-level communication channel
//! - [`ReaderEvent`] -- asynchronous tag/GPIO/connection notifications
//! - [`Error`] / [`Result`] -- error handling with the retry taxonomy

pub mod error;
pub mod events;
pub mod reader;
pub mod transport;
pub mod types;

// Everything an application touches is reachable from the crate root.
pub use error::{Error, ErrorCategory, Result};
pub use events::ReaderEvent;
pub use reader::Reader;
pub use transport::Transport;
pub use types::*;
