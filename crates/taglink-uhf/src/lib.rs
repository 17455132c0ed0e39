//! UHF reader family backend for taglink.
//!
//! This crate drives the TL-series UHF readers over the ASCII line
//! protocol implemented in `taglink-ascii`. It provides:
//!
//! - **Model definitions** ([`models`]) -- static capability data for the
//!   supported readers (TL-D100, TL-P400, TL-X800): link options, antenna
//!   counts, RF power ranges, GPIO population.
//! - **Command builders** ([`commands`]) -- construct command text for
//!   inventory, RF configuration, identity, and GPIO operations, and
//!   parse the model-specific replies.
//! - **Reader driver** ([`reader`]) -- full
//!   [`Reader`](taglink_core::Reader) trait implementation over the
//!   background protocol engine, with event emission for tag and GPIO
//!   pushes.
//! - **Builder** ([`builder`]) -- fluent builder API for constructing
//!   [`UhfReader`] instances with model-derived defaults.
//!
//! # Example
//!
//! ```no_run
//! use taglink_core::Reader;
//! use taglink_uhf::{tl_p400, UhfReaderBuilder};
//!
//! # async fn example() -> taglink_core::Result<()> {
//! let reader = UhfReaderBuilder::new(tl_p400())
//!     .tcp_endpoint("10.0.0.5")
//!     .build()?;
//! reader.connect().await?;
//!
//! for frame in reader.get_inventory().await? {
//!     println!("tag: {frame}");
//! }
//!
//! reader.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod commands;
pub mod models;
pub mod reader;

// Re-export the main types so `use taglink_uhf::*` pulls in the whole API.
pub use builder::UhfReaderBuilder;
pub use models::{all_uhf_models, tl_d100, tl_p400, tl_x800, LinkSupport, UhfModel};
pub use reader::UhfReader;
