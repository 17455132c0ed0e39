//! # taglink -- Async RFID Reader Control
//!
//! `taglink` is an asynchronous Rust library for controlling RFID readers
//! that speak the TL-series ASCII line protocol over serial or TCP. It is
//! designed for inventory services, access-control daemons, and test
//! tooling where reliable device communication and low-latency tag events
//! are essential.
//!
//! ## Quick Start
//!
//! Add `taglink` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! taglink = { version = "0.1", features = ["uhf"] }
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Connect to a reader and run an inventory round:
//!
//! ```no_run
//! use taglink::Reader;
//! use taglink::uhf::{models::tl_p400, UhfReaderBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = UhfReaderBuilder::new(tl_p400())
//!         .serial_port("/dev/ttyUSB0")
//!         .build()?;
//!     reader.connect().await?;
//!
//!     for frame in reader.get_inventory().await? {
//!         println!("tag: {frame}");
//!     }
//!
//!     reader.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                  | Purpose                                      |
//! |------------------------|----------------------------------------------|
//! | `taglink-core`         | Traits ([`Reader`], [`Transport`]), types, errors |
//! | `taglink-transport`    | Serial and TCP transport implementations     |
//! | `taglink-ascii`        | ASCII line protocol: CRC16, framing, handshake, IO engine |
//! | `taglink-uhf`          | TL-series UHF reader family driver           |
//! | `taglink-test-harness` | Scriptable `MockTransport` for tests         |
//! | **`taglink`**          | This facade crate -- re-exports everything   |
//!
//! All reader drivers implement the [`Reader`] trait, so application code
//! can work with `dyn Reader` and remain family-agnostic.
//!
//! ## Feature Flags
//!
//! Reader families are gated behind feature flags:
//!
//! | Feature | Enables                           | Default |
//! |---------|-----------------------------------|---------|
//! | `uhf`   | [`uhf`] module (TL-series models) | yes     |
//! | `full`  | All reader families               | no      |
//!
//! ## Events
//!
//! All drivers emit [`ReaderEvent`]s through a broadcast channel: tag
//! inventory rounds (continuous or single-shot), GPIO input changes, and
//! connection status transitions. Subscribe once and receive everything:
//!
//! ```no_run
//! use taglink::{Reader, ReaderEvent};
//! # async fn example(reader: &dyn Reader) -> taglink::Result<()> {
//! let mut events = reader.subscribe();
//! reader.start_inventory().await?;
//! loop {
//!     match events.recv().await {
//!         Ok(ReaderEvent::TagInventory { frames, .. }) => {
//!             println!("round: {} tags", frames.len());
//!         }
//!         Ok(event) => println!("{event:?}"),
//!         Err(_) => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Supported Readers
//!
//! - **UHF**: TL-D100 (desktop USB), TL-P400 (industrial panel, GPIO),
//!   TL-X800 (long-range portal, GPIO)

pub use taglink_core::*;

/// Transport implementations.
///
/// Provides [`SerialTransport`](transport::SerialTransport) (tokio-serial)
/// and [`TcpTransport`](transport::TcpTransport) (tokio TCP), both
/// implementing the [`Transport`] trait, plus
/// [`SerialConfig`](transport::SerialConfig) for non-default line
/// parameters.
pub mod transport {
    pub use taglink_transport::*;
}

/// The ASCII line protocol engine.
///
/// CRC16 framing, the line scanner, the handshake negotiator, and the
/// background IO task that reader drivers are built on. Applications
/// normally use a driver from a family module instead of this directly.
pub mod ascii {
    pub use taglink_ascii::*;
}

/// TL-series UHF reader family backend.
///
/// Provides [`UhfReader`](uhf::UhfReader) and
/// [`UhfReaderBuilder`](uhf::UhfReaderBuilder) for controlling the
/// TL-D100, TL-P400, and TL-X800 over serial or TCP.
#[cfg(feature = "uhf")]
pub mod uhf {
    pub use taglink_uhf::*;
}

/// Returns a flat list of all supported reader models across the enabled
/// family backends.
///
/// This is the primary entry point for applications that need to
/// enumerate supported readers (e.g. for a model picker). Each family is
/// gated behind its feature flag; only models from enabled families are
/// included.
///
/// # Example
///
/// ```
/// for reader in taglink::supported_readers() {
///     println!("{} {}", reader.family, reader.model_name);
/// }
/// ```
pub fn supported_readers() -> Vec<ReaderDefinition> {
    let mut readers = Vec::new();

    #[cfg(feature = "uhf")]
    {
        readers.extend(
            uhf::models::all_uhf_models()
                .iter()
                .map(ReaderDefinition::from),
        );
    }

    readers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_readers_covers_enabled_families() {
        let readers = supported_readers();

        #[cfg(feature = "uhf")]
        {
            assert_eq!(readers.len(), 3);
            assert!(readers.iter().any(|r| r.model_name == "TL-P400"));
        }

        #[cfg(not(feature = "uhf"))]
        assert!(readers.is_empty());
    }
}
