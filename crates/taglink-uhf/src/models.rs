//! UHF reader model definitions.
//!
//! Each supported reader is described by a [`UhfModel`] struct capturing
//! its transport options, antenna count, RF power range, and GPIO
//! complement. All models speak the same ASCII protocol; the differences
//! are physical, so the driver consults the model table instead of
//! branching on a model enum.
//!
//! Models are defined as factory functions (e.g. [`tl_d100()`]) that
//! return a fully populated [`UhfModel`]. The following models are
//! supported:
//!
//! | Model   | Link         | Antennas | Power      | GPIO |
//! |---------|--------------|----------|------------|------|
//! | TL-D100 | Serial       | 1        | 5-12 dBm   | No   |
//! | TL-P400 | Serial / TCP | 4        | 5-27 dBm   | Yes  |
//! | TL-X800 | TCP          | 8        | 5-30 dBm   | Yes  |

use std::ops::RangeInclusive;

use taglink_core::types::{ReaderDefinition, ReaderFamily};

/// Which physical links a model can be reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSupport {
    /// USB virtual COM port or RS-232 only.
    Serial,
    /// Ethernet only.
    Tcp,
    /// Either medium; industrial models expose both.
    SerialOrTcp,
}

impl LinkSupport {
    /// `true` if the model accepts a serial connection.
    pub fn allows_serial(self) -> bool {
        matches!(self, LinkSupport::Serial | LinkSupport::SerialOrTcp)
    }

    /// `true` if the model accepts a TCP connection.
    pub fn allows_tcp(self) -> bool {
        matches!(self, LinkSupport::Tcp | LinkSupport::SerialOrTcp)
    }
}

/// Static model definition for a UHF reader.
#[derive(Debug, Clone)]
pub struct UhfModel {
    /// Human-readable model name (e.g. "TL-P400").
    pub name: &'static str,
    /// Which links the hardware exposes.
    pub link: LinkSupport,
    /// Default serial baud rate, for models with a serial link.
    pub default_baud_rate: u32,
    /// Default TCP command port, for models with a network link.
    pub default_tcp_port: u16,
    /// Number of antenna ports.
    pub antenna_count: u8,
    /// Valid RF output power range in dBm.
    pub power_range_dbm: RangeInclusive<u8>,
    /// Number of GPIO input pins; 0 means no GPIO block.
    pub gpio_inputs: u8,
    /// Number of GPIO output pins.
    pub gpio_outputs: u8,
}

impl UhfModel {
    /// `true` if the model has any GPIO pins.
    pub fn has_gpio(&self) -> bool {
        self.gpio_inputs > 0 || self.gpio_outputs > 0
    }

    /// `true` if `dbm` is within this model's RF power range.
    pub fn power_in_range(&self, dbm: u8) -> bool {
        self.power_range_dbm.contains(&dbm)
    }

    /// `true` if `port` addresses an existing antenna (ports count from 1).
    pub fn antenna_in_range(&self, port: u8) -> bool {
        port >= 1 && port <= self.antenna_count
    }
}

impl From<&UhfModel> for ReaderDefinition {
    fn from(model: &UhfModel) -> Self {
        ReaderDefinition {
            family: ReaderFamily::Uhf,
            model_name: model.name,
            default_baud_rate: if model.link.allows_serial() {
                Some(model.default_baud_rate)
            } else {
                None
            },
            default_tcp_port: if model.link.allows_tcp() {
                Some(model.default_tcp_port)
            } else {
                None
            },
            antenna_count: model.antenna_count,
        }
    }
}

/// TL-D100 model definition.
///
/// Desktop USB reader for enrollment stations and point-of-sale desks.
/// Single integrated antenna, low power, powered over the USB cable.
pub fn tl_d100() -> UhfModel {
    UhfModel {
        name: "TL-D100",
        link: LinkSupport::Serial,
        default_baud_rate: 115_200,
        default_tcp_port: 0,
        antenna_count: 1,
        power_range_dbm: 5..=12,
        gpio_inputs: 0,
        gpio_outputs: 0,
    }
}

/// TL-P400 model definition.
///
/// Industrial panel reader for dock doors and conveyor lines. Four
/// external antenna ports, GPIO for light stacks and photo eyes, and
/// both serial and Ethernet links.
pub fn tl_p400() -> UhfModel {
    UhfModel {
        name: "TL-P400",
        link: LinkSupport::SerialOrTcp,
        default_baud_rate: 115_200,
        default_tcp_port: 2101,
        antenna_count: 4,
        power_range_dbm: 5..=27,
        gpio_inputs: 4,
        gpio_outputs: 4,
    }
}

/// TL-X800 model definition.
///
/// Long-range portal reader for gates and warehouse portals. Eight
/// antenna ports, the widest power range in the family, Ethernet only.
pub fn tl_x800() -> UhfModel {
    UhfModel {
        name: "TL-X800",
        link: LinkSupport::Tcp,
        default_baud_rate: 0,
        default_tcp_port: 2101,
        antenna_count: 8,
        power_range_dbm: 5..=30,
        gpio_inputs: 8,
        gpio_outputs: 8,
    }
}

/// Returns a list of all supported UHF model definitions.
///
/// Useful for building model selection UIs or iterating over all known
/// models.
pub fn all_uhf_models() -> Vec<UhfModel> {
    vec![tl_d100(), tl_p400(), tl_x800()]
}
