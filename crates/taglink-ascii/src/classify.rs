//! Reply-line classification.
//!
//! Command replies and unsolicited push traffic share one stream, so
//! every line is classified before it can be attributed to a pending
//! command. Classification order matters: heartbeats first, then
//! inventory pushes, then input-change pushes, and only what remains is
//! a command reply.

/// Prefix of the periodic alive marker. Discarded on sight.
pub const HEARTBEAT_PREFIX: &str = "HBT";

/// Inventory marker carried by tag notification lines.
pub const INVENTORY_MARKER: &str = "IVF";

/// Prefix of a digital-input change notification.
pub const INPUT_CHANGE_PREFIX: &str = "INC";

/// Width of the trailing window searched for the inventory marker.
///
/// Some firmware revisions put the tag payload first and append the
/// marker with a tag count, instead of leading with it.
pub const INVENTORY_TRAILER_WINDOW: usize = 14;

/// True for heartbeat lines.
pub fn is_heartbeat(line: &str) -> bool {
    line.starts_with(HEARTBEAT_PREFIX)
}

/// True when the line leads with the inventory marker, which ends an
/// accumulated inventory round.
pub fn is_inventory_lead(line: &str) -> bool {
    line.starts_with(INVENTORY_MARKER)
}

/// True when the inventory marker sits inside the line's trailing
/// window, marking a self-contained tag notification.
///
/// Both this rule and [`is_inventory_lead`] are required; neither
/// subsumes the other across firmware revisions.
pub fn is_inventory_trailer(line: &str) -> bool {
    let bytes = line.as_bytes();
    let tail_start = bytes.len().saturating_sub(INVENTORY_TRAILER_WINDOW);
    bytes[tail_start..]
        .windows(INVENTORY_MARKER.len())
        .any(|w| w == INVENTORY_MARKER.as_bytes())
}

/// Parse the tag count from a marker token sequence like `IVF 02`.
///
/// Returns `None` when the count field is absent or malformed; older
/// firmware omits it.
pub fn inventory_count(line: &str) -> Option<usize> {
    let rest = line.strip_prefix(INVENTORY_MARKER)?;
    rest.split_ascii_whitespace().next()?.parse().ok()
}

/// Parse an input-change notification: `INC <pin> <HI|LO>`.
pub fn parse_input_change(line: &str) -> Option<(u8, bool)> {
    let rest = line.strip_prefix(INPUT_CHANGE_PREFIX)?;
    let mut parts = rest.split_ascii_whitespace();
    let pin = parts.next()?.parse().ok()?;
    let level = match parts.next()? {
        "HI" => true,
        "LO" => false,
        _ => return None,
    };
    Some((pin, level))
}
