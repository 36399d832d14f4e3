//! # PCI Bus Signals
//!
//! This module defines the wires between a PCI target and the rest of the bus. See
//! [`PciSignals`] for the complete bundle.
//!
//! The bundle carries no behavior. Who drives which line is a matter of convention: the target
//! only ever updates the lines documented as outputs.

use std::fmt;

/// A single active-low signal line.
///
/// PCI handshake lines are asserted by driving them to logic 0. Wrapping them in this type lets
/// the rest of the code talk about "asserted" and "deasserted" instead of raw levels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActiveLow {
    level: bool,
}

impl ActiveLow {
    /// The line is driven low.
    pub const ASSERTED: Self = Self { level: false };

    /// The line is driven (or pulled) high.
    pub const DEASSERTED: Self = Self { level: true };

    /// Construct a line from its logical state.
    #[must_use]
    pub const fn from_asserted(asserted: bool) -> Self {
        Self { level: !asserted }
    }

    /// Whether the line is currently asserted (driven low).
    #[must_use]
    pub const fn is_asserted(self) -> bool {
        !self.level
    }

    /// The raw electrical level of the line.
    #[must_use]
    pub const fn level(self) -> bool {
        self.level
    }
}

/// Undriven active-low lines are pulled up, so they default to deasserted.
impl Default for ActiveLow {
    fn default() -> Self {
        Self::DEASSERTED
    }
}

impl fmt::Display for ActiveLow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(self.level))
    }
}

/// The complete set of PCI bus lines seen by a single target.
///
/// The multiplexed address/data bus is a tri-state wire. It is split into an input view
/// (`ad_i`), the value the target would like to drive (`ad_o`) and an explicit output enable
/// (`ad_oe`). Resolving the actual bus value is the job of
/// [`resolve_ad_bus`](crate::device::bus::resolve_ad_bus).
///
/// Target outputs are `ad_o`, `ad_oe`, `trdy_n`, `devsel_n` and `stop_n`. Everything else is
/// driven by the rest of the bus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PciSignals {
    /// The resolved value of the AD bus as seen by the target.
    pub ad_i: u32,
    /// The value the target drives onto the AD bus when `ad_oe` is set.
    pub ad_o: u32,
    /// Whether the target currently drives the AD bus.
    pub ad_oe: bool,

    /// Command during the address phase, byte enables during the data phase. Only the low four
    /// bits are meaningful.
    pub cbe: u8,

    /// Marks the extent of a transaction.
    pub frame_n: ActiveLow,
    /// Initiator ready.
    pub irdy_n: ActiveLow,
    /// Target ready.
    pub trdy_n: ActiveLow,
    /// Device select, the target claims the transaction.
    pub devsel_n: ActiveLow,
    /// Initialization device select, used for configuration cycles.
    pub idsel: bool,
    /// Even parity over AD and CBE.
    pub par: bool,

    /// Bus request.
    pub req_n: ActiveLow,
    /// Bus grant.
    pub gnt_n: ActiveLow,
    /// Bus reset.
    pub rst_n: ActiveLow,
    /// Bus clock. The model advances on explicit clock edges; this line only mirrors them.
    pub clk: bool,

    /// Target requests the initiator to stop.
    pub stop_n: ActiveLow,
    /// Exclusive access.
    pub lock_n: ActiveLow,
    /// Data parity error.
    pub perr_n: ActiveLow,
    /// System error.
    pub serr_n: ActiveLow,
}
