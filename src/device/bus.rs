//! # Bus Plumbing
//!
//! This module contains the two pieces of bus plumbing the device model needs:
//!
//! - [`Request`], the offset-size pair used to access register storage, and
//! - [`resolve_ad_bus`], which turns the individual drivers of the tri-state AD bus into the
//!   value every party on the bus observes.

use thiserror::Error;
use tracing::warn;

/// The value of the AD bus when no party drives it.
///
/// The bus is pulled up, so an undriven bus reads as all ones.
pub const FLOATING_AD_BUS: u32 = 0xFFFF_FFFF;

/// The size of register requests.
///
/// We don't use plain integers here to prevent use with illegal
/// sizes. The AD bus is 32 bits wide, so that is the largest access.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum RequestSize {
    Size1 = 1,
    Size2 = 2,
    Size4 = 4,
}

impl From<RequestSize> for usize {
    fn from(r: RequestSize) -> Self {
        r as Self
    }
}

/// The offset-size pair for register reads and writes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Request {
    /// The byte offset of the request relative to the start of the register block.
    pub offset: usize,

    /// The size of this request.
    pub size: RequestSize,
}

impl Request {
    /// Create a new request from offset and size.
    #[must_use]
    pub const fn new(offset: usize, size: RequestSize) -> Self {
        Self { offset, size }
    }

    /// A full-width request, the only size the AD bus transfers.
    #[must_use]
    pub const fn dword(offset: usize) -> Self {
        Self::new(offset, RequestSize::Size4)
    }

    /// Split a request into individual byte requests.
    #[must_use]
    pub fn iter_bytes(&self) -> impl Iterator<Item = Self> {
        (self.offset..self.offset + usize::from(self.size))
            .map(|offset| Self::new(offset, RequestSize::Size1))
    }
}

/// One party that may drive the shared AD bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdDriver {
    /// A human-readable name used in diagnostics.
    pub name: &'static str,

    /// Whether this party currently enables its output.
    pub enabled: bool,

    /// The value this party drives when enabled.
    pub value: u32,
}

impl AdDriver {
    /// Describe a driver and its current output.
    #[must_use]
    pub const fn new(name: &'static str, enabled: bool, value: u32) -> Self {
        Self {
            name,
            enabled,
            value,
        }
    }
}

/// More than one party enabled its output on the AD bus in the same cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("AD bus is driven by more than one party: {drivers:?}")]
pub struct BusContention {
    /// The names of all parties that enabled their output.
    pub drivers: Vec<&'static str>,
}

/// Resolve the value of the tri-state AD bus.
///
/// The bus carries the value of the single enabled driver, or [`FLOATING_AD_BUS`] if nobody
/// drives it. At most one party may drive the bus at any time. A violation is reported as
/// [`BusContention`] instead of guessing a winner.
pub fn resolve_ad_bus(drivers: &[AdDriver]) -> Result<u32, BusContention> {
    let mut enabled = drivers.iter().filter(|d| d.enabled);

    match (enabled.next(), enabled.next()) {
        (None, _) => Ok(FLOATING_AD_BUS),
        (Some(driver), None) => Ok(driver.value),
        (Some(_), Some(_)) => {
            let drivers: Vec<_> = drivers
                .iter()
                .filter(|d| d.enabled)
                .map(|d| d.name)
                .collect();

            warn!("AD bus contention between {:?}", drivers);
            Err(BusContention { drivers })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn request_byte_iterator_works() {
        let request = Request::new(0x10, RequestSize::Size2);

        let split_request = request.iter_bytes().collect::<Vec<_>>();
        let offsets = split_request.iter().map(|r| r.offset).collect::<Vec<_>>();

        assert_eq!(offsets, vec![0x10, 0x11]);
        assert!(split_request.iter().all(|r| r.size == RequestSize::Size1));
    }

    #[test]
    fn undriven_bus_floats_high() {
        assert_eq!(resolve_ad_bus(&[]), Ok(FLOATING_AD_BUS));
        assert_eq!(
            resolve_ad_bus(&[
                AdDriver::new("target", false, 0x1234),
                AdDriver::new("initiator", false, 0x5678),
            ]),
            Ok(FLOATING_AD_BUS)
        );
    }

    #[test]
    fn contention_names_all_drivers() {
        let result = resolve_ad_bus(&[
            AdDriver::new("target", true, 0),
            AdDriver::new("bystander", false, 0),
            AdDriver::new("initiator", true, 0),
        ]);

        assert_eq!(
            result,
            Err(BusContention {
                drivers: vec!["target", "initiator"]
            })
        );
    }

    proptest! {
        #[test]
        fn single_driver_owns_the_bus(value: u32, position in 0usize..3) {
            let drivers: Vec<_> = (0..3)
                .map(|i| AdDriver::new("party", i == position, if i == position { value } else { !value }))
                .collect();

            prop_assert_eq!(resolve_ad_bus(&drivers), Ok(value));
        }
    }
}
