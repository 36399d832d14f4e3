//! A cycle-level model of a single-function PCI target device.
//!
//! The [`device`] module contains the model itself. The [`testbench`] module drives it from the
//! initiator side.

pub mod device;
pub mod testbench;
