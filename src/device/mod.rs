//! # Device Emulation Code
//!
//! This module contains the cycle-level model of the PCI target. It
//! does not know how it is driven; see [`crate::testbench`] for that.

#![deny(missing_docs)]
#![deny(rustdoc::all)]
#![deny(clippy::must_use_candidate)]
#![deny(missing_debug_implementations)]

pub mod bus;
pub mod decode;
pub mod pci;
pub mod register_set;
pub mod signals;
