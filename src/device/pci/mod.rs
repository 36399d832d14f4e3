//! # PCI Target Emulation
//!
//! This module contains the PCI specific parts of the device model: the
//! [transaction state machine](target) and the two register files it composes, the
//! [Configuration Space](config_space) and the [command/status block](command_status).
//!
//! ## Example
//!
//! A target is driven by writing its input lines and advancing the clock:
//!
//! ```rust
//! use pci_target::device::pci::{constants::bus_command, target::{PciTarget, Phase}};
//! use pci_target::device::signals::ActiveLow;
//!
//! let mut target = PciTarget::default();
//!
//! let pci = target.pci_mut();
//! pci.frame_n = ActiveLow::ASSERTED;
//! pci.irdy_n = ActiveLow::ASSERTED;
//! pci.cbe = bus_command::IO_READ;
//! pci.ad_i = 0x0;
//! target.tick();
//!
//! assert_eq!(target.phase(), Phase::Decode);
//! assert!(target.pci().devsel_n.is_asserted());
//! ```

pub mod command_status;
pub mod config_space;
pub mod constants;
pub mod target;
pub mod traits;
