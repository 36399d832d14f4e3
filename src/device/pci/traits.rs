//! # Register File Traits
//!
//! This module contains the interface between the protocol engine and the register files it
//! serves. See [`RegisterFile`].

use std::fmt::Debug;

/// The address/data/enable port of a register file for a single clock cycle.
///
/// A default port is idle: nothing is read and nothing is written.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RegisterPort {
    /// The byte offset of the addressed register.
    pub offset: u8,

    /// The value to store when `write_enable` is set.
    pub data_in: u32,

    /// Store `data_in` at `offset` on the next clock edge.
    pub write_enable: bool,

    /// Request the value at `offset`.
    pub read_enable: bool,
}

impl RegisterPort {
    /// A port that requests a read of `offset`.
    #[must_use]
    pub const fn read(offset: u8) -> Self {
        Self {
            offset,
            data_in: 0,
            write_enable: false,
            read_enable: true,
        }
    }

    /// A port that stores `data_in` at `offset`.
    #[must_use]
    pub const fn write(offset: u8, data_in: u32) -> Self {
        Self {
            offset,
            data_in,
            write_enable: true,
            read_enable: false,
        }
    }
}

/// A passive, address-decoded register file.
///
/// Register files have a combinational read path and a synchronous write path. They never act on
/// their own: the owner presents a [`RegisterPort`] each cycle and clocks the file once per edge.
pub trait RegisterFile: Debug {
    /// Decode `offset` and return the register value in the same cycle.
    ///
    /// Offsets without a register read as all ones.
    fn read(&self, offset: u8) -> u32;

    /// Apply the effects of one clock edge given the port state during the cycle before it.
    fn clock(&mut self, port: &RegisterPort);
}
