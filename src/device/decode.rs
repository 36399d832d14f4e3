//! # Register Decode Tables
//!
//! Register files on the bus respond to a handful of dword offsets and return all ones for
//! everything else. This module expresses that as data: a [`DecodeEntry`] table that maps an
//! offset to a named register and its write behavior, applied on top of a [`RegisterSet`] by
//! [`DecodedRegisters`].

use tracing::{debug, trace};

use crate::device::{bus::Request, register_set::RegisterSet};

/// The value returned for reads of offsets that no register claims.
pub const UNMAPPED_READ: u32 = 0xFFFF_FFFF;

/// How a decoded register reacts to writes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    /// Writes are dropped.
    ReadOnly,

    /// Writes update the bits the underlying [`RegisterSet`] marks as writable.
    Writable,
}

/// A single dword register in a decode table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DecodeEntry {
    /// The byte offset of the register. Decoding matches this offset exactly.
    pub offset: u8,

    /// The name of the register for diagnostics.
    pub name: &'static str,

    /// Whether writes reach the register.
    pub access: Access,
}

impl DecodeEntry {
    /// A register that ignores writes.
    #[must_use]
    pub const fn read_only(offset: u8, name: &'static str) -> Self {
        Self {
            offset,
            name,
            access: Access::ReadOnly,
        }
    }

    /// A register that accepts writes.
    #[must_use]
    pub const fn writable(offset: u8, name: &'static str) -> Self {
        Self {
            offset,
            name,
            access: Access::Writable,
        }
    }
}

/// Register storage that is only reachable through a decode table.
#[derive(Debug, Clone)]
pub struct DecodedRegisters<const SIZE: usize> {
    /// The name of the register file for diagnostics.
    name: &'static str,
    table: &'static [DecodeEntry],
    regs: RegisterSet<SIZE>,
}

impl<const SIZE: usize> DecodedRegisters<SIZE> {
    /// Put `regs` behind the decode `table`.
    ///
    /// Every entry of the table must describe a dword that lies within `regs`.
    #[must_use]
    pub fn new(name: &'static str, table: &'static [DecodeEntry], regs: RegisterSet<SIZE>) -> Self {
        for entry in table {
            assert!(
                usize::from(entry.offset) + 4 <= regs.size(),
                "{} register {} at {:#04x} lies outside of its storage",
                name,
                entry.name,
                entry.offset
            );
        }

        Self { name, table, regs }
    }

    /// Find the register claiming `offset`, if any.
    #[must_use]
    pub fn decode(&self, offset: u8) -> Option<&'static DecodeEntry> {
        let table: &'static [DecodeEntry] = self.table;
        table.iter().find(|entry| entry.offset == offset)
    }

    /// Read the register at `offset`, or [`UNMAPPED_READ`] if there is none.
    #[must_use]
    pub fn read(&self, offset: u8) -> u32 {
        self.decode(offset).map_or(UNMAPPED_READ, |entry| {
            self.regs.read(Request::dword(entry.offset.into()))
        })
    }

    /// Write the register at `offset`.
    ///
    /// Writes to unmapped offsets and read-only registers are silently dropped.
    pub fn write(&mut self, offset: u8, value: u32) {
        match self.decode(offset) {
            Some(entry) if entry.access == Access::Writable => {
                trace!(
                    "{} write: {} ({:#04x}) <- {:#010x}",
                    self.name,
                    entry.name,
                    offset,
                    value
                );
                self.regs.write(Request::dword(entry.offset.into()), value);
            }
            Some(entry) => debug!(
                "Ignored {} write to read-only {}: {:#04x} <- {:#010x}",
                self.name, entry.name, offset, value
            ),
            None => debug!(
                "Ignored {} write: {:#04x} <- {:#010x}",
                self.name, offset, value
            ),
        }
    }

    /// Direct access to the storage behind the decode table.
    ///
    /// This reaches registers the table does not map.
    #[must_use]
    pub const fn storage(&self) -> &RegisterSet<SIZE> {
        &self.regs
    }
}
