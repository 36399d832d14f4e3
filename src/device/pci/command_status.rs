//! # Command/Status Block
//!
//! The device-specific registers of the target, reachable through I/O read and write
//! transactions. The block consists of two fully writable dwords: a generic command register at
//! offset `0x00` and a generic status register at offset `0x04`.

use tracing::trace;

use crate::device::{
    decode::{DecodeEntry, DecodedRegisters},
    register_set::RegisterSetBuilder,
};

use super::{
    constants::command_status::{offset, SIZE},
    traits::{RegisterFile, RegisterPort},
};

const DECODE_TABLE: &[DecodeEntry] = &[
    DecodeEntry::writable(offset::COMMAND, "command"),
    DecodeEntry::writable(offset::STATUS, "status"),
];

/// The command/status register block.
///
/// Reads are purely combinational; there is no output latch. A value written on one clock edge
/// is visible to reads in the following cycle.
#[derive(Debug, Clone)]
pub struct CommandStatus {
    regs: DecodedRegisters<SIZE>,
}

impl Default for CommandStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandStatus {
    /// Create the block with both registers cleared.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: DecodedRegisters::new(
                "command/status",
                DECODE_TABLE,
                RegisterSetBuilder::<SIZE>::new()
                    .u32_le_rw_at(offset::COMMAND.into(), 0)
                    .u32_le_rw_at(offset::STATUS.into(), 0)
                    .into(),
            ),
        }
    }
}

impl RegisterFile for CommandStatus {
    fn read(&self, offset: u8) -> u32 {
        self.regs.read(offset)
    }

    fn clock(&mut self, port: &RegisterPort) {
        if port.write_enable {
            self.regs.write(port.offset, port.data_in);
        } else if port.read_enable {
            trace!(
                "command/status read: {:#04x} -> {:#010x}",
                port.offset,
                self.regs.read(port.offset)
            );
        }
    }
}
