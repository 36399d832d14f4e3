//! # PCI Configuration Space
//!
//! This module emulates the PCI Configuration Space of the target. To construct a Configuration
//! Space use [`ConfigSpaceBuilder`].
//!
//! Only the first four dwords of the standard header are decoded:
//!
//! | offset | contents                                              |
//! |--------|-------------------------------------------------------|
//! | `0x00` | vendor ID, device ID                                  |
//! | `0x04` | command, status                                       |
//! | `0x08` | revision ID, class code                               |
//! | `0x0C` | cache line size, latency timer, header type, BIST     |
//!
//! Everything else, including the BARs, reads as all ones.

use tracing::trace;

use crate::device::{
    bus::Request,
    decode::{DecodeEntry, DecodedRegisters},
    register_set::RegisterSetBuilder,
};

use super::{
    constants::config_space::{
        self, class_code, command, dword, header_type, offset, reset, BAR_ENTRY_SIZE, MAX_BARS,
    },
    traits::{RegisterFile, RegisterPort},
};

/// The registers the configuration space responds to.
const DECODE_TABLE: &[DecodeEntry] = &[
    DecodeEntry::read_only(dword::VENDOR_DEVICE, "vendor/device ID"),
    DecodeEntry::writable(dword::COMMAND_STATUS, "command/status"),
    DecodeEntry::read_only(dword::REVISION_CLASS, "revision/class code"),
    DecodeEntry::read_only(dword::CACHE_LATENCY_HEADER_BIST, "cache line/latency/header/BIST"),
];

/// A builder for [`ConfigSpace`] objects.
#[derive(Debug, Clone)]
pub struct ConfigSpaceBuilder {
    vendor: u16,
    device: u16,
    revision: u8,
    class_code: u32,
}

impl Default for ConfigSpaceBuilder {
    fn default() -> Self {
        Self::new(reset::VENDOR, reset::DEVICE)
    }
}

impl ConfigSpaceBuilder {
    /// Create a builder for [`ConfigSpace`] with the given identity and default settings for
    /// everything else.
    #[must_use]
    pub const fn new(vendor: u16, device: u16) -> Self {
        Self {
            vendor,
            device,
            revision: reset::REVISION,
            class_code: reset::CLASS_CODE,
        }
    }

    /// Configure the revision field for this device.
    ///
    /// When not specified, the revision defaults to 1.
    #[must_use]
    pub const fn revision(mut self, revision: u8) -> Self {
        self.revision = revision;
        self
    }

    /// Configure the class code from its class, subclass and programming interface parts.
    ///
    /// When not specified, the class code is zero.
    #[must_use]
    pub fn class(self, class: u8, subclass: u8, prog_if: u8) -> Self {
        self.class_code(u32::from_be_bytes([0, class, subclass, prog_if]))
    }

    /// Configure the raw 24-bit class code.
    #[must_use]
    pub fn class_code(mut self, code: u32) -> Self {
        assert_eq!(
            code & !class_code::MASK,
            0,
            "class code {code:#x} does not fit into 24 bits"
        );

        self.class_code = code;
        self
    }

    /// Create the finalized Configuration Space object.
    #[must_use]
    pub fn config_space(self) -> ConfigSpace {
        let [prog_if, subclass, class, _] = self.class_code.to_le_bytes();
        let mut regs = RegisterSetBuilder::<{ config_space::SIZE }>::new();

        regs.u16_le_ro_at(offset::VENDOR, self.vendor)
            .u16_le_ro_at(offset::DEVICE, self.device)
            .u16_le_at(offset::COMMAND, reset::COMMAND, command::WRITABLE_BITS)
            .u16_le_ro_at(offset::STATUS, reset::STATUS)
            .u8_ro_at(offset::REVISION, self.revision)
            .u8_ro_at(offset::PROG_IF, prog_if)
            .u8_ro_at(offset::SUBCLASS, subclass)
            .u8_ro_at(offset::CLASS, class)
            .u8_ro_at(offset::CACHE_LINE_SIZE, reset::CACHE_LINE_SIZE)
            .u8_ro_at(offset::LATENCY_TIMER, reset::LATENCY_TIMER)
            .u8_ro_at(offset::HEADER_TYPE, header_type::TYPE_00)
            .u8_ro_at(offset::BIST, reset::BIST);

        for i in 0..MAX_BARS {
            // BARs exist as storage, but no address decode uses them.
            regs.u32_le_ro_at(offset::BAR_0 + i * BAR_ENTRY_SIZE, reset::BAR);
        }

        ConfigSpace {
            regs: DecodedRegisters::new("config space", DECODE_TABLE, regs.into()),
            data_out: 0,
        }
    }
}

/// The Configuration Space of the target.
///
/// Use [`ConfigSpaceBuilder`] to construct this.
///
/// Besides the combinational [`read`](RegisterFile::read), the Configuration Space has a
/// registered output: on each clock edge with read enable (and no write enable) the decoded value
/// is latched into [`data_out`](Self::data_out). Only the command field is writable.
#[derive(Debug, Clone)]
pub struct ConfigSpace {
    regs: DecodedRegisters<{ config_space::SIZE }>,
    data_out: u32,
}

impl Default for ConfigSpace {
    fn default() -> Self {
        ConfigSpaceBuilder::default().config_space()
    }
}

impl ConfigSpace {
    /// The value latched by the last read-enabled clock edge.
    #[must_use]
    pub const fn data_out(&self) -> u32 {
        self.data_out
    }

    /// The contents of a Base Address Register slot.
    ///
    /// BARs are not reachable through the decoded register interface.
    #[must_use]
    pub fn bar(&self, bar_no: usize) -> Option<u32> {
        (bar_no < MAX_BARS).then(|| {
            self.regs
                .storage()
                .read(Request::dword(offset::BAR_0 + bar_no * BAR_ENTRY_SIZE))
        })
    }
}

impl RegisterFile for ConfigSpace {
    fn read(&self, offset: u8) -> u32 {
        self.regs.read(offset)
    }

    fn clock(&mut self, port: &RegisterPort) {
        if port.write_enable {
            self.regs.write(port.offset, port.data_in);
        } else if port.read_enable {
            self.data_out = self.regs.read(port.offset);
            trace!(
                "config space read: {:#04x} -> {:#010x}",
                port.offset,
                self.data_out
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MAPPED: [u8; 4] = [
        dword::VENDOR_DEVICE,
        dword::COMMAND_STATUS,
        dword::REVISION_CLASS,
        dword::CACHE_LATENCY_HEADER_BIST,
    ];

    fn snapshot(cfg_space: &ConfigSpace) -> [u32; 4] {
        MAPPED.map(|offset| cfg_space.read(offset))
    }

    #[test]
    fn reset_values_are_exposed() {
        let cfg_space = ConfigSpace::default();

        assert_eq!(cfg_space.read(dword::VENDOR_DEVICE), 0x5678_1234);
        assert_eq!(cfg_space.read(dword::COMMAND_STATUS), 0x0200_0000);
        assert_eq!(cfg_space.read(dword::REVISION_CLASS), 0x0000_0001);
        assert_eq!(cfg_space.read(dword::CACHE_LATENCY_HEADER_BIST), 0);
        assert_eq!(cfg_space.data_out(), 0);
    }

    #[test]
    fn identity_can_be_configured() {
        let cfg_space = ConfigSpaceBuilder::new(0xDEAD, 0xBEEF)
            .revision(0x12)
            .class(0x0C, 0x03, 0x30)
            .config_space();

        assert_eq!(cfg_space.read(dword::VENDOR_DEVICE), 0xBEEF_DEAD);
        assert_eq!(cfg_space.read(dword::REVISION_CLASS), 0x0C03_3012);
    }

    #[test]
    #[should_panic]
    fn class_code_must_fit_into_24_bits() {
        let _ = ConfigSpaceBuilder::default().class_code(0x0100_0000);
    }

    #[test]
    fn only_the_command_field_is_written() {
        let mut cfg_space = ConfigSpace::default();

        cfg_space.clock(&RegisterPort::write(dword::COMMAND_STATUS, 0xABCD_0147));

        assert_eq!(cfg_space.read(dword::COMMAND_STATUS), 0x0200_0147);
    }

    #[test]
    fn reads_are_latched_on_the_clock_edge() {
        let mut cfg_space = ConfigSpace::default();

        cfg_space.clock(&RegisterPort::read(dword::VENDOR_DEVICE));
        assert_eq!(cfg_space.data_out(), 0x5678_1234);

        // Without read enable, the output holds.
        cfg_space.clock(&RegisterPort {
            offset: dword::REVISION_CLASS,
            ..RegisterPort::default()
        });
        assert_eq!(cfg_space.data_out(), 0x5678_1234);

        cfg_space.clock(&RegisterPort::read(0x40));
        assert_eq!(cfg_space.data_out(), 0xFFFF_FFFF);
    }

    #[test]
    fn writes_take_precedence_over_read_latching() {
        let mut cfg_space = ConfigSpace::default();

        cfg_space.clock(&RegisterPort {
            read_enable: true,
            ..RegisterPort::write(dword::COMMAND_STATUS, 0x0003)
        });

        assert_eq!(cfg_space.data_out(), 0);
        assert_eq!(cfg_space.read(dword::COMMAND_STATUS), 0x0200_0003);
    }

    #[test]
    fn bars_are_stored_but_not_decoded() {
        let cfg_space = ConfigSpace::default();

        for bar_no in 0..MAX_BARS {
            assert_eq!(cfg_space.bar(bar_no), Some(0));
            let bar_offset = (offset::BAR_0 + bar_no * BAR_ENTRY_SIZE) as u8;
            assert_eq!(cfg_space.read(bar_offset), 0xFFFF_FFFF);
        }
        assert_eq!(cfg_space.bar(MAX_BARS), None);
    }

    proptest! {
        #[test]
        fn unmapped_offsets_read_all_ones(offset: u8) {
            prop_assume!(!MAPPED.contains(&offset));

            prop_assert_eq!(ConfigSpace::default().read(offset), 0xFFFF_FFFF);
        }

        #[test]
        fn writes_only_ever_change_the_command_field(
            writes in proptest::collection::vec((any::<u8>(), any::<u32>()), 0..32)
        ) {
            let mut cfg_space = ConfigSpace::default();
            let initial = snapshot(&cfg_space);
            let mut command = u32::from(reset::COMMAND);

            for (offset, value) in writes {
                cfg_space.clock(&RegisterPort::write(offset, value));
                if offset == dword::COMMAND_STATUS {
                    command = value & 0xFFFF;
                }
            }

            let current = snapshot(&cfg_space);
            prop_assert_eq!(current[0], initial[0]);
            prop_assert_eq!(current[1], (initial[1] & 0xFFFF_0000) | command);
            prop_assert_eq!(current[2], initial[2]);
            prop_assert_eq!(current[3], initial[3]);
            for bar_no in 0..MAX_BARS {
                prop_assert_eq!(cfg_space.bar(bar_no), Some(0));
            }
        }
    }
}
