//! # PCI Constants
//!
//! This module collects PCI related constants. Configuration Space offsets follow the "PCI Local
//! Bus Specification". Reset values and the command/status block layout are specific to this
//! device.

// Allow missing docs to avoid duplicating the PCI spec for all constants.
#![allow(missing_docs)]

/// Bus commands as encoded on C/BE# during the address phase.
pub mod bus_command {
    /// Mask of the meaningful C/BE# bits.
    pub const MASK: u8 = 0b1111;

    pub const INTERRUPT_ACKNOWLEDGE: u8 = 0b0000;
    pub const IO_READ: u8 = 0b0010;
    pub const IO_WRITE: u8 = 0b0011;
    pub const MEMORY_READ: u8 = 0b0110;
    pub const MEMORY_WRITE: u8 = 0b0111;
    pub const CONFIG_READ: u8 = 0b1010;
    pub const CONFIG_WRITE: u8 = 0b1011;
}

/// Constants related to the configuration space.
pub mod config_space {

    /// The config space size of a single PCI device in bytes.
    pub const SIZE: usize = 256;

    /// The maximum number of Base Address Registers (BARs) per device.
    pub const MAX_BARS: usize = 6;

    /// The size in bytes of a single BAR.
    pub const BAR_ENTRY_SIZE: usize = 4;

    /// The byte offsets of the fields in the configuration space.
    pub mod offset {
        pub const VENDOR: usize = 0x0;
        pub const DEVICE: usize = 0x2;
        pub const COMMAND: usize = 0x4;
        pub const STATUS: usize = 0x6;
        pub const REVISION: usize = 0x8;
        pub const PROG_IF: usize = 0x9;
        pub const SUBCLASS: usize = 0xA;
        pub const CLASS: usize = 0xB;
        pub const CACHE_LINE_SIZE: usize = 0xC;
        pub const LATENCY_TIMER: usize = 0xD;
        pub const HEADER_TYPE: usize = 0xE;
        pub const BIST: usize = 0xF;

        pub const BAR_0: usize = 0x10;
    }

    /// The dword offsets that the configuration space decodes.
    pub mod dword {
        pub const VENDOR_DEVICE: u8 = 0x00;
        pub const COMMAND_STATUS: u8 = 0x04;
        pub const REVISION_CLASS: u8 = 0x08;
        pub const CACHE_LATENCY_HEADER_BIST: u8 = 0x0C;
    }

    /// Power-on values of the configuration space fields.
    pub mod reset {
        pub const VENDOR: u16 = 0x1234;
        pub const DEVICE: u16 = 0x5678;
        pub const COMMAND: u16 = 0x0000;
        /// DEVSEL timing "medium".
        pub const STATUS: u16 = 0x0200;
        pub const REVISION: u8 = 0x01;
        pub const CLASS_CODE: u32 = 0x00_0000;
        pub const CACHE_LINE_SIZE: u8 = 0x00;
        pub const LATENCY_TIMER: u8 = 0x00;
        pub const BIST: u8 = 0x00;
        pub const BAR: u32 = 0x0000_0000;
    }

    /// Command Register Constants.
    pub mod command {
        /// The complete command field is writable.
        pub const WRITABLE_BITS: u16 = 0xFFFF;
    }

    /// Class code constants.
    pub mod class_code {
        /// The class code is 24 bits wide: class, subclass and programming interface.
        pub const MASK: u32 = 0x00FF_FFFF;
    }

    /// PCI header type.
    ///
    /// This is usually type 0, except for PCI-to-PCI bridges and other exotic devices such as
    /// Cardbus bridges.
    pub mod header_type {
        pub const TYPE_00: u8 = 0;
    }
}

/// Constants related to the device-specific command/status block in I/O space.
pub mod command_status {
    /// The storage size of the block in bytes.
    pub const SIZE: usize = 8;

    /// Register offsets as decoded from the I/O address.
    pub mod offset {
        pub const COMMAND: u8 = 0x00;
        pub const STATUS: u8 = 0x04;
    }

    /// The I/O address bits that select a register.
    ///
    /// The register offset is `(address >> ADDRESS_SHIFT) & ADDRESS_MASK`.
    pub const ADDRESS_SHIFT: u32 = 2;
    pub const ADDRESS_MASK: u32 = 0xF;
}
