//! # PCI Target Protocol Engine
//!
//! This module implements the bus side of the device: a state machine that watches the PCI
//! handshake lines, claims I/O read and write transactions and serves them from the
//! [`CommandStatus`] block. See [`PciTarget`] for a starting point.
//!
//! A transaction moves through the following states:
//!
//! ```text
//!        FRAME# & IRDY#, I/O command
//!   Idle ---------------------------> Decode ---> IoRead / IoWrite
//!    ^                                                 |
//!    +------ data transferred, FRAME# & IRDY# released +
//! ```
//!
//! The combinational logic of each cycle is the pure function [`evaluate`]. [`PciTarget`] wraps it
//! with the state that persists across clock edges.

use tracing::{debug, trace};

use crate::device::signals::{ActiveLow, PciSignals};

use super::{
    command_status::CommandStatus,
    config_space::ConfigSpace,
    constants::{
        bus_command,
        command_status::{ADDRESS_MASK, ADDRESS_SHIFT},
    },
    traits::{RegisterFile, RegisterPort},
};

/// A bus command as latched from C/BE# during the address phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BusCommand {
    /// Read from I/O space.
    IoRead,

    /// Write to I/O space.
    IoWrite,

    /// Any other command. The target never claims these.
    Other(u8),
}

impl From<u8> for BusCommand {
    fn from(cbe: u8) -> Self {
        match cbe & bus_command::MASK {
            bus_command::IO_READ => Self::IoRead,
            bus_command::IO_WRITE => Self::IoWrite,
            other => Self::Other(other),
        }
    }
}

impl From<BusCommand> for u8 {
    fn from(command: BusCommand) -> Self {
        match command {
            BusCommand::IoRead => bus_command::IO_READ,
            BusCommand::IoWrite => bus_command::IO_WRITE,
            BusCommand::Other(cbe) => cbe,
        }
    }
}

/// The state of the transaction state machine.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Phase {
    /// No transaction is in progress. The target returns here after every transaction.
    #[default]
    Idle,

    /// An I/O transaction was seen. The target claims it and prepares the data phase.
    Decode,

    /// Data phase of an I/O read.
    IoRead,

    /// Data phase of an I/O write.
    IoWrite,
}

/// Everything the protocol engine remembers across clock edges.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProtocolState {
    /// The current state.
    pub phase: Phase,

    /// The AD bus value latched during the last address phase.
    pub address: u32,

    /// The bus command latched during the last address phase.
    pub command: BusCommand,

    /// Set one cycle after the transaction was claimed. Models the setup latency of the target.
    pub device_ready: bool,

    /// The initiator signaled IRDY# during the data phase.
    pub data_transferred: bool,
}

impl Default for ProtocolState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            address: 0,
            command: BusCommand::from(0),
            device_ready: false,
            data_transferred: false,
        }
    }
}

impl ProtocolState {
    /// The state after a transaction completed. The latched address and command are kept.
    const fn finish(self) -> Self {
        Self {
            phase: Phase::Idle,
            device_ready: false,
            data_transferred: false,
            ..self
        }
    }
}

/// The bus lines the target samples, in their logical sense.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TargetInputs {
    /// FRAME# is asserted.
    pub frame: bool,

    /// IRDY# is asserted.
    pub irdy: bool,

    /// The resolved AD bus value.
    pub ad: u32,

    /// The C/BE# value.
    pub cbe: u8,
}

impl TargetInputs {
    /// Sample the input lines of a signal bundle.
    #[must_use]
    pub const fn sample(pci: &PciSignals) -> Self {
        Self {
            frame: pci.frame_n.is_asserted(),
            irdy: pci.irdy_n.is_asserted(),
            ad: pci.ad_i,
            cbe: pci.cbe,
        }
    }
}

/// The bus lines the target drives, in their logical sense.
///
/// The default value is the idle bus: no handshake asserted and the AD bus released.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TargetOutputs {
    /// The value offered on the AD bus.
    pub ad: u32,

    /// The target drives the AD bus.
    pub ad_oe: bool,

    /// TRDY# is asserted.
    pub trdy: bool,

    /// DEVSEL# is asserted.
    pub devsel: bool,

    /// STOP# is asserted. This target never requests a stop.
    pub stop: bool,
}

impl TargetOutputs {
    /// Put the outputs onto the target's lines of a signal bundle.
    pub fn drive(&self, pci: &mut PciSignals) {
        pci.ad_o = self.ad;
        pci.ad_oe = self.ad_oe;
        pci.trdy_n = ActiveLow::from_asserted(self.trdy);
        pci.devsel_n = ActiveLow::from_asserted(self.devsel);
        pci.stop_n = ActiveLow::from_asserted(self.stop);
    }
}

/// The combinational result of one cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// What the target drives during this cycle.
    pub outputs: TargetOutputs,

    /// What the target presents to the command/status block during this cycle.
    pub port: RegisterPort,

    /// The state after the next clock edge.
    pub next: ProtocolState,
}

/// Select the command/status register from an I/O address.
const fn register_offset(address: u32) -> u8 {
    ((address >> ADDRESS_SHIFT) & ADDRESS_MASK) as u8
}

/// Handle the initiator side of a data phase.
///
/// IRDY# marks the data as transferred. Once transferred, releasing both FRAME# and IRDY# ends
/// the transaction.
const fn data_phase(state: &ProtocolState, inputs: &TargetInputs) -> ProtocolState {
    if inputs.irdy {
        ProtocolState {
            data_transferred: true,
            ..*state
        }
    } else if state.data_transferred && !inputs.frame {
        state.finish()
    } else {
        *state
    }
}

/// Evaluate one cycle of the protocol engine.
///
/// This is a pure function of the current state, the sampled inputs and the combinational read
/// path of the register file behind the I/O space.
#[must_use]
pub fn evaluate(
    state: &ProtocolState,
    inputs: &TargetInputs,
    registers: &impl RegisterFile,
) -> Evaluation {
    let mut outputs = TargetOutputs::default();
    let mut port = RegisterPort::default();

    let next = match state.phase {
        Phase::Idle if inputs.frame && inputs.irdy => {
            let command = BusCommand::from(inputs.cbe);
            let phase = match command {
                BusCommand::IoRead | BusCommand::IoWrite => Phase::Decode,
                BusCommand::Other(_) => Phase::Idle,
            };

            ProtocolState {
                phase,
                address: inputs.ad,
                command,
                ..*state
            }
        }
        Phase::Idle => *state,
        Phase::Decode => {
            outputs.devsel = true;

            match state.command {
                BusCommand::IoRead => ProtocolState {
                    phase: Phase::IoRead,
                    device_ready: true,
                    ..*state
                },
                BusCommand::IoWrite => ProtocolState {
                    phase: Phase::IoWrite,
                    device_ready: true,
                    ..*state
                },
                // Only I/O commands leave Idle.
                BusCommand::Other(_) => state.finish(),
            }
        }
        Phase::IoRead => {
            outputs.devsel = true;

            if state.device_ready {
                port = RegisterPort::read(register_offset(state.address));
                outputs.ad = registers.read(port.offset);
                outputs.ad_oe = true;
                outputs.trdy = true;

                data_phase(state, inputs)
            } else {
                *state
            }
        }
        Phase::IoWrite => {
            outputs.devsel = true;

            if state.device_ready {
                let offset = register_offset(state.address);
                outputs.trdy = true;
                port = if inputs.irdy {
                    RegisterPort::write(offset, inputs.ad)
                } else {
                    RegisterPort {
                        offset,
                        ..RegisterPort::default()
                    }
                };

                data_phase(state, inputs)
            } else {
                *state
            }
        }
    };

    Evaluation {
        outputs,
        port,
        next,
    }
}

/// A single-function PCI target.
///
/// The target owns its bus lines and both register files. Whoever drives the bus writes the input
/// lines through [`pci_mut`](Self::pci_mut) and then calls [`settle`](Self::settle) or
/// [`tick`](Self::tick). The target only ever writes its own output lines.
///
/// I/O transactions reach the [`CommandStatus`] block. The [`ConfigSpace`] is not reachable from
/// the bus. It is accessed through its own port ([`config_port_mut`](Self::config_port_mut)),
/// which stands in for a configuration access mechanism.
///
/// The reset line is not consulted. The state machine only starts from [`ProtocolState::default`]
/// when the target is constructed.
#[derive(Debug, Clone)]
pub struct PciTarget {
    pci: PciSignals,
    state: ProtocolState,
    config_space: ConfigSpace,
    config_port: RegisterPort,
    cmd_status: CommandStatus,
}

impl Default for PciTarget {
    fn default() -> Self {
        Self::new(ConfigSpace::default())
    }
}

impl PciTarget {
    /// Create a target in its power-on state with the given Configuration Space.
    #[must_use]
    pub fn new(config_space: ConfigSpace) -> Self {
        let mut target = Self {
            pci: PciSignals::default(),
            state: ProtocolState::default(),
            config_space,
            config_port: RegisterPort::default(),
            cmd_status: CommandStatus::new(),
        };

        target.settle();
        target
    }

    /// The bus lines of the target.
    #[must_use]
    pub const fn pci(&self) -> &PciSignals {
        &self.pci
    }

    /// Mutable access to the bus lines to drive the inputs of the target.
    ///
    /// Changes to the target's output lines are overwritten by the next [`settle`](Self::settle).
    pub fn pci_mut(&mut self) -> &mut PciSignals {
        &mut self.pci
    }

    /// The current protocol state.
    #[must_use]
    pub const fn state(&self) -> &ProtocolState {
        &self.state
    }

    /// The current state of the transaction state machine.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.state.phase
    }

    /// The Configuration Space of the target.
    #[must_use]
    pub const fn config_space(&self) -> &ConfigSpace {
        &self.config_space
    }

    /// The port of the Configuration Space. It is sampled on every clock edge.
    pub fn config_port_mut(&mut self) -> &mut RegisterPort {
        &mut self.config_port
    }

    /// The command/status block behind the I/O space.
    #[must_use]
    pub const fn command_status(&self) -> &CommandStatus {
        &self.cmd_status
    }

    fn evaluate(&self) -> Evaluation {
        evaluate(
            &self.state,
            &TargetInputs::sample(&self.pci),
            &self.cmd_status,
        )
    }

    /// Recompute the output lines after inputs have changed.
    pub fn settle(&mut self) {
        let evaluation = self.evaluate();
        evaluation.outputs.drive(&mut self.pci);
    }

    /// Advance the target by one clock edge.
    ///
    /// All synchronous state (register files and protocol state) is updated from the values of
    /// the cycle that ends with this edge. Afterwards the outputs are settled for the new cycle.
    pub fn tick(&mut self) {
        let inputs = TargetInputs::sample(&self.pci);
        let evaluation = self.evaluate();
        let next = evaluation.next;

        trace!(
            "{:?}: frame={} irdy={} cbe={:#06b} ad={:#010x} -> {:?}",
            self.state.phase,
            inputs.frame,
            inputs.irdy,
            inputs.cbe,
            inputs.ad,
            evaluation.outputs
        );

        if self.state.phase == Phase::Idle && inputs.frame && inputs.irdy {
            match next.command {
                BusCommand::Other(cbe) => debug!(
                    "Ignoring bus command {:#06b} at {:#010x}",
                    cbe, next.address
                ),
                command => debug!(
                    "Claiming {:?} ({:#06b}) at {:#010x}",
                    command,
                    u8::from(command),
                    next.address
                ),
            }
        }
        if next.phase != self.state.phase {
            debug!("{:?} -> {:?}", self.state.phase, next.phase);
        }

        self.cmd_status.clock(&evaluation.port);
        self.config_space.clock(&self.config_port);
        self.state = next;

        self.settle();
    }
}
