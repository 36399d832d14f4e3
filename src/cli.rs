//! This module implements the CLI interface.
//!
//! The command line builds a target from the identity flags, resets it and
//! runs a list of I/O transactions against it.
use clap::Parser;

use pci_target::{
    device::pci::{config_space::ConfigSpaceBuilder, constants::config_space::reset},
    testbench::{parse_number, TestbenchConfig, Transaction},
};

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
pub struct Cli {
    /// Enable verbose logging. Can be specified multiple times to
    /// increase verbosity. Use -vv to trace every bus cycle.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// The vendor ID reported in the Configuration Space.
    #[arg(long, value_name = "ID", value_parser = parse_u16, default_value_t = reset::VENDOR)]
    vendor_id: u16,

    /// The device ID reported in the Configuration Space.
    #[arg(long, value_name = "ID", value_parser = parse_u16, default_value_t = reset::DEVICE)]
    device_id: u16,

    /// The revision ID reported in the Configuration Space.
    #[arg(long, value_name = "REV", value_parser = parse_u8, default_value_t = reset::REVISION)]
    revision: u8,

    /// How many cycles the reset line is held asserted before the
    /// first transaction.
    #[arg(long, value_name = "CYCLES", default_value_t = TestbenchConfig::default().reset_cycles)]
    reset_cycles: u32,

    /// How many cycles to wait for the device to claim a
    /// transaction before giving up. Must be at least 1.
    #[arg(
        long,
        value_name = "CYCLES",
        value_parser = clap::value_parser!(u32).range(1..),
        default_value_t = TestbenchConfig::default().max_wait_cycles
    )]
    max_wait_cycles: u32,

    /// The I/O transactions to run, in order. Each one is either
    /// read:ADDR or write:ADDR=DATA. Numbers are decimal or
    /// 0x-prefixed hexadecimal.
    ///
    /// Without transactions, 0xDEADBEEF is written to and read back
    /// from address 0.
    #[arg(value_name = "TRANSACTION")]
    transactions: Vec<Transaction>,
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let value = parse_number(s).map_err(|e| e.to_string())?;
    u16::try_from(value).map_err(|e| e.to_string())
}

fn parse_u8(s: &str) -> Result<u8, String> {
    let value = parse_number(s).map_err(|e| e.to_string())?;
    u8::try_from(value).map_err(|e| e.to_string())
}

impl Cli {
    /// The Configuration Space described by the identity flags.
    pub fn config_space(&self) -> ConfigSpaceBuilder {
        ConfigSpaceBuilder::new(self.vendor_id, self.device_id).revision(self.revision)
    }

    /// The reset and wait cycle counts for the testbench.
    pub fn testbench_config(&self) -> TestbenchConfig {
        TestbenchConfig {
            reset_cycles: self.reset_cycles,
            max_wait_cycles: self.max_wait_cycles,
        }
    }

    /// The transactions to run.
    pub fn transactions(&self) -> Vec<Transaction> {
        if self.transactions.is_empty() {
            vec![
                Transaction::Write {
                    address: 0x0,
                    data: 0xDEAD_BEEF,
                },
                Transaction::Read { address: 0x0 },
            ]
        } else {
            self.transactions.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_the_write_read_scenario() {
        let cli = Cli::try_parse_from(["pci-target"]).unwrap();

        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.testbench_config(), TestbenchConfig::default());
        assert_eq!(cli.transactions().len(), 2);
    }

    #[test]
    fn identity_and_transactions_are_parsed() {
        let cli = Cli::try_parse_from([
            "pci-target",
            "-vv",
            "--vendor-id",
            "0x8086",
            "--revision",
            "3",
            "write:0x10=0xCAFE",
            "read:0x10",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.vendor_id, 0x8086);
        assert_eq!(cli.device_id, reset::DEVICE);
        assert_eq!(cli.revision, 3);
        assert_eq!(
            cli.transactions(),
            vec![
                Transaction::Write {
                    address: 0x10,
                    data: 0xCAFE
                },
                Transaction::Read { address: 0x10 },
            ]
        );
    }

    #[test]
    fn out_of_range_identity_is_rejected() {
        assert!(Cli::try_parse_from(["pci-target", "--vendor-id", "0x10000"]).is_err());
        assert!(Cli::try_parse_from(["pci-target", "bogus"]).is_err());
    }

    #[test]
    fn wait_cycles_must_not_be_zero() {
        assert!(Cli::try_parse_from(["pci-target", "--max-wait-cycles", "0"]).is_err());

        let cli = Cli::try_parse_from(["pci-target", "--max-wait-cycles", "1"]).unwrap();
        assert_eq!(cli.testbench_config().max_wait_cycles, 1);
    }
}
