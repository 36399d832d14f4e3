mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use pci_target::{device::pci::target::PciTarget, testbench::Testbench};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let args = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(match args.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")?;

    let target = PciTarget::new(args.config_space().config_space());
    let mut testbench = Testbench::new(target, args.testbench_config());

    testbench.reset().context("Failed to reset the target")?;
    info!("Target is out of reset after {} cycles", testbench.cycle());

    for transaction in args.transactions() {
        let data = testbench
            .run(&transaction)
            .with_context(|| format!("Failed to run {transaction}"))?;

        if let Some(data) = data {
            println!("Read Data: {data:#010X}");
        }
    }

    info!("Done after {} cycles", testbench.cycle());

    Ok(())
}
