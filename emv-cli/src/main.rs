//! EMV CLI - Command line tool for aligning vaccination and excess mortality statistics.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "emv-cli",
    version,
    about = "Excess mortality vs vaccination toolkit"
)]
struct Cli {
    #[command(subcommand)]
    command: emv_cmd::Command,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    log::debug!("emv-cli {}", env!("CARGO_PKG_VERSION"));
    emv_cmd::run(cli.command)
}
