//! Binary entry point for the `raptodb` server.
//!
//! Parses the CLI, installs the counting allocator behind the `MEM`
//! command, sets the display level, and runs the server until a `DOWN`
//! query shuts it down. Exit code 0 on clean shutdown, 1 on any fatal
//! error.

use anyhow::Context;
use clap::Parser;
use rapto::cli::{Cli, Command};
use rapto::memtrack::CountingAlloc;
use rapto::verbosity::set_display_level;

#[global_allocator]
static ALLOC: CountingAlloc = CountingAlloc;

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Server(args) => {
            set_display_level(args.verbose.level());
            let cfg = args.into_config();
            let name = cfg.name.clone();
            rapto::server::run(cfg).with_context(|| format!("server {name:?}"))?;
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("raptodb: {err:#}");
        std::process::exit(1);
    }
    std::process::exit(0);
}
