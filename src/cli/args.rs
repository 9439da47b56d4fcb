//! Argument definitions for `raptodb server`.
//!
//! Parsing is delegated to `clap`; [`ServerArgs::into_config`] translates
//! the flag surface into a [`ServerConfig`], applying the `--auth` →
//! `--tls` upgrade and the autosnap count clamp at configuration time.

use crate::server::ServerConfig;
use crate::snapshot::autosnap::AutosnapConfig;
use crate::verbosity::{LEVEL_NOISY, LEVEL_WARNINGS};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "raptodb", version, about = "In-memory key-value database server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the database server.
    Server(ServerArgs),
}

/// Flags of the `server` subcommand.
#[derive(Debug, Args)]
pub struct ServerArgs {
    /// Database name; also names the storage file.
    #[arg(long)]
    pub name: String,

    /// Listen address as IP:PORT. Defaults to a random loopback port in
    /// 10000..19999, or 127.0.0.1:8443 with --tls.
    #[arg(long)]
    pub addr: Option<SocketAddr>,

    /// Directory holding the storage file.
    #[arg(long, default_value = ".")]
    pub db_path: String,

    /// Diagnostic volume.
    #[arg(long, value_enum, default_value = "warnings")]
    pub verbose: VerbosityArg,

    /// Enable periodic snapshots after DELAY seconds and COUNT modifications.
    #[arg(long, num_args = 2, value_names = ["DELAY", "COUNT"])]
    pub save: Option<Vec<u64>>,

    /// Encrypt sessions with the key-exchange handshake.
    #[arg(long)]
    pub tls: bool,

    /// Require a session password (implies --tls).
    #[arg(long, value_name = "PASSWORD")]
    pub auth: Option<String>,

    /// Capacity budget in bytes; required for a new database.
    #[arg(long, value_name = "BYTES")]
    pub db_size: Option<u64>,
}

/// `--verbose` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VerbosityArg {
    Silent,
    Warnings,
    Noisy,
}

impl VerbosityArg {
    /// Display level this argument selects.
    pub fn level(self) -> u32 {
        match self {
            VerbosityArg::Silent => 0,
            VerbosityArg::Warnings => LEVEL_WARNINGS,
            VerbosityArg::Noisy => LEVEL_NOISY,
        }
    }
}

impl ServerArgs {
    /// Builds the server configuration from the parsed flags.
    pub fn into_config(self) -> ServerConfig {
        let mut cfg = ServerConfig::new(self.name);
        cfg.addr = self.addr;
        cfg.db_path = self.db_path;
        cfg.tls = self.tls || self.auth.is_some();
        cfg.auth = self.auth.map(String::into_bytes);
        cfg.db_size = self.db_size;
        cfg.save = self.save.as_deref().map(|pair| match *pair {
            [delay, count] => AutosnapConfig::new(delay, count),
            // clap enforces exactly two values for --save.
            _ => AutosnapConfig::new(0, 1),
        });
        cfg
    }
}
