//! CLI argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Listen address, overriding the config file
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Listen port, overriding the config file
    #[arg(long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the tables described by a JSON config file
    #[command(short_flag = 'S')]
    Server {
        /// Path to the config file
        file: PathBuf,
    },
    /// Serve one database straight from a DSN, e.g. pg://user:pass@host:5432/db/table
    #[command(short_flag = 's')]
    Boot {
        dsn: String,
    },
    /// Print the version and exit
    #[command(short_flag = 'v')]
    Version,
}
