//! Command line entry points
//!
//! - `serve`: run the HTTP decision service
//! - `check-config`: load, validate and print the effective configuration
//! - `fingerprint`: show how a query is normalized and fingerprinted

pub mod check_config;
pub mod fingerprint;
pub mod serve;

use clap::{Parser, Subcommand};

/// Query decision engine - semantic cache and router in front of agent workflows
#[derive(Parser)]
#[command(name = "qde")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP service
    Serve,

    /// Validate the configuration and print it
    CheckConfig,

    /// Print the normalized form and fingerprint of a query
    Fingerprint(fingerprint::FingerprintArgs),
}
