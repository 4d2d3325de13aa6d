//! Command-line flags and how they layer over the loaded configuration.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::{GuardConfig, LogFormat};
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "storefront-guard")]
#[command(about = "Per-client admission control for the gift card storefront")]
#[command(version)]
pub struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// HTTP listen address, overriding the configuration
    #[arg(long)]
    pub http_addr: Option<SocketAddr>,

    /// Log output format, overriding the configuration
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

impl Args {
    /// Load the file and environment configuration, apply the flags on top
    /// and validate the result.
    pub fn load_config(&self) -> Result<GuardConfig> {
        let mut config = GuardConfig::load(self.config.as_deref())?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Overwrite the settings given on the command line.
    pub fn apply(&self, config: &mut GuardConfig) {
        if let Some(addr) = self.http_addr {
            config.server.http_addr = addr;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}
