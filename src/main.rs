//! hik-drill - Offline Hikvision/Haikon DVR disk image decoder
//!
//! Decodes the master sector and HIKBTREE index of a DVR disk image and
//! reports every recorded video segment without the DVR firmware.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hik_drill::cli::{self, Cli, Commands};
use hik_drill::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();
    // init-config must work when the target config is missing or broken
    let config = match &cli.command {
        Commands::InitConfig(_) => Config::default(),
        _ => cli::load_config(cli.config.as_deref())?,
    };

    // Initialize logging; stdout is reserved for reports and JSON
    let level = if cli.verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .with(EnvFilter::from_default_env().add_directive(format!("hik_drill={}", level).parse()?))
        .init();

    match &cli.command {
        Commands::Decode(args) => cli::run_decode(&config, args)?,
        Commands::Info(args) => cli::run_info(&config, args)?,
        Commands::InitConfig(args) => cli::run_init_config(cli.config.as_deref(), args)?,
    }

    Ok(())
}
