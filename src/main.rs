mod config;
mod constants;
mod core_accounting;
mod core_channel;
mod core_cli;
mod core_event;
mod core_ftpcommand;
mod core_network;
mod core_node;
mod core_tls;
mod core_transfer;
mod core_vfs;
mod helpers;
mod server;
mod session;

use crate::config::Config;
use crate::core_cli::Cli;
use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize the logger with a custom format
    let default_level = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    let config = if args.config.is_empty() {
        info!("No configuration file given, using built-in defaults");
        let config = Config::default();
        config.validate()?;
        config
    } else {
        Config::load_from_file(&args.config)?
    };

    let monitor_interval = Duration::from_secs(config.server.monitor_interval_secs);
    let ctx = server::ServerContext::new(config)?;
    core_node::monitor::spawn(Arc::clone(&ctx.registry), monitor_interval);

    server::run(ctx).await
}
