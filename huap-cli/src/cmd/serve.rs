use anyhow::Result;
use clap::{Arg, Command};
use huap_server::{Server, ServerConfig};
use std::path::PathBuf;

use crate::config::HuapConfig;

pub fn add_serve_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to")
                .default_value("0.0.0.0"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(clap::ArgAction::SetTrue),
        )
}

/// Serves the site root until Ctrl-C. `port` overrides the configured one.
pub async fn execute(config: &HuapConfig, port: Option<u16>) -> Result<()> {
    let server = Server::new(ServerConfig {
        host: config.build.host.clone(),
        port: port.unwrap_or(config.build.port),
        root: PathBuf::from(&config.build.source),
        open: config.build.open,
        site: config.site.clone(),
    });

    server.run().await
}
