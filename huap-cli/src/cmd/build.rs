use anyhow::Result;
use clap::{Arg, Command, value_parser};
use huap_core::SiteBuilder;
use std::path::Path;
use tracing::{info, warn};

use crate::config::HuapConfig;

pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("DIR")
                .help("Site root containing markdown files")
                .default_value("."),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .default_value("./huap.toml"),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .value_name("N")
                .help("Worker threads for a build (default: processor count)")
                .value_parser(value_parser!(usize)),
        )
}

pub fn execute(config: &HuapConfig, output_dir: &Path) -> Result<()> {
    let report = SiteBuilder::new()
        .source_dir(config.source_dir())
        .output_dir(output_dir)
        .workers(config.build.jobs)
        .site_config(config.site.clone())
        .build()?;

    if report.failed > 0 {
        warn!("{} file(s) could not be built", report.failed);
    }
    info!("Site built successfully in {}", output_dir.display());

    Ok(())
}
