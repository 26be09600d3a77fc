use anyhow::{Context, Result, bail};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;
mod config;

use crate::config::HuapConfig;

/// What a single positional argument asks for.
#[derive(Debug, PartialEq, Eq)]
enum Target {
    /// Serve the site root, on the given port or the configured one.
    Serve(Option<u16>),
    /// Build the site root into a directory and exit.
    Build(PathBuf),
}

impl Target {
    fn parse(arg: Option<&str>) -> Result<Self> {
        let Some(arg) = arg else {
            return Ok(Target::Serve(None));
        };

        match arg.strip_prefix(':') {
            Some(port) => {
                let port = port
                    .parse::<u16>()
                    .with_context(|| format!("Invalid port in '{arg}'"))?;
                Ok(Target::Serve(Some(port)))
            }
            None if arg.is_empty() => bail!("Empty target"),
            None => Ok(Target::Build(PathBuf::from(arg))),
        }
    }
}

fn cli() -> Command {
    let command = Command::new("huap")
        .about("Build a markdown site in parallel or serve it rendered on request")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("target")
                .value_name("TARGET")
                .help("':PORT' to serve on that port, or a directory to build into"),
        );

    cmd::serve::add_serve_args(cmd::build::add_build_args(command))
}

async fn run(args: &ArgMatches) -> Result<()> {
    let target = Target::parse(args.get_one::<String>("target").map(String::as_str))?;
    let config = HuapConfig::load(args)?;

    match target {
        Target::Serve(port) => cmd::serve::execute(&config, port).await,
        Target::Build(output_dir) => cmd::build::execute(&config, &output_dir),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    run(&cli().get_matches()).await
}
