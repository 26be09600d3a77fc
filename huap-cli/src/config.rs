use anyhow::Result;
use clap::{ArgMatches, parser::ValueSource};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use huap_core::{config::SiteConfig, default_workers};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HuapConfig {
    /// Invocation settings
    pub build: BuildConfig,
    /// Rendering settings (from huap-core)
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Site root holding the markdown sources
    pub source: String,
    /// Configuration file path
    pub config: String,
    /// Worker threads for one-shot builds
    pub jobs: usize,
    /// Host for the server
    pub host: String,
    /// Port for the server when none is given on the command line
    pub port: u16,
    /// Open browser automatically
    pub open: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: ".".to_string(),
            config: "./huap.toml".to_string(),
            jobs: default_workers(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            open: false,
        }
    }
}

impl Default for HuapConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig::default(),
            site: SiteConfig::default(),
        }
    }
}

impl HuapConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (HUAP_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = args
            .try_get_one::<String>("config")
            .ok()
            .flatten()
            .cloned()
            .unwrap_or_else(|| BuildConfig::default().config);

        let mut builder = ConfigBuilder::builder();

        builder = builder.add_source(ConfigBuilder::try_from(&Self::default())?);

        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::new(&config_file, FileFormat::Toml));
        }

        // HUAP_SITE__LAYOUT=base.html sets site.layout
        builder = builder.add_source(
            Environment::with_prefix("HUAP")
                .prefix_separator("_")
                .separator("__"),
        );

        // Typed flags only; clap defaults must not mask the file or env.
        let mut cli_overrides = HashMap::new();

        if let Some(source) = from_command_line::<String>(args, "source") {
            cli_overrides.insert("build.source".to_string(), source);
        }
        if let Some(config) = from_command_line::<String>(args, "config") {
            cli_overrides.insert("build.config".to_string(), config);
        }
        if let Some(host) = from_command_line::<String>(args, "host") {
            cli_overrides.insert("build.host".to_string(), host);
        }
        if let Some(jobs) = from_command_line::<usize>(args, "jobs") {
            cli_overrides.insert("build.jobs".to_string(), jobs.max(1).to_string());
        }
        if from_command_line::<bool>(args, "open") == Some(true) {
            cli_overrides.insert("build.open".to_string(), "true".to_string());
        }

        if !cli_overrides.is_empty() {
            builder = builder.add_source(ConfigBuilder::try_from(&cli_overrides)?);
        }

        let config: HuapConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Site root as a path
    pub fn source_dir(&self) -> &Path {
        Path::new(&self.build.source)
    }
}

/// Value of `name` only when the user typed it. Arguments the command does
/// not define, and values filled in from clap defaults, yield `None`.
fn from_command_line<T>(args: &ArgMatches, name: &str) -> Option<T>
where
    T: Clone + Send + Sync + 'static,
{
    let value = args.try_get_one::<T>(name).ok().flatten()?;
    (args.value_source(name) == Some(ValueSource::CommandLine)).then(|| value.clone())
}
