//! bundlecfg - Installer bundle configuration resolver
//!
//! Resolves a bundle directory into its effective configuration and prints the
//! projected product settings as YAML on stdout.
//!
//! # Execution Flow
//!
//! 1. Load `engine.yaml` from the bundle (defaults when absent)
//! 2. Initialize logging → `<log dir>/bundlecfg.<date>`
//! 3. Load `main.xml`, `config.xml` and `overrides.yaml`
//! 4. Run the engine startup sequence (overlays, overrides, locale, work dir)
//! 5. Resolve products, optionally saving the merged document
//! 6. Print products as YAML
//!
//! `--list-locales` stops after step 2 and prints the available locale codes.
//!
//! # Bundle Directory
//!
//! - `main.xml`: base document
//! - `config.xml`: optional overlay
//! - `overrides.yaml`: optional `KEY: value` overrides for `//Config`
//! - `engine.yaml`: engine settings
//! - `locales/<code>.locale`: locale resources

use anyhow::{Context, Result};
use bundlecfg::engine::ConfigEngine;
use bundlecfg::{APP_NAME, ConfigManager, VERSION};
use camino::Utf8PathBuf;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "bundlecfg")]
#[command(about = "Resolve an installer bundle's layered configuration", version)]
struct Cli {
    /// Bundle directory containing main.xml and friends
    #[arg(long, short = 'b', default_value = ".")]
    bundle: Utf8PathBuf,

    /// XML document that replaces the resolved configuration
    #[arg(long = "override")]
    override_file: Option<Utf8PathBuf>,

    /// Write the merged configuration document to this file
    #[arg(long)]
    saveconfig: Option<Utf8PathBuf>,

    /// Locale code to use when the bundle selects locales by user choice
    #[arg(long, short = 'l')]
    locale: Option<String>,

    /// Log directory (defaults to the engine settings value)
    #[arg(long)]
    log_dir: Option<Utf8PathBuf>,

    /// Enable debug logging on the console
    #[arg(long)]
    debug: bool,

    /// Print the locale codes the bundle ships and exit
    #[arg(long)]
    list_locales: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.bundle)?;
    let settings = config_manager.load_settings()?;

    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| cli.bundle.join(&settings.engine.log_dir));
    let debug = cli.debug || settings.engine.debug_mode;
    let _guard = bundlecfg::logging::setup_logging_with_console(log_dir.as_str(), "bundlecfg", debug, debug)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!("Bundle: {}", config_manager.config_dir());

    let mut engine = ConfigEngine::new(settings.clone()).with_locales(config_manager.locale_resources(&settings));
    if cli.list_locales {
        for code in engine.available_locales() {
            println!("{code}");
        }
        return Ok(());
    }

    let sources = config_manager.startup_sources(cli.override_file, cli.locale)?;
    if let Some(path) = cli.saveconfig {
        engine = engine.with_save_path(path);
    }

    engine
        .startup(sources)
        .context("Failed to resolve bundle configuration")?;
    engine
        .resolve_settings()
        .context("Failed to resolve product settings")?;

    let yaml = serde_yaml_ng::to_string(engine.products_settings())
        .context("Failed to serialize product settings to YAML")?;
    print!("{yaml}");

    engine.metrics().log_summary();
    tracing::info!("Shutdown complete");
    Ok(())
}
