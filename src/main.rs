//! Browser Host Config - Main Entry Point
//!
//! Loads a settings file, applies command-line overrides, validates the result
//! and shows what the engine would be started with.

use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use browser_host_config::{
    browser::Engine,
    config::{ProcessConfiguration, ReadDiscipline, Setting, SettingValue, SettingsSnapshot, WriteMode},
    NAME, VERSION,
};

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
}

/// Build the CLI command parser
fn build_cli() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .author("KI-Browser Team")
        .about("Inspect and validate process-wide browser host settings")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to settings file (TOML or JSON)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .value_name("NAME=VALUE")
                .help("Override a setting, e.g. --set wcf_close_timeout=0")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("lenient")
                .long("lenient")
                .help("Set write_mode to lenient in the effective settings (late writes warn instead of failing)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the effective settings as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("write")
                .short('w')
                .long("write")
                .value_name("FILE")
                .help("Save the effective settings to FILE (TOML or JSON)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("validate-only")
                .long("validate-only")
                .help("Only validate, do not derive engine switches")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level: error, warn, info, debug or trace")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .conflicts_with_all(["verbose", "quiet"]),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress output except errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
}

/// Log level from `--log-level`, or from `-v`/`-q` when it is absent.
fn log_level(explicit: Option<&str>, verbosity: u8, quiet: bool) -> Result<Level> {
    if let Some(level) = explicit {
        return level
            .parse()
            .map_err(|_| anyhow!("Invalid log level: {}", level));
    }

    Ok(if quiet {
        Level::ERROR
    } else {
        match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    })
}

/// Initialize the tracing/logging subsystem
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

/// Split `name=value` and parse the value for that setting.
fn parse_override(raw: &str) -> Result<(Setting, SettingValue)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Override '{}' must have the form NAME=VALUE", raw))?;
    let setting: Setting = name.parse()?;
    let value = SettingValue::parse(setting, value)?;
    Ok((setting, value))
}

/// Print settings with their freeze points
fn print_settings(config: &ProcessConfiguration) {
    println!(
        "{bold}{blue}Settings{reset} {dim}({} mode){reset}",
        config.mode(),
        bold = colors::BOLD,
        blue = colors::BLUE,
        dim = colors::DIM,
        reset = colors::RESET
    );

    for setting in Setting::ALL {
        let latch = match setting.read_discipline() {
            ReadDiscipline::SnapshotOnce(point) => format!("frozen at {}", point),
            ReadDiscipline::LiveRead => "live".to_string(),
        };
        println!(
            "  {:<45} {green}{:<24}{reset} {dim}{}{reset}",
            setting.name(),
            config.get(setting).to_string(),
            latch,
            green = colors::GREEN,
            dim = colors::DIM,
            reset = colors::RESET
        );
    }
    println!();
}

/// Main application entry point
#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let quiet = matches.get_flag("quiet");
    init_tracing(log_level(
        matches.get_one::<String>("log-level").map(String::as_str),
        matches.get_count("verbose"),
        quiet,
    )?);

    let mut snapshot = match matches.get_one::<PathBuf>("config") {
        Some(path) => SettingsSnapshot::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => SettingsSnapshot::default(),
    };
    if matches.get_flag("lenient") {
        snapshot.write_mode = WriteMode::Lenient;
    }

    let config = Arc::new(ProcessConfiguration::from_snapshot(snapshot));
    for raw in matches.get_many::<String>("set").into_iter().flatten() {
        let (setting, value) = parse_override(raw)?;
        config
            .set(setting, value)
            .with_context(|| format!("Failed to apply override '{}'", raw))?;
    }

    let effective = config.snapshot();
    effective.validate().context("Invalid settings")?;
    info!("settings validated");

    if let Some(path) = matches.get_one::<PathBuf>("write") {
        effective
            .to_file(path)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        info!(path = %path.display(), "settings written");
    }

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&effective.redacted())?);
    } else if !quiet {
        print_settings(&config);
    }

    if matches.get_flag("validate-only") {
        return Ok(());
    }

    let engine = Engine::initialize(Arc::clone(&config)).context("Engine initialization failed")?;
    if !quiet && !matches.get_flag("json") {
        println!(
            "{bold}{blue}Engine switches{reset}",
            bold = colors::BOLD,
            blue = colors::BLUE,
            reset = colors::RESET
        );
        if engine.startup().switches.is_empty() {
            println!(
                "  {yellow}(none){reset}",
                yellow = colors::YELLOW,
                reset = colors::RESET
            );
        }
        for switch in &engine.startup().switches {
            println!("  {}", switch);
        }
    }
    engine.shutdown().await?;

    Ok(())
}
