//! seasonscan - grower discovery and season history over the booking portal
//!
//! Probes a range of grower numbers season by season, keeps the first season
//! each one appears in, then fetches every later season into a local store.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

mod cmd;
mod config;

use config::Config;
use seasonscan_core::Verbosity;

#[derive(Parser)]
#[command(name = "seasonscan")]
#[command(about = "Grower discovery and season history over the booking portal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./seasonscan.toml or ~/.config/seasonscan/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Discover growers in a number range and fetch their season history
    Discover(cmd::discover::DiscoverArgs),
    /// List stored growers, optionally filtered
    Growers(cmd::growers::GrowersArgs),
    /// Show one stored grower and its seasons
    Show(cmd::show::ShowArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let progress = Arc::new(seasonscan_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, the spinner shows activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let verbosity = match (cli.debug, is_tty) {
        (true, _) => Verbosity::Debug,
        (false, true) => Verbosity::Quiet,
        (false, false) => Verbosity::Normal,
    };
    seasonscan_core::init_logging(verbosity, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Discover(args) => cmd::discover::run(args, &config, &progress),
        Command::Growers(args) => cmd::growers::run(args, &config),
        Command::Show(args) => cmd::show::run(args, &config),
        Command::Config => {
            print_config(&config);
            Ok(())
        }
    }
}

fn print_config(config: &Config) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let scan = &config.scan;
    table.add_row(vec!["Portal URL", &config.portal.base_url]);
    table.add_row(vec![
        "Request timeout",
        &format!("{}s", config.portal.timeout),
    ]);
    table.add_row(vec![
        "Username",
        config.portal.username.as_deref().unwrap_or("not set"),
    ]);
    table.add_row(vec![
        "Password",
        if config.portal.password.is_some() {
            "configured"
        } else {
            "not set"
        },
    ]);
    table.add_row(vec!["Identifier prefix", &scan.prefix]);
    table.add_row(vec![
        "Seasons",
        &format!("{}..={}", scan.start_period, scan.current_period()),
    ]);
    table.add_row(vec!["Batch size", &scan.batch_size.to_string()]);
    table.add_row(vec!["Concurrency", &scan.concurrency.to_string()]);
    table.add_row(vec!["Delay", &format!("{}ms", scan.delay_ms)]);
    table.add_row(vec![
        "Retries",
        &format!("{} (every {}ms)", scan.max_retries, scan.retry_delay_ms),
    ]);
    table.add_row(vec!["Backend", &scan.backend.to_string()]);
    table.add_row(vec![
        "Data directory",
        &config.store.data_dir.display().to_string(),
    ]);

    eprintln!("\n{table}");
}
