//! Growers subcommand - list what earlier scans stored

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use seasonscan_store::{DirStore, GrowerEntry};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct GrowersArgs {
    /// Case-insensitive filter over number, name, surname, province and farm name
    pub query: Option<String>,

    /// Data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
}

pub fn run(args: GrowersArgs, config: &Config) -> Result<()> {
    let data_dir = args
        .data_dir
        .unwrap_or_else(|| config.store.data_dir.clone());
    let store = DirStore::new(&data_dir)?;

    let entries = match args.query.as_deref() {
        Some(query) => store.search(query)?,
        None => store.list()?,
    };

    if entries.is_empty() {
        eprintln!("No growers found.");
        return Ok(());
    }

    eprintln!("\n{}", growers_table(&entries));
    eprintln!("{} growers", seasonscan_core::fmt_num(entries.len()));
    Ok(())
}

fn growers_table(entries: &[GrowerEntry]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Grower").fg(Color::Cyan),
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Province").fg(Color::Cyan),
            Cell::new("Farm").fg(Color::Cyan),
            Cell::new("First sales").fg(Color::Cyan),
            Cell::new("Seasons").fg(Color::Cyan),
            Cell::new("Saved").fg(Color::Cyan),
        ]);

    for entry in entries {
        let identity = &entry.grower.identity;
        table.add_row(vec![
            Cell::new(&identity.id),
            Cell::new(entry.grower.display_name()),
            Cell::new(&identity.farming_province),
            Cell::new(&identity.farm_name),
            Cell::new(
                identity
                    .first_sales_year
                    .map_or_else(|| "-".to_string(), |y| y.to_string()),
            ),
            Cell::new(entry.seasons),
            Cell::new(&entry.saved_at),
        ]);
    }
    table
}
