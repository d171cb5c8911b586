//! Show subcommand - one grower's identity and stored seasons

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use seasonscan_engine::{Period, SeasonalReport};
use seasonscan_store::DirStore;

use super::{fmt_opt, parse_identifier};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Grower number (e.g. V100081)
    pub id: String,

    /// Show the grade and creditor breakdown of one season
    #[arg(long)]
    pub season: Option<Period>,

    /// Data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
}

pub fn run(args: ShowArgs, config: &Config) -> Result<()> {
    let id = parse_identifier(&args.id, &config.scan.prefix)?;
    let data_dir = args
        .data_dir
        .unwrap_or_else(|| config.store.data_dir.clone());
    let store = DirStore::new(&data_dir)?;

    let Some(grower) = store.grower(&id)? else {
        bail!("{id} is not in {}", data_dir.display());
    };
    let identity = &grower.identity;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(id.to_string()).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    let or_dash = |s: Option<&str>| s.filter(|s| !s.is_empty()).unwrap_or("-").to_string();
    table.add_row(vec!["Name".to_string(), grower.display_name()]);
    table.add_row(vec![
        "Portal number".to_string(),
        or_dash(identity.portal_number.as_deref()),
    ]);
    table.add_row(vec![
        "National ID".to_string(),
        or_dash(identity.national_id.as_deref()),
    ]);
    table.add_row(vec![
        "Province".to_string(),
        or_dash(Some(identity.farming_province.as_str())),
    ]);
    table.add_row(vec!["Farm".to_string(), or_dash(Some(identity.farm_name.as_str()))]);
    table.add_row(vec!["Address".to_string(), or_dash(Some(identity.address.as_str()))]);
    table.add_row(vec![
        "First sales".to_string(),
        identity
            .first_sales_year
            .map_or_else(|| "-".to_string(), |y| y.to_string()),
    ]);
    eprintln!("\n{table}");

    let seasons = store.seasons(&id)?;
    if let Some(period) = args.season {
        let Some(season) = seasons.iter().find(|s| s.period == period) else {
            bail!("{id} has no stored {period} season");
        };
        eprintln!("\n{}", seasons_table(std::slice::from_ref(season)));
        if season.grades.is_empty() {
            eprintln!("No grade breakdown.");
        } else {
            eprintln!("\n{}", grades_table(season));
        }
        if season.creditors.is_empty() {
            eprintln!("No creditors.");
        } else {
            eprintln!("\n{}", creditors_table(season));
        }
    } else if seasons.is_empty() {
        eprintln!("No seasons stored.");
    } else {
        eprintln!("\n{}", seasons_table(&seasons));
    }
    Ok(())
}

fn seasons_table(seasons: &[SeasonalReport]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Season").fg(Color::Cyan),
            Cell::new("Contractor").fg(Color::Cyan),
            Cell::new("Bales").fg(Color::Cyan),
            Cell::new("Mass (kg)").fg(Color::Cyan),
            Cell::new("Value (USD)").fg(Color::Cyan),
            Cell::new("Avg price").fg(Color::Cyan),
            Cell::new("Grades").fg(Color::Cyan),
            Cell::new("Creditors").fg(Color::Cyan),
        ]);

    for season in seasons {
        let s = &season.summary;
        table.add_row(vec![
            Cell::new(season.period),
            Cell::new(season.contractor.as_deref().unwrap_or("-")),
            Cell::new(
                s.total_bales
                    .map_or_else(|| "-".to_string(), |b| b.to_string()),
            ),
            Cell::new(fmt_opt(s.total_mass_kg)),
            Cell::new(fmt_opt(s.total_value_usd)),
            Cell::new(fmt_opt(s.average_price_usd)),
            Cell::new(season.grades.len()),
            Cell::new(season.creditors.len()),
        ]);
    }
    table
}

fn grades_table(season: &SeasonalReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Grade").fg(Color::Cyan),
            Cell::new("Mass (kg)").fg(Color::Cyan),
            Cell::new("Value (USD)").fg(Color::Cyan),
            Cell::new("Avg price").fg(Color::Cyan),
        ]);

    for grade in &season.grades {
        table.add_row(vec![
            Cell::new(&grade.grade_name),
            Cell::new(fmt_opt(grade.mass_kg)),
            Cell::new(fmt_opt(grade.value_usd)),
            Cell::new(fmt_opt(grade.average_price_usd)),
        ]);
    }
    table
}

fn creditors_table(season: &SeasonalReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Creditor").fg(Color::Cyan),
            Cell::new("Owed (USD)").fg(Color::Cyan),
            Cell::new("Paid (USD)").fg(Color::Cyan),
            Cell::new("Recovery %").fg(Color::Cyan),
            Cell::new("Notes").fg(Color::Cyan),
        ]);

    for creditor in &season.creditors {
        table.add_row(vec![
            Cell::new(&creditor.creditor_name),
            Cell::new(fmt_opt(creditor.total_owed_usd)),
            Cell::new(fmt_opt(creditor.total_paid_usd)),
            Cell::new(fmt_opt(creditor.recovery_percentage)),
            Cell::new(&creditor.notes),
        ]);
    }
    table
}
