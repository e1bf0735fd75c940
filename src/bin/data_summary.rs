use clap::Parser;
use icu_eda::{aggregate::category_count, header, Config, DatasetLoader};
use noisy_float::prelude::*;
use qu::ick_use::*;
use std::{iter, path::PathBuf};
use term_data_table::{Cell, Row, Table};

#[derive(Parser)]
struct Opt {
    /// Dashboard settings (TOML). Defaults are used if not given.
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// The admissions file, overriding the one in the config
    #[clap(short, long)]
    data: Option<PathBuf>,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let mut config = match &opt.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(data) = opt.data {
        config.data_path = data;
    }
    let data = DatasetLoader::new(config.cleaning.clone()).load(&config.data_path)?;
    let rows = data.len();

    header("Data stats");
    println!("total admissions: {}", rows);
    println!("total columns: {}", data.columns().len());

    header("Columns");
    let mut table = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from("Column"))
            .with_cell(Cell::from("Kind"))
            .with_cell(Cell::from("Missing"))
            .with_cell(Cell::from("Percentage")),
    );
    for column in data.columns() {
        let missing = column.missing_count();
        table.add_row(
            Row::new()
                .with_cell(Cell::from(column.name().to_string()))
                .with_cell(Cell::from(format!("{:?}", column.kind())))
                .with_cell(Cell::from(missing.to_string()))
                .with_cell(Cell::from(percent(missing, rows))),
        );
    }
    println!("{}", table);

    header("Outcomes");
    let mut table = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from("Outcome flag"))
            .with_cell(Cell::from("Count"))
            .with_cell(Cell::from("Percentage")),
    );
    for (value, count) in category_count(&data, &config.outcome_column)? {
        table.add_row(
            Row::new()
                .with_cell(Cell::from(value.to_string()))
                .with_cell(Cell::from(count.to_string()))
                .with_cell(Cell::from(percent(count, rows))),
        );
    }
    println!("{}", table);

    header("Ages");
    let buckets = config.age_buckets()?;
    let ages = data
        .column(&config.age_column)?
        .numbers()?
        .map(|age| age.and_then(R64::try_new));
    let counts = buckets.ranges().bucket_values_with_missing(ages);
    let mut table = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from("Age range"))
            .with_cell(Cell::from("Count"))
            .with_cell(Cell::from("Percentage")),
    );
    let labels = buckets
        .levels()
        .iter()
        .map(|level| level.to_string())
        .chain(iter::once("missing data".to_string()))
        .collect::<Vec<_>>();
    for (label, (_, count)) in labels.iter().zip(counts.iter()) {
        table.add_row(
            Row::new()
                .with_cell(Cell::from(label.clone()))
                .with_cell(Cell::from(count.to_string()))
                .with_cell(Cell::from(percent(count, rows))),
        );
    }
    println!("{}", table);
    if counts.missing() > 0 {
        event!(
            Level::WARN,
            "{} admission(s) have no age recorded",
            counts.missing()
        );
    }
    Ok(())
}

fn percent(count: usize, total: usize) -> String {
    if total == 0 {
        return "-".into();
    }
    format!("{:.1}%", count as f64 / total as f64 * 100.)
}
