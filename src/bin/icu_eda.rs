use clap::{Parser, Subcommand};
use icu_eda::{
    header, Comparison, Config, Dashboard, DatasetLoader, QueryResult, Response, Rows, Selection,
    Stratum,
};
use qu::ick_use::*;
use std::path::PathBuf;
use term_data_table::{Cell, Row, Table};

#[derive(Parser)]
struct Opt {
    /// Dashboard settings (TOML). Defaults are used if not given.
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// The admissions file, overriding the one in the config
    #[clap(short, long)]
    data: Option<PathBuf>,
    /// Print the response as JSON rather than as tables
    #[clap(long)]
    json: bool,
    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List everything that can be selected
    Labels,
    /// List the values of a demographic column
    Strata { column: String },
    /// Age groups by outcome within one stratum
    Demographic { column: String, value: String },
    /// Distribution of a predictor by outcome
    Predictor { label: String },
    /// Change in a lab value between the first hour and the first day, by outcome
    Lab {
        label: String,
        #[clap(long, requires = "stratum_value")]
        stratum_column: Option<String>,
        #[clap(long, requires = "stratum_column")]
        stratum_value: Option<String>,
    },
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
    // nothing works without the table, so failing to load it is fatal.
    let loader = DatasetLoader::new(config.cleaning.clone());
    let table = loader.load(&config.data_path)?;
    let dashboard = Dashboard::new(table, &config)?;

    let selection = match opt.cmd {
        Cmd::Labels => {
            print_labels(&dashboard);
            return Ok(());
        }
        Cmd::Strata { column } => {
            match dashboard.strata(&column) {
                Ok(values) => values.iter().for_each(|v| println!("{}", v)),
                Err(e) => println!("{}", e.user_message()),
            }
            return Ok(());
        }
        Cmd::Demographic { column, value } => match dashboard.parse_value(&column, &value) {
            Ok(value) => Selection::Demographic { column, value },
            Err(e) => {
                println!("{}", e.user_message());
                return Ok(());
            }
        },
        Cmd::Predictor { label } => Selection::Predictor { label },
        Cmd::Lab {
            label,
            stratum_column,
            stratum_value,
        } => {
            let stratum = match (stratum_column, stratum_value) {
                (Some(column), Some(raw)) => match dashboard.parse_value(&column, &raw) {
                    Ok(value) => Some(Stratum { column, value }),
                    Err(e) => {
                        println!("{}", e.user_message());
                        return Ok(());
                    }
                },
                _ => None,
            };
            Selection::LabChange { label, stratum }
        }
    };

    let response = dashboard.respond(&selection);
    if opt.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    match response {
        Response::Ready(result) => print_result(&result),
        Response::Message(msg) => println!("{}", msg),
    }
    Ok(())
}

fn print_labels(dashboard: &Dashboard) {
    header("Predictors");
    dashboard.predictor_labels().for_each(|l| println!("{}", l));
    header("Lab operations");
    dashboard.lab_labels().for_each(|l| println!("{}", l));
    header("Demographic columns");
    dashboard
        .demographic_columns()
        .iter()
        .for_each(|c| println!("{}", c));
}

fn print_result(result: &QueryResult) {
    header(&format!("{} observations", result.observations));
    let table = match &result.rows {
        Rows::Histogram(bins) => {
            let mut table = Table::new().with_row(
                Row::new()
                    .with_cell(Cell::from("Bin"))
                    .with_cell(Cell::from("Outcome"))
                    .with_cell(Cell::from("Count")),
            );
            for bin in bins {
                table.add_row(
                    Row::new()
                        .with_cell(Cell::from(format!("{}–{}", bin.low, bin.high)))
                        .with_cell(Cell::from(bin.group.to_string()))
                        .with_cell(Cell::from(bin.count.to_string())),
                );
            }
            table
        }
        Rows::Categories(counts) => {
            let mut table = Table::new().with_row(
                Row::new()
                    .with_cell(Cell::from("Group"))
                    .with_cell(Cell::from("Outcome"))
                    .with_cell(Cell::from("Count")),
            );
            for count in counts {
                table.add_row(
                    Row::new()
                        .with_cell(Cell::from(count.value.to_string()))
                        .with_cell(Cell::from(count.group.to_string()))
                        .with_cell(Cell::from(count.count.to_string())),
                );
            }
            table
        }
    };
    println!("{}", table);

    if let Some(comparison) = &result.comparison {
        header("Alive vs. Deceased");
        println!("{}", comparison_table(comparison));
    }
    for notice in result.notices.iter() {
        println!("note: {}", notice);
    }
}

fn comparison_table(c: &Comparison) -> Table<'static> {
    let mut table = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from("Test"))
            .with_cell(Cell::from("Statistic"))
            .with_cell(Cell::from("p-value")),
    );
    table.add_row(
        Row::new()
            .with_cell(Cell::from(format!("Welch's t (df {:.1})", c.welch_df)))
            .with_cell(Cell::from(format!("{:.4}", c.welch_t)))
            .with_cell(Cell::from(format!("{:.4e}", c.welch_p))),
    );
    table.add_row(
        Row::new()
            .with_cell(Cell::from(format!(
                "Mann-Whitney U ({:?})",
                c.mann_whitney_method
            )))
            .with_cell(Cell::from(format!("{}", c.mann_whitney_u)))
            .with_cell(Cell::from(format!("{:.4e}", c.mann_whitney_p))),
    );
    table
}
