mod cli;
mod directory;
mod extract;
mod model;
mod util;
mod validate;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, OutputFormat};
use crate::directory::BuiltinDirectory;
use crate::extract::{ExtractOptions, TicketExtractor};
use crate::model::{Outcome, TicketRecord};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if !cli.pdf_path.exists() {
        error!(path = %cli.pdf_path.display(), "input file not found");
        std::process::exit(1);
    }

    if let Err(err) = run(&cli) {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let directory = BuiltinDirectory::new();
    let extractor = TicketExtractor::new(
        ExtractOptions {
            validate: !cli.no_validate,
        },
        &directory,
    )
    .context("failed to initialize extractor")?;

    let outcome = extractor.extract_document(&cli.pdf_path);

    match cli.output {
        OutputFormat::Json => {
            let rendered = serde_json::to_string_pretty(&outcome)
                .context("failed to serialize extraction result")?;
            println!("{rendered}");
        }
        OutputFormat::Text => render_text(&outcome),
    }

    Ok(())
}

fn render_text(outcome: &Outcome) {
    match outcome {
        Outcome::Single(record) => render_record(record),
        Outcome::Multi(multi) => {
            println!("Bookings: {}", multi.booking_count);
            for record in &multi.bookings {
                println!();
                render_record(record);
            }
        }
    }
}

fn render_record(record: &TicketRecord) {
    if !record.success {
        println!(
            "Extraction failed: {}",
            record.error.as_deref().unwrap_or("unknown error")
        );
        return;
    }

    println!("PNR: {}", record.pnr.as_deref().unwrap_or("-"));
    println!(
        "Transaction ID: {}",
        record.transaction_id.as_deref().unwrap_or("-")
    );
    println!("Passengers: {}", record.passengers.len());
    for passenger in &record.passengers {
        let age = passenger
            .age
            .map(|age| age.to_string())
            .unwrap_or_else(|| "-".to_string());
        let gender = passenger.gender.map(|g| g.as_str()).unwrap_or("-");
        println!("  {}. {}, {}, {}", passenger.serial, passenger.name, age, gender);
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
