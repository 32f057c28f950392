use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "railticket",
    version,
    about = "Structured data extraction and validation for IRCTC e-ticket PDFs"
)]
pub struct Cli {
    /// Path to the ticket PDF.
    pub pdf_path: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Skip field and cross-field validation of the extracted record.
    #[arg(long, default_value_t = false)]
    pub no_validate: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
