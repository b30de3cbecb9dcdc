//! socle CLI: compose soft-core SoCs for a board and seed their boot ROM.

mod commands;
mod resolve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "socle", version, about = "Soft-core SoC composition and bring-up")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and validate board descriptors
    Board {
        #[command(subcommand)]
        action: BoardAction,
    },
    /// Compose a SoC and print its description
    Build {
        /// Built-in board name or path to a .board.toml file
        #[arg(long)]
        board: String,
        /// Built-in variant name or path to a .variant.toml file
        #[arg(long)]
        variant: Option<String>,
        /// Build configuration (soc.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Compiled firmware for the boot ROM (suppresses the placeholder)
        #[arg(long)]
        firmware: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Write the placeholder ROM image here, if one is generated
        #[arg(long)]
        image_out: Option<PathBuf>,
    },
    /// Generate a standalone placeholder image
    Image {
        /// Image size in bytes (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_u64)]
        size: u64,
        /// Generator seed
        #[arg(long, value_parser = parse_u64, default_value_t = socle_image::DEFAULT_SEED)]
        seed: u64,
        /// Output file
        #[arg(long)]
        output: PathBuf,
        /// Write words most-significant byte first
        #[arg(long)]
        big_endian: bool,
    },
}

#[derive(Subcommand)]
enum BoardAction {
    /// List built-in boards and variants
    List,
    /// Show details of a board
    Describe {
        /// Built-in board name or path to a .board.toml file
        name: String,
        /// Output format (default: human-readable, "toml" for TOML)
        #[arg(long)]
        format: Option<String>,
    },
    /// Validate a board file
    Validate {
        /// Path to a .board.toml file
        path: PathBuf,
    },
    /// Print a template board file seeded from fomu-evt
    Template {
        /// Name for the new board
        name: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Toml,
}

fn parse_u64(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Board { action } => match action {
            BoardAction::List => commands::board::list(),
            BoardAction::Describe { name, format } => commands::board::describe(&name, format.as_deref()),
            BoardAction::Validate { path } => commands::board::validate(&path),
            BoardAction::Template { name } => commands::board::template(&name),
        },

        Commands::Build {
            board,
            variant,
            config,
            firmware,
            format,
            image_out,
        } => commands::build::run(&commands::build::BuildArgs {
            board: &board,
            variant: variant.as_deref(),
            config: config.as_deref(),
            firmware: firmware.as_deref(),
            toml: matches!(format, Format::Toml),
            image_out: image_out.as_deref(),
        }),

        Commands::Image {
            size,
            seed,
            output,
            big_endian,
        } => commands::image::run(size, seed, &output, big_endian),
    }
}
