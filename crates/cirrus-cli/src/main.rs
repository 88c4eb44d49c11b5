use anyhow::{Context, Result};
use cirrus_cli::report::{self, Report};
use cirrus_parse::parse_str;
use cirrus_types::{CheckerConfig, TypeChecker};
use clap::{Parser, Subcommand, ValueEnum};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Maximum source file size in bytes (1MB)
const MAX_SOURCE_SIZE: usize = 1_000_000;

#[derive(Parser, Debug)]
#[command(name = "cirrus")]
#[command(about = "Cirrus: type, decorator and dependency checking for infrastructure programs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Type-check a program and print its evaluation order
    Check {
        /// Path to .cirrus source file
        file: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,

        /// Do not run evaluation-time decorator checks against literal defaults
        #[arg(long)]
        skip_defaults: bool,
    },

    /// Parse a source file and dump the AST
    Parse {
        /// Path to .cirrus source file
        file: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Pretty,
    Json,
}

fn main() -> ExitCode {
    // Initialize tracing if CIRRUS_LOG is set
    if let Ok(filter) = EnvFilter::try_from_env("CIRRUS_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Check {
            file,
            format,
            skip_defaults,
        } => cmd_check(&file, format, skip_defaults),
        Commands::Parse { file, format } => cmd_parse(&file, format),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_source(path: &str) -> Result<String> {
    let src =
        std::fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path))?;
    if src.len() > MAX_SOURCE_SIZE {
        anyhow::bail!(
            "source file exceeds {}MB limit ({} bytes)",
            MAX_SOURCE_SIZE / 1_000_000,
            src.len()
        );
    }
    Ok(src)
}

fn cmd_check(file: &str, format: Format, skip_defaults: bool) -> Result<ExitCode> {
    let src = read_source(file)?;
    let program = parse_str(file, &src)?;
    debug!(file, declarations = program.items.len(), "parsed");

    let checker = TypeChecker::new().with_config(CheckerConfig {
        validate_defaults: !skip_defaults,
        ..CheckerConfig::default()
    });

    match (checker.check_program(&program), format) {
        (Ok(checked), Format::Pretty) => {
            print!("{}", Report::new(&checked).render());
            Ok(ExitCode::SUCCESS)
        }
        (Ok(checked), Format::Json) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&Report::new(&checked))?
            );
            Ok(ExitCode::SUCCESS)
        }
        (Err(diags), Format::Pretty) => {
            for err in diags.errors() {
                match err.span() {
                    Some(span) => eprintln!("{}:{}: {}", file, span.start, err),
                    None => eprintln!("{}: {}", file, err),
                }
            }
            eprintln!("{} error(s)", diags.len());
            Ok(ExitCode::FAILURE)
        }
        (Err(diags), Format::Json) => {
            let out = serde_json::json!({ "errors": report::diagnostics(&diags) });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_parse(file: &str, format: Format) -> Result<ExitCode> {
    let src = read_source(file)?;
    let program = parse_str(file, &src)?;
    match format {
        Format::Pretty => println!("{:#?}", program),
        Format::Json => println!("{}", serde_json::to_string_pretty(&program)?),
    }
    Ok(ExitCode::SUCCESS)
}
