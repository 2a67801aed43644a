//! sqlreport CLI - Generate reports from SQL queries and templates
//!
//! Usage:
//!   sqlreport [--config <file>] run <report> [--base-path <dir>] [--input <defines>]
//!   sqlreport [--config <file>] list
//!   sqlreport [--config <file>] check <report>
//!
//! Examples:
//!   sqlreport run customers --input "region:=north|year:=2024"
//!   sqlreport --config reports/sqlreport.toml -v run invoices --prepare
//!   sqlreport check customers

use clap::{ArgAction, Parser, Subcommand};
use sqlreport::config::Settings;
use sqlreport::definition::Definitions;
use sqlreport::engine::MAIN_TEMPLATE;
use sqlreport::messages::Messages;
use sqlreport::run::{RunOptions, Runner};
use sqlreport::util::format_elapsed;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sqlreport")]
#[command(about = "sqlreport - Generate text and XML reports from SQL queries and templates")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a report
    Run {
        /// Name of the report
        report: String,

        /// Directory for definition files and relative output names
        #[arg(short, long)]
        base_path: Option<PathBuf>,

        /// Input values: "name:=value|name2:=value2"
        #[arg(short, long, default_value = "")]
        input: String,

        /// Never ask for missing input values
        #[arg(long)]
        no_prompt: bool,

        /// Prepare every query once
        #[arg(long)]
        prepare: bool,
    },

    /// List configured reports
    List,

    /// Parse the definition files of a report without running it
    Check {
        /// Name of the report
        report: String,

        /// Directory for definition files
        #[arg(short, long)]
        base_path: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Run {
            report,
            base_path,
            input,
            no_prompt,
            prepare,
        } => {
            let options = RunOptions {
                base_path: base_path.unwrap_or_else(|| settings.base_path()),
                input,
                interactive: !no_prompt,
                prepare,
            };
            cmd_run(&settings, &report, options)
        }
        Commands::List => cmd_list(&settings),
        Commands::Check { report, base_path } => {
            let base_path = base_path.unwrap_or_else(|| settings.base_path());
            cmd_check(&settings, &report, base_path)
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn cmd_run(settings: &Settings, report: &str, options: RunOptions) -> ExitCode {
    let runner = Runner::new(settings, options);
    match runner.run(report) {
        Ok(result) => {
            println!(
                "{} ({} rows, {} errors, {} warnings, {})",
                result.output_file.display(),
                result.rows,
                result.error_count(),
                result.warning_count(),
                format_elapsed(result.elapsed)
            );
            if let Some(batch) = &result.batch {
                println!(
                    "batch: {} commands, {} succeeded, {} failed",
                    batch.commands, batch.succeeded, batch.failed
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_list(settings: &Settings) -> ExitCode {
    if settings.reports.is_empty() {
        println!("No reports defined.");
        return ExitCode::SUCCESS;
    }

    println!("Reports:");
    for (name, report) in &settings.reports {
        let mut flags = Vec::new();
        if report.batch {
            flags.push("batch");
        }
        if report.xml {
            flags.push("xml");
        }
        if report.prepare {
            flags.push("prepare");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!(
            "  - {} (connection: {}){} {}",
            name, report.connection, flags, report.description
        );
    }
    ExitCode::SUCCESS
}

fn cmd_check(settings: &Settings, report: &str, base_path: PathBuf) -> ExitCode {
    let definition = match settings.get_report(report) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let sql_file = definition
        .sql
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| base_path.join(s));
    let template_file = base_path.join(&definition.template);

    let mut messages = Messages::new();
    let definitions = match Definitions::load(sql_file.as_deref(), &template_file, &mut messages) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Queries:");
    for name in definitions.queries.names() {
        println!("  - {}", name);
    }
    println!("Templates:");
    for name in definitions.templates.names() {
        let marker = if definitions.is_data_driven(name) {
            " (data driven)"
        } else {
            ""
        };
        println!("  - {}{}", name, marker);
    }
    if !definitions.templates.contains(MAIN_TEMPLATE) {
        eprintln!("Warning: no MAIN template defined");
    }

    if messages.error_count() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
