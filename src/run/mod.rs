//! Report runs.
//!
//! A run wires one report definition to a fresh [`Engine`]: it seeds input
//! values, resolves the output file, connects, parses the definition files,
//! expands `MAIN` and writes the result. The database connection is closed
//! whether the run succeeds or not.

mod batch;
mod output;

pub use batch::{parse_batch, BatchCommand, BATCH_MARKER};
pub use output::{decode, encode, open_output, output_path, DEFAULT_OUTPUT};

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;
use thiserror::Error;

use crate::config::{ReportDefinition, Settings, SettingsError};
use crate::db::{Connector, DbError};
use crate::definition::{DefinitionError, Definitions};
use crate::engine::{Engine, EngineOptions, ExpandMode, MAIN_TEMPLATE};
use crate::messages::{Level, Messages};
use crate::prompt::{NoPrompt, StdinPrompt};
use crate::util::format_elapsed;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("Can't open file '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can't read batch file '{}': {source}", path.display())]
    Batch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type RunResult<T> = Result<T, RunError>;

/// Options shared by every run started from one command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Directory definition files and relative output names are resolved
    /// against.
    pub base_path: PathBuf,
    /// Input values, `name:=value|name2:=value2`.
    pub input: String,
    /// Ask on stdin for input values that were not given.
    pub interactive: bool,
    /// Force prepared-query mode regardless of the report setting.
    pub prepare: bool,
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct RunReport {
    pub output_file: PathBuf,
    pub elapsed: Duration,
    /// Data rows expanded.
    pub rows: u64,
    /// Distinct replacement names bound during the run.
    pub parameters: usize,
    pub messages: Messages,
    /// Present when the report drove a batch.
    pub batch: Option<BatchSummary>,
}

impl RunReport {
    pub fn error_count(&self) -> usize {
        self.messages.error_count()
    }

    pub fn warning_count(&self) -> usize {
        self.messages.count(Level::Warn)
    }
}

/// Counts for the sub-runs of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub commands: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Run one report definition against `connector`.
///
/// The resolved output file is stored in `definition.last_output_file`.
pub fn run_report(
    definition: &mut ReportDefinition,
    connector: Box<dyn Connector>,
    options: &RunOptions,
) -> RunResult<RunReport> {
    let started = Instant::now();
    let engine_options = EngineOptions {
        xml_escape: definition.xml,
        locale: definition.locale.clone(),
        prepare_queries: definition.prepare || options.prepare,
        ..EngineOptions::default()
    };
    let mut engine = Engine::new(connector, engine_options);
    if options.interactive {
        engine = engine.with_prompt(Box::new(StdinPrompt));
    } else {
        engine = engine.with_prompt(Box::new(NoPrompt));
    }

    engine.set_input_values(&definition.defines);
    engine.set_input_values(&options.input);

    let pattern = engine.expand_line(&definition.output, ExpandMode::Text);
    let timestamp = definition.timestamp.then(|| Local::now().naive_local());
    let output_file = output_path(&pattern, &options.base_path, timestamp);
    engine
        .messages_mut()
        .info(format!("OUTPUT FILE NAME '{}'", output_file.display()));
    definition.last_output_file = Some(output_file.clone());

    let result = generate(&mut engine, definition, &options.base_path, &output_file);
    engine.close();

    let elapsed = started.elapsed();
    let parameters = engine.bindings().distinct_names();
    engine.messages_mut().info(format!(
        "query execution time: {}; using {} different parameters",
        format_elapsed(elapsed),
        parameters
    ));
    if let Err(e) = &result {
        engine.messages_mut().error(e.to_string());
    } else if engine.messages().error_count() > 0 {
        engine
            .messages_mut()
            .info("creating output creates some errors");
    }
    result?;

    let rows = engine.unique_id();
    Ok(RunReport {
        output_file,
        elapsed,
        rows,
        parameters,
        messages: engine.into_messages(),
        batch: None,
    })
}

/// Everything between connecting and writing the output.
fn generate(
    engine: &mut Engine,
    definition: &ReportDefinition,
    base_path: &Path,
    output_file: &Path,
) -> RunResult<()> {
    engine.connect()?;

    let sql_file = definition
        .sql
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| base_path.join(s));
    let template_file = base_path.join(&definition.template);
    let definitions = Definitions::load(sql_file.as_deref(), &template_file, engine.messages_mut())?;
    engine.load_definitions(definitions);

    let output_error = |source| RunError::Output {
        path: output_file.to_path_buf(),
        source,
    };
    let mut file = open_output(output_file, definition.append).map_err(output_error)?;

    engine.run_script_template();
    let text = engine.output_template(MAIN_TEMPLATE);

    file.write_all(&encode(&text, definition.utf8))
        .and_then(|()| file.flush())
        .map_err(output_error)
}

/// Runs named reports from [`Settings`], including batch sub-runs.
pub struct Runner<'a> {
    settings: &'a Settings,
    options: RunOptions,
}

impl<'a> Runner<'a> {
    pub fn new(settings: &'a Settings, options: RunOptions) -> Self {
        Self { settings, options }
    }

    /// Run the report `name`; a batch report also runs every control line
    /// of its output and deletes the output afterwards.
    pub fn run(&self, name: &str) -> RunResult<RunReport> {
        let started = Instant::now();
        let (definition, mut report) = self.run_single(name, &self.options.input)?;
        if definition.batch {
            let summary = self.run_batch(&report.output_file, definition.utf8)?;
            log::info!(
                "batch execution time: {}",
                format_elapsed(started.elapsed())
            );
            report.batch = Some(summary);
        }
        Ok(report)
    }

    fn run_single(&self, name: &str, input: &str) -> RunResult<(ReportDefinition, RunReport)> {
        let mut definition = self.settings.get_report(name)?.clone();
        let connector = self
            .settings
            .get_connection(&definition.connection)?
            .connector()?;
        let options = RunOptions {
            input: input.to_string(),
            ..self.options.clone()
        };
        log::info!("running report '{}'", name);
        let report = run_report(&mut definition, connector, &options)?;
        Ok((definition, report))
    }

    fn run_batch(&self, batch_file: &Path, utf8: bool) -> RunResult<BatchSummary> {
        let bytes = fs::read(batch_file).map_err(|source| RunError::Batch {
            path: batch_file.to_path_buf(),
            source,
        })?;
        let commands = parse_batch(&decode(&bytes, utf8));

        let mut summary = BatchSummary {
            commands: commands.len(),
            ..BatchSummary::default()
        };
        for (idx, command) in commands.iter().enumerate() {
            if !self.settings.reports.contains_key(&command.report) {
                log::error!(
                    "Unknown report '{}' at line {}",
                    command.report,
                    command.line
                );
                summary.failed += 1;
                continue;
            }
            log::info!("--[ {}/{} ]--", idx + 1, commands.len());
            match self.run_single(&command.report, &command.input(&self.options.input)) {
                Ok(_) => summary.succeeded += 1,
                Err(e) => {
                    log::error!("batch line {}: {}", command.line, e);
                    summary.failed += 1;
                }
            }
        }

        if let Err(e) = fs::remove_file(batch_file) {
            log::warn!(
                "can't remove batch file '{}': {}",
                batch_file.display(),
                e
            );
        }
        Ok(summary)
    }
}
