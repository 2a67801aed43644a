//! # sqlreport
//!
//! Generates text and XML reports from named SQL queries and line templates.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Report definition (sqlreport.toml)                │
//! │  (connection, query file, template file, output policy)  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [run]
//! ┌─────────────────────────────────────────────────────────┐
//! │       Definitions: QueryTable + TemplateTable            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [engine, starting at ::MAIN]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Template expansion ── queries ──▶ Connector (SQLite)   │
//! │        │                                                 │
//! │        └── ${...} ──▶ resolver + modifiers + Lua EVAL    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │        Output file (UTF-8 or ISO-8859-1), batch lines    │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod db;
pub mod definition;
pub mod engine;
pub mod messages;
pub mod prompt;
pub mod run;
pub mod script;
pub mod util;

pub use config::{ReportDefinition, Settings};
pub use definition::Definitions;
pub use engine::{Engine, EngineOptions, Expansion};
pub use run::{run_report, RunError, RunOptions, RunReport, Runner};
