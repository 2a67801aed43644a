//! Template expansion engine.
//!
//! The engine walks the template tree depth first. A template whose name
//! matches a query is data driven: the query runs, every row binds its
//! columns into the replacement map and the template lines are expanded once
//! per row. A template without a query is expanded once.
//!
//! ```text
//! ::MAIN
//! Customers: #{CUSTOMERS,LIST, / }
//!
//! ::CUSTOMERS
//! ${name,UPPERCASE} (${city,IFEMPTY,"unknown"})
//! ```
//!
//! All per-run state (bindings, user input, counters, tree memory) lives on
//! one [`Engine`], so a fresh engine per run never sees leftovers of an
//! earlier run.

mod bindings;
mod modifier;
mod resolver;
pub mod rtf;

pub use bindings::Bindings;
pub use modifier::Modifier;
pub use resolver::ExpandMode;

pub use crate::definition::EMPTY_SUFFIX;

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::db::{Connector, DbError, DbResult, Prepared, ResultSet, Value};
use crate::definition::{query_name_for, Definitions};
use crate::messages::Messages;
use crate::prompt::{NoPrompt, Prompt};
use crate::script::{Evaluator, LuaEvaluator};

use rtf::RtfConverter;

/// Template evaluated by the scripting engine before `MAIN`.
pub const SCRIPT_TEMPLATE: &str = "SCRIPT";

/// Entry point of every report.
pub const MAIN_TEMPLATE: &str = "MAIN";

/// Binding holding the connection's table prefix.
pub const TABLE_PREFIX_VAR: &str = "_tableprefix";

static SUB_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\{([^\}]*)\}").unwrap());

/// Per-run engine options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Escape `&`, `<` and `>` in column values.
    pub xml_escape: bool,
    /// Locale for `__DATE` and `__TIME`, e.g. `de_DE`.
    pub locale: String,
    /// Prepare every query once instead of expanding its text per call.
    pub prepare_queries: bool,
    /// Maximum nesting of template calls.
    pub max_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            xml_escape: false,
            locale: "en_US".to_string(),
            prepare_queries: false,
            max_depth: 64,
        }
    }
}

/// Result of expanding the lines of one template.
///
/// The newline after the last line is not part of `text`; `pending_newline`
/// tells the caller to write it before its own next output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    pub text: String,
    pub pending_newline: bool,
}

/// A parsed `#{name[,LIST[,separator]]}` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TemplateCall {
    name: String,
    separator: Option<String>,
}

impl TemplateCall {
    fn parse(call: &str, messages: &mut Messages) -> Self {
        let mut parts = call.split(',');
        let name = parts.next().unwrap_or_default().trim().to_string();
        let modifier = parts.next().map(|m| m.trim().to_uppercase());
        let rest: Vec<&str> = parts.collect();

        let separator = match modifier.as_deref() {
            Some("LIST") if rest.is_empty() => Some(",".to_string()),
            Some("LIST") => Some(rest.join(",")),
            Some("") | None => None,
            Some(other) => {
                messages.warn(format!(
                    "unknown modifier '{}' in call of template '{}'",
                    other, name
                ));
                None
            }
        };
        Self { name, separator }
    }
}

fn xml_escape(value: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(value.len());
    for &b in value {
        match b {
            b'&' => escaped.extend_from_slice(b"&amp;"),
            b'<' => escaped.extend_from_slice(b"&lt;"),
            b'>' => escaped.extend_from_slice(b"&gt;"),
            _ => escaped.push(b),
        }
    }
    escaped
}

/// Expands templates for one report run.
pub struct Engine {
    connector: Box<dyn Connector>,
    evaluator: Box<dyn Evaluator>,
    prompt: Box<dyn Prompt>,
    options: EngineOptions,
    messages: Messages,
    definitions: Definitions,
    prepared: HashMap<String, Prepared>,
    bindings: Bindings,
    user_inputs: HashMap<String, String>,
    cumulation: HashMap<String, u64>,
    tree_memory: HashMap<String, Vec<u8>>,
    tree_changed: bool,
    sequences: HashMap<String, u64>,
    /// One entry per active data-driven call: is the current row its first?
    list_frames: Vec<bool>,
    line_counter: u64,
    unique_id: u64,
    depth: usize,
    rtf: RtfConverter,
}

impl Engine {
    pub fn new(connector: Box<dyn Connector>, options: EngineOptions) -> Self {
        Self {
            connector,
            evaluator: Box::new(LuaEvaluator::new()),
            prompt: Box::new(NoPrompt),
            options,
            messages: Messages::new(),
            definitions: Definitions::default(),
            prepared: HashMap::new(),
            bindings: Bindings::new(),
            user_inputs: HashMap::new(),
            cumulation: HashMap::new(),
            tree_memory: HashMap::new(),
            tree_changed: true,
            sequences: HashMap::new(),
            list_frames: Vec::new(),
            line_counter: 0,
            unique_id: 0,
            depth: 0,
            rtf: RtfConverter::new(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_prompt(mut self, prompt: Box<dyn Prompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut Messages {
        &mut self.messages
    }

    pub fn into_messages(self) -> Messages {
        self.messages
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    /// Number of data rows expanded so far.
    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    /// Bind a value outside of any query row.
    pub fn bind(&mut self, name: &str, value: impl Into<Vec<u8>>) {
        self.bindings.set(name, value.into());
    }

    pub fn user_input(&self, name: &str) -> Option<&str> {
        self.user_inputs.get(name).map(String::as_str)
    }

    /// Seed user input from `name:=value|name2:=value2`.
    pub fn set_input_values(&mut self, defines: &str) {
        for define in defines.split('|').filter(|d| !d.is_empty()) {
            let (name, value) = define.split_once(":=").unwrap_or((define, ""));
            let overwrite = self
                .user_inputs
                .insert(name.to_string(), value.to_string())
                .is_some();
            self.messages.debug(format!(
                "{} INPUT PARAM '{}' with value '{}'",
                if overwrite { "OVERWRITE" } else { "ADD" },
                name,
                value
            ));
        }
    }

    /// Open the database connection and bind `_tableprefix`.
    pub fn connect(&mut self) -> DbResult<()> {
        self.connector.connect()?;
        let prefix = self.connector.table_prefix().to_string();
        self.messages.debug(format!(
            "Set parameter ${{{}}} to '{}'",
            TABLE_PREFIX_VAR, prefix
        ));
        self.bind(TABLE_PREFIX_VAR, prefix);
        Ok(())
    }

    pub fn close(&mut self) {
        self.connector.close();
    }

    /// Install parsed definitions; in prepared mode every query is prepared
    /// right away.
    pub fn load_definitions(&mut self, definitions: Definitions) {
        self.definitions = definitions;
        self.prepared.clear();
        if !self.options.prepare_queries {
            return;
        }

        let queries: Vec<(String, String)> = self
            .definitions
            .queries
            .iter()
            .map(|(name, sql)| (name.to_string(), sql.to_string()))
            .collect();
        for (name, sql) in queries {
            self.messages
                .debug(format!("Adding Prepared SQL Query '{}'", name));
            let statement = self.expand_line(&sql, ExpandMode::SqlBinding);
            self.messages
                .debug(format!("prepared sql query: {}", statement));
            match self.connector.prepare(&statement) {
                Ok(prepared) => {
                    self.prepared.insert(name, prepared);
                }
                Err(e) => self
                    .messages
                    .error(format!("preparing sql query: {} ({})", statement, e)),
            }
        }
    }

    /// Evaluate the `SCRIPT` template, if defined.
    pub fn run_script_template(&mut self) {
        let Some(lines) = self.definitions.templates.get(SCRIPT_TEMPLATE) else {
            return;
        };
        let chunk = lines.join("\n");
        if let Err(e) = self.evaluator.load(&chunk) {
            self.messages.error(format!(
                "script error '{}' at line {}",
                e.message,
                e.line.unwrap_or_default()
            ));
        } else {
            self.messages.debug("script template evaluated");
        }
    }

    /// Expand a template call such as `CUSTOMERS` or `ITEMS,LIST,;`.
    ///
    /// Data-driven output ends with a newline after the last row; the
    /// trailing newline of a static template is dropped.
    pub fn output_template(&mut self, call: &str) -> String {
        let call = TemplateCall::parse(call, &mut self.messages);

        let Some(lines) = self.definitions.templates.get(&call.name).map(<[String]>::to_vec) else {
            if !call.name.ends_with(EMPTY_SUFFIX) {
                self.messages
                    .error(format!("template {} isn't defined", call.name));
            }
            return String::new();
        };

        if self.depth >= self.options.max_depth {
            self.messages.error(format!(
                "recursion limit of {} reached at template '{}'",
                self.options.max_depth, call.name
            ));
            return format!("[recursion limit reached at '{}']", call.name);
        }

        let previous_context = self.messages.set_context(Some(call.name.clone()));
        let saved_tree_changed = self.tree_changed;
        self.depth += 1;
        self.bindings.push_scope();

        let query = query_name_for(&call.name);
        self.messages.debug(format!(
            "output template {} using query {}",
            call.name, query
        ));

        let output = if self.definitions.queries.contains(&query) {
            self.output_rows(&call, &query, &lines)
        } else {
            let saved_line_counter = std::mem::take(&mut self.line_counter);
            let text = self.expand_lines(&lines).text;
            self.line_counter = saved_line_counter;
            text
        };

        self.bindings.pop_scope();
        self.depth -= 1;
        self.tree_changed = saved_tree_changed;
        self.messages.set_context(previous_context);
        output
    }

    fn output_rows(&mut self, call: &TemplateCall, query: &str, lines: &[String]) -> String {
        let result = match self.execute_query(query) {
            Ok(result) => result,
            Err((sql, e)) => {
                self.messages
                    .error(format!("executing SQL '{}' ({})", sql, e));
                return format!("## error executing {} ## {}##", sql, e);
            }
        };

        if self.messages.is_trace() {
            for (idx, column) in result.columns.iter().enumerate() {
                self.messages
                    .trace(format!("column {} name '{}'", idx, column));
            }
            self.messages
                .trace(format!("Size of result is {}", result.rows.len()));
        }

        let saved_line_counter = self.line_counter;
        self.line_counter = 0;
        self.list_frames.push(true);

        let mut output = String::new();
        let mut has_data = false;
        let mut pending_newline = false;
        for row in &result.rows {
            for (idx, column) in result.columns.iter().enumerate() {
                let value = if self.options.xml_escape {
                    xml_escape(row.value(idx))
                } else {
                    row.value(idx).to_vec()
                };
                self.bindings.set(column, value);
            }
            if !has_data && row.is_all_null() {
                continue;
            }

            let first = !has_data;
            has_data = true;
            if !first {
                if let Some(separator) = &call.separator {
                    output.push_str(separator);
                }
            }
            if pending_newline {
                output.push('\n');
            }
            if let Some(frame) = self.list_frames.last_mut() {
                *frame = first;
            }
            self.tree_changed = first;

            let expansion = self.expand_lines(lines);
            output.push_str(&expansion.text);
            pending_newline = expansion.pending_newline;
            self.unique_id += 1;
            self.line_counter += 1;
        }

        self.list_frames.pop();
        self.line_counter = saved_line_counter;

        if has_data {
            if pending_newline {
                output.push('\n');
            }
        } else {
            let fallback = format!("{}{}", call.name, EMPTY_SUFFIX);
            output.push_str(&self.output_template(&fallback));
        }
        output
    }

    fn execute_query(&mut self, query: &str) -> Result<ResultSet, (String, DbError)> {
        if self.options.prepare_queries {
            if let Some(statement) = self.prepared.get(query).cloned() {
                let values: Vec<Value> = statement
                    .parameters
                    .iter()
                    .map(|param| {
                        let name = param.strip_prefix(':').unwrap_or(param);
                        self.bindings.get(name).map(<[u8]>::to_vec)
                    })
                    .collect();
                if self.messages.is_trace() {
                    for (param, value) in statement.parameters.iter().zip(&values) {
                        let shown = value
                            .as_deref()
                            .map(String::from_utf8_lossy)
                            .unwrap_or_default();
                        self.messages
                            .trace(format!("bound {} to value {}", param, shown));
                    }
                }
                return self
                    .connector
                    .execute_prepared(&statement, &values)
                    .map_err(|e| (statement.sql.clone(), e));
            }
        }

        let text = self
            .definitions
            .queries
            .get(query)
            .unwrap_or_default()
            .to_string();
        let sql = self.expand_line(&text, ExpandMode::Text);
        self.messages.debug(format!("SQL-Query: {}", sql));
        self.connector.execute(&sql).map_err(|e| (sql, e))
    }

    /// Expand template lines, resolving `#{...}` calls left to right.
    ///
    /// A line whose expansion ends with `\` continues on the next line
    /// without a newline.
    pub fn expand_lines(&mut self, lines: &[String]) -> Expansion {
        let mut expansion = Expansion::default();
        for (idx, line) in lines.iter().enumerate() {
            let last = idx + 1 == lines.len();
            let mut rest = 0;
            for caps in SUB_TEMPLATE.captures_iter(line) {
                let (Some(whole), Some(call)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                let before = self.expand_line(&line[rest..whole.start()], ExpandMode::Text);
                expansion.text.push_str(&before);
                let nested = self.output_template(call.as_str());
                expansion.text.push_str(&nested);
                rest = whole.end();
            }

            let tail = self.expand_line(&line[rest..], ExpandMode::Text);
            if let Some(continued) = tail.strip_suffix('\\') {
                expansion.text.push_str(continued);
            } else if last {
                expansion.text.push_str(&tail);
                expansion.pending_newline = true;
            } else {
                expansion.text.push_str(&tail);
                expansion.text.push('\n');
            }
        }
        expansion
    }

    fn is_first_row(&self) -> bool {
        self.list_frames.last().copied().unwrap_or(true)
    }
}
