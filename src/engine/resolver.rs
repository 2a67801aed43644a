//! Variable resolution for `${...}` placeholders.
//!
//! A placeholder is split on commas into a name and optional modifier
//! arguments. Names are looked up in a fixed order:
//!
//! 1. a trailing `EVAL` part sends the rest to the scripting evaluator
//! 2. `?name` reads (and at most once asks for) user input
//! 3. a bound column value, passed through the modifier pipeline
//! 4. `__NAME` built-in globals
//! 5. in SQL binding mode, a `:name` driver placeholder
//!
//! Anything else is written as an inline `['name' is unknown]` marker.

use std::fmt::Write;
use std::sync::LazyLock;

use chrono::{Local, Locale};
use regex::Regex;

use super::Engine;
use crate::util::parse_number;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^\}]*)\}").unwrap());
static EXPRESSION_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([?]*[a-zA-Z_]+)").unwrap());

const DEFAULT_DATE_FORMAT: &str = "%-d %B %Y";
const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";

/// How placeholders in a line are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandMode {
    /// `${...}` placeholders, unknown names become inline markers.
    Text,
    /// Like `Text`, but unknown names become `:name` bind parameters.
    SqlBinding,
    /// `$name` / `$?name` tokens inside an `EVAL` expression.
    Expression,
}

impl Engine {
    /// Replace every placeholder in `line`.
    pub fn expand_line(&mut self, line: &str, mode: ExpandMode) -> String {
        let pattern = match mode {
            ExpandMode::Expression => &*EXPRESSION_VAR,
            ExpandMode::Text | ExpandMode::SqlBinding => &*PLACEHOLDER,
        };

        let mut result = String::with_capacity(line.len());
        let mut last = 0;
        for caps in pattern.captures_iter(line) {
            let (Some(whole), Some(content)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            result.push_str(&line[last..whole.start()]);
            last = whole.end();

            let parts: Vec<&str> = content.as_str().split(',').collect();
            self.resolve(&parts, mode, &mut result);
        }
        result.push_str(&line[last..]);
        result
    }

    fn resolve(&mut self, parts: &[&str], mode: ExpandMode, out: &mut String) {
        let name = parts[0];
        let trailing = parts[parts.len() - 1];

        if mode != ExpandMode::Expression && trailing.trim().eq_ignore_ascii_case("EVAL") {
            if !trailing.eq_ignore_ascii_case("EVAL") {
                self.messages.warn(format!(
                    "'{}' is read as 'eval', please remove the surrounding whitespace",
                    trailing
                ));
            }
            let expression = parts[..parts.len() - 1].join(",");
            self.evaluate(&expression, out);
        } else if let Some(input) = name.strip_prefix('?') {
            self.resolve_user_input(input, parts, out);
        } else if let Some(value) = self.bindings.get(name) {
            let value = value.to_vec();
            if parts.len() > 1 {
                let modified = self.apply_modifier(name, &value, &parts[1..]);
                out.push_str(&modified);
            } else {
                out.push_str(&String::from_utf8_lossy(&value));
            }
        } else if name.starts_with("__") {
            self.resolve_global(parts, out);
        } else if mode == ExpandMode::SqlBinding {
            out.push(':');
            out.push_str(name);
        } else {
            out.push_str(&format!("['{}' is unknown]", name));
            self.messages
                .error(format!("unknown variable name '{}'", name));
        }
    }

    fn evaluate(&mut self, expression: &str, out: &mut String) {
        let expanded = self.expand_line(expression, ExpandMode::Expression);
        match self.evaluator.evaluate(&expanded) {
            Ok(value) => out.push_str(&value),
            Err(e) => {
                self.messages.error(format!(
                    "error '{}' at line {} evaluate script /{}/",
                    e.message,
                    e.line.unwrap_or_default(),
                    expanded
                ));
                out.push_str(&format!("[EVAL error: {}]", e.message));
            }
        }
    }

    /// `${?name[,description[,MODIFIER,args...]]}`
    fn resolve_user_input(&mut self, input: &str, parts: &[&str], out: &mut String) {
        if !self.user_inputs.contains_key(input) {
            let description = parts.get(1).copied().unwrap_or(input);
            let answer = self.prompt.ask(input, description).unwrap_or_default();
            self.user_inputs.insert(input.to_string(), answer);
        }
        let value = self
            .user_inputs
            .get(input)
            .cloned()
            .unwrap_or_default();

        if parts.len() > 2 {
            let modified = self.apply_modifier(parts[0], value.as_bytes(), &parts[2..]);
            out.push_str(&modified);
        } else {
            out.push_str(&value);
        }
    }

    fn resolve_global(&mut self, parts: &[&str], out: &mut String) {
        let name = parts[0];
        let arg = parts.get(1).copied();
        match name {
            "__LSEP" => {
                if !self.is_first_row() {
                    out.push_str(arg.unwrap_or(","));
                }
            }
            "__DATE" => {
                let formatted = self.format_now(arg.unwrap_or(DEFAULT_DATE_FORMAT));
                out.push_str(&formatted);
            }
            "__TIME" => {
                let formatted = self.format_now(arg.unwrap_or(DEFAULT_TIME_FORMAT));
                out.push_str(&formatted);
            }
            "__UNIQUEID" => {
                let _ = write!(out, "{}", self.unique_id);
            }
            "__LINECNT" | "__LINECNTH" => {
                let offset = arg.and_then(parse_number).unwrap_or(0);
                let number = self.line_counter.wrapping_add(offset);
                if name == "__LINECNTH" {
                    let _ = write!(out, "{:x}", number);
                } else {
                    let _ = write!(out, "{}", number);
                }
            }
            "__TAB" => {
                let column = arg.and_then(|a| a.trim().parse::<usize>().ok()).unwrap_or(0);
                let current = out.rsplit('\n').next().map_or(0, |l| l.chars().count());
                if current < column {
                    out.push_str(&" ".repeat(column - current));
                }
            }
            "__LF" => out.push('\n'),
            "__CLEAR" => {
                if let Some(key) = arg {
                    self.cumulation.remove(key);
                }
            }
            "__TREE_RESET" => match arg {
                Some(key) => {
                    if self.tree_memory.remove(key).is_none() {
                        self.messages
                            .warn(format!("__TREE_RESET: no tree entry named '{}'", key));
                    }
                }
                None => self.tree_memory.clear(),
            },
            "__SEQ" => {
                let counter = self
                    .sequences
                    .entry(arg.unwrap_or_default().to_string())
                    .or_insert(0);
                *counter += 1;
                let _ = write!(out, "{}", counter);
            }
            _ => {
                out.push_str(&format!("['{}' is unknown]", name));
                self.messages
                    .error(format!("unknown global variable '{}'", name));
            }
        }
    }

    /// Current local time in the report locale. A malformed format is
    /// logged and renders as an empty string.
    fn format_now(&mut self, format: &str) -> String {
        let tag = self.options.locale.replace('-', "_");
        let locale = Locale::try_from(tag.as_str()).unwrap_or(Locale::POSIX);
        let mut formatted = String::new();
        if write!(formatted, "{}", Local::now().format_localized(format, locale)).is_err() {
            self.messages
                .error(format!("invalid date format '{}'", format));
            formatted.clear();
        }
        formatted
    }
}
