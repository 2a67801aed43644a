//! Scripting evaluator used by the `EVAL` modifier.
//!
//! The engine treats the evaluator as a black box: a string expression goes
//! in, a string or an error with an optional line number comes out. The
//! default implementation embeds Lua 5.4 through `mlua`; the state lives for
//! one report run, so functions defined by the `SCRIPT` template stay
//! available to every later `EVAL`.

use std::sync::LazyLock;

use mlua::{Lua, Value};
use regex::Regex;
use thiserror::Error;

static LINE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\]:(\d+):").unwrap());

/// An evaluation failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
    /// Line inside the evaluated chunk, when the evaluator reports one.
    pub line: Option<u32>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
        }
    }
}

pub type ScriptResult<T> = Result<T, ScriptError>;

/// Evaluates expressions for `${...,EVAL}` placeholders.
pub trait Evaluator {
    /// Evaluate an expression and render its value as a string.
    fn evaluate(&mut self, expression: &str) -> ScriptResult<String>;

    /// Run a chunk of statements for its side effects (definitions).
    fn load(&mut self, chunk: &str) -> ScriptResult<()>;
}

/// Lua based evaluator.
pub struct LuaEvaluator {
    lua: Lua,
}

impl LuaEvaluator {
    pub fn new() -> Self {
        Self { lua: Lua::new() }
    }
}

impl Default for LuaEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for LuaEvaluator {
    fn evaluate(&mut self, expression: &str) -> ScriptResult<String> {
        let value: Value = self
            .lua
            .load(expression)
            .set_name("eval")
            .eval()
            .map_err(to_script_error)?;
        render(value)
    }

    fn load(&mut self, chunk: &str) -> ScriptResult<()> {
        self.lua
            .load(chunk)
            .set_name("script")
            .exec()
            .map_err(to_script_error)
    }
}

fn render(value: Value) -> ScriptResult<String> {
    match value {
        Value::Nil => Ok(String::new()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Number(n) => Ok(format_number(n)),
        Value::String(s) => Ok(s.to_string_lossy()),
        other => Err(ScriptError::new(format!(
            "expression returned a {} value",
            other.type_name()
        ))),
    }
}

/// Integral floats print without a fractional part, so `4 / 2` renders as
/// `2` rather than Lua's `2.0`.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn to_script_error(err: mlua::Error) -> ScriptError {
    let message = match &err {
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::RuntimeError(message) => message.clone(),
        mlua::Error::CallbackError { cause, .. } => cause.to_string(),
        other => other.to_string(),
    };
    let line = LINE_NUMBER
        .captures(&message)
        .and_then(|c| c[1].parse().ok());
    ScriptError { message, line }
}
