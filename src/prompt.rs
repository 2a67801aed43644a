//! Asking the user for `${?name}` values.
//!
//! The engine asks at most once per name and run; the answer is cached in the
//! user-input map.

use std::io::{self, BufRead, Write};

/// Source of interactive user input.
pub trait Prompt {
    /// Ask for a value. `None` means the user gave no answer; the engine then
    /// caches an empty string.
    fn ask(&mut self, name: &str, description: &str) -> Option<String>;
}

/// Never asks; every unknown input resolves to an empty string.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompt for NoPrompt {
    fn ask(&mut self, name: &str, _description: &str) -> Option<String> {
        log::warn!("no value given for input parameter '{}'", name);
        None
    }
}

/// Reads answers line by line from standard input.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, name: &str, description: &str) -> Option<String> {
        let mut stderr = io::stderr();
        if description == name {
            let _ = write!(stderr, "{}: ", name);
        } else {
            let _ = write!(stderr, "{} ({}): ", description, name);
        }
        let _ = stderr.flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(answer.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}
