//! Modifiers applied to resolved values: `${name,MODIFIER,args...}`.

use std::fmt::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::rtf::is_rtf;
use super::Engine;
use crate::util::{parse_number, parse_signed, wrap_text};

const DEFAULT_WRAP_WIDTH: usize = 78;

/// A value modifier keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    Uppercase,
    Lowercase,
    Capitalize,
    IfEmpty,
    Hex,
    Base64,
    Bool,
    RemoveLineFeeds,
    TreeMode,
    Format,
    Cumulate,
    Rtf,
    /// A format string where `%1` stands for the value.
    Printf(String),
}

impl Modifier {
    /// Parse a modifier keyword, case-insensitively.
    pub fn parse(keyword: &str) -> Option<Self> {
        let modifier = match keyword.trim().to_uppercase().as_str() {
            "UPPERCASE" | "UPPER" => Modifier::Uppercase,
            "LOWERCASE" | "LOWER" => Modifier::Lowercase,
            "CAPITALIZE" => Modifier::Capitalize,
            "IFEMPTY" => Modifier::IfEmpty,
            "HEX" => Modifier::Hex,
            "BASE64" => Modifier::Base64,
            "BOOL" => Modifier::Bool,
            "RMLF" => Modifier::RemoveLineFeeds,
            "TREEMODE" => Modifier::TreeMode,
            "FMT" => Modifier::Format,
            "CUMULATE" => Modifier::Cumulate,
            "RTF" => Modifier::Rtf,
            _ if keyword.contains("%1") => Modifier::Printf(keyword.to_string()),
            _ => return None,
        };
        Some(modifier)
    }
}

impl Engine {
    /// Apply `args[0]` as modifier to `value`; `args[1..]` are its arguments.
    pub(super) fn apply_modifier(&mut self, name: &str, value: &[u8], args: &[&str]) -> String {
        let Some(modifier) = Modifier::parse(args[0]) else {
            self.messages
                .error(format!("Not supported variable conversion '{}'.", args[0]));
            return String::new();
        };
        let params = &args[1..];
        let text = String::from_utf8_lossy(value);

        match modifier {
            Modifier::Uppercase => text.to_uppercase(),
            Modifier::Lowercase => text.to_lowercase(),
            Modifier::Capitalize => capitalize(&text),
            Modifier::IfEmpty if value.is_empty() => self.first_non_empty(params),
            Modifier::IfEmpty => text.into_owned(),
            Modifier::Hex => to_hex(value),
            Modifier::Base64 => STANDARD.encode(value),
            Modifier::Bool => match parse_signed(&text) {
                Some(n) if n != 0 => "true".to_string(),
                _ => "false".to_string(),
            },
            Modifier::RemoveLineFeeds => remove_line_feeds(&text),
            Modifier::TreeMode => self.tree_mode(name, value, params.first().copied()),
            Modifier::Format => {
                let width = params
                    .first()
                    .and_then(|w| w.trim().parse::<usize>().ok())
                    .unwrap_or(DEFAULT_WRAP_WIDTH);
                let start_of_line = params.get(1).copied().unwrap_or_default();
                wrap_text(&text, width, start_of_line).join("\n")
            }
            Modifier::Cumulate => match parse_number(&text) {
                Some(number) => {
                    let total = self.cumulation.entry(name.to_string()).or_insert(0);
                    *total = total.wrapping_add(number);
                    total.to_string()
                }
                None => {
                    self.messages
                        .warn(format!("CUMULATE: '{}' of '{}' is not a number", text, name));
                    String::new()
                }
            },
            Modifier::Rtf if is_rtf(value) => {
                let result_type = params.first().copied().unwrap_or("html");
                let xml = self.options.xml_escape;
                self.rtf
                    .convert(&text, result_type, xml, &mut self.messages)
            }
            Modifier::Rtf => {
                self.messages
                    .debug("No RTF String found -- use given string");
                text.into_owned()
            }
            Modifier::Printf(_) if value.is_empty() => String::new(),
            Modifier::Printf(format) => format.replace("%1", &text),
        }
    }

    /// Fallbacks for `IFEMPTY`: a quoted argument is a literal, a bound name
    /// is used when it is not empty, an unbound name is skipped unless it is
    /// the last argument.
    fn first_non_empty(&self, fallbacks: &[&str]) -> String {
        for (idx, fallback) in fallbacks.iter().enumerate() {
            let last = idx + 1 == fallbacks.len();
            if let Some(literal) = unquote(fallback) {
                return literal.to_string();
            }
            match self.bindings.get(fallback) {
                Some(value) if !value.is_empty() => {
                    return String::from_utf8_lossy(value).into_owned();
                }
                Some(_) => {}
                None if last => return fallback.to_string(),
                None => {}
            }
        }
        String::new()
    }

    /// Emit `value` when it differs from the last emitted value of `name` or
    /// when a higher level value changed in this row; otherwise emit
    /// `default`.
    fn tree_mode(&mut self, name: &str, value: &[u8], default: Option<&str>) -> String {
        let unchanged = self.tree_memory.get(name).map(Vec::as_slice) == Some(value);
        if self.tree_changed || !unchanged {
            self.tree_memory.insert(name.to_string(), value.to_vec());
            self.tree_changed = true;
            String::from_utf8_lossy(value).into_owned()
        } else {
            default.unwrap_or_default().to_string()
        }
    }
}

fn unquote(arg: &str) -> Option<&str> {
    arg.strip_prefix('"')
        .and_then(|a| a.strip_suffix('"'))
        .or_else(|| arg.strip_prefix('\'').and_then(|a| a.strip_suffix('\'')))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => {
            let mut capitalized: String = first.to_uppercase().collect();
            capitalized.push_str(&chars.as_str().to_lowercase());
            capitalized
        }
        None => String::new(),
    }
}

/// A number as hex (negative numbers keep their sign), anything else as a
/// hex dump of its bytes.
fn to_hex(value: &[u8]) -> String {
    if let Some(n) = parse_signed(&String::from_utf8_lossy(value)) {
        let sign = if n < 0 { "-" } else { "" };
        return format!("{}{:x}", sign, n.unsigned_abs());
    }
    let mut dump = String::with_capacity(value.len() * 2);
    for b in value {
        let _ = write!(dump, "{:02x}", b);
    }
    dump
}

fn remove_line_feeds(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
