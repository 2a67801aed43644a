//! Parsers for the query and template definition formats.

use super::{QueryTable, TemplateTable, BLOCK_MARKER, COMMENT_MARKER};
use crate::messages::Messages;

/// Parse a query definition text.
///
/// Lines are trimmed; empty lines and comments are dropped. All lines of a
/// block are joined with single spaces so words on adjacent lines never run
/// together. A data line before the first marker is reported and skipped.
pub fn parse_queries(text: &str, messages: &mut Messages) -> QueryTable {
    let mut table = QueryTable::new();
    let mut name = String::new();
    let mut sql = String::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(COMMENT_MARKER) {
            continue;
        }

        if let Some(rest) = line.strip_prefix(BLOCK_MARKER) {
            add_query(&mut table, &name, &sql, messages);
            name = rest.trim().to_string();
            sql.clear();
        } else if name.is_empty() {
            messages.error(format!("no name for SQL at line {}", idx + 1));
        } else {
            if !sql.is_empty() {
                sql.push(' ');
            }
            sql.push_str(line);
        }
    }
    add_query(&mut table, &name, &sql, messages);

    table
}

fn add_query(table: &mut QueryTable, name: &str, sql: &str, messages: &mut Messages) {
    if name.is_empty() {
        return;
    }
    messages.debug(format!("Adding SQL Query '{}'", name));
    if table.insert(name, sql).is_some() {
        messages.warn(format!("Overwrite query '{}'", name));
    }
}

/// Parse a template definition text.
///
/// Lines are kept verbatim. Runs of empty lines inside a block are kept, but
/// a run that is followed by the next marker (or the end of the file) is
/// dropped. Comment lines are skipped without ending a run of empty lines.
pub fn parse_templates(text: &str, messages: &mut Messages) -> TemplateTable {
    let mut table = TemplateTable::new();
    let mut name = String::new();
    let mut pending_blank = 0usize;

    for (idx, line) in text.lines().enumerate() {
        if line.is_empty() {
            pending_blank += 1;
            continue;
        }
        if line.starts_with(COMMENT_MARKER) {
            continue;
        }

        if let Some(rest) = line.strip_prefix(BLOCK_MARKER) {
            pending_blank = 0;
            name = rest.trim().to_string();
            if name.is_empty() {
                continue;
            }
            if table.insert(name.clone(), Vec::new()).is_some() {
                messages.warn(format!("Overwrite Template '{}'", name));
            } else {
                messages.debug(format!("Adding Template '{}'", name));
            }
        } else if let Some(lines) = table.lines_mut(&name) {
            lines.extend(std::iter::repeat(String::new()).take(pending_blank));
            pending_blank = 0;
            lines.push(line.to_string());
        } else if name.is_empty() {
            messages.warn(format!(
                "template line {} is outside of any template block",
                idx + 1
            ));
        }
    }

    table
}
