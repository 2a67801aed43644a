//! Query and template definitions.
//!
//! Both definition files share one line-oriented format: a marker line
//! `::NAME` opens a block that runs until the next marker or the end of the
//! file, and `::#...` lines are comments.
//!
//! ```text
//! ::#  customers.sql
//! ::CUSTOMERS
//! SELECT id, name
//!   FROM ${_tableprefix}customer
//!  WHERE region = '${?region}'
//! ```
//!
//! Query blocks are joined into one SQL string. Template blocks keep their
//! lines verbatim because expansion is line oriented.

mod parse;

pub use parse::{parse_queries, parse_templates};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::messages::Messages;

/// Prefix of a block marker line.
pub const BLOCK_MARKER: &str = "::";

/// Prefix of a comment line.
pub const COMMENT_MARKER: &str = "::#";

/// Suffix of the template used when a query returns no data.
pub const EMPTY_SUFFIX: &str = "_EMPTY";

/// Errors that can occur while loading definition files.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("can't open {kind} file '{}': {source}", path.display())]
    Read {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Named SQL statements, unexpanded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTable {
    queries: HashMap<String, String>,
}

impl QueryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a query, returning the text it replaced.
    pub fn insert(&mut self, name: impl Into<String>, sql: impl Into<String>) -> Option<String> {
        self.queries.insert(name.into(), sql.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.queries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Query names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.queries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.queries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Named templates, each an ordered list of raw lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateTable {
    templates: HashMap<String, Vec<String>>,
}

impl TemplateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a template, returning the lines it replaced.
    pub fn insert(&mut self, name: impl Into<String>, lines: Vec<String>) -> Option<Vec<String>> {
        self.templates.insert(name.into(), lines)
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.templates.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Template names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn lines_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        self.templates.get_mut(name)
    }
}

/// The parsed content of one query file and one template file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Definitions {
    pub queries: QueryTable,
    pub templates: TemplateTable,
}

impl Definitions {
    /// Parse definitions from in-memory text.
    pub fn parse(query_text: &str, template_text: &str, messages: &mut Messages) -> Self {
        Self {
            queries: parse_queries(query_text, messages),
            templates: parse_templates(template_text, messages),
        }
    }

    /// Whether `template` runs a query, directly or through its base name.
    pub fn is_data_driven(&self, template: &str) -> bool {
        self.queries.contains(&query_name_for(template))
    }

    /// Load definitions from disk.
    ///
    /// The query file is optional; when `query_path` is given it must be
    /// readable. The template file is always required.
    pub fn load(
        query_path: Option<&Path>,
        template_path: &Path,
        messages: &mut Messages,
    ) -> DefinitionResult<Self> {
        let queries = match query_path {
            Some(path) => {
                let text = read_definition_file("sql", path)?;
                messages.debug(format!("reading sql file '{}'", path.display()));
                parse_queries(&text, messages)
            }
            None => QueryTable::new(),
        };

        let text = read_definition_file("template", template_path)?;
        messages.info(format!(
            "start executing template file '{}'",
            template_path.display()
        ));
        let templates = parse_templates(&text, messages);

        Ok(Self { queries, templates })
    }
}

/// Name of the query bound to a template.
///
/// `ARTICLE.NAMES` reuses the query `ARTICLE`; the empty suffix survives so
/// `ARTICLE.NAMES_EMPTY` looks for `ARTICLE_EMPTY`.
pub fn query_name_for(template: &str) -> String {
    match template.split_once('.') {
        Some((base, _)) if template.ends_with(EMPTY_SUFFIX) => format!("{}{}", base, EMPTY_SUFFIX),
        Some((base, _)) => base.to_string(),
        None => template.to_string(),
    }
}

/// Definition files that are not valid UTF-8 are read as ISO-8859-1.
fn read_definition_file(kind: &'static str, path: &Path) -> DefinitionResult<String> {
    let bytes = fs::read(path).map_err(|source| DefinitionError::Read {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    })
}
