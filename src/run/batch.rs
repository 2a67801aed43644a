//! Batch control lines.
//!
//! A batch report writes lines such as
//!
//! ```text
//! !!invoice!!customer:=17!!year:=2024
//! ```
//!
//! Every such line runs the named report with the extra input values
//! appended to the input of the batch run.

/// Prefix of a batch control line.
pub const BATCH_MARKER: &str = "!!";

/// One parsed control line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCommand {
    /// 1-based line number in the batch file.
    pub line: usize,
    pub report: String,
    pub args: Vec<String>,
}

impl BatchCommand {
    /// Input for the sub-run: `base` followed by this line's arguments.
    pub fn input(&self, base: &str) -> String {
        let mut input = base.to_string();
        for arg in &self.args {
            input.push('|');
            input.push_str(arg);
        }
        input
    }
}

/// Collect the control lines of a generated batch file.
pub fn parse_batch(text: &str) -> Vec<BatchCommand> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let line = line.trim();
            if !line.starts_with(BATCH_MARKER) {
                return None;
            }
            let mut parts = line.split(BATCH_MARKER).filter(|p| !p.is_empty());
            let report = parts.next().unwrap_or_default().to_string();
            Some(BatchCommand {
                line: idx + 1,
                report,
                args: parts.map(String::from).collect(),
            })
        })
        .collect()
}
