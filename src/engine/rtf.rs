//! RTF to HTML/text conversion for the `RTF` modifier.
//!
//! The external `unrtf` tool is used when it can be found on the `PATH`.
//! Otherwise a small built-in converter extracts the first German text run
//! and maps the common umlaut escapes.

use std::fs::{self, File};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::messages::Messages;

const UNRTF: &str = "unrtf";
const TOOL_TIMEOUT: Duration = Duration::from_secs(10);

static HTML_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<body[^>]*>(.*)</body>").unwrap());
static FONT_ELEMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</*font[^>]*>").unwrap());
static SPAN_ELEMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</*span[^>]*>").unwrap());
static GERMAN_TEXT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"lang1031 ([^}]*)").unwrap());

const ESCAPES: [(&str, &str); 7] = [
    ("\\'c4", "Ä"),
    ("\\'d6", "Ö"),
    ("\\'dc", "Ü"),
    ("\\'df", "ß"),
    ("\\'e4", "ä"),
    ("\\'f6", "ö"),
    ("\\'fc", "ü"),
];

/// True when `value` looks like an RTF document.
pub fn is_rtf(value: &[u8]) -> bool {
    value.starts_with(b"{\\rtf")
}

/// Converts RTF text, probing for `unrtf` once per run.
#[derive(Debug, Default)]
pub struct RtfConverter {
    tool_available: Option<bool>,
}

impl RtfConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert `rtf` to `result_type` (`html` or `text`).
    ///
    /// `xml_output` selects how paragraph marks are rendered by the built-in
    /// converter.
    pub fn convert(
        &mut self,
        rtf: &str,
        result_type: &str,
        xml_output: bool,
        messages: &mut Messages,
    ) -> String {
        if self.tool_available(messages) {
            messages.info(format!("using {} to convert rtf -> {}", UNRTF, result_type));
            match run_unrtf(rtf, result_type) {
                Ok(output) => strip_markup(&output),
                Err(e) => {
                    messages.error(e);
                    String::new()
                }
            }
        } else {
            messages.warn(format!("Please add {} to your PATH for better results.", UNRTF));
            builtin_convert(rtf, xml_output)
        }
    }

    fn tool_available(&mut self, messages: &mut Messages) -> bool {
        if let Some(available) = self.tool_available {
            return available;
        }
        let available = tempfile::tempdir()
            .map_err(|e| e.to_string())
            .and_then(|scratch| {
                run_tool(UNRTF, &["--version".to_string()], scratch.path(), TOOL_TIMEOUT)
            })
            .map(|out| {
                messages.debug(format!("{} version {}", UNRTF, out.stderr.trim()));
                out.success
            })
            .unwrap_or(false);
        self.tool_available = Some(available);
        available
    }
}

/// Keep only the `<body>` content and drop font and span elements.
fn strip_markup(html: &str) -> String {
    let body = HTML_BODY
        .captures(html)
        .and_then(|c| c.get(1))
        .map_or(html, |m| m.as_str());
    let without_font = FONT_ELEMENT.replace_all(body, "");
    SPAN_ELEMENT.replace_all(&without_font, "").into_owned()
}

fn builtin_convert(rtf: &str, xml_output: bool) -> String {
    let Some(part) = GERMAN_TEXT.captures(rtf).and_then(|c| c.get(1)) else {
        return String::new();
    };
    let mut text = part.as_str().to_string();
    for (escape, replacement) in ESCAPES {
        text = text.replace(escape, replacement);
    }
    text.replace("\\par", if xml_output { "</p>" } else { "" })
}

fn run_unrtf(rtf: &str, result_type: &str) -> Result<String, String> {
    let scratch = tempfile::tempdir().map_err(|e| format!("can't create scratch directory: {}", e))?;
    let input = scratch.path().join("input.rtf");
    fs::write(&input, rtf).map_err(|e| format!("can't write '{}': {}", input.display(), e))?;

    let args = [
        format!("--{}", result_type.trim().to_lowercase()),
        input.display().to_string(),
    ];
    let out = run_tool(UNRTF, &args, scratch.path(), TOOL_TIMEOUT)?;
    if out.success {
        Ok(out.stdout)
    } else {
        Err(out.stderr.trim().to_string())
    }
}

#[derive(Debug)]
struct ToolOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// Run an external program with a timeout. Its output is captured in files
/// inside `scratch` so a chatty child can never block on a full pipe.
fn run_tool(
    program: &str,
    args: &[String],
    scratch: &Path,
    timeout: Duration,
) -> Result<ToolOutput, String> {
    let out_path = scratch.join("stdout");
    let err_path = scratch.join("stderr");
    let stdout = File::create(&out_path).map_err(|e| e.to_string())?;
    let stderr = File::create(&err_path).map_err(|e| e.to_string())?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|e| e.to_string())?;

    let started = Instant::now();
    let success = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.success(),
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("RTF converter not ready within {:?}.", timeout));
            }
            Ok(None) => thread::sleep(Duration::from_millis(20)),
            Err(e) => return Err(e.to_string()),
        }
    };

    let read = |path: &Path| {
        fs::read(path)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    };
    Ok(ToolOutput {
        success,
        stdout: read(&out_path),
        stderr: read(&err_path),
    })
}
