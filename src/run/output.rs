//! Output file naming, opening and encoding.

use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// File name used when a report has no output pattern.
pub const DEFAULT_OUTPUT: &str = "output.txt";

/// Resolve an already expanded output pattern to a file path.
///
/// Relative names are joined to `base_path`. With a timestamp the name
/// becomes `<dir>/<yyyy-MM-dd>-<stem>-<HHmm>.<ext>`.
pub fn output_path(expanded: &str, base_path: &Path, timestamp: Option<NaiveDateTime>) -> PathBuf {
    let name = if expanded.trim().is_empty() {
        DEFAULT_OUTPUT
    } else {
        expanded
    };
    let path = Path::new(name);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_path.join(path)
    };

    let Some(now) = timestamp else {
        return path;
    };
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut decorated = format!("{}-{}-{}", now.format("%Y-%m-%d"), stem, now.format("%H%M"));
    if let Some(ext) = path.extension() {
        decorated.push('.');
        decorated.push_str(&ext.to_string_lossy());
    }
    match path.parent() {
        Some(dir) => dir.join(decorated),
        None => PathBuf::from(decorated),
    }
}

/// Open the output file, creating missing directories.
pub fn open_output(path: &Path, append: bool) -> io::Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            log::info!("create path {}", dir.display());
            fs::create_dir_all(dir)?;
        }
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
}

/// Encode report text as UTF-8 or ISO-8859-1. Characters outside Latin-1
/// become `?`.
pub fn encode(text: &str, utf8: bool) -> Cow<'_, [u8]> {
    if utf8 {
        return Cow::Borrowed(text.as_bytes());
    }
    Cow::Owned(
        text.chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
            .collect(),
    )
}

/// Inverse of [`encode`]: read a written report back as text.
pub fn decode(bytes: &[u8], utf8: bool) -> String {
    if utf8 {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        bytes.iter().map(|&b| char::from(b)).collect()
    }
}
