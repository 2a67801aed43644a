/// Break `text` into lines of at most `width` characters.
///
/// Lines are preferably split at a space, comma or tab seen since the start
/// of the current line; a line without any such position is cut hard at
/// `width`. Existing line breaks (`\n`, `\r`, `\r\n`) are kept. Every line
/// after the first is prefixed with `start_of_line`, and all lines are
/// trimmed before the prefix is applied.
pub fn wrap_text(text: &str, width: usize, start_of_line: &str) -> Vec<String> {
    let width = width.max(1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let segment =
        |from: usize, to: usize| -> String { chars[from..to].iter().collect::<String>().trim().to_string() };

    let mut lines = Vec::new();
    let mut prefix = "";
    let mut idx = 0;
    let mut start = 0;
    let mut split = 0;

    while idx < len {
        let c = chars[idx];
        if c == ' ' || c == ',' || c == '\t' {
            split = idx;
        }

        if c == '\n' || c == '\r' {
            lines.push(format!("{}{}", prefix, segment(start, idx)));
            prefix = start_of_line;
            if c == '\r' && chars.get(idx + 1) == Some(&'\n') {
                idx += 1;
            }
            idx += 1;
            start = idx;
            split = start;
            continue;
        }

        if idx > start && (idx - start) % width == 0 {
            if split == start {
                split = idx;
            }
            lines.push(format!("{}{}", prefix, segment(start, split)));
            prefix = start_of_line;
            start = split;
            split = start;
        }
        idx += 1;
    }

    if start < len {
        let rest = segment(start, len);
        if !rest.is_empty() {
            lines.push(format!("{}{}", prefix, rest));
        }
    }

    lines
}
