//! Cleanup of assembled page markdown.
//!
//! Text pulled out of a PDF carries artefacts of how the file was produced
//! rather than of what it says. Producers on different platforms end lines
//! with `\r\n` or a lone `\r`, justified layout leaves padding at line ends,
//! pages holding only images leave long runs of empty lines, and word
//! processors embed format characters (soft hyphens, zero-width joiners,
//! byte order marks) that render as nothing but break search.
//!
//! The cleanup is one pass over the lines. Word texts in the bounding box
//! list are not touched, only the markdown.

/// Empty lines allowed in a row. Page and table markers use at most two.
pub const MAX_BLANK_RUN: usize = 2;

/// Format characters that carry no visible text.
const FORMAT_CHARS: &[char] = &[
    '\u{00AD}', // soft hyphen
    '\u{200B}', // zero width space
    '\u{200C}', // zero width non-joiner
    '\u{200D}', // zero width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // byte order mark
];

fn is_noise(c: char) -> bool {
    FORMAT_CHARS.contains(&c) || (c.is_control() && c != '\t')
}

/// Split on `\r\n`, `\r` or `\n`.
fn producer_lines(input: &str) -> impl Iterator<Item = &str> {
    input
        .split('\n')
        .flat_map(|chunk| chunk.strip_suffix('\r').unwrap_or(chunk).split('\r'))
}

/// Normalise extracted markdown.
///
/// Output lines are LF-terminated, free of format characters and trailing
/// blanks, with no more than [`MAX_BLANK_RUN`] empty lines in a row. A
/// document with no text cleans to the empty string.
pub fn clean_markdown(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut blank_run = 0usize;

    for raw in producer_lines(input) {
        let line: String = raw.chars().filter(|&c| !is_noise(c)).collect();
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > MAX_BLANK_RUN {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    let end = out.trim_end().len();
    if end == 0 {
        return String::new();
    }
    out.truncate(end);
    out.push('\n');
    out
}
