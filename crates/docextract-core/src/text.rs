use once_cell::sync::Lazy;
use regex::Regex;

/// Expand common typographic ligatures found in PDFs.
pub fn expand_ligatures(text: &str) -> String {
    text.replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{FB05}', '\u{FB06}'], "st")
}

/// Normalize the raw text of one page.
///
/// - ligatures expanded
/// - `\r\n` and lone `\r` become `\n`
/// - control characters other than `\n` and `\t` dropped
/// - trailing whitespace stripped from every line
/// - three or more consecutive newlines collapsed to one blank line
/// - leading and trailing whitespace trimmed
pub fn normalize_page_text(text: &str) -> String {
    static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

    let text = expand_ligatures(text).replace("\r\n", "\n").replace('\r', "\n");

    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    let stripped = cleaned
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_RUNS.replace_all(&stripped, "\n\n").trim().to_string()
}
