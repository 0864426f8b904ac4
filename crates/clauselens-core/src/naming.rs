//! Clause title cleanup and collision handling.
//!
//! Titles come from a text generator and are best-effort: anything that
//! does not survive [`clean_title`] is replaced by [`PLACEHOLDER_NAME`],
//! and repeated names get a numeric suffix so the output mapping keeps
//! unique keys.

use std::collections::HashSet;

/// Name used when no usable title was generated.
pub const PLACEHOLDER_NAME: &str = "Unnamed Clause";

/// Longest accepted title; longer output is a sentence, not a name.
pub const MAX_TITLE_WORDS: usize = 6;

const QUOTES: &[char] = &['"', '\'', '`', '“', '”', '‘', '’', '*'];

/// Reduce a raw generated title to a single clean line.
///
/// Takes the first non-empty line, drops an echoed `Title:` label,
/// strips surrounding quotes or emphasis and a trailing period, and
/// collapses whitespace. Returns `None` when nothing is left or the
/// result is longer than [`MAX_TITLE_WORDS`].
pub fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = strip_label(unquote(line));
    let words: Vec<&str> = unquote(line).split_whitespace().collect();
    if words.is_empty() || words.len() > MAX_TITLE_WORDS {
        None
    } else {
        Some(words.join(" "))
    }
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '.' || QUOTES.contains(&c))
}

fn strip_label(s: &str) -> &str {
    const LABEL: &str = "title:";
    match s.get(..LABEL.len()) {
        Some(head) if head.eq_ignore_ascii_case(LABEL) => &s[LABEL.len()..],
        _ => s,
    }
}

/// Resolve generated titles into unique names.
///
/// `None` entries become [`PLACEHOLDER_NAME`]. When a name is already
/// taken, the entry's 0-based position is appended (`"Rent 2"`), and a
/// further counter is added if that is taken too.
pub fn assign_names(titles: Vec<Option<String>>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(titles.len());

    for (i, title) in titles.into_iter().enumerate() {
        let base = title.unwrap_or_else(|| PLACEHOLDER_NAME.to_string());
        let mut name = base.clone();
        if taken.contains(&name) {
            name = format!("{} {}", base, i);
            let mut extra = 2;
            while taken.contains(&name) {
                name = format!("{} {}-{}", base, i, extra);
                extra += 1;
            }
        }
        taken.insert(name.clone());
        names.push(name);
    }
    names
}

/// Fold a representative sentence into a stored clause text.
///
/// Line breaks become spaces, whitespace runs collapse, and the text ends
/// with a period.
pub fn normalize_clause_text(text: &str) -> String {
    let mut out = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !out.is_empty() && !out.ends_with('.') {
        out.push('.');
    }
    out
}
