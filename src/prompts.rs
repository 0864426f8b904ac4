//! Prompt rendering and the fixed texts shown when generation is unavailable.

/// Answer returned when the model cannot answer from the document.
pub const NO_ANSWER: &str = "I cannot answer this question based on the document.";
/// Answer returned when a session has nothing indexed.
pub const NOTHING_INDEXED: &str =
    "No document content is indexed yet. Please process a document first.";
/// Answer returned when retrieval yields no fragments.
pub const NOTHING_RELEVANT: &str = "I couldn't find relevant information in the document.";
/// Summary returned when neither generation nor the heuristic yields text.
pub const SUMMARY_FAILED: &str = "Summary generation failed.";

/// Replace `{name}` placeholders in one pass.
///
/// Substituted values are not scanned again, so a question containing
/// `{context}` stays literal. Unknown placeholders are left as written.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let value = after.find('}').and_then(|end| {
            vars.iter()
                .find(|(key, _)| *key == &after[..end])
                .map(|(_, value)| (end, *value))
        });
        match value {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Fragments joined by blank lines and cut to `max_chars` characters.
pub fn build_context<S: AsRef<str>>(fragments: &[S], max_chars: usize) -> String {
    let joined = fragments
        .iter()
        .map(|f| f.as_ref())
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&joined, max_chars).to_string()
}

/// The first three `". "`-separated sentences of the context.
pub fn fallback_summary(context: &str) -> String {
    let head = context.split(". ").take(3).collect::<Vec<_>>().join(". ");
    let head = head.trim();
    if head.is_empty() {
        SUMMARY_FAILED.to_string()
    } else {
        head.to_string()
    }
}

pub fn with_disclaimer(text: &str, disclaimer: &str) -> String {
    format!("{}\n\n{}", text, disclaimer)
}

/// Operator-facing note listing missing clauses, `None` when nothing is missing.
///
/// At most `display_limit` names are listed; the rest are counted as `+N more`.
pub fn suspicion_note(missing: &[String], display_limit: usize) -> Option<String> {
    if missing.is_empty() {
        return None;
    }
    let shown = &missing[..missing.len().min(display_limit)];
    let mut list = shown.join(", ");
    let remaining = missing.len() - shown.len();
    if remaining > 0 {
        list = format!("{} +{} more", list, remaining);
    }
    Some(format!(
        "The following standard clauses appear to be missing from your agreement: {}. \
         It is advised to consult with a professional legal advisor.",
        list
    ))
}
