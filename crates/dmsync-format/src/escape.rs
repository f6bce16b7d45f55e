//! Escaping for text embedded in generated DM-script source.

/// Escape `s` for use between the quotes of a DM-script string literal.
pub fn escape_string(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Turn `name` into a valid DM-script identifier.
///
/// Every character outside `[A-Za-z0-9_]` becomes `_` and a leading digit gets
/// an `_` prefix. Distinct names can collide (`a-b` and `a_b`, or names that
/// differ only in case, since DM-script identifiers are case-insensitive);
/// callers that need uniqueness must check the escaped form.
pub fn escape_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}
