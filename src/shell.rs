//! POSIX shell quoting for commands embedded in generated hook configs.

/// Characters that never need quoting.
fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '@')
}

/// Quote `s` so a POSIX shell reads it back as one literal word.
///
/// Safe strings pass through untouched; everything else is wrapped in single
/// quotes, with embedded single quotes written as `'"'"'`.
///
/// ```
/// use hookbridge::shell::shell_quote;
///
/// assert_eq!(shell_quote("hello"), "hello");
/// assert_eq!(shell_quote("hello world"), "'hello world'");
/// assert_eq!(shell_quote(""), "''");
/// ```
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().all(is_shell_safe) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

/// Quote each part and join with spaces.
pub fn shell_join<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .map(|part| shell_quote(part.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `s` contains anything other than safe characters and whitespace.
pub fn contains_shell_special(s: &str) -> bool {
    s.chars().any(|c| !is_shell_safe(c) && !c.is_whitespace())
}
