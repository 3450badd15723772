use crate::error::{Result, StoreError};

/// Prefix for per-conversation settings tables. Keeps names that would
/// otherwise start with a digit valid as SQL identifiers.
pub const SETTINGS_TABLE_PREFIX: &str = "settings_";

/// Map an identifier to a string made only of `[A-Za-z0-9_]`.
///
/// Everything from the first `@` on is dropped, then every other character
/// becomes `_`. Distinct identifiers may collide; the result is never
/// meaningful to SQL. May return an empty string.
pub fn sanitize(id: &str) -> String {
    let base = id.split('@').next().unwrap_or_default();
    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Physical settings table name for an identifier.
pub fn settings_table_name(id: &str) -> Result<String> {
    let sanitized = sanitize(id);
    if sanitized.is_empty() {
        return Err(StoreError::DegenerateIdentifier(id.to_string()));
    }
    Ok(format!("{}{}", SETTINGS_TABLE_PREFIX, sanitized))
}

/// Double-quote a sanitized name for use in a statement.
pub(crate) fn quote(name: &str) -> String {
    debug_assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    format!("\"{}\"", name)
}
