use serde::Serializer;

pub mod profile;
pub mod task;
pub mod user;

/// Trimmed text, or `None` when nothing is left.
pub(crate) fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Patch fields where an empty string means "clear": sent as `null`.
pub(crate) fn blank_as_null<S: Serializer>(
    value: &Option<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value.as_deref().and_then(non_blank) {
        Some(text) => serializer.serialize_some(&text),
        None => serializer.serialize_none(),
    }
}
