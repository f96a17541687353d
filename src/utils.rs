//! Content-type and query-value helpers shared by the emitter and API clients.

use serde_json::Value;

use crate::types::{ContentType, Suffix};

/// Extensions preferred for media types where the registry lists several.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/pjpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/tiff", "tif"),
    ("image/webp", "webp"),
    ("image/bmp", "bmp"),
    ("audio/mpeg", "mp3"),
    ("audio/mp3", "mp3"),
    ("audio/ogg", "ogg"),
    ("audio/wav", "wav"),
    ("audio/x-wav", "wav"),
    ("audio/flac", "flac"),
    ("video/mp4", "mp4"),
    ("video/mpeg", "mpg"),
    ("video/quicktime", "mov"),
    ("video/webm", "webm"),
];

/// Lowercase the MIME essence (`type/subtype`) and drop any parameters.
///
/// Returns `None` for empty input.
pub fn normalize_content_type(raw: &str) -> Option<ContentType> {
    let essence = raw.split(';').next().unwrap_or("").trim();
    if essence.is_empty() {
        return None;
    }
    Some(essence.to_ascii_lowercase())
}

/// Guess a file suffix (with leading dot) for a content type.
pub fn guess_suffix(content_type: &str) -> Option<Suffix> {
    let essence = normalize_content_type(content_type)?;
    if let Some((_, ext)) = PREFERRED_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == essence)
    {
        return Some(format!(".{ext}"));
    }
    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|extensions| extensions.first())
        .map(|ext| format!(".{ext}"))
}

/// Render a scalar JSON value the way it is sent as a query parameter.
///
/// `null` yields `None`; strings are passed through unquoted; composite values
/// fall back to their JSON text.
pub fn value_to_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

/// Expand one query value into parameter values (arrays become repeats).
pub fn expand_param_values(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_to_param).collect(),
        other => value_to_param(other).into_iter().collect(),
    }
}
