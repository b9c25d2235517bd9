//! Localized-string unwrapping.
//!
//! Many Voyager fields arrive as
//! `{ "localized": { "en_US": "..." }, "preferredLocale": {...} }`, but the
//! same field can also be a bare string on other endpoints or after an
//! upstream change. Both forms must be accepted.

use serde_json::Value;

/// Locale preferred when several are present.
const DEFAULT_LOCALE: &str = "en_US";

/// Unwrap a possibly-localized string field.
///
/// Order: bare string as-is; `localized[en_US]`; the first locale present;
/// empty string.
pub fn extract_localized(value: &Value) -> String {
    if let Some(s) = value.as_str() {
        return s.to_string();
    }
    if let Some(locales) = value.get("localized").and_then(Value::as_object) {
        if let Some(s) = locales.get(DEFAULT_LOCALE).and_then(Value::as_str) {
            return s.to_string();
        }
        for candidate in locales.values() {
            if let Some(s) = candidate.as_str() {
                return s.to_string();
            }
        }
    }
    String::new()
}

/// `extract_localized` applied to a named field of an object.
pub fn localized_field(value: &Value, field: &str) -> String {
    value.get(field).map(extract_localized).unwrap_or_default()
}
