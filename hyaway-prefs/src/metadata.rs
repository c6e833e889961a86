//! Preference metadata and the `Preferences` record trait
//!
//! Each settings domain is a plain serde record. Its metadata table is the
//! single source of truth for key names, descriptions, defaults and the
//! bounds that settings controls enforce.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

/// Wire type of a preference value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefKind {
    Boolean,
    Number,
    Text,
    /// Enumerated string with the allowed wire values
    Choice(&'static [&'static str]),
}

impl PrefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefKind::Boolean => "boolean",
            PrefKind::Number => "number",
            PrefKind::Text => "string",
            PrefKind::Choice(_) => "enum",
        }
    }
}

/// Metadata for a single preference key
///
/// # Validator Signature
///
/// All validators have signature `fn(&Value) -> Result<(), String>`.
/// Error messages follow `"{key}: {specific_reason}"`.
///
/// # Example
///
/// ```rust
/// # use hyaway_prefs::metadata::{check_range, PrefKind, PrefMetadata};
/// # use serde_json::json;
/// let meta = PrefMetadata {
///     key: "limit",
///     kind: PrefKind::Number,
///     default_value: "100",
///     description: "Maximum number of files",
///     validation_range: "1-10000",
///     validator: |v| check_range("limit", v, 1.0, 10000.0),
/// };
///
/// assert!(meta.validate(&json!(500)).is_ok());
/// assert!(meta.validate(&json!(0)).is_err());
/// ```
pub struct PrefMetadata {
    pub key: &'static str,
    pub kind: PrefKind,
    pub default_value: &'static str,
    pub description: &'static str,
    pub validation_range: &'static str,
    pub validator: fn(&Value) -> Result<(), String>,
}

impl PrefMetadata {
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        (self.validator)(value)
    }
}

impl Debug for PrefMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefMetadata")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("default_value", &self.default_value)
            .field("validation_range", &self.validation_range)
            .finish()
    }
}

/// A typed settings record persisted under one store name
///
/// Implementors must serialize to a JSON object whose fields are the
/// preference keys. Only data fields exist on the record, so persisted state
/// never carries behaviour.
pub trait Preferences:
    Serialize + DeserializeOwned + Default + Clone + PartialEq + Debug + Send + Sync + 'static
{
    /// Persistence key and broadcast topic; unique per backend
    const STORE_NAME: &'static str;

    /// Schema version written into the persisted envelope
    const VERSION: u32 = 0;

    fn metadata() -> &'static [PrefMetadata];

    fn describe(key: &str) -> Option<&'static PrefMetadata> {
        Self::metadata().iter().find(|m| m.key == key)
    }
}

/// Validate a numeric value against an inclusive range
pub fn check_range(key: &str, value: &Value, min: f64, max: f64) -> Result<(), String> {
    let v = value
        .as_f64()
        .ok_or_else(|| format!("{}: expected a number", key))?;
    if !(min..=max).contains(&v) {
        return Err(format!("{}: value {} out of range [{}, {}]", key, v, min, max));
    }
    Ok(())
}

/// Validate that a value is one of the allowed enum strings
pub fn check_choice(key: &str, value: &Value, choices: &[&str]) -> Result<(), String> {
    let v = value
        .as_str()
        .ok_or_else(|| format!("{}: expected a string", key))?;
    if !choices.contains(&v) {
        return Err(format!(
            "{}: '{}' is not one of [{}]",
            key,
            v,
            choices.join(", ")
        ));
    }
    Ok(())
}

pub fn check_bool(key: &str, value: &Value) -> Result<(), String> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(format!("{}: expected a boolean", key))
    }
}

/// Validate a free-text value by character count
pub fn check_text(key: &str, value: &Value, max_len: usize) -> Result<(), String> {
    let v = value
        .as_str()
        .ok_or_else(|| format!("{}: expected a string", key))?;
    if v.chars().count() > max_len {
        return Err(format!("{}: longer than {} characters", key, max_len));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_range_bounds_inclusive() {
        assert!(check_range("limit", &json!(1), 1.0, 10.0).is_ok());
        assert!(check_range("limit", &json!(10), 1.0, 10.0).is_ok());
        assert!(check_range("limit", &json!(0), 1.0, 10.0).is_err());
        assert!(check_range("limit", &json!(11), 1.0, 10.0).is_err());
    }

    #[test]
    fn test_check_range_error_format() {
        let err = check_range("days", &json!(99), 1.0, 30.0).unwrap_err();
        assert_eq!(err, "days: value 99 out of range [1, 30]");

        let err = check_range("days", &json!("seven"), 1.0, 30.0).unwrap_err();
        assert_eq!(err, "days: expected a number");
    }

    #[test]
    fn test_check_choice() {
        let choices = ["grid", "masonry"];
        assert!(check_choice("layout", &json!("grid"), &choices).is_ok());
        assert!(check_choice("layout", &json!("list"), &choices).is_err());
        assert!(check_choice("layout", &json!(3), &choices).is_err());
    }

    #[test]
    fn test_check_bool_and_text() {
        assert!(check_bool("haptics", &json!(true)).is_ok());
        assert!(check_bool("haptics", &json!("true")).is_err());

        assert!(check_text("pinned_search", &json!("abc"), 3).is_ok());
        assert!(check_text("pinned_search", &json!("abcd"), 3).is_err());
    }
}
