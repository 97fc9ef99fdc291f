//! Settings checks shared by the backend strategies.
//!
//! Every check ignores an absent key unless it is named `require_*`.

use polyfs_config::Settings;
use regex::Regex;
use serde_json::Value;

use crate::error::StrategyError;

pub const UPLOAD_METHOD: &str = "upload_method";
pub const UPLOAD_METHOD_CLIENT: &str = "client";
pub const UPLOAD_METHOD_SERVER: &str = "server";

/// `upload_method` must be `client` or `server`; absent means `client`.
pub fn ensure_upload_method(settings: &mut Settings) -> Result<(), StrategyError> {
    match settings.get(UPLOAD_METHOD) {
        None => {
            settings.insert(
                UPLOAD_METHOD.to_string(),
                Value::String(UPLOAD_METHOD_CLIENT.to_string()),
            );
            Ok(())
        }
        Some(_) => check_one_of(
            settings,
            UPLOAD_METHOD,
            &[UPLOAD_METHOD_CLIENT, UPLOAD_METHOD_SERVER],
        ),
    }
}

pub fn check_bool(settings: &Settings, key: &str) -> Result<(), StrategyError> {
    match settings.get(key) {
        None | Some(Value::Bool(_)) => Ok(()),
        Some(other) => Err(StrategyError::validation(
            key,
            format!("expected a boolean, got {}", type_name(other)),
        )),
    }
}

pub fn check_string(settings: &Settings, key: &str) -> Result<(), StrategyError> {
    optional_str(settings, key).map(|_| ())
}

/// Value, if present, must be one of `allowed`.
pub fn check_one_of(settings: &Settings, key: &str, allowed: &[&str]) -> Result<(), StrategyError> {
    match optional_str(settings, key)? {
        Some(value) if !allowed.contains(&value) => Err(StrategyError::validation(
            key,
            format!("'{}' is not one of {}", value, allowed.join(", ")),
        )),
        _ => Ok(()),
    }
}

/// Value, if present, must fully match `pattern` and have a length within `len`.
pub fn check_pattern(
    settings: &Settings,
    key: &str,
    pattern: &Regex,
    len: std::ops::RangeInclusive<usize>,
    expected: &str,
) -> Result<(), StrategyError> {
    match optional_str(settings, key)? {
        Some(value) => match_pattern(key, value, pattern, len, expected),
        None => Ok(()),
    }
}

/// Value must be present and a non-empty string.
pub fn require_string<'a>(settings: &'a Settings, key: &str) -> Result<&'a str, StrategyError> {
    match optional_str(settings, key)? {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(StrategyError::validation(key, "is required")),
    }
}

pub(crate) fn match_pattern(
    key: &str,
    value: &str,
    pattern: &Regex,
    len: std::ops::RangeInclusive<usize>,
    expected: &str,
) -> Result<(), StrategyError> {
    if !len.contains(&value.len()) || !pattern.is_match(value) {
        return Err(StrategyError::validation(
            key,
            format!("'{}' is not {}", value, expected),
        ));
    }
    Ok(())
}

fn optional_str<'a>(settings: &'a Settings, key: &str) -> Result<Option<&'a str>, StrategyError> {
    match settings.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(StrategyError::validation(
            key,
            format!("expected a string, got {}", type_name(other)),
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
