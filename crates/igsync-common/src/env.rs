//! Environment variable lookups
//!
//! Every `from_env` constructor in the workspace goes through these helpers so
//! that unset and unparsable variables behave the same way everywhere: the
//! lenient helpers fall back to the default, the strict ones report the key.

use crate::error::{CommonError, Result};
use std::str::FromStr;

/// Read a string variable, falling back to `default` when unset
pub fn string_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a variable, falling back to `default` when unset or unparsable
pub fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse a variable, returning `None` when unset and an error when unparsable
pub fn parse_strict<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CommonError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(CommonError::Config(format!(
            "{} is not valid unicode",
            key
        ))),
    }
}

/// Read a list variable separated by commas and/or whitespace
///
/// Empty entries are discarded. An unset or blank variable yields `default`.
pub fn list_or(key: &str, default: &[&str]) -> Vec<String> {
    let parsed = std::env::var(key)
        .map(|raw| split_list(&raw))
        .unwrap_or_default();

    if parsed.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        parsed
    }
}

/// Split a comma/whitespace separated list
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
