//! Environment variable fallbacks.
//!
//! Environment variables only fill fields no configuration file set; an
//! explicit file value always wins.

use std::collections::HashMap;

use crate::merge::{contains_path, set_path};

/// Environment variable naming an alternate kura home directory.
pub const KURA_HOME: &str = "KURA_HOME";

/// Fallbacks as `(variable, dotted config path)`.
pub const ENV_FALLBACKS: &[(&str, &str)] = &[
    ("KURA_LOG_LEVEL", "logging.level"),
    ("KURA_CURL_PATH", "transport.curl_path"),
];

/// Snapshot every `KURA_*` variable of the current process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with("KURA_"))
        .collect()
}

/// Apply fallbacks for fields none of the `file_layers` set.
///
/// Returns how many fields were filled from the environment.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    file_layers: &[toml::Value],
    env: &HashMap<String, String>,
) -> usize {
    let mut applied = 0usize;
    for (var, path) in ENV_FALLBACKS {
        let Some(value) = env.get(*var).filter(|v| !v.is_empty()) else {
            continue;
        };
        if file_layers.iter().any(|layer| contains_path(layer, path)) {
            continue;
        }
        set_path(merged, path, toml::Value::String(value.clone()));
        applied = applied.saturating_add(1);
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_fallback_fills_unset_field() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"info\"").unwrap();
        let applied = apply_env_fallbacks(&mut merged, &[], &env(&[("KURA_LOG_LEVEL", "debug")]));

        assert_eq!(applied, 1);
        assert_eq!(merged["logging"]["level"].as_str(), Some("debug"));
    }

    #[test]
    fn test_file_value_wins() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"").unwrap();
        let user: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"").unwrap();
        let applied = apply_env_fallbacks(
            &mut merged,
            &[user],
            &env(&[("KURA_LOG_LEVEL", "trace"), ("KURA_CURL_PATH", "/usr/bin/curl")]),
        );

        assert_eq!(applied, 1);
        assert_eq!(merged["logging"]["level"].as_str(), Some("warn"));
        assert_eq!(merged["transport"]["curl_path"].as_str(), Some("/usr/bin/curl"));
    }

    #[test]
    fn test_empty_variable_is_ignored() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"info\"").unwrap();
        assert_eq!(
            apply_env_fallbacks(&mut merged, &[], &env(&[("KURA_LOG_LEVEL", "")])),
            0
        );
    }
}
