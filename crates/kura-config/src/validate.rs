//! Post-merge configuration validation.
//!
//! Checks that deserialized [`Config`](crate::Config) values are within
//! acceptable ranges and that cross-field invariants hold.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Smallest worker stack accepted, in KiB.
const MIN_WORKER_STACK_KB: u32 = 256;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_runtime(config)?;
    validate_transport(config)?;
    validate_rate_limit(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_runtime(config: &Config) -> ConfigResult<()> {
    let r = &config.runtime;

    if r.worker_stack_kb != 0 && r.worker_stack_kb < MIN_WORKER_STACK_KB {
        return Err(invalid(
            "runtime.worker_stack_kb",
            format!(
                "{} KiB is too small; use 0 for the platform default or at least {MIN_WORKER_STACK_KB}",
                r.worker_stack_kb
            ),
        ));
    }

    if r.worker_stack_kb != 0 && r.max_stack_kb >= r.worker_stack_kb {
        return Err(invalid(
            "runtime.max_stack_kb",
            format!(
                "script stack limit ({} KiB) must be below the worker stack ({} KiB)",
                r.max_stack_kb, r.worker_stack_kb
            ),
        ));
    }

    Ok(())
}

fn validate_transport(config: &Config) -> ConfigResult<()> {
    let t = &config.transport;

    if t.timeout_secs == 0 {
        return Err(invalid("transport.timeout_secs", "must be greater than 0"));
    }
    if t.connect_timeout_secs == 0 {
        return Err(invalid(
            "transport.connect_timeout_secs",
            "must be greater than 0",
        ));
    }
    if t.connect_timeout_secs > t.timeout_secs {
        return Err(invalid(
            "transport.connect_timeout_secs",
            format!(
                "connect timeout ({}s) exceeds the total timeout ({}s)",
                t.connect_timeout_secs, t.timeout_secs
            ),
        ));
    }

    Ok(())
}

fn validate_rate_limit(config: &Config) -> ConfigResult<()> {
    let r = &config.rate_limit;

    if r.permits == 0 {
        return Err(invalid("rate_limit.permits", "must be at least 1"));
    }
    if r.period_ms == 0 {
        return Err(invalid("rate_limit.period_ms", "must be greater than 0"));
    }
    if r.poll_interval_ms == 0 {
        return Err(invalid("rate_limit.poll_interval_ms", "must be greater than 0"));
    }

    for (id, source) in &r.sources {
        if source.permits == 0 {
            return Err(invalid(
                format!("rate_limit.sources.{id}.permits"),
                "must be at least 1",
            ));
        }
        if source.period_ms == 0 {
            return Err(invalid(
                format!("rate_limit.sources.{id}.period_ms"),
                "must be greater than 0",
            ));
        }
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceRateLimit;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_permits_rejected() {
        let mut config = Config::default();
        config.rate_limit.permits = 0;
        assert_eq!(field_of(validate(&config)), "rate_limit.permits");
    }

    #[test]
    fn test_source_override_checked() {
        let mut config = Config::default();
        config.rate_limit.sources.insert(
            "77".into(),
            SourceRateLimit {
                permits: 1,
                period_ms: 0,
            },
        );
        assert_eq!(field_of(validate(&config)), "rate_limit.sources.77.period_ms");
    }

    #[test]
    fn test_connect_timeout_bounded_by_total() {
        let mut config = Config::default();
        config.transport.connect_timeout_secs = 60;
        assert_eq!(field_of(validate(&config)), "transport.connect_timeout_secs");
    }

    #[test]
    fn test_script_stack_below_worker_stack() {
        let mut config = Config::default();
        config.runtime.max_stack_kb = 8192;
        assert_eq!(field_of(validate(&config)), "runtime.max_stack_kb");

        config.runtime.worker_stack_kb = 0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".into();
        assert_eq!(field_of(validate(&config)), "logging.level");
    }
}
