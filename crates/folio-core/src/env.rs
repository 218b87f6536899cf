//! Typed access to environment-style key/value lookups.
//!
//! All configuration parsing goes through [`EnvReader`] so that it can be
//! driven by `std::env::var` in production and by a plain `HashMap` in tests,
//! without `set_var`/`remove_var` races between test threads.

use std::env::VarError;
use std::fmt::Display;
use std::str::FromStr;

use crate::ConfigError;

/// Wraps a lookup function with `require`/`optional`/`parse` helpers.
pub struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }

    /// Returns the value of `var`, treating blank values as missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if the variable is unset or blank.
    pub fn require(&self, var: &str) -> Result<String, ConfigError> {
        self.optional(var)
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    }

    /// Returns the trimmed value of `var`, or `None` when unset or blank.
    pub fn optional(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn or_default(&self, var: &str, default: &str) -> String {
        self.optional(var).unwrap_or_else(|| default.to_string())
    }

    /// Parses `var` into `T`, falling back to `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvVar`] if the value is present but
    /// does not parse.
    pub fn parse<T>(&self, var: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(var) {
            None => Ok(default),
            Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Parses a boolean flag. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvVar`] for any other value.
    pub fn parse_bool(&self, var: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(var).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                other => Err(ConfigError::InvalidEnvVar {
                    var: var.to_string(),
                    reason: format!("expected a boolean, got \"{other}\""),
                }),
            },
        }
    }
}
