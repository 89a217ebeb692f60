// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! The configuration consumer seam (`spec.md` §1 scopes the `.conf` tokenizer and
//! schema layer out; §6 defines what the logger reads from whatever implements them).
//!
//! `daemonlib` does not parse `.conf` files itself — [`ConfigSource`] is the trait an
//! application's own config loader implements, and [`LogLevel`] is the one typed
//! value this crate needs out of it beyond the raw debug-filter string. A minimal
//! in-memory implementation (`#[cfg(test)]` only, see [`tests::MapConfigSource`])
//! exercises the seam without this crate taking on a parser dependency.

use std::fmt;
use std::str::FromStr;

use crate::logger::Level;

/// `log.level`'s four recognized values (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub fn into_level(self) -> Level {
        match self {
            LogLevel::Error => Level::Error,
            LogLevel::Warn => Level::Warn,
            LogLevel::Info => Level::Info,
            LogLevel::Debug => Level::Debug,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLogLevel(pub String);

impl fmt::Display for InvalidLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a recognized log.level value: {:?}", self.0)
    }
}

impl std::error::Error for InvalidLogLevel {}

impl FromStr for LogLevel {
    type Err = InvalidLogLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(InvalidLogLevel(other.to_string())),
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// What the logger needs from a loaded configuration. An application wires its own
/// `.conf` loader into this trait; `daemonlib` never parses a file itself
/// (`spec.md` §1).
///
/// Per `spec.md` §7's "configuration warnings are printed to stderr only when
/// `--check-config` is in effect; otherwise they are suppressed and the option
/// retains its default", a `ConfigSource` implementation is expected to apply that
/// policy itself when loading — by the time `log_level`/`debug_filter` are called
/// here, defaulting has already happened.
pub trait ConfigSource {
    /// The effective `log.level`, already defaulted if absent or unparseable.
    fn log_level(&self) -> LogLevel;

    /// The raw `log.debug_filter` string, or `""` if unset (an empty filter string
    /// parses to zero rules, per `spec.md` §6's grammar, which is the correct
    /// "no debug filtering configured" state).
    fn debug_filter(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A minimal in-memory [`ConfigSource`] for tests, standing in for an
    /// application's real `.conf`-backed implementation.
    pub(crate) struct MapConfigSource {
        pub level: LogLevel,
        pub debug_filter: String,
    }

    impl ConfigSource for MapConfigSource {
        fn log_level(&self) -> LogLevel {
            self.level
        }
        fn debug_filter(&self) -> &str {
            &self.debug_filter
        }
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!("Debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    }

    #[test]
    fn unrecognized_log_level_is_rejected() {
        assert!("trace".parse::<LogLevel>().is_err());
    }

    #[test]
    fn config_source_seam_is_object_safe_enough_for_a_stub() {
        let cfg = MapConfigSource { level: LogLevel::Warn, debug_filter: "+all".into() };
        assert_eq!(cfg.log_level(), LogLevel::Warn);
        assert_eq!(cfg.debug_filter(), "+all");
    }
}
