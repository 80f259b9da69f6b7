//! Per-object diagnostic verbosity
//!
//! Scenes and controllers each carry a [`LogLevel`]. A message is emitted
//! through `tracing` only when its level is within the object's level, so a
//! silent scene stays silent even under a verbose subscriber.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Diagnostic verbosity, 0 (silent) to 3 (debug)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LogLevel {
    Silent = 0,
    Error = 1,
    #[default]
    Warn = 2,
    Debug = 3,
}

impl TryFrom<u8> for LogLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(LogLevel::Silent),
            1 => Ok(LogLevel::Error),
            2 => Ok(LogLevel::Warn),
            3 => Ok(LogLevel::Debug),
            other => Err(format!("loglevel must be between 0 and 3, got {}", other)),
        }
    }
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> u8 {
        level as u8
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Emit `args` at `at` if `current` permits it
pub fn emit(current: LogLevel, at: LogLevel, args: fmt::Arguments<'_>) {
    if at == LogLevel::Silent || at > current {
        return;
    }
    match at {
        LogLevel::Error => tracing::error!("{}", args),
        LogLevel::Warn => tracing::warn!("{}", args),
        LogLevel::Debug => tracing::debug!("{}", args),
        LogLevel::Silent => {}
    }
}

/// Log through an object's loglevel
///
/// ```ignore
/// log_at!(scene.loglevel(), LogLevel::Warn, "triggerElement was removed");
/// ```
#[macro_export]
macro_rules! log_at {
    ($current:expr, $at:expr, $($arg:tt)+) => {
        $crate::log::emit($current, $at, ::std::format_args!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loglevel_from_u8() {
        assert_eq!(LogLevel::try_from(3), Ok(LogLevel::Debug));
        assert!(LogLevel::try_from(4).is_err());
        assert_eq!(u8::from(LogLevel::Warn), 2);
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(LogLevel::Debug > LogLevel::Warn);
        assert!(LogLevel::Error > LogLevel::Silent);
        assert_eq!(LogLevel::default(), LogLevel::Warn);
    }
}
