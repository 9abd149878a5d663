//! Application log with syslog-style priorities, written through `tracing`.

use std::fmt;

use crate::config::ConfigCell;

/// Config path of the minimum priority that is still written.
pub const LOGLEVEL_PATH: &str = "madmin/log/manager/loglevel";

/// Syslog-style priorities; lower is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogPriority {
    Emerg = 0,
    Alert = 1,
    Crit = 2,
    Err = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl LogPriority {
    pub fn from_level(level: i64) -> Option<Self> {
        Some(match level {
            0 => Self::Emerg,
            1 => Self::Alert,
            2 => Self::Crit,
            3 => Self::Err,
            4 => Self::Warning,
            5 => Self::Notice,
            6 => Self::Info,
            7 => Self::Debug,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emerg => "emerg",
            Self::Alert => "alert",
            Self::Crit => "crit",
            Self::Err => "err",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for LogPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application log used by shop components.
pub trait Logger: Send + Sync {
    fn log(&self, priority: LogPriority, facility: &str, message: &str);

    fn enabled(&self, _priority: LogPriority) -> bool {
        true
    }
}

/// Logger forwarding to `tracing`, filtered by the configured loglevel.
///
/// The threshold is read through the context's config cell on every call.
pub struct TracingLogger {
    config: ConfigCell,
}

impl TracingLogger {
    pub fn new(config: ConfigCell) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> LogPriority {
        self.config
            .load()
            .get_i64(LOGLEVEL_PATH)
            .and_then(LogPriority::from_level)
            .unwrap_or(LogPriority::Notice)
    }
}

impl Logger for TracingLogger {
    fn log(&self, priority: LogPriority, facility: &str, message: &str) {
        if !self.enabled(priority) {
            return;
        }
        let priority_name = priority.as_str();
        match priority {
            LogPriority::Emerg | LogPriority::Alert | LogPriority::Crit | LogPriority::Err => {
                tracing::error!(facility, priority = priority_name, "{message}")
            }
            LogPriority::Warning => tracing::warn!(facility, priority = priority_name, "{message}"),
            LogPriority::Notice | LogPriority::Info => {
                tracing::info!(facility, priority = priority_name, "{message}")
            }
            LogPriority::Debug => tracing::debug!(facility, priority = priority_name, "{message}"),
        }
    }

    fn enabled(&self, priority: LogPriority) -> bool {
        priority <= self.threshold()
    }
}
