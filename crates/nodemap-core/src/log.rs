//! Named loggers with numeric priorities, forwarded to `tracing`.

use core::fmt;

/// Numeric log priority; lower values are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum LogPriority {
    /// Failures that abort an operation.
    Error = 300,
    /// Recoverable problems.
    Warn = 400,
    /// Lifecycle events.
    Info = 600,
    /// Diagnostic detail.
    Debug = 700,
    /// Everything else.
    NotSet = 800,
}

impl LogPriority {
    /// Numeric value of the priority.
    #[must_use]
    pub const fn value(self) -> u32 {
        self as u32
    }

    /// Maps a numeric priority onto the nearest named priority at or above it
    /// in severity.
    #[must_use]
    pub const fn from_value(value: u32) -> Self {
        match value {
            0..=300 => Self::Error,
            301..=400 => Self::Warn,
            401..=600 => Self::Info,
            601..=700 => Self::Debug,
            _ => Self::NotSet,
        }
    }
}

/// A named logger. Messages go to `tracing` with the logger name attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Logger {
    name: &'static str,
}

impl Logger {
    /// Returns the logger called `name`.
    #[must_use]
    pub const fn get(name: &'static str) -> Self {
        Self { name }
    }

    /// Logger name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }

    /// Emits a message at `priority`.
    pub fn log(self, priority: LogPriority, args: fmt::Arguments<'_>) {
        match priority {
            LogPriority::Error => tracing::error!(logger = self.name, "{args}"),
            LogPriority::Warn => tracing::warn!(logger = self.name, "{args}"),
            LogPriority::Info => tracing::info!(logger = self.name, "{args}"),
            LogPriority::Debug => tracing::debug!(logger = self.name, "{args}"),
            LogPriority::NotSet => tracing::trace!(logger = self.name, "{args}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LogPriority, Logger};

    #[test]
    fn priorities_order_by_severity() {
        assert!(LogPriority::Error < LogPriority::Warn);
        assert!(LogPriority::Debug < LogPriority::NotSet);
        assert_eq!(LogPriority::Info.value(), 600);
    }

    #[test]
    fn numeric_values_round_up_to_named_priorities() {
        assert_eq!(LogPriority::from_value(0), LogPriority::Error);
        assert_eq!(LogPriority::from_value(350), LogPriority::Warn);
        assert_eq!(LogPriority::from_value(700), LogPriority::Debug);
        assert_eq!(LogPriority::from_value(9000), LogPriority::NotSet);
    }

    #[test]
    fn logging_without_subscriber_is_a_no_op() {
        let logger = Logger::get("NodeMap.Test");
        assert_eq!(logger.name(), "NodeMap.Test");
        logger.log(LogPriority::Warn, format_args!("value {}", 3));
    }
}
