//! Error types for the chaos engine.

use thiserror::Error;

/// Errors that can occur while planning or applying chaos.
#[derive(Debug, Error)]
pub enum ChaosError {
    /// Docker API error.
    #[error("docker error: {0}")]
    Runtime(#[from] bollard::errors::Error),

    /// Signal name is not in the POSIX signal table.
    #[error("unexpected signal: {name}")]
    UnknownSignal {
        /// The rejected signal name.
        name: String,
    },

    /// Network interface name failed validation.
    #[error("bad network interface name '{name}': must match '{pattern}'")]
    BadInterface {
        /// The rejected interface name.
        name: String,
        /// The pattern interface names must match.
        pattern: &'static str,
    },

    /// A command parameter is out of bounds or malformed.
    #[error("invalid {what}: {reason}")]
    InvalidParameter {
        /// Which parameter was rejected.
        what: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Selector pattern is not a valid regular expression.
    #[error("invalid container pattern: {0}")]
    BadPattern(#[from] regex::Error),

    /// Container survived the stop sequence (stop-signal, grace wait, SIGKILL).
    #[error("container {name} ({id}) could not be stopped")]
    NotStopped {
        /// Container display name.
        name: String,
        /// Container identifier.
        id: String,
    },

    /// A transient disruption was applied but could not be reverted.
    ///
    /// The container is left in the disrupted state; the engine cannot
    /// recover it.
    #[error("disruption leaked on container {name} ({id}): {source}")]
    Leaked {
        /// Container display name.
        name: String,
        /// Container identifier.
        id: String,
        /// The revert failure.
        #[source]
        source: Box<ChaosError>,
    },
}

impl ChaosError {
    /// True if this error means a disruption was left in place.
    pub fn is_leak(&self) -> bool {
        matches!(self, ChaosError::Leaked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaked_wraps_source() {
        let inner = ChaosError::NotStopped {
            name: "db".into(),
            id: "abc".into(),
        };
        let err = ChaosError::Leaked {
            name: "db".into(),
            id: "abc".into(),
            source: Box::new(inner),
        };
        assert!(err.is_leak());
        assert!(err.to_string().contains("leaked"));
        assert!(err.to_string().contains("db"));
    }

    #[test]
    fn unknown_signal_message() {
        let err = ChaosError::UnknownSignal {
            name: "SIGBOGUS".into(),
        };
        assert_eq!(err.to_string(), "unexpected signal: SIGBOGUS");
        assert!(!err.is_leak());
    }
}
