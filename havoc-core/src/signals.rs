//! POSIX signal name table.
//!
//! Kill commands address the main process inside a container by signal
//! name; the Docker API accepts the name as-is, so the engine only needs
//! to validate that a name is a real Linux signal before scheduling.

use crate::error::ChaosError;

/// Default signal for the `kill` command.
pub const DEFAULT_KILL_SIGNAL: &str = "SIGKILL";

/// Default signal for the graceful phase of the `stop` command.
pub const DEFAULT_STOP_SIGNAL: &str = "SIGTERM";

/// Linux signal table, name to number.
pub const SIGNALS: [(&str, i32); 30] = [
    ("SIGHUP", 1),
    ("SIGINT", 2),
    ("SIGQUIT", 3),
    ("SIGILL", 4),
    ("SIGTRAP", 5),
    ("SIGIOT", 6),
    ("SIGBUS", 7),
    ("SIGFPE", 8),
    ("SIGKILL", 9),
    ("SIGUSR1", 10),
    ("SIGSEGV", 11),
    ("SIGUSR2", 12),
    ("SIGPIPE", 13),
    ("SIGALRM", 14),
    ("SIGTERM", 15),
    ("SIGSTKFLT", 16),
    ("SIGCHLD", 17),
    ("SIGCONT", 18),
    ("SIGSTOP", 19),
    ("SIGTSTP", 20),
    ("SIGTTIN", 21),
    ("SIGTTOU", 22),
    ("SIGURG", 23),
    ("SIGXCPU", 24),
    ("SIGXFSZ", 25),
    ("SIGVTALRM", 26),
    ("SIGPROF", 27),
    ("SIGWINCH", 28),
    ("SIGIO", 29),
    ("SIGPWR", 30),
];

/// Look up a signal number by name.
pub fn lookup(name: &str) -> Option<i32> {
    SIGNALS.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

/// Validate that `name` is a recognized POSIX signal.
pub fn validate(name: &str) -> Result<(), ChaosError> {
    if lookup(name).is_some() {
        Ok(())
    } else {
        Err(ChaosError::UnknownSignal { name: name.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_signals_resolve() {
        assert_eq!(lookup("SIGKILL"), Some(9));
        assert_eq!(lookup("SIGTERM"), Some(15));
        assert_eq!(lookup("SIGHUP"), Some(1));
        assert_eq!(lookup("SIGPWR"), Some(30));
    }

    #[test]
    fn unknown_signal_rejected() {
        assert_eq!(lookup("SIGRTMIN"), None);
        assert_eq!(lookup("sigkill"), None);
        assert!(validate("KILL").is_err());
        assert!(validate("SIGKILL").is_ok());
    }

    #[test]
    fn table_is_complete() {
        assert_eq!(SIGNALS.len(), 30);
    }
}
