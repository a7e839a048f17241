//! Validated chaos command values.
//!
//! A [`ChaosCommand`] is built from user input, validated once against
//! the scheduler interval, and then treated as immutable: invalid
//! parameters never reach an executor.

use std::net::IpAddr;
use std::time::Duration;

use crate::error::ChaosError;
use crate::netem::{self, FilterMode, NetemEffect};
use crate::signals;

/// Parameters shared by every netem disruption.
#[derive(Debug, Clone, PartialEq)]
pub struct NetemCommand {
    /// Interface to install the qdisc on.
    pub interface: String,
    /// Optional target IP; when set, only matching traffic is disrupted.
    pub target: Option<IpAddr>,
    /// How the target IP is matched.
    pub filter_mode: FilterMode,
    /// How long the disruption stays installed.
    pub duration: Duration,
    /// The netem parameter set.
    pub effect: NetemEffect,
}

/// One chaos command, kind plus parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ChaosCommand {
    /// Send a signal to the main process.
    Kill {
        /// POSIX signal name.
        signal: String,
    },
    /// Graceful stop with a SIGKILL escalation.
    Stop {
        /// Grace period in seconds for each wait phase.
        wait_secs: u64,
    },
    /// Remove the container.
    Remove {
        /// Force removal of a running container.
        force: bool,
        /// Also remove links.
        links: bool,
        /// Also remove anonymous volumes.
        volumes: bool,
    },
    /// Pause all processes for a bounded duration.
    Pause {
        /// How long the container stays paused.
        duration: Duration,
    },
    /// Network emulation via in-container traffic control.
    Netem(NetemCommand),
}

impl ChaosCommand {
    /// Short name of the command kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChaosCommand::Kill { .. } => "kill",
            ChaosCommand::Stop { .. } => "stop",
            ChaosCommand::Remove { .. } => "rm",
            ChaosCommand::Pause { .. } => "pause",
            ChaosCommand::Netem(cmd) => match cmd.effect {
                NetemEffect::Delay { .. } => "netem delay",
                NetemEffect::Loss { .. } => "netem loss",
                NetemEffect::Duplicate { .. } => "netem duplicate",
                NetemEffect::Corrupt { .. } => "netem corrupt",
            },
        }
    }

    /// Duration of the transient disruption, if this kind has one.
    pub fn transient_duration(&self) -> Option<Duration> {
        match self {
            ChaosCommand::Pause { duration } => Some(*duration),
            ChaosCommand::Netem(cmd) => Some(cmd.duration),
            _ => None,
        }
    }

    /// Validate all parameters against their bounds and the scheduler
    /// `interval`. Must pass before the command is scheduled.
    pub fn validate(&self, interval: Duration) -> Result<(), ChaosError> {
        match self {
            ChaosCommand::Kill { signal } => signals::validate(signal)?,
            ChaosCommand::Stop { .. } | ChaosCommand::Remove { .. } => {}
            ChaosCommand::Pause { .. } => {}
            ChaosCommand::Netem(cmd) => {
                netem::validate_interface(&cmd.interface)?;
                validate_effect(&cmd.effect)?;
            }
        }

        if let Some(duration) = self.transient_duration() {
            if duration.is_zero() {
                return Err(ChaosError::InvalidParameter {
                    what: "duration",
                    reason: "must be greater than zero".into(),
                });
            }
            if duration >= interval {
                return Err(ChaosError::InvalidParameter {
                    what: "duration",
                    reason: format!(
                        "{duration:?} must be smaller than the recurrent interval {interval:?}"
                    ),
                });
            }
        }
        Ok(())
    }
}

fn validate_effect(effect: &NetemEffect) -> Result<(), ChaosError> {
    match *effect {
        NetemEffect::Delay {
            amount_ms,
            variation_ms,
            correlation,
        } => {
            if amount_ms == 0 {
                return Err(ChaosError::InvalidParameter {
                    what: "delay amount",
                    reason: "must be greater than zero".into(),
                });
            }
            if variation_ms > amount_ms {
                return Err(ChaosError::InvalidParameter {
                    what: "delay variation",
                    reason: format!("{variation_ms}ms exceeds the delay amount {amount_ms}ms"),
                });
            }
            if correlation > 100 {
                return Err(ChaosError::InvalidParameter {
                    what: "delay correlation",
                    reason: "must be between 0 and 100".into(),
                });
            }
        }
        NetemEffect::Loss {
            percent,
            correlation,
        }
        | NetemEffect::Duplicate {
            percent,
            correlation,
        }
        | NetemEffect::Corrupt {
            percent,
            correlation,
        } => {
            if !(percent > 0.0 && percent <= 100.0) {
                return Err(ChaosError::InvalidParameter {
                    what: "netem percent",
                    reason: "must be within (0, 100]".into(),
                });
            }
            if !(0.0..=100.0).contains(&correlation) {
                return Err(ChaosError::InvalidParameter {
                    what: "netem correlation",
                    reason: "must be between 0 and 100".into(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(10);

    fn delay(amount_ms: u64, variation_ms: u64, correlation: u8) -> ChaosCommand {
        ChaosCommand::Netem(NetemCommand {
            interface: "eth0".into(),
            target: None,
            filter_mode: FilterMode::Dport,
            duration: Duration::from_secs(1),
            effect: NetemEffect::Delay {
                amount_ms,
                variation_ms,
                correlation,
            },
        })
    }

    #[test]
    fn kill_accepts_known_signal_only() {
        let ok = ChaosCommand::Kill {
            signal: "SIGTERM".into(),
        };
        assert!(ok.validate(INTERVAL).is_ok());

        let bad = ChaosCommand::Kill {
            signal: "SIGNOPE".into(),
        };
        assert!(matches!(
            bad.validate(INTERVAL),
            Err(ChaosError::UnknownSignal { .. })
        ));
    }

    #[test]
    fn pause_duration_must_stay_below_interval() {
        let fits = ChaosCommand::Pause {
            duration: Duration::from_secs(5),
        };
        assert!(fits.validate(INTERVAL).is_ok());

        let equal = ChaosCommand::Pause { duration: INTERVAL };
        assert!(equal.validate(INTERVAL).is_err());

        let zero = ChaosCommand::Pause {
            duration: Duration::ZERO,
        };
        assert!(zero.validate(INTERVAL).is_err());
    }

    #[test]
    fn delay_bounds() {
        assert!(delay(100, 10, 20).validate(INTERVAL).is_ok());
        assert!(delay(0, 0, 0).validate(INTERVAL).is_err());
        assert!(delay(100, 101, 0).validate(INTERVAL).is_err());
        assert!(delay(100, 10, 101).validate(INTERVAL).is_err());
    }

    #[test]
    fn netem_duration_must_stay_below_interval() {
        let mut cmd = match delay(100, 0, 0) {
            ChaosCommand::Netem(cmd) => cmd,
            _ => unreachable!(),
        };
        cmd.duration = INTERVAL + Duration::from_secs(1);
        assert!(ChaosCommand::Netem(cmd).validate(INTERVAL).is_err());
    }

    #[test]
    fn bad_interface_rejected_before_scheduling() {
        let cmd = ChaosCommand::Netem(NetemCommand {
            interface: "eth0; rm -rf /".into(),
            target: None,
            filter_mode: FilterMode::Dport,
            duration: Duration::from_secs(1),
            effect: NetemEffect::Delay {
                amount_ms: 100,
                variation_ms: 0,
                correlation: 0,
            },
        });
        assert!(matches!(
            cmd.validate(INTERVAL),
            Err(ChaosError::BadInterface { .. })
        ));
    }

    #[test]
    fn loss_bounds() {
        let loss = |percent, correlation| {
            ChaosCommand::Netem(NetemCommand {
                interface: "eth0".into(),
                target: None,
                filter_mode: FilterMode::Dport,
                duration: Duration::from_secs(1),
                effect: NetemEffect::Loss {
                    percent,
                    correlation,
                },
            })
        };
        assert!(loss(10.0, 25.0).validate(INTERVAL).is_ok());
        assert!(loss(0.0, 0.0).validate(INTERVAL).is_err());
        assert!(loss(100.5, 0.0).validate(INTERVAL).is_err());
        assert!(loss(10.0, 101.0).validate(INTERVAL).is_err());
    }

    #[test]
    fn kinds_are_named() {
        assert_eq!(
            ChaosCommand::Kill {
                signal: "SIGKILL".into()
            }
            .kind(),
            "kill"
        );
        assert_eq!(delay(100, 0, 0).kind(), "netem delay");
    }
}
