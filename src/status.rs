//! Status codes, alarm codes, and the abort signal. Three tiers: a
//! recoverable status code returned to the line issuer, a latched alarm
//! requiring operator acknowledgement, and the uncatchable abort that
//! unwinds busy-waits.

use core::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum StatusCode {
    /// No error.
    Ok = 0,
    /// The planner buffer, or a transient allocation, was exhausted.
    Overflow = 1,
    /// Motion requested while the system is in ALARM, ESTOP, or SLEEP.
    SystemGClock = 2,
    /// Commanded target lies outside the configured soft-limit travel.
    TravelExceeded = 3,
    /// A limit switch is still asserted after a motion sequence completed.
    LimitsEngaged = 4,
    /// Caught by nothing more specific; should not normally be observed.
    Unhandled = 5,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Overflow => "buffer overflow",
            Self::SystemGClock => "g-code locked out of current state",
            Self::TravelExceeded => "commanded travel exceeds machine limits",
            Self::LimitsEngaged => "limit switch still engaged",
            Self::Unhandled => "unhandled error",
        };
        f.write_str(s)
    }
}

/// Latched alarm. Setting one of these always drives the system state
/// machine to `ALARM` or `ESTOP`.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AlarmCode {
    /// A hard-limit switch tripped during motion.
    HardLimit = 1,
    /// A commanded target violated the configured soft limits.
    SoftLimit = 2,
    /// A cycle was aborted mid-motion (reset during CYCLE/HOMING/JOG).
    AbortCycle = 3,
    /// Probe pin already triggered before the probing motion started.
    ProbeFailInitial = 4,
    /// Probing motion completed without the probe pin ever triggering.
    ProbeFailContact = 5,
    /// Homing was reset (aborted) before completion.
    HomingFailReset = 6,
    /// Homing is required (by settings) but has not been performed.
    HomingRequired = 7,
    /// Emergency stop asserted.
    EStop = 8,
}

impl AlarmCode {
    /// The three alarms that block the foreground loop (except for status
    /// reports) until an explicit reset.
    pub const fn blocks_foreground(self) -> bool {
        matches!(self, Self::HardLimit | Self::SoftLimit | Self::EStop)
    }
}

impl fmt::Display for AlarmCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HardLimit => "hard limit triggered",
            Self::SoftLimit => "soft limit violation",
            Self::AbortCycle => "motion aborted mid-cycle",
            Self::ProbeFailInitial => "probe already triggered",
            Self::ProbeFailContact => "probe did not trigger",
            Self::HomingFailReset => "homing reset before completion",
            Self::HomingRequired => "homing required before motion",
            Self::EStop => "emergency stop",
        };
        f.write_str(s)
    }
}

/// Result of a function that can be cancelled mid-flight by `EXEC_RESET`.
/// Every busy-wait propagates this up instead of its own status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtResult<T> {
    /// Completed normally.
    Done(T),
    /// `realtime_checkpoint` observed an abort; the caller must unwind.
    Aborted,
}

impl<T> RtResult<T> {
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
