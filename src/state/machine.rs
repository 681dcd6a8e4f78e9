//! System state machine. Owns `Mode`, the sticky flags, and the
//! transitions driven by realtime events plus motion completion.

use crate::consts::MAX_AXES;
use crate::plan_request::AxisValues;
use crate::rt_event::{DrainedState, StateFlag};
use crate::status::AlarmCode;

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Cycle,
    Hold,
    SafetyDoor,
    Homing,
    Jog,
    CheckMode,
    Alarm,
    EStop,
    Sleep,
    ToolChange,
}

impl Mode {
    /// These three modes reject every motion request outright.
    pub const fn gclocks_motion(self) -> bool {
        matches!(self, Self::Alarm | Self::EStop | Self::Sleep)
    }
}

/// Modal g-code snapshot carried alongside the state. The g-code
/// parser (out of scope) owns the full modal group set; the core only
/// needs these fields to arbitrate overrides and coolant/spindle services.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModalSnapshot {
    pub spindle: crate::plan_request::SpindleSetpoint,
    pub coolant: crate::hal::CoolantState,
    pub distance_mode_absolute: bool,
    pub override_control_enabled: bool,
}

impl ModalSnapshot {
    pub fn new() -> Self {
        Self {
            spindle: crate::plan_request::SpindleSetpoint::OFF,
            coolant: crate::hal::CoolantState {
                mist: false,
                flood: false,
            },
            distance_mode_absolute: true,
            override_control_enabled: true,
        }
    }
}

/// Sticky flags that persist across realtime-event drains.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StickyFlags {
    pub abort: bool,
    /// Set for one drain pass when `EXEC_STOP` (`MotionCancel`) was
    /// observed; consumed by the HAL-level teardown that follows.
    pub cancel: bool,
    pub exit: bool,
    pub probe_succeeded: bool,
    pub block_delete_enabled: bool,
    pub feed_hold_pending: bool,
    pub delay_overrides: bool,
    /// Set for one drain pass when `EXEC_RESET` was observed; consumed by
    /// the HAL-level teardown that follows, same shape as `cancel`.
    pub reset_pending: bool,
}

/// Override values. Feed/rapid/spindle are all percentages.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideValues {
    pub feed_pct: u8,
    pub rapid_pct: u8,
    pub spindle_pct: u8,
    pub spindle_stop_initiated: bool,
}

/// The whole process-wide state record.
pub struct SystemState {
    pub mode: Mode,
    pub sticky: StickyFlags,
    pub suspend: bool,
    pub overrides: OverrideValues,
    pub modal: ModalSnapshot,
    pub homed_mask: u32,
    pub last_step_position: AxisValues,
    pub probe_position: AxisValues,
    pub pending_status_report: bool,
    execute_sys_motion: bool,
}

impl SystemState {
    pub fn new(settings: &crate::settings::Settings) -> Self {
        Self {
            mode: Mode::Idle,
            sticky: StickyFlags::default(),
            suspend: false,
            overrides: OverrideValues {
                feed_pct: settings.overrides.feed_pct,
                rapid_pct: settings.overrides.rapid_pct,
                spindle_pct: settings.overrides.spindle_pct,
                spindle_stop_initiated: false,
            },
            modal: ModalSnapshot::new(),
            homed_mask: 0,
            last_step_position: [0.0; MAX_AXES],
            probe_position: [0.0; MAX_AXES],
            pending_status_report: false,
            execute_sys_motion: false,
        }
    }

    /// Invariant: `homed.mask ⊆ settings.homing.enabled.mask`.
    pub fn mark_homed(&mut self, axis_mask: u32, settings: &crate::settings::Settings) {
        self.homed_mask |= axis_mask & settings.homing.enabled_mask;
    }

    pub fn execute_sys_motion(&self) -> bool {
        self.execute_sys_motion
    }

    pub fn begin_sys_motion(&mut self) {
        self.execute_sys_motion = true;
    }

    pub fn end_sys_motion(&mut self) {
        self.execute_sys_motion = false;
    }

    /// Set the mode to ALARM or ESTOP as required by posting `code`.
    /// Invariant: after any path that sets `abort = true`, the state
    /// becomes ALARM or ESTOP before control returns to the main loop.
    pub fn enter_alarm(&mut self, code: AlarmCode) {
        self.sticky.abort = true;
        self.mode = if code == AlarmCode::EStop {
            Mode::EStop
        } else {
            Mode::Alarm
        };
        #[cfg(feature = "defmt-log")]
        defmt::warn!("alarm posted: {}", code);
    }

    /// Drive the state machine from one drained realtime snapshot plus any
    /// alarm bits observed alongside it. `planner_has_block` lets IDLE
    /// transition into CYCLE. Returns the alarm, if any, that forced the
    /// transition (for logging by the caller).
    pub fn apply(&mut self, drained: &DrainedState, alarm_bits: u32, planner_has_block: bool) {
        // EXEC_RESET wins over everything else observed in the same pass.
        if drained.test(StateFlag::Reset) {
            self.reset_enter();
            self.sticky.reset_pending = true;
            return;
        }

        if alarm_bits != 0 {
            // SLEEP is modelled as ALARM for safety.
            if alarm_bits & (1 << (u8::from(AlarmCode::EStop) as u32)) != 0 {
                self.mode = Mode::EStop;
            } else if self.mode != Mode::EStop {
                self.mode = Mode::Alarm;
            }
            self.sticky.abort = true;
            return;
        }

        if drained.test(StateFlag::SafetyDoor) {
            if self.mode != Mode::Alarm && self.mode != Mode::EStop {
                self.mode = Mode::SafetyDoor;
            }
            return;
        }

        // EXEC_STOP: cancel whatever's running and fall straight back to
        // IDLE, without the latch a genuine alarm would impose.
        if drained.test(StateFlag::MotionCancel) {
            self.sticky.cancel = true;
            self.sticky.feed_hold_pending = false;
            self.overrides.spindle_stop_initiated = false;
            self.modal.spindle = crate::plan_request::SpindleSetpoint::OFF;
            self.modal.coolant = crate::hal::CoolantState {
                mist: false,
                flood: false,
            };
            self.execute_sys_motion = false;
            if self.mode != Mode::Alarm && self.mode != Mode::EStop {
                self.mode = Mode::Idle;
            }
            #[cfg(feature = "defmt-log")]
            defmt::debug!("motion cancel observed, reverting to idle");
            return;
        }

        match self.mode {
            Mode::Idle | Mode::ToolChange => {
                if drained.test(StateFlag::CycleStart) && planner_has_block {
                    self.mode = Mode::Cycle;
                }
            }
            Mode::Cycle => {
                if drained.test(StateFlag::FeedHold) {
                    self.mode = Mode::Hold;
                }
            }
            Mode::Hold => {
                if drained.test(StateFlag::CycleStart) {
                    self.mode = Mode::Cycle;
                } else if self.sticky.feed_hold_pending {
                    // A cycle-start that arrived before the hold took full
                    // effect cancels the pending hold.
                    self.sticky.feed_hold_pending = false;
                }
            }
            Mode::Jog => {
                if drained.test(StateFlag::JogCancel) {
                    self.mode = Mode::Idle;
                }
            }
            _ => {}
        }

        if drained.test(StateFlag::StatusReport) {
            self.pending_status_report = true;
        }

        if drained.test(StateFlag::Exit) {
            self.sticky.exit = true;
        }
    }

    /// On `EXEC_RESET`: kill outputs, suspend input, and post
    /// the right alarm depending on what was running when reset hit.
    pub fn reset_enter(&mut self) -> Option<AlarmCode> {
        let code = match self.mode {
            Mode::Cycle | Mode::Jog => Some(AlarmCode::AbortCycle),
            Mode::Homing => Some(AlarmCode::HomingFailReset),
            _ if self.execute_sys_motion => Some(AlarmCode::AbortCycle),
            _ => None,
        };
        self.execute_sys_motion = false;
        if let Some(code) = code {
            self.enter_alarm(code);
        } else if self.mode != Mode::EStop {
            self.mode = Mode::Alarm;
            self.sticky.abort = true;
            #[cfg(feature = "defmt-log")]
            defmt::debug!("reset observed with nothing to cancel");
        }
        code
    }

    /// After reset completes the main loop re-enters IDLE,
    /// unless e-stop is still asserted.
    pub fn reset_complete(&mut self, e_stop_asserted: bool) {
        self.sticky = StickyFlags::default();
        self.execute_sys_motion = false;
        self.mode = if e_stop_asserted { Mode::EStop } else { Mode::Idle };
    }
}
