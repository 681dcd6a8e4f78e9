//! The system state machine, plus the realtime checkpoint and suspend
//! loop that the rest of the crate suspends at.

pub mod machine;

use crate::hal::{CoolantState, ControlPin, Planner, SpindleCoolantProbe, Stepper};
use crate::overrides;
use crate::plan_request::SpindleSetpoint;
use crate::rt_event::RtEventRegister;
use crate::settings::Settings;
use machine::{Mode, SystemState};

/// Drain the realtime event register and progress the state machine. The only legal suspension point in the crate
/// (GLOSSARY): every busy-wait calls this between iterations so a reset
/// observed here unwinds the call stack. Returns `true` if the caller must
/// abort.
pub fn realtime_checkpoint(
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    planner_has_block: bool,
) -> bool {
    let _ = settings;
    let drained = reg.clear_state_flags();
    let alarm_bits = reg.clear_alarm();
    state.apply(&drained, alarm_bits, planner_has_block);
    state.sticky.abort
}

/// HAL-level teardown for a reset or motion-cancel that `realtime_checkpoint` has
/// already observed (`state.sticky.reset_pending` / `state.sticky.cancel`). Called
/// once by the protocol loop, the one place every HAL collaborator is in scope at
/// the same time — every nested busy-wait only ever sees the cheap `bool` from
/// `realtime_checkpoint` and unwinds without touching hardware itself.
pub fn service_realtime_teardown<P: Planner, S: Stepper, SP: SpindleCoolantProbe>(
    state: &mut SystemState,
    settings: &Settings,
    planner: &mut P,
    stepper: &mut S,
    spindle_coolant: &mut SP,
) {
    if state.sticky.reset_pending {
        state.sticky.reset_pending = false;
        spindle_coolant.spindle_set_state(SpindleSetpoint::OFF);
        spindle_coolant.coolant_set_state(CoolantState { mist: false, flood: false });
        stepper.go_idle();
        stepper.reset_segment_buffer();
        planner.reset();
        planner.sync_position_from_steps();
        let e_stop_latched = state.mode == Mode::EStop;
        state.reset_complete(e_stop_latched);
    }

    if state.sticky.cancel {
        state.sticky.cancel = false;
        spindle_coolant.spindle_set_state(SpindleSetpoint::OFF);
        spindle_coolant.coolant_set_state(CoolantState { mist: false, flood: false });
        planner.reset();
        stepper.reset_segment_buffer();
        stepper.go_idle();
        planner.sync_position_from_steps();
        state.overrides.feed_pct = settings.overrides.feed_pct;
        state.overrides.rapid_pct = settings.overrides.rapid_pct;
        state.overrides.spindle_pct = settings.overrides.spindle_pct;
        planner.feed_override(state.overrides.feed_pct, state.overrides.rapid_pct);
    }
}

/// Shared by the motion gateway's backpressure loop and the protocol loop's main loop: promote IDLE to
/// CYCLE whenever a block is ready and nothing else has claimed the mode.
pub fn auto_cycle_start<P: Planner>(state: &mut SystemState, planner: &P) {
    if state.mode == Mode::Idle && planner.has_current_block() {
        state.mode = Mode::Cycle;
    }
}

/// Run the state machine's suspend loop: while `suspend` holds, repeatedly
/// service overrides, poll for the safety door closing (which re-arms
/// cycle-start by falling back to HOLD), poll the sleep timer, and drain
/// the realtime event register. Returns `true` if aborted.
///
/// `sleep_elapsed_s` is the wall-clock time since the previous call to this
/// function, supplied by the caller: the HAL owns the clock, and dwell
/// and other timeouts go through it as a monotonic wall clock.
#[allow(clippy::too_many_arguments)]
pub fn run_suspend_loop<P: Planner, SP: SpindleCoolantProbe, CP: ControlPin>(
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    planner: &mut P,
    spindle_coolant: &mut SP,
    control_pin: &CP,
    sleep_elapsed_s: f32,
) -> bool {
    state.suspend = true;
    let mut elapsed = 0.0f32;

    loop {
        if realtime_checkpoint(reg, state, settings, planner.has_current_block()) {
            state.suspend = false;
            return true;
        }

        overrides::service(reg, state, settings, planner, spindle_coolant);

        if state.mode == Mode::SafetyDoor && !control_pin.get_control_state().safety_door {
            // Door closed: re-arm cycle-start by falling back to HOLD.
            state.mode = Mode::Hold;
        }

        if settings.sleep_enable && matches!(state.mode, Mode::Idle | Mode::Hold) {
            elapsed += sleep_elapsed_s;
            if elapsed >= settings.sleep_timeout_s {
                state.mode = Mode::Sleep;
            }
        }

        if !matches!(state.mode, Mode::Hold | Mode::SafetyDoor | Mode::Sleep) {
            break;
        }
    }

    state.suspend = false;
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{ControlPinState, CoolantState};
    use crate::plan_request::{PlanLineRequest, SpindleSetpoint};

    struct MockPlanner;
    impl Planner for MockPlanner {
        fn push(&mut self, _r: &PlanLineRequest) -> bool {
            true
        }
        fn is_full(&self) -> bool {
            false
        }
        fn has_current_block(&self) -> bool {
            true
        }
        fn reset(&mut self) {}
        fn sync_position_from_steps(&mut self) {}
        fn feed_override(&mut self, _f: u8, _r: u8) {}
    }
    struct MockSpindleCoolant;
    impl SpindleCoolantProbe for MockSpindleCoolant {
        fn spindle_set_state(&mut self, _s: SpindleSetpoint) {}
        fn coolant_set_state(&mut self, _s: CoolantState) {}
        fn probe_configure_invert_mask(&mut self, _i: bool) {}
        fn probe_get_state(&self) -> bool {
            false
        }
    }
    struct MockControlPin {
        door_open: bool,
    }
    impl ControlPin for MockControlPin {
        fn get_control_state(&self) -> ControlPinState {
            ControlPinState {
                safety_door: self.door_open,
                ..ControlPinState::default()
            }
        }
    }

    #[derive(Default)]
    struct RecordingStepper {
        go_idle_calls: u32,
        reset_segment_buffer_calls: u32,
    }
    impl Stepper for RecordingStepper {
        fn prep_buffer(&mut self) {}
        fn wake_up(&mut self) {}
        fn go_idle(&mut self) {
            self.go_idle_calls += 1;
        }
        fn reset_segment_buffer(&mut self) {
            self.reset_segment_buffer_calls += 1;
        }
        fn parking_setup_buffer(&mut self) {}
        fn limits_enable(&mut self, _hard: bool, _probe_mode: bool) {}
        fn limits_get_state(&self) -> u32 {
            0
        }
        fn step_position(&self) -> crate::plan_request::AxisValues {
            [0.0; crate::consts::MAX_AXES]
        }
    }

    #[derive(Default)]
    struct RecordingPlanner {
        reset_calls: u32,
        synced: u32,
    }
    impl Planner for RecordingPlanner {
        fn push(&mut self, _r: &PlanLineRequest) -> bool {
            true
        }
        fn is_full(&self) -> bool {
            false
        }
        fn has_current_block(&self) -> bool {
            false
        }
        fn reset(&mut self) {
            self.reset_calls += 1;
        }
        fn sync_position_from_steps(&mut self) {
            self.synced += 1;
        }
        fn feed_override(&mut self, _f: u8, _r: u8) {}
    }

    #[derive(Default)]
    struct RecordingSpindleCoolant {
        spindle_off_calls: u32,
    }
    impl SpindleCoolantProbe for RecordingSpindleCoolant {
        fn spindle_set_state(&mut self, s: SpindleSetpoint) {
            if s == SpindleSetpoint::OFF {
                self.spindle_off_calls += 1;
            }
        }
        fn coolant_set_state(&mut self, _s: CoolantState) {}
        fn probe_configure_invert_mask(&mut self, _i: bool) {}
        fn probe_get_state(&self) -> bool {
            false
        }
    }

    #[test]
    fn reset_teardown_kills_outputs_and_re_idles() {
        let settings = Settings::default();
        let reg = RtEventRegister::new();
        let mut state = SystemState::new(&settings);
        reg.set_state_flag(crate::rt_event::StateFlag::Reset);
        assert!(realtime_checkpoint(&reg, &mut state, &settings, false));
        assert!(state.sticky.reset_pending);

        let mut planner = RecordingPlanner::default();
        let mut stepper = RecordingStepper::default();
        let mut spindle = RecordingSpindleCoolant::default();
        service_realtime_teardown(&mut state, &settings, &mut planner, &mut stepper, &mut spindle);

        assert!(!state.sticky.reset_pending);
        assert_eq!(state.mode, Mode::Idle);
        assert_eq!(planner.reset_calls, 1);
        assert_eq!(stepper.go_idle_calls, 1);
        assert_eq!(spindle.spindle_off_calls, 1);
    }

    #[test]
    fn stop_teardown_reverts_overrides_and_reidles_without_touching_reset_pending() {
        let mut settings = Settings::default();
        settings.overrides.feed_pct = 100;
        let reg = RtEventRegister::new();
        let mut state = SystemState::new(&settings);
        state.mode = Mode::Cycle;
        state.overrides.feed_pct = 40;
        reg.set_state_flag(crate::rt_event::StateFlag::MotionCancel);
        // Motion-cancel reverts to IDLE in the same pass rather than
        // latching an abort: busy-waits that check `state.mode` unwind on
        // their own, so the checkpoint itself reports no abort here.
        assert!(!realtime_checkpoint(&reg, &mut state, &settings, true));
        assert!(state.sticky.cancel);
        assert_eq!(state.mode, Mode::Idle);

        let mut planner = RecordingPlanner::default();
        let mut stepper = RecordingStepper::default();
        let mut spindle = RecordingSpindleCoolant::default();
        service_realtime_teardown(&mut state, &settings, &mut planner, &mut stepper, &mut spindle);

        assert!(!state.sticky.cancel);
        assert!(!state.sticky.reset_pending);
        assert_eq!(state.mode, Mode::Idle);
        assert_eq!(state.overrides.feed_pct, 100);
        assert_eq!(planner.reset_calls, 1);
    }

    #[test]
    fn suspend_loop_exits_when_door_closes() {
        let settings = Settings::default();
        let reg = RtEventRegister::new();
        let mut state = SystemState::new(&settings);
        state.mode = Mode::SafetyDoor;
        let mut planner = MockPlanner;
        let mut spindle = MockSpindleCoolant;
        let pin = MockControlPin { door_open: false };

        let aborted = run_suspend_loop(&reg, &mut state, &settings, &mut planner, &mut spindle, &pin, 0.0);
        assert!(!aborted);
        assert_eq!(state.mode, Mode::Hold);
        assert!(!state.suspend);
    }

    #[test]
    fn suspend_loop_sleeps_after_timeout() {
        let mut settings = Settings::default();
        settings.sleep_enable = true;
        settings.sleep_timeout_s = 1.0;
        let reg = RtEventRegister::new();
        let mut state = SystemState::new(&settings);
        state.mode = Mode::Hold;
        let mut planner = MockPlanner;
        let mut spindle = MockSpindleCoolant;
        let pin = MockControlPin { door_open: false };

        // First call: 0.5s elapsed, not yet timed out, stays suspended...
        // but since mode stays Hold and nothing else changes it, the loop
        // itself advances `elapsed` across iterations until it trips.
        let aborted = run_suspend_loop(&reg, &mut state, &settings, &mut planner, &mut spindle, &pin, 1.5);
        assert!(!aborted);
        assert_eq!(state.mode, Mode::Sleep);
    }

    #[test]
    fn realtime_checkpoint_reports_abort() {
        let settings = Settings::default();
        let reg = RtEventRegister::new();
        let mut state = SystemState::new(&settings);
        reg.set_state_flag(crate::rt_event::StateFlag::Reset);
        assert!(realtime_checkpoint(&reg, &mut state, &settings, false));
        assert!(state.sticky.abort);
    }
}
