//! Probing driver. One-shot probing motion with probe-pin state
//! monitoring, failure taxonomy, and buffer flush.

use crate::hal::{Planner, SpindleCoolantProbe, Stepper};
use crate::plan_request::{AxisValues, MotionClass, OverrideDisableFlags, PlanLineRequest, SpindleSetpoint};
use crate::rt_event::{RtEventRegister, StateFlag};
use crate::settings::Settings;
use crate::state::machine::{Mode, SystemState};
use crate::state::realtime_checkpoint;
use crate::status::AlarmCode;

use crate::motion::backlash::BacklashTracker;
use crate::motion::gateway::{self, LineOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found,
    FailInit,
    FailEnd,
    CheckMode,
    Abort,
}

/// Run one probing motion toward `target`. `no_error` mirrors the
/// G38.3/G38.5 distinction: when set, motion
/// completing without contact snapshots position instead of alarming.
#[allow(clippy::too_many_arguments)]
pub fn probe<P: Planner, SP: SpindleCoolantProbe, ST: Stepper>(
    target: AxisValues,
    feed_rate: f32,
    no_error: bool,
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    backlash: &mut BacklashTracker,
    planner: &mut P,
    spindle_coolant: &mut SP,
    stepper: &mut ST,
) -> ProbeOutcome {
    if state.mode == Mode::CheckMode {
        return ProbeOutcome::CheckMode;
    }

    if spindle_coolant.probe_get_state() {
        reg.set_alarm(AlarmCode::ProbeFailInitial);
        state.enter_alarm(AlarmCode::ProbeFailInitial);
        return ProbeOutcome::FailInit;
    }

    state.sticky.probe_succeeded = false;

    let req = PlanLineRequest {
        target,
        feed_rate,
        inverse_time: false,
        motion_class: MotionClass::Feed,
        spindle: SpindleSetpoint::OFF,
        override_disable: OverrideDisableFlags::default(),
        line_number: 0,
    };
    if gateway::line(req, reg, state, settings, backlash, planner, spindle_coolant) == LineOutcome::Aborted {
        return ProbeOutcome::Abort;
    }
    reg.set_state_flag(StateFlag::CycleStart);

    loop {
        if realtime_checkpoint(reg, state, settings, planner.has_current_block()) {
            flush(planner, stepper);
            return ProbeOutcome::Abort;
        }
        if spindle_coolant.probe_get_state() {
            state.probe_position = stepper.step_position();
            state.sticky.probe_succeeded = true;
            stepper.go_idle();
            break;
        }
        if state.mode == Mode::Idle {
            break;
        }
    }

    flush(planner, stepper);

    if state.sticky.probe_succeeded {
        #[cfg(feature = "defmt-log")]
        defmt::debug!("probe contact made, position latched");
        ProbeOutcome::Found
    } else if no_error {
        state.probe_position = stepper.step_position();
        #[cfg(feature = "defmt-log")]
        defmt::debug!("probe motion completed without contact, no_error set");
        ProbeOutcome::FailEnd
    } else {
        reg.set_alarm(AlarmCode::ProbeFailContact);
        state.enter_alarm(AlarmCode::ProbeFailContact);
        ProbeOutcome::FailEnd
    }
}

fn flush<P: Planner, ST: Stepper>(planner: &mut P, stepper: &mut ST) {
    stepper.reset_segment_buffer();
    planner.reset();
    planner.sync_position_from_steps();
}
