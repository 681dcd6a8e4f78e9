//! Motion gateway `line`. The single funnel every straight line passes
//! through: soft-limit check, backlash insertion, backpressure against the
//! planner, dispatch.

use crate::hal::{Planner, SpindleCoolantProbe};
use crate::plan_request::{MotionClass, PlanLineRequest, SpindleState};
use crate::rt_event::RtEventRegister;
use crate::settings::Settings;
use crate::state::machine::{Mode, SystemState};
use crate::state::realtime_checkpoint;
use crate::status::AlarmCode;

use super::backlash::BacklashTracker;

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// The line (and, if needed, its backlash precursor) was pushed.
    Pushed,
    /// Laser-mode zero-length coalesce: the planner rejected the move but
    /// the spindle setpoint was applied synchronously.
    CoalescedSpindleOnly,
    /// Soft-limit violation; a `SoftLimit` alarm was posted.
    RejectedSoftLimit,
    /// `CHECK_MODE`: validated, never pushed.
    CheckModeNoOp,
    /// A realtime checkpoint observed an abort mid-wait.
    Aborted,
}

/// Run the motion gateway for one straight-line request.
#[allow(clippy::too_many_arguments)]
pub fn line<P: Planner, SP: SpindleCoolantProbe>(
    request: PlanLineRequest,
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    backlash: &mut BacklashTracker,
    planner: &mut P,
    spindle_coolant: &mut SP,
) -> LineOutcome {
    let is_jog = request.motion_class == MotionClass::Jog;

    if !is_jog && settings.soft_limits_enabled {
        for i in 0..settings.axis_count {
            if request.target[i] > settings.travel_max[i] || request.target[i] < settings.travel_min[i]
            {
                reg.set_alarm(AlarmCode::SoftLimit);
                state.enter_alarm(AlarmCode::SoftLimit);
                return LineOutcome::RejectedSoftLimit;
            }
        }
    }

    if state.mode == Mode::CheckMode {
        return LineOutcome::CheckModeNoOp;
    }

    if realtime_checkpoint(reg, state, settings, planner.has_current_block()) {
        return LineOutcome::Aborted;
    }

    if backlash.enabled_mask() != 0 {
        if let Some(shadow) = backlash.compensate(request.target, settings) {
            let mut shadow_request = PlanLineRequest::rapid(shadow, request.line_number);
            shadow_request.motion_class = MotionClass::Backlash;
            if wait_for_buffer_space(reg, state, settings, planner) {
                return LineOutcome::Aborted;
            }
            planner.push(&shadow_request);
        }
    }

    if wait_for_buffer_space(reg, state, settings, planner) {
        return LineOutcome::Aborted;
    }

    if !planner.push(&request) {
        if settings.laser_mode && request.spindle.state == SpindleState::Cw {
            spindle_coolant.spindle_set_state(request.spindle);
            return LineOutcome::CoalescedSpindleOnly;
        }
    }

    LineOutcome::Pushed
}

/// While the buffer is full, kick auto-cycle-start and drain the realtime
/// event register; bail with `true` (aborted) if a checkpoint observes it.
fn wait_for_buffer_space<P: Planner>(
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    planner: &mut P,
) -> bool {
    while planner.is_full() {
        crate::state::auto_cycle_start(state, planner);
        if realtime_checkpoint(reg, state, settings, planner.has_current_block()) {
            return true;
        }
    }
    false
}
