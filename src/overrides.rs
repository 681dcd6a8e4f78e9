//! Override controller. Drains the override queue in two groups
//! (feed/rapid, spindle/coolant/spindle-stop) and applies each,
//! respecting which states permit it.

use crate::hal::{CoolantState, Planner, SpindleCoolantProbe};
use crate::plan_request::{SpindleSetpoint, SpindleState};
use crate::rt_event::{OverrideCommand, RtEventRegister};
use crate::settings::Settings;
use crate::state::machine::{Mode, SystemState};

const RAPID_MEDIUM_PCT: u8 = 50;
const RAPID_LOW_PCT: u8 = 25;

/// Drain and apply every pending override command. Returns the number of
/// commands applied (tests rely on this; callers don't need to).
///
/// Skipped entirely while `delay_overrides` is set — used by tool-change
/// and certain canned passes.
pub fn service<P: Planner, SP: SpindleCoolantProbe>(
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    planner: &mut P,
    spindle_coolant: &mut SP,
) -> usize {
    if state.sticky.delay_overrides {
        return 0;
    }

    let commands: heapless::Vec<OverrideCommand, { crate::consts::OVERRIDE_QUEUE_SIZE }> =
        reg.drain_overrides();

    for cmd in commands.iter().copied() {
        apply_one(cmd, state, settings, planner, spindle_coolant);
    }
    commands.len()
}

fn apply_one<P: Planner, SP: SpindleCoolantProbe>(
    cmd: OverrideCommand,
    state: &mut SystemState,
    settings: &Settings,
    planner: &mut P,
    spindle_coolant: &mut SP,
) {
    use OverrideCommand::*;
    match cmd {
        FeedCoarsePlus => bump_feed(state, settings.overrides.feed_coarse_increment as i16),
        FeedCoarseMinus => bump_feed(state, -(settings.overrides.feed_coarse_increment as i16)),
        FeedFinePlus => bump_feed(state, settings.overrides.feed_fine_increment as i16),
        FeedFineMinus => bump_feed(state, -(settings.overrides.feed_fine_increment as i16)),
        FeedReset => state.overrides.feed_pct = settings.overrides.feed_pct,
        RapidFull => state.overrides.rapid_pct = 100,
        RapidMedium => state.overrides.rapid_pct = RAPID_MEDIUM_PCT,
        RapidLow => state.overrides.rapid_pct = RAPID_LOW_PCT,
        SpindleCoarsePlus => bump_spindle(state, settings.overrides.spindle_coarse_increment as i16),
        SpindleCoarseMinus => {
            bump_spindle(state, -(settings.overrides.spindle_coarse_increment as i16))
        }
        SpindleFinePlus => bump_spindle(state, settings.overrides.spindle_fine_increment as i16),
        SpindleFineMinus => bump_spindle(state, -(settings.overrides.spindle_fine_increment as i16)),
        SpindleReset => state.overrides.spindle_pct = settings.overrides.spindle_pct,
        SpindleStopToggle => {
            // Two-phase toggle, permitted only in HOLD with spindle on.
            if state.mode == Mode::Hold && state.modal.spindle.state != SpindleState::Off {
                if !state.overrides.spindle_stop_initiated {
                    state.overrides.spindle_stop_initiated = true;
                    spindle_coolant.spindle_set_state(SpindleSetpoint::OFF);
                } else {
                    state.overrides.spindle_stop_initiated = false;
                    spindle_coolant.spindle_set_state(state.modal.spindle);
                }
            }
        }
        CoolantMistToggle => toggle_coolant(state, planner, spindle_coolant, true, false),
        CoolantFloodToggle => toggle_coolant(state, planner, spindle_coolant, false, true),
    }

    planner.feed_override(state.overrides.feed_pct, state.overrides.rapid_pct);
}

fn bump_feed(state: &mut SystemState, delta: i16) {
    let v = state.overrides.feed_pct as i16 + delta;
    state.overrides.feed_pct = v.clamp(10, 200) as u8;
}

fn bump_spindle(state: &mut SystemState, delta: i16) {
    let v = state.overrides.spindle_pct as i16 + delta;
    state.overrides.spindle_pct = v.clamp(10, 200) as u8;
}

fn toggle_coolant<P: Planner, SP: SpindleCoolantProbe>(
    state: &mut SystemState,
    planner: &mut P,
    spindle_coolant: &mut SP,
    mist: bool,
    flood: bool,
) {
    // Permitted only in IDLE/CYCLE/HOLD.
    if !matches!(state.mode, Mode::Idle | Mode::Cycle | Mode::Hold) {
        return;
    }
    let mut c = state.modal.coolant;
    if mist {
        c.mist = !c.mist;
    }
    if flood {
        c.flood = !c.flood;
    }
    state.modal.coolant = c;
    spindle_coolant.coolant_set_state(c);
    // Implicit planner sync on coolant change.
    planner.sync_position_from_steps();
}
