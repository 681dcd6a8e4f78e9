//! Canned-cycle engine. Drilling (plain, dwell, chip-break) and threading
//! (G76-style) cycles, expanded into straight-line and rapid moves through
//! the motion gateway.

use num_traits::float::Float;

use crate::hal::{Clock, Planner, SpindleCoolantProbe};
use crate::plan_request::{AxisValues, MotionClass, OverrideDisableFlags, PlanLineRequest, SpindleSetpoint};
use crate::rt_event::RtEventRegister;
use crate::settings::Settings;
use crate::state::machine::SystemState;
use crate::state::realtime_checkpoint;

use super::backlash::BacklashTracker;
use super::gateway::{self, LineOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Done,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetractMode {
    Previous,
    RPlane,
}

/// Drill cycle parameters (plain / dwell / chip-break).
pub struct DrillParams {
    pub plane_axes: (usize, usize),
    pub linear_axis: usize,
    pub retract_mode: RetractMode,
    pub r_plane: f32,
    pub final_depth: f32,
    pub peck_delta: f32,
    pub dwell_s: f32,
    pub spindle_off: bool,
    pub chip_break: bool,
    pub g73_retract: f32,
    pub hole_repeats: u32,
    pub xy_increment: (f32, f32),
    pub feed_rate: f32,
    pub line_number: u32,
}

/// Run a drill (G73/G81/G83-style) cycle starting from `current_position`.
#[allow(clippy::too_many_arguments)]
pub fn drill<P: Planner, SP: SpindleCoolantProbe, C: Clock>(
    current_position: AxisValues,
    hole_center: (f32, f32),
    params: &DrillParams,
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    backlash: &mut BacklashTracker,
    planner: &mut P,
    spindle_coolant: &mut SP,
    clock: &C,
) -> CycleOutcome {
    let (a, b) = params.plane_axes;
    let lin = params.linear_axis;
    let mut pos = current_position;
    let mut previous_linear = pos[lin];

    for hole in 0..params.hole_repeats.max(1) {
        if hole > 0 {
            let target_a = hole_center.0 + params.xy_increment.0 * hole as f32;
            let target_b = hole_center.1 + params.xy_increment.1 * hole as f32;
            pos[a] = target_a;
            pos[b] = target_b;
            pos[lin] = previous_linear;
            if rapid_to(pos, params, reg, state, settings, backlash, planner, spindle_coolant)
                == CycleOutcome::Aborted
            {
                return CycleOutcome::Aborted;
            }
        }

        // Pre-positioning: clear the R plane, move in-plane, drop to R.
        if pos[lin] < params.r_plane {
            pos[lin] = params.r_plane;
            if rapid_to(pos, params, reg, state, settings, backlash, planner, spindle_coolant)
                == CycleOutcome::Aborted
            {
                return CycleOutcome::Aborted;
            }
        }
        pos[a] = hole_center.0 + params.xy_increment.0 * hole as f32;
        pos[b] = hole_center.1 + params.xy_increment.1 * hole as f32;
        pos[lin] = pos[lin].max(params.r_plane);
        if rapid_to(pos, params, reg, state, settings, backlash, planner, spindle_coolant)
            == CycleOutcome::Aborted
        {
            return CycleOutcome::Aborted;
        }
        if pos[lin] > params.r_plane {
            pos[lin] = params.r_plane;
            if rapid_to(pos, params, reg, state, settings, backlash, planner, spindle_coolant)
                == CycleOutcome::Aborted
            {
                return CycleOutcome::Aborted;
            }
        }

        let mut depth = params.r_plane;
        loop {
            depth = (depth - params.peck_delta).max(params.final_depth);
            pos[lin] = depth;
            if feed_to(pos, params.feed_rate, params, reg, state, settings, backlash, planner, spindle_coolant)
                == CycleOutcome::Aborted
            {
                return CycleOutcome::Aborted;
            }

            if params.dwell_s > 0.0 && dwell(params.dwell_s, reg, state, settings, planner, clock) == CycleOutcome::Aborted
            {
                return CycleOutcome::Aborted;
            }
            if params.spindle_off {
                spindle_coolant.spindle_set_state(SpindleSetpoint::OFF);
            }

            let at_final = depth <= params.final_depth + crate::consts::ZERO_LENGTH_EPSILON;
            let retract_to = if params.chip_break && !at_final {
                (depth + params.g73_retract).min(params.r_plane)
            } else {
                params.r_plane
            };
            pos[lin] = retract_to;
            if rapid_to(pos, params, reg, state, settings, backlash, planner, spindle_coolant)
                == CycleOutcome::Aborted
            {
                return CycleOutcome::Aborted;
            }

            if at_final {
                break;
            }
        }

        previous_linear = previous_linear.max(params.r_plane);
        if params.retract_mode == RetractMode::Previous {
            pos[lin] = previous_linear;
            if rapid_to(pos, params, reg, state, settings, backlash, planner, spindle_coolant)
                == CycleOutcome::Aborted
            {
                return CycleOutcome::Aborted;
            }
        }
    }

    CycleOutcome::Done
}

#[allow(clippy::too_many_arguments)]
fn rapid_to<P: Planner, SP: SpindleCoolantProbe>(
    target: AxisValues,
    params: &DrillParams,
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    backlash: &mut BacklashTracker,
    planner: &mut P,
    spindle_coolant: &mut SP,
) -> CycleOutcome {
    let req = PlanLineRequest::rapid(target, params.line_number);
    push(req, reg, state, settings, backlash, planner, spindle_coolant)
}

#[allow(clippy::too_many_arguments)]
fn feed_to<P: Planner, SP: SpindleCoolantProbe>(
    target: AxisValues,
    feed_rate: f32,
    params: &DrillParams,
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    backlash: &mut BacklashTracker,
    planner: &mut P,
    spindle_coolant: &mut SP,
) -> CycleOutcome {
    let req = PlanLineRequest {
        target,
        feed_rate,
        inverse_time: false,
        motion_class: MotionClass::Feed,
        spindle: SpindleSetpoint::OFF,
        override_disable: OverrideDisableFlags::default(),
        line_number: params.line_number,
    };
    push(req, reg, state, settings, backlash, planner, spindle_coolant)
}

#[allow(clippy::too_many_arguments)]
fn push<P: Planner, SP: SpindleCoolantProbe>(
    req: PlanLineRequest,
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    backlash: &mut BacklashTracker,
    planner: &mut P,
    spindle_coolant: &mut SP,
) -> CycleOutcome {
    match gateway::line(req, reg, state, settings, backlash, planner, spindle_coolant) {
        LineOutcome::Aborted => CycleOutcome::Aborted,
        _ => CycleOutcome::Done,
    }
}

fn dwell<P: Planner, C: Clock>(
    seconds: f32,
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    planner: &mut P,
    clock: &C,
) -> CycleOutcome {
    let start = clock.now_s();
    while clock.now_s() - start < seconds {
        if realtime_checkpoint(reg, state, settings, planner.has_current_block()) {
            return CycleOutcome::Aborted;
        }
    }
    CycleOutcome::Done
}

/// End-taper configuration for a threading pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaperMode {
    None,
    Entry,
    Exit,
    Both,
}

pub struct ThreadParams {
    pub x_axis: usize,
    pub z_axis: usize,
    pub peak_x: f32,
    pub start_z: f32,
    pub final_z: f32,
    pub full_depth: f32,
    pub initial_depth: f32,
    pub degression: f32,
    pub spring_passes: u32,
    pub infeed_angle_rad: f32,
    pub taper_mode: TaperMode,
    pub taper_length: f32,
    pub cut_direction: f32, // +1.0 or -1.0 along X
    pub feed_rate: f32,
    pub line_number: u32,
}

/// Compute the ordered sequence of depth-of-cut values for each pass,
/// including spring passes.
pub fn thread_pass_depths(params: &ThreadParams) -> heapless::Vec<f32, 64> {
    let mut depths = heapless::Vec::new();
    let mut pass = 1u32;
    loop {
        let doc = params.initial_depth * (pass as f32).powf(1.0 / params.degression);
        if doc >= params.full_depth {
            let _ = depths.push(params.full_depth);
            break;
        }
        let _ = depths.push(doc);
        pass += 1;
        if depths.is_full() {
            break;
        }
    }
    for _ in 0..params.spring_passes {
        if depths.push(params.full_depth).is_err() {
            break;
        }
    }
    depths
}

/// Run a G76-style threading cycle.
#[allow(clippy::too_many_arguments)]
pub fn thread<P: Planner, SP: SpindleCoolantProbe>(
    current_position: AxisValues,
    params: &ThreadParams,
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    backlash: &mut BacklashTracker,
    planner: &mut P,
    spindle_coolant: &mut SP,
) -> CycleOutcome {
    // Tapers extend past the nominal start/end of the thread, ramping
    // linearly between the surface (zero depth) and full depth; they run
    // opposite the direction of travel so the thread widens out of the cut
    // rather than into it.
    let dz_dir: f32 = if params.final_z >= params.start_z { 1.0 } else { -1.0 };
    let has_entry_taper = matches!(params.taper_mode, TaperMode::Entry | TaperMode::Both);
    let has_exit_taper = matches!(params.taper_mode, TaperMode::Exit | TaperMode::Both);

    let depths = thread_pass_depths(params);
    let pos_x = current_position;

    for (idx, &doc) in depths.iter().enumerate() {
        let is_last = idx + 1 == depths.len();
        let doc = if is_last { params.full_depth } else { doc };

        let mut z_start = params.start_z;
        if params.infeed_angle_rad.abs() > f32::EPSILON {
            z_start += doc * params.infeed_angle_rad.tan();
        }
        let taper_entry_z = if has_entry_taper {
            z_start - dz_dir * params.taper_length
        } else {
            z_start
        };
        let taper_exit_z = if has_exit_taper {
            params.final_z + dz_dir * params.taper_length
        } else {
            params.final_z
        };

        // Rapid to where the pass starts: the surface if there's an entry
        // taper to ramp down through, full depth otherwise.
        let mut entry = pos_x;
        entry[params.x_axis] = if has_entry_taper {
            params.peak_x
        } else {
            params.peak_x + doc * params.cut_direction
        };
        entry[params.z_axis] = taper_entry_z;
        if rapid(entry, params, reg, state, settings, backlash, planner, spindle_coolant) == CycleOutcome::Aborted {
            return CycleOutcome::Aborted;
        }

        // Bracket the synchronized cut: on just before, off immediately after.
        let mut cut_request = PlanLineRequest {
            target: entry,
            feed_rate: params.feed_rate,
            inverse_time: false,
            motion_class: MotionClass::SpindleSynchronized,
            spindle: SpindleSetpoint::OFF,
            override_disable: OverrideDisableFlags {
                no_feed_override: true,
                feed_hold_disable: true,
            },
            line_number: params.line_number,
        };

        if has_entry_taper {
            let mut taper_in = entry;
            taper_in[params.x_axis] = params.peak_x + doc * params.cut_direction;
            taper_in[params.z_axis] = z_start;
            cut_request.target = taper_in;
            if gateway::line(cut_request, reg, state, settings, backlash, planner, spindle_coolant)
                == LineOutcome::Aborted
            {
                return CycleOutcome::Aborted;
            }
        }

        let mut main_cut_end = entry;
        main_cut_end[params.x_axis] = params.peak_x + doc * params.cut_direction;
        main_cut_end[params.z_axis] = params.final_z;
        cut_request.target = main_cut_end;
        if gateway::line(cut_request, reg, state, settings, backlash, planner, spindle_coolant) == LineOutcome::Aborted
        {
            return CycleOutcome::Aborted;
        }

        let mut target = main_cut_end;
        if has_exit_taper {
            let mut taper_out = main_cut_end;
            taper_out[params.x_axis] = params.peak_x;
            taper_out[params.z_axis] = taper_exit_z;
            cut_request.target = taper_out;
            if gateway::line(cut_request, reg, state, settings, backlash, planner, spindle_coolant)
                == LineOutcome::Aborted
            {
                return CycleOutcome::Aborted;
            }
            target = taper_out;
        }

        let mut retract = target;
        retract[params.x_axis] = params.peak_x;
        if rapid(retract, params, reg, state, settings, backlash, planner, spindle_coolant) == CycleOutcome::Aborted {
            return CycleOutcome::Aborted;
        }

        let mut back_to_start = retract;
        back_to_start[params.z_axis] = params.start_z;
        if rapid(back_to_start, params, reg, state, settings, backlash, planner, spindle_coolant)
            == CycleOutcome::Aborted
        {
            return CycleOutcome::Aborted;
        }
    }

    #[cfg(feature = "defmt-log")]
    defmt::debug!("threading cycle complete, {} passes", depths.len());
    CycleOutcome::Done
}

#[allow(clippy::too_many_arguments)]
fn rapid<P: Planner, SP: SpindleCoolantProbe>(
    target: AxisValues,
    params: &ThreadParams,
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    backlash: &mut BacklashTracker,
    planner: &mut P,
    spindle_coolant: &mut SP,
) -> CycleOutcome {
    let req = PlanLineRequest::rapid(target, params.line_number);
    match gateway::line(req, reg, state, settings, backlash, planner, spindle_coolant) {
        LineOutcome::Aborted => CycleOutcome::Aborted,
        _ => CycleOutcome::Done,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::CoolantState;
    use crate::plan_request::SpindleSetpoint as Setpoint;
    use crate::rt_event::RtEventRegister;
    use crate::settings::Settings;

    struct RecordingPlanner {
        pushed: heapless::Vec<PlanLineRequest, 32>,
    }
    impl Planner for RecordingPlanner {
        fn push(&mut self, r: &PlanLineRequest) -> bool {
            let _ = self.pushed.push(*r);
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

    struct NoopSpindleCoolant;
    impl SpindleCoolantProbe for NoopSpindleCoolant {
        fn spindle_set_state(&mut self, _s: Setpoint) {}
        fn coolant_set_state(&mut self, _s: CoolantState) {}
        fn probe_configure_invert_mask(&mut self, _i: bool) {}
        fn probe_get_state(&self) -> bool {
            false
        }
    }

    fn taper_params(taper_mode: TaperMode) -> ThreadParams {
        ThreadParams {
            x_axis: 0,
            z_axis: 2,
            peak_x: 0.0,
            start_z: 0.0,
            final_z: -10.0,
            full_depth: 1.0,
            initial_depth: 1.0,
            degression: 1.0,
            spring_passes: 0,
            infeed_angle_rad: 0.0,
            taper_mode,
            taper_length: 2.0,
            cut_direction: -1.0,
            feed_rate: 100.0,
            line_number: 1,
        }
    }

    fn run_thread(taper_mode: TaperMode) -> heapless::Vec<PlanLineRequest, 32> {
        let settings = Settings::default();
        let reg = RtEventRegister::new();
        let mut state = SystemState::new(&settings);
        let mut backlash = BacklashTracker::new(&settings, [0.0; crate::consts::MAX_AXES]);
        let mut planner = RecordingPlanner { pushed: heapless::Vec::new() };
        let mut spindle = NoopSpindleCoolant;
        let params = taper_params(taper_mode);
        let outcome = thread(
            [0.0; crate::consts::MAX_AXES],
            &params,
            &reg,
            &mut state,
            &settings,
            &mut backlash,
            &mut planner,
            &mut spindle,
        );
        assert_eq!(outcome, CycleOutcome::Done);
        planner.pushed
    }

    fn synchronized_targets(pushed: &[PlanLineRequest]) -> heapless::Vec<AxisValues, 32> {
        let mut out = heapless::Vec::new();
        for r in pushed {
            if r.motion_class == MotionClass::SpindleSynchronized {
                let _ = out.push(r.target);
            }
        }
        out
    }

    #[test]
    fn no_taper_cuts_straight_to_full_depth() {
        let pushed = run_thread(TaperMode::None);
        let cuts = synchronized_targets(&pushed);
        // One synchronized segment per pass: straight to full depth, no ramp.
        assert_eq!(cuts.len(), 1);
        assert!((cuts[0][0] - (-1.0)).abs() < 1e-6);
        assert!((cuts[0][2] - (-10.0)).abs() < 1e-6);
    }

    #[test]
    fn entry_taper_ramps_from_surface_before_the_main_cut() {
        let pushed = run_thread(TaperMode::Entry);
        let cuts = synchronized_targets(&pushed);
        // Ramp segment to full depth at start_z, then the main cut to final_z.
        assert_eq!(cuts.len(), 2);
        assert!((cuts[0][0] - (-1.0)).abs() < 1e-6);
        assert!((cuts[0][2] - 0.0).abs() < 1e-6);
        assert!((cuts[1][2] - (-10.0)).abs() < 1e-6);
    }

    #[test]
    fn exit_taper_ramps_back_to_the_surface_past_final_z() {
        let pushed = run_thread(TaperMode::Exit);
        let cuts = synchronized_targets(&pushed);
        assert_eq!(cuts.len(), 2);
        // Main cut to final_z at full depth, then a ramp back to the
        // surface past final_z by the taper length.
        assert!((cuts[0][2] - (-10.0)).abs() < 1e-6);
        assert!((cuts[1][0] - 0.0).abs() < 1e-6);
        assert!((cuts[1][2] - (-12.0)).abs() < 1e-6);
    }

    #[test]
    fn both_tapers_differ_in_emitted_path_from_no_taper() {
        let no_taper = synchronized_targets(&run_thread(TaperMode::None));
        let both = synchronized_targets(&run_thread(TaperMode::Both));
        assert_eq!(no_taper.len(), 1);
        assert_eq!(both.len(), 3);
        assert_ne!(both[0], no_taper[0]);
    }

    #[test]
    fn s6_thread_pass_depths_sequence() {
        let params = ThreadParams {
            x_axis: 0,
            z_axis: 2,
            peak_x: 0.0,
            start_z: 0.0,
            final_z: -10.0,
            full_depth: 1.0,
            initial_depth: 0.2,
            degression: 2.0,
            spring_passes: 2,
            infeed_angle_rad: 0.0,
            taper_mode: TaperMode::None,
            taper_length: 0.0,
            cut_direction: 1.0,
            feed_rate: 100.0,
            line_number: 1,
        };
        let depths = thread_pass_depths(&params);
        // 0.2, 0.2*2^0.5=0.283, 0.2*3^0.5=0.346, 0.2*4^0.5=0.4, ... until >=1.0,
        // then the full-depth pass, then two spring passes at full depth.
        assert!((depths[0] - 0.2).abs() < 1e-3);
        assert!((depths[1] - 0.2828).abs() < 1e-3);
        assert!((depths[2] - 0.3464).abs() < 1e-3);
        assert!((depths[3] - 0.4).abs() < 1e-3);
        let last_three = &depths[depths.len() - 3..];
        for d in last_three {
            assert!((d - 1.0).abs() < 1e-6);
        }
    }
}
