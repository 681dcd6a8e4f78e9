//! Arc decomposer. Chord-tolerance segmentation of circular arcs with
//! incremental rotation and periodic exact re-anchoring.

use num_traits::float::Float;

use crate::consts::{ARC_ANGULAR_TRAVEL_EPSILON, MAX_AXES};
use crate::hal::{Planner, SpindleCoolantProbe};
use crate::plan_request::{AxisValues, MotionClass, OverrideDisableFlags, PlanLineRequest, SpindleSetpoint};
use crate::rt_event::RtEventRegister;
use crate::settings::Settings;
use crate::state::machine::SystemState;

use super::backlash::BacklashTracker;
use super::gateway::{self, LineOutcome};

/// One arc request: the two in-plane axes, the helical/linear axis,
/// target, center offset relative to current position, and direction.
pub struct ArcRequest {
    pub plane_axes: (usize, usize),
    pub linear_axis: usize,
    pub target: AxisValues,
    pub offset: (f32, f32),
    pub clockwise: bool,
    pub feed_rate: f32,
    pub inverse_time: bool,
    pub spindle: SpindleSetpoint,
    pub override_disable: OverrideDisableFlags,
    pub line_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcOutcome {
    Done,
    Aborted,
}

/// Decompose and emit an arc through the motion gateway.
#[allow(clippy::too_many_arguments)]
pub fn decompose<P: Planner, SP: SpindleCoolantProbe>(
    current_position: AxisValues,
    req: &ArcRequest,
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    backlash: &mut BacklashTracker,
    planner: &mut P,
    spindle_coolant: &mut SP,
) -> ArcOutcome {
    let (a, b) = req.plane_axes;
    let lin = req.linear_axis;

    let center_a = current_position[a] + req.offset.0;
    let center_b = current_position[b] + req.offset.1;

    let mut r_a = current_position[a] - center_a;
    let mut r_b = current_position[b] - center_b;
    let radius = (r_a * r_a + r_b * r_b).sqrt();

    let target_r_a = req.target[a] - center_a;
    let target_r_b = req.target[b] - center_b;

    let cross = r_a * target_r_b - r_b * target_r_a;
    let dot = r_a * target_r_a + r_b * target_r_b;
    let mut angular_travel = cross.atan2(dot);

    if req.clockwise {
        if angular_travel > -ARC_ANGULAR_TRAVEL_EPSILON {
            angular_travel -= 2.0 * core::f32::consts::PI;
        }
    } else if angular_travel < ARC_ANGULAR_TRAVEL_EPSILON {
        angular_travel += 2.0 * core::f32::consts::PI;
    }

    let mut feed_rate = req.feed_rate;

    if angular_travel.abs() < ARC_ANGULAR_TRAVEL_EPSILON {
        // Boundary behavior: zero angular travel ⇒ zero segments,
        // single push to target.
        return emit_point(
            req.target,
            feed_rate,
            false,
            req,
            reg,
            state,
            settings,
            backlash,
            planner,
            spindle_coolant,
        );
    }

    let tol = settings.arc_tolerance;
    let n_segments = ((0.5 * angular_travel * radius).abs() / (tol * (2.0 * radius - tol)).sqrt())
        .floor() as u32;
    let n_segments = n_segments.max(1);

    if req.inverse_time {
        feed_rate *= n_segments as f32;
    }

    let theta_per_segment = angular_travel / n_segments as f32;
    let linear_per_segment = (req.target[lin] - current_position[lin]) / n_segments as f32;

    let cos_small = 1.0 - 0.5 * theta_per_segment * theta_per_segment;
    let sin_small = theta_per_segment * (cos_small + 4.0) / 6.0;

    let interval = settings.arc_correction_interval as u32;
    let orig_r_a = r_a;
    let orig_r_b = r_b;

    for i in 1..n_segments {
        if i % interval == 0 {
            let exact_theta = theta_per_segment * i as f32;
            let cos_t = exact_theta.cos();
            let sin_t = exact_theta.sin();
            r_a = orig_r_a * cos_t - orig_r_b * sin_t;
            r_b = orig_r_a * sin_t + orig_r_b * cos_t;
        } else {
            let new_a = r_a * cos_small - r_b * sin_small;
            let new_b = r_a * sin_small + r_b * cos_small;
            r_a = new_a;
            r_b = new_b;
        }

        let mut point = current_position;
        point[a] = center_a + r_a;
        point[b] = center_b + r_b;
        point[lin] = current_position[lin] + linear_per_segment * i as f32;

        let outcome = emit_point(
            point,
            feed_rate,
            req.inverse_time,
            req,
            reg,
            state,
            settings,
            backlash,
            planner,
            spindle_coolant,
        );
        if outcome == ArcOutcome::Aborted {
            return ArcOutcome::Aborted;
        }
    }

    // Always terminate with an exact final segment.
    emit_point(
        req.target,
        feed_rate,
        req.inverse_time,
        req,
        reg,
        state,
        settings,
        backlash,
        planner,
        spindle_coolant,
    )
}

#[allow(clippy::too_many_arguments)]
fn emit_point<P: Planner, SP: SpindleCoolantProbe>(
    point: AxisValues,
    feed_rate: f32,
    inverse_time: bool,
    req: &ArcRequest,
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    backlash: &mut BacklashTracker,
    planner: &mut P,
    spindle_coolant: &mut SP,
) -> ArcOutcome {
    let line_request = PlanLineRequest {
        target: point,
        feed_rate,
        inverse_time,
        motion_class: MotionClass::Feed,
        spindle: req.spindle,
        override_disable: req.override_disable,
        line_number: req.line_number,
    };
    match gateway::line(line_request, reg, state, settings, backlash, planner, spindle_coolant) {
        LineOutcome::Aborted => ArcOutcome::Aborted,
        _ => ArcOutcome::Done,
    }
}
