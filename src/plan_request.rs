//! The plan line request: the single value type conveyed to the
//! planner for every segment, whatever produced it (a straight g-code move,
//! an arc chord, a canned-cycle pass, a homing seek, a backlash insert).

use crate::consts::MAX_AXES;

pub type AxisValues = [f32; MAX_AXES];

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionClass {
    Rapid,
    Feed,
    Jog,
    /// A synthetic move inserted to take up backlash slack. The planner
    /// must not use this to update reported machine position.
    Backlash,
    /// Feed locked to spindle angular position (threading).
    SpindleSynchronized,
    /// Internally generated parking/system motion.
    System,
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpindleState {
    Off,
    Cw,
    Ccw,
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpindleSetpoint {
    pub state: SpindleState,
    pub rpm: f32,
}

impl SpindleSetpoint {
    pub const OFF: Self = Self {
        state: SpindleState::Off,
        rpm: 0.0,
    };
}

/// Which overrides a particular move is exempt from. Synchronized
/// threading cuts bracket themselves with feed-hold-disable.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverrideDisableFlags {
    pub no_feed_override: bool,
    pub feed_hold_disable: bool,
}

/// A single straight-line request to the planner. Every producer of
/// motion, from the motion gateway through the probing driver, funnels
/// through here via the motion gateway.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanLineRequest {
    pub target: AxisValues,
    pub feed_rate: f32,
    pub inverse_time: bool,
    pub motion_class: MotionClass,
    pub spindle: SpindleSetpoint,
    pub override_disable: OverrideDisableFlags,
    pub line_number: u32,
}

impl PlanLineRequest {
    pub fn rapid(target: AxisValues, line_number: u32) -> Self {
        Self {
            target,
            feed_rate: 0.0,
            inverse_time: false,
            motion_class: MotionClass::Rapid,
            spindle: SpindleSetpoint::OFF,
            override_disable: OverrideDisableFlags::default(),
            line_number,
        }
    }
}
