//! The read-only settings snapshot. Built once by the caller from
//! whatever persistence mechanism it uses — persistence format itself is a
//! named non-goal — and handed to every component by reference.

use crate::consts::{BACKLASH_EPSILON, MAX_AXES, N_ARC_CORRECTION_MAX, N_ARC_CORRECTION_MIN};
use crate::plan_request::AxisValues;

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverrideDefaults {
    pub feed_pct: u8,
    pub rapid_pct: u8,
    pub spindle_pct: u8,
    pub feed_coarse_increment: u8,
    pub feed_fine_increment: u8,
    pub spindle_coarse_increment: u8,
    pub spindle_fine_increment: u8,
}

impl Default for OverrideDefaults {
    fn default() -> Self {
        Self {
            feed_pct: 100,
            rapid_pct: 100,
            spindle_pct: 100,
            feed_coarse_increment: 10,
            feed_fine_increment: 1,
            spindle_coarse_increment: 10,
            spindle_fine_increment: 1,
        }
    }
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homing {
    /// Which axes participate in homing at all.
    pub enabled_mask: u32,
    /// Direction to seek in for each axis's limit switch (bit set = negative).
    pub direction_mask: u32,
    /// Ordered groups of axes homed together; each entry is an axis bitmask.
    pub cycle_groups: [u32; MAX_AXES],
    pub cycle_group_count: usize,
    /// Small retract distance after tripping a limit switch.
    pub pull_off: f32,
    /// Two physical switches share one input pin; any assertion is unsafe
    /// except during an active homing seek on that axis.
    pub two_switches_on_one_pin: bool,
}

impl Default for Homing {
    fn default() -> Self {
        Self {
            enabled_mask: 0,
            direction_mask: 0,
            cycle_groups: [0; MAX_AXES],
            cycle_group_count: 0,
            pull_off: 1.0,
            two_switches_on_one_pin: false,
        }
    }
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub axis_count: usize,
    pub backlash: AxisValues,
    pub homing: Homing,
    pub soft_limits_enabled: bool,
    pub hard_limits_enabled: bool,
    pub travel_max: AxisValues,
    pub travel_min: AxisValues,
    pub arc_tolerance: f32,
    pub arc_correction_interval: u8,
    pub overrides: OverrideDefaults,
    pub laser_mode: bool,
    pub block_delete_default: bool,
    pub sleep_enable: bool,
    pub sleep_timeout_s: f32,
    pub legacy_rt_commands: bool,
    pub force_init_alarm: bool,
}

impl Settings {
    /// Checks the snapshot for internal consistency: axis count too large,
    /// or arc correction interval outside the bounds the geometric
    /// decomposer was designed around. Call once at startup, after loading
    /// settings and before constructing a `SystemState` from them; nothing
    /// in the RT path calls this itself.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.axis_count > MAX_AXES {
            return Err("axis_count exceeds MAX_AXES");
        }
        if self.arc_correction_interval < N_ARC_CORRECTION_MIN
            || self.arc_correction_interval > N_ARC_CORRECTION_MAX
        {
            return Err("arc_correction_interval out of [4, 20]");
        }
        Ok(())
    }

    /// Axes whose backlash compensation is non-zero: the enabled-axis mask
    /// derived from `settings.backlash[i] > ε`.
    pub fn backlash_enabled_mask(&self) -> u32 {
        let mut mask = 0u32;
        for i in 0..self.axis_count {
            if self.backlash[i].abs() > BACKLASH_EPSILON {
                mask |= 1 << i;
            }
        }
        mask
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            axis_count: 3,
            backlash: [0.0; MAX_AXES],
            homing: Homing::default(),
            soft_limits_enabled: false,
            hard_limits_enabled: false,
            travel_max: [0.0; MAX_AXES],
            travel_min: [0.0; MAX_AXES],
            arc_tolerance: 0.002,
            arc_correction_interval: 12,
            overrides: OverrideDefaults::default(),
            laser_mode: false,
            block_delete_default: false,
            sleep_enable: false,
            sleep_timeout_s: 300.0,
            legacy_rt_commands: false,
            force_init_alarm: false,
        }
    }
}
