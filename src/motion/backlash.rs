//! Backlash tracker. Per-axis direction memory and compensating rapid
//! inserts, consulted by the motion gateway before every commanded move.

use crate::consts::ZERO_LENGTH_EPSILON;
use crate::plan_request::AxisValues;
use crate::settings::Settings;

pub struct BacklashTracker {
    enabled_mask: u32,
    /// Bit set ⇒ the axis's last (or expected) direction of travel is negative.
    direction_mask: u32,
    previous_target: AxisValues,
}

impl BacklashTracker {
    /// `current_position` seeds `previous_target`. The initial direction
    /// is derived from the homing seek direction so the
    /// first move that continues in that same direction injects no
    /// compensation.
    pub fn new(settings: &Settings, current_position: AxisValues) -> Self {
        let enabled_mask = settings.backlash_enabled_mask();
        let direction_mask = (!settings.homing.direction_mask) & enabled_mask;
        Self {
            enabled_mask,
            direction_mask,
            previous_target: current_position,
        }
    }

    pub fn enabled_mask(&self) -> u32 {
        self.enabled_mask
    }

    /// Re-sync hook: reset `previous_target` from current machine steps,
    /// without touching direction.
    pub fn sync_position(&mut self, current_position: AxisValues) {
        self.previous_target = current_position;
    }

    /// Compare `target` to the remembered previous target on every enabled
    /// axis. Returns the shadow position to synthesize a rapid backlash
    /// move to, if any axis reversed direction; `None` if no compensation
    /// is needed. Always advances `previous_target` to `target`.
    pub fn compensate(&mut self, target: AxisValues, settings: &Settings) -> Option<AxisValues> {
        let mut shadow = self.previous_target;
        let mut any = false;

        for i in 0..settings.axis_count {
            let bit = 1u32 << i;
            if self.enabled_mask & bit == 0 {
                continue;
            }
            let delta = target[i] - self.previous_target[i];
            if delta.abs() <= ZERO_LENGTH_EPSILON {
                continue;
            }
            let negative = delta < 0.0;
            let was_negative = self.direction_mask & bit != 0;
            if negative != was_negative {
                let sign = if negative { -1.0 } else { 1.0 };
                shadow[i] = self.previous_target[i] + sign * settings.backlash[i];
                if negative {
                    self.direction_mask |= bit;
                } else {
                    self.direction_mask &= !bit;
                }
                any = true;
            }
        }

        self.previous_target = target;
        if any {
            Some(shadow)
        } else {
            None
        }
    }
}
