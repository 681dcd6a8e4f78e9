//! Stepper/motion driver contract. Step timing and acceleration
//! profile are non-goals of this crate; it only issues the few control
//! operations the motion core needs to observe or command.

pub trait Stepper {
    /// Prepare the next segment buffer from the current planner block.
    fn prep_buffer(&mut self);

    /// Wake the stepper ISR if it's idle but there's work to do.
    fn wake_up(&mut self);

    /// Force all axes idle (no step pulses).
    fn go_idle(&mut self);

    /// Discard the in-flight segment buffer (used on reset/abort).
    fn reset_segment_buffer(&mut self);

    /// Set up the special single-block buffer used for parking/system
    /// motion.
    fn parking_setup_buffer(&mut self);

    /// Enable or disable limit switch interrupts; `probe_mode` configures
    /// the probe-pin invert used while homing two-switches-on-one-pin.
    fn limits_enable(&mut self, hard: bool, probe_mode: bool);

    /// Current limit-switch bitmask, one bit per axis.
    fn limits_get_state(&self) -> u32;

    /// Last machine-step position, per axis.
    fn step_position(&self) -> crate::plan_request::AxisValues;
}
