//! Spindle/coolant/probe HAL contract.

use crate::plan_request::SpindleSetpoint;

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoolantState {
    pub mist: bool,
    pub flood: bool,
}

pub trait SpindleCoolantProbe {
    fn spindle_set_state(&mut self, setpoint: SpindleSetpoint);
    fn coolant_set_state(&mut self, state: CoolantState);

    /// Configure whether the probe-pin read is inverted.
    fn probe_configure_invert_mask(&mut self, invert: bool);

    /// `true` if the probe is currently triggered.
    fn probe_get_state(&self) -> bool;
}
