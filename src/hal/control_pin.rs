//! Control-pin HAL contract: the physical reset/cycle-start/
//! feed-hold/door/e-stop lines, as distinct from the realtime command
//! *bytes* that arrive over the stream (the ingest classifier handles those).

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlPinState {
    pub reset: bool,
    pub cycle_start: bool,
    pub feed_hold: bool,
    pub safety_door: bool,
    pub e_stop: bool,
}

pub trait ControlPin {
    fn get_control_state(&self) -> ControlPinState;
}
