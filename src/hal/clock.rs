//! Monotonic wall-clock HAL contract.

pub trait Clock {
    /// Seconds since an arbitrary, HAL-chosen epoch. Only deltas matter.
    fn now_s(&self) -> f32;
}
