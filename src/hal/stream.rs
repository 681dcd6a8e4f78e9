//! Stream (input byte source) HAL contract.

pub trait Stream {
    /// Non-blocking byte read; `None` if nothing is pending.
    fn read(&mut self) -> Option<u8>;

    /// Suspend or resume accepting new input, as done on reset.
    fn suspend_read(&mut self, suspend: bool);

    /// Discard any bytes queued but not yet consumed, as done on
    /// jog-cancel/stop.
    fn cancel_read_buffer(&mut self);
}
