//! External interfaces: every collaborator this crate depends on
//! but does not implement — the g-code parser, the trajectory planner, the
//! stepper pulse generator, and the hardware abstraction layer for
//! spindle/coolant/probe/stream/control-pin I/O. Each is a trait so a
//! firmware image can plug in its own concrete driver for its board.

pub mod clock;
pub mod control_pin;
pub mod planner;
pub mod spindle;
pub mod stepper;
pub mod stream;

pub use clock::Clock;
pub use control_pin::{ControlPin, ControlPinState};
pub use planner::Planner;
pub use spindle::{CoolantState, SpindleCoolantProbe};
pub use stepper::Stepper;
pub use stream::Stream;
