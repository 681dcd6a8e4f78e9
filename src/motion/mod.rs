//! Motion production: the gateway every straight line funnels through,
//! the geometric decomposers that feed it (arcs, canned cycles), and the
//! backlash compensator it consults.

pub mod arc;
pub mod backlash;
pub mod canned_cycle;
pub mod gateway;

pub use backlash::BacklashTracker;
pub use gateway::{line, LineOutcome};
