//! The planner contract. The planner itself — the kinematic
//! block buffer and feed/acceleration solve — is out of scope; this crate
//! only ever touches it through this trait.

use crate::plan_request::PlanLineRequest;

pub trait Planner {
    /// Push one line request. Returns `true` if accepted, `false` if the
    /// planner rejected it (e.g. a zero-length move).
    fn push(&mut self, request: &PlanLineRequest) -> bool;

    /// Whether the buffer has no room for another block.
    fn is_full(&self) -> bool;

    /// Whether a block is currently being executed.
    fn has_current_block(&self) -> bool;

    /// Discard all buffered blocks.
    fn reset(&mut self);

    /// Resynchronize the planner's notion of position from the stepper's
    /// last commanded step position, as done during homing/probing
    /// post-processing.
    fn sync_position_from_steps(&mut self);

    /// Apply feed/rapid override percentages.
    fn feed_override(&mut self, feed_pct: u8, rapid_pct: u8);
}
