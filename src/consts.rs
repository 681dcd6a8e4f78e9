//! System-wide constants for the motion core.

/// Maximum number of machine axes this build supports. Axis vectors are
/// fixed-size arrays of this length; `Settings::axis_count` may be smaller.
pub const MAX_AXES: usize = 6;

/// Bounds on the arc-correction interval: re-anchor the
/// rotated radius vector exactly at least this often, never less.
pub const N_ARC_CORRECTION_MIN: u8 = 4;
pub const N_ARC_CORRECTION_MAX: u8 = 20;

/// Epsilon used when comparing a commanded arc direction against the raw
/// `atan2` sign, to avoid flipping the 2π correction on a near-full circle.
pub const ARC_ANGULAR_TRAVEL_EPSILON: f32 = 1e-4;

/// Epsilon below which a per-axis backlash setting is treated as "disabled".
pub const BACKLASH_EPSILON: f32 = 1e-6;

/// Epsilon below which a throttle/feed/position delta is treated as zero
/// for the purposes of the laser-mode zero-length coalesce.
pub const ZERO_LENGTH_EPSILON: f32 = 1e-6;

/// Maximum length, in bytes, of a single assembled g-code/system/user line.
pub const LINE_BUFFER_SIZE: usize = 256;

/// Capacity of the lock-free override-command ring.
pub const OVERRIDE_QUEUE_SIZE: usize = 16;
