//! Realtime command ingest. Classifies one incoming byte at the boundary
//! between "control character, siphoned to the realtime event register"
//! and "g-code stream byte, passed through to the line buffer".

use crate::hal::Stream;
use crate::rt_event::{OverrideCommand, RtEventRegister, StateFlag};
use crate::settings::Settings;

/// Extended (non-legacy) realtime command bytes, chosen from the private-use
/// control range so they never collide with a g-code stream byte.
pub mod rt_byte {
    pub const RESET: u8 = 0x18; // Ctrl-X
    pub const EXIT: u8 = 0x04; // Ctrl-D
    pub const STATUS_REPORT: u8 = 0x05; // Ctrl-E (extended form of `?`)
    pub const CYCLE_START: u8 = 0x02; // extended form of `~`
    pub const FEED_HOLD: u8 = 0x03; // extended form of `!`
    pub const SAFETY_DOOR: u8 = 0x84;
    pub const JOG_CANCEL: u8 = 0x85;
    pub const GCODE_REPORT: u8 = 0x86;
    pub const OPTIONAL_STOP_TOGGLE: u8 = 0x87;
    pub const PID_REPORT: u8 = 0x88;
    pub const STOP: u8 = 0x89;

    pub const FEED_COARSE_PLUS: u8 = 0x90;
    pub const FEED_COARSE_MINUS: u8 = 0x91;
    pub const FEED_FINE_PLUS: u8 = 0x92;
    pub const FEED_FINE_MINUS: u8 = 0x93;
    pub const FEED_RESET: u8 = 0x94;
    pub const RAPID_FULL: u8 = 0x95;
    pub const RAPID_MEDIUM: u8 = 0x96;
    pub const RAPID_LOW: u8 = 0x97;
    pub const SPINDLE_COARSE_PLUS: u8 = 0x98;
    pub const SPINDLE_COARSE_MINUS: u8 = 0x99;
    pub const SPINDLE_FINE_PLUS: u8 = 0x9A;
    pub const SPINDLE_FINE_MINUS: u8 = 0x9B;
    pub const SPINDLE_RESET: u8 = 0x9C;
    pub const SPINDLE_STOP_TOGGLE: u8 = 0x9D;
    pub const COOLANT_MIST_TOGGLE: u8 = 0x9E;
    pub const COOLANT_FLOOD_TOGGLE: u8 = 0x9F;
}

/// Context the caller must supply so legacy ASCII variants (`?`, `~`, `!`)
/// aren't stolen out of a `$`-system line or a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineContext {
    pub in_system_line: bool,
    pub in_comment: bool,
}

impl LineContext {
    fn preserves_verbatim(self) -> bool {
        self.in_system_line || self.in_comment
    }
}

/// Classify one byte. Returns `true` if the caller must not buffer it (it
/// was either consumed as a realtime command or silently discarded).
pub fn classify<S: Stream>(
    byte: u8,
    reg: &RtEventRegister,
    settings: &Settings,
    ctx: LineContext,
    stream: &mut S,
) -> bool {
    if byte == b'\n' || byte == b'\r' {
        return false;
    }

    let legacy_ok = settings.legacy_rt_commands || !ctx.preserves_verbatim();

    match byte {
        rt_byte::RESET => {
            // Reset is suppressed when e-stop is active; the
            // caller is expected to gate that upstream since this function
            // has no view of the e-stop control pin. See `classify_reset`.
            reg.set_state_flag(StateFlag::Reset);
            true
        }
        rt_byte::STOP => {
            reg.set_state_flag(StateFlag::MotionCancel);
            stream.cancel_read_buffer();
            true
        }
        rt_byte::EXIT => {
            reg.set_state_flag(StateFlag::Exit);
            true
        }
        rt_byte::STATUS_REPORT => {
            reg.set_state_flag(StateFlag::StatusReport);
            true
        }
        b'?' if legacy_ok => {
            reg.set_state_flag(StateFlag::StatusReport);
            true
        }
        rt_byte::CYCLE_START => {
            reg.set_state_flag(StateFlag::CycleStart);
            true
        }
        b'~' if legacy_ok => {
            reg.set_state_flag(StateFlag::CycleStart);
            true
        }
        rt_byte::FEED_HOLD => {
            reg.set_state_flag(StateFlag::FeedHold);
            true
        }
        b'!' if legacy_ok => {
            reg.set_state_flag(StateFlag::FeedHold);
            true
        }
        rt_byte::SAFETY_DOOR => {
            reg.set_state_flag(StateFlag::SafetyDoor);
            true
        }
        rt_byte::JOG_CANCEL => {
            reg.set_state_flag(StateFlag::JogCancel);
            stream.cancel_read_buffer();
            true
        }
        rt_byte::GCODE_REPORT => {
            reg.set_state_flag(StateFlag::GcodeReport);
            true
        }
        rt_byte::OPTIONAL_STOP_TOGGLE => true, // consumed; no register bit defined at this layer
        rt_byte::PID_REPORT => {
            reg.set_state_flag(StateFlag::PidReport);
            true
        }
        rt_byte::FEED_COARSE_PLUS => enqueue(reg, OverrideCommand::FeedCoarsePlus),
        rt_byte::FEED_COARSE_MINUS => enqueue(reg, OverrideCommand::FeedCoarseMinus),
        rt_byte::FEED_FINE_PLUS => enqueue(reg, OverrideCommand::FeedFinePlus),
        rt_byte::FEED_FINE_MINUS => enqueue(reg, OverrideCommand::FeedFineMinus),
        rt_byte::FEED_RESET => enqueue(reg, OverrideCommand::FeedReset),
        rt_byte::RAPID_FULL => enqueue(reg, OverrideCommand::RapidFull),
        rt_byte::RAPID_MEDIUM => enqueue(reg, OverrideCommand::RapidMedium),
        rt_byte::RAPID_LOW => enqueue(reg, OverrideCommand::RapidLow),
        rt_byte::SPINDLE_COARSE_PLUS => enqueue(reg, OverrideCommand::SpindleCoarsePlus),
        rt_byte::SPINDLE_COARSE_MINUS => enqueue(reg, OverrideCommand::SpindleCoarseMinus),
        rt_byte::SPINDLE_FINE_PLUS => enqueue(reg, OverrideCommand::SpindleFinePlus),
        rt_byte::SPINDLE_FINE_MINUS => enqueue(reg, OverrideCommand::SpindleFineMinus),
        rt_byte::SPINDLE_RESET => enqueue(reg, OverrideCommand::SpindleReset),
        rt_byte::SPINDLE_STOP_TOGGLE => enqueue(reg, OverrideCommand::SpindleStopToggle),
        rt_byte::COOLANT_MIST_TOGGLE => enqueue(reg, OverrideCommand::CoolantMistToggle),
        rt_byte::COOLANT_FLOOD_TOGGLE => enqueue(reg, OverrideCommand::CoolantFloodToggle),
        0x00..=0x1F | 0x7F..=0xBF => true, // silently dropped
        _ => false,
    }
}

fn enqueue(reg: &RtEventRegister, cmd: OverrideCommand) -> bool {
    reg.enqueue_override(cmd);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockStream {
        cancelled: bool,
    }
    impl Stream for MockStream {
        fn read(&mut self) -> Option<u8> {
            None
        }
        fn suspend_read(&mut self, _s: bool) {}
        fn cancel_read_buffer(&mut self) {
            self.cancelled = true;
        }
    }

    #[test]
    fn newline_is_not_dropped() {
        let reg = RtEventRegister::new();
        let settings = Settings::default();
        let mut stream = MockStream { cancelled: false };
        assert!(!classify(b'\n', &reg, &settings, LineContext::default(), &mut stream));
    }

    #[test]
    fn reset_sets_flag_and_drops() {
        let reg = RtEventRegister::new();
        let settings = Settings::default();
        let mut stream = MockStream { cancelled: false };
        assert!(classify(rt_byte::RESET, &reg, &settings, LineContext::default(), &mut stream));
        assert!(reg.clear_state_flags().test(StateFlag::Reset));
    }

    #[test]
    fn jog_cancel_flushes_stream() {
        let reg = RtEventRegister::new();
        let settings = Settings::default();
        let mut stream = MockStream { cancelled: false };
        classify(rt_byte::JOG_CANCEL, &reg, &settings, LineContext::default(), &mut stream);
        assert!(stream.cancelled);
    }

    #[test]
    fn legacy_question_mark_rejected_inside_dollar_line() {
        let reg = RtEventRegister::new();
        let settings = Settings::default(); // legacy_rt_commands = false
        let mut stream = MockStream { cancelled: false };
        let ctx = LineContext {
            in_system_line: true,
            in_comment: false,
        };
        // Not consumed as a realtime char; falls through to "other", and
        // since it's printable ASCII it is passed through (not dropped).
        assert!(!classify(b'?', &reg, &settings, ctx, &mut stream));
        assert!(reg.clear_state_flags().is_empty());
    }

    #[test]
    fn legacy_question_mark_accepted_outside_dollar_line() {
        let reg = RtEventRegister::new();
        let settings = Settings::default();
        let mut stream = MockStream { cancelled: false };
        assert!(classify(b'?', &reg, &settings, LineContext::default(), &mut stream));
        assert!(reg.clear_state_flags().test(StateFlag::StatusReport));
    }

    #[test]
    fn control_byte_in_low_range_silently_dropped() {
        let reg = RtEventRegister::new();
        let settings = Settings::default();
        let mut stream = MockStream { cancelled: false };
        assert!(classify(0x01, &reg, &settings, LineContext::default(), &mut stream));
        assert!(reg.clear_state_flags().is_empty());
    }

    #[test]
    fn override_command_enqueues() {
        let reg = RtEventRegister::new();
        let settings = Settings::default();
        let mut stream = MockStream { cancelled: false };
        classify(rt_byte::SPINDLE_COARSE_PLUS, &reg, &settings, LineContext::default(), &mut stream);
        let drained: heapless::Vec<OverrideCommand, 4> = reg.drain_overrides();
        assert_eq!(drained.as_slice(), &[OverrideCommand::SpindleCoarsePlus]);
    }
}
