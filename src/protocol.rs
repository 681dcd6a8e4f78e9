//! Main protocol loop. Drains input, ticks the realtime event register,
//! gates g-code on state, triggers auto-cycle-start.

use crate::consts::LINE_BUFFER_SIZE;
use crate::hal::{Planner, SpindleCoolantProbe, Stepper, Stream};
use crate::ingest::{self, LineContext};
use crate::rt_event::RtEventRegister;
use crate::settings::Settings;
use crate::state::machine::{Mode, SystemState};
use crate::state::{auto_cycle_start, realtime_checkpoint, service_realtime_teardown};
use crate::status::StatusCode;

/// Assembles line-buffer bytes into complete lines, stripping `;`-to-EOL
/// and `(...)` comments the way the pluggable input filter would.
pub struct LineAssembler {
    buf: heapless::Vec<u8, LINE_BUFFER_SIZE>,
    in_paren_comment: bool,
    in_line_comment: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            in_paren_comment: false,
            in_line_comment: false,
        }
    }

    /// Feed one byte already known not to have been dropped by the ingest classifier. Returns
    /// the assembled line once a terminator is seen (empty lines are
    /// swallowed, not returned).
    pub fn push(&mut self, byte: u8) -> Option<heapless::Vec<u8, LINE_BUFFER_SIZE>> {
        if byte == b'\n' || byte == b'\r' {
            self.in_paren_comment = false;
            self.in_line_comment = false;
            if self.buf.is_empty() {
                return None;
            }
            return Some(core::mem::replace(&mut self.buf, heapless::Vec::new()));
        }
        if self.in_line_comment {
            return None;
        }
        if self.in_paren_comment {
            if byte == b')' {
                self.in_paren_comment = false;
            }
            return None;
        }
        if byte == b'(' {
            self.in_paren_comment = true;
            return None;
        }
        if byte == b';' {
            self.in_line_comment = true;
            return None;
        }
        let _ = self.buf.push(byte); // silently dropped if the line overruns
        None
    }

    pub fn context(&self) -> LineContext {
        LineContext {
            in_system_line: self.buf.first() == Some(&b'$'),
            in_comment: self.in_paren_comment || self.in_line_comment,
        }
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// External line handlers: system-command, user-command, and g-code
/// parser dispatch, each out of scope but required at this seam.
pub trait LineDispatch {
    fn dispatch_system(&mut self, line: &[u8]) -> StatusCode;
    fn dispatch_user(&mut self, line: &[u8]) -> StatusCode;
    fn dispatch_gcode(&mut self, line: &[u8]) -> StatusCode;
}

/// Cold-start gate: elevate straight to ALARM when any of the
/// unsafe-to-start conditions hold; otherwise IDLE (caller still runs the
/// startup script).
pub fn startup_gate(
    settings: &Settings,
    e_stop_asserted: bool,
    hard_limit_asserted: bool,
    homed_mask: u32,
) -> Mode {
    let homing_required = settings.homing.enabled_mask != 0 && homed_mask != settings.homing.enabled_mask;
    if e_stop_asserted {
        Mode::EStop
    } else if homing_required || hard_limit_asserted || settings.force_init_alarm {
        Mode::Alarm
    } else {
        Mode::Idle
    }
}

/// Single internal slot for injected g-code. Only one line may
/// be in flight at a time.
#[derive(Default)]
pub struct XCommandSlot {
    pending: Option<heapless::Vec<u8, LINE_BUFFER_SIZE>>,
}

impl XCommandSlot {
    pub fn inject(&mut self, line: heapless::Vec<u8, LINE_BUFFER_SIZE>) {
        self.pending = Some(line);
    }

    pub fn take(&mut self) -> Option<heapless::Vec<u8, LINE_BUFFER_SIZE>> {
        self.pending.take()
    }
}

/// Dispatch one assembled line, gating g-code on state. Returns `None` for
/// the documented quirk: a `$` line executed out of the xcommand slot never
/// reports its status code back (design notes' open question — reproduced
/// verbatim rather than generalized away).
pub fn process_line<D: LineDispatch>(
    line: &[u8],
    state: &mut SystemState,
    dispatch: &mut D,
    from_xcommand: bool,
) -> Option<StatusCode> {
    match line.first() {
        Some(b'$') => {
            let code = dispatch.dispatch_system(line);
            if from_xcommand {
                None
            } else {
                Some(code)
            }
        }
        Some(b'[') => Some(dispatch.dispatch_user(line)),
        _ => {
            if state.mode.gclocks_motion() {
                #[cfg(feature = "defmt-log")]
                defmt::debug!("g-code line rejected, current mode locks out motion");
                Some(StatusCode::SystemGClock)
            } else {
                // CHECK_MODE still reaches the parser; the motion gateway itself is the one
                // that short-circuits without a planner push.
                Some(dispatch.dispatch_gcode(line))
            }
        }
    }
}

/// Process one incoming stream byte: classify it (the ingest classifier), feed the survivor to
/// the line assembler, and dispatch completed lines. Call in a tight loop
/// driven by the firmware's main loop; returns `true` if the explicit exit
/// flag was observed.
#[allow(clippy::too_many_arguments)]
pub fn run_step<S: Stream, D: LineDispatch, P: Planner, St: Stepper, SP: SpindleCoolantProbe>(
    stream: &mut S,
    assembler: &mut LineAssembler,
    xcommand: &mut XCommandSlot,
    reg: &RtEventRegister,
    state: &mut SystemState,
    settings: &Settings,
    dispatch: &mut D,
    planner: &mut P,
    stepper: &mut St,
    spindle_coolant: &mut SP,
) -> bool {
    if let Some(byte) = stream.read() {
        let ctx = assembler.context();
        if !ingest::classify(byte, reg, settings, ctx, stream) {
            if let Some(line) = assembler.push(byte) {
                if realtime_checkpoint(reg, state, settings, planner.has_current_block()) {
                    // Aborted: drop the line, let the caller observe ALARM/ESTOP.
                    service_realtime_teardown(state, settings, planner, stepper, spindle_coolant);
                } else {
                    process_line(&line, state, dispatch, false);
                }
            }
        }
    }

    if let Some(line) = xcommand.take() {
        process_line(&line, state, dispatch, true);
    }

    auto_cycle_start(state, planner);
    realtime_checkpoint(reg, state, settings, planner.has_current_block());
    service_realtime_teardown(state, settings, planner, stepper, spindle_coolant);

    state.sticky.exit
}
