//! The realtime event register.
//!
//! Two bitsets (`exec_state`, `exec_alarm`) addressable atomically
//! word-at-a-time: any producer (ISR or foreground) ORs bits in; only the
//! foreground drains, swapping the whole word to zero in one step. A third
//! ring holds enqueued override commands, guarded by a brief,
//! `critical_section`-bounded window rather than a full lock.

use core::sync::atomic::{AtomicU32, Ordering};

use heapless::spsc::Queue;

use crate::consts::OVERRIDE_QUEUE_SIZE;

/// Bits set in `exec_state`. Mirrors grbl's `EXEC_*` state flags.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StateFlag {
    Reset = 1 << 0,
    CycleStart = 1 << 1,
    FeedHold = 1 << 2,
    SafetyDoor = 1 << 3,
    MotionCancel = 1 << 4,
    /// Jog-cancel: decelerate to stop and flush input, only while JOG.
    JogCancel = 1 << 5,
    Sleep = 1 << 6,
    StatusReport = 1 << 7,
    GcodeReport = 1 << 8,
    PidReport = 1 << 9,
    Exit = 1 << 10,
}

/// Alarm bits set in `exec_alarm`. These piggyback `AlarmCode`'s discriminant
/// so the drain can hand the caller a concrete `AlarmCode`.
pub use crate::status::AlarmCode;

/// The realtime event register. A single instance is shared between the
/// foreground loop and all interrupt sources; every field is either an
/// atomic word or guarded by a momentary critical section.
pub struct RtEventRegister {
    exec_state: AtomicU32,
    exec_alarm: AtomicU32,
    overrides: critical_section::Mutex<core::cell::RefCell<Queue<OverrideCommand, OVERRIDE_QUEUE_SIZE>>>,
}

/// Override commands enqueued from realtime command bytes.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideCommand {
    FeedCoarsePlus,
    FeedCoarseMinus,
    FeedFinePlus,
    FeedFineMinus,
    FeedReset,
    RapidFull,
    RapidMedium,
    RapidLow,
    SpindleCoarsePlus,
    SpindleCoarseMinus,
    SpindleFinePlus,
    SpindleFineMinus,
    SpindleReset,
    SpindleStopToggle,
    CoolantMistToggle,
    CoolantFloodToggle,
}

/// A drained snapshot of the register, returned all-at-once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainedState {
    pub bits: u32,
}

impl DrainedState {
    pub fn test(&self, flag: StateFlag) -> bool {
        self.bits & (flag as u32) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

impl RtEventRegister {
    pub const fn new() -> Self {
        Self {
            exec_state: AtomicU32::new(0),
            exec_alarm: AtomicU32::new(0),
            overrides: critical_section::Mutex::new(core::cell::RefCell::new(Queue::new())),
        }
    }

    /// Writer side: OR a state flag in. Callable from ISR context.
    pub fn set_state_flag(&self, flag: StateFlag) {
        self.exec_state.fetch_or(flag as u32, Ordering::AcqRel);
    }

    /// Writer side: post an alarm. Callable from ISR context.
    pub fn set_alarm(&self, code: AlarmCode) {
        self.exec_alarm
            .fetch_or(1u32 << (u8::from(code) as u32), Ordering::AcqRel);
    }

    /// Writer side: enqueue an override command. Callable from ISR context;
    /// silently dropped if the ring is full — allocation failures here must
    /// fail silently, never block.
    pub fn enqueue_override(&self, cmd: OverrideCommand) {
        critical_section::with(|cs| {
            let mut q = self.overrides.borrow(cs).borrow_mut();
            let _ = q.enqueue(cmd);
        });
    }

    /// Drain the state register: swap to zero, return the snapshot.
    /// Read-modify-write bounded by a brief critical section; interrupts
    /// are blocked only for the duration of the swap.
    pub fn clear_state_flags(&self) -> DrainedState {
        let prior = self.exec_state.swap(0, Ordering::AcqRel);
        DrainedState { bits: prior }
    }

    /// Drain the alarm register: swap to zero, return the prior bitset.
    pub fn clear_alarm(&self) -> u32 {
        self.exec_alarm.swap(0, Ordering::AcqRel)
    }

    /// Non-destructive test against the current state bits.
    pub fn test(&self, flag: StateFlag) -> bool {
        self.exec_state.load(Ordering::Acquire) & (flag as u32) != 0
    }

    /// Drain every pending override command, in FIFO order.
    pub fn drain_overrides<const N: usize>(&self) -> heapless::Vec<OverrideCommand, N> {
        critical_section::with(|cs| {
            let mut q = self.overrides.borrow(cs).borrow_mut();
            let mut out = heapless::Vec::new();
            while let Some(cmd) = q.dequeue() {
                if out.push(cmd).is_err() {
                    break;
                }
            }
            out
        })
    }
}

impl Default for RtEventRegister {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_is_idempotent() {
        let reg = RtEventRegister::new();
        reg.set_state_flag(StateFlag::CycleStart);
        let first = reg.clear_state_flags();
        assert!(first.test(StateFlag::CycleStart));
        let second = reg.clear_state_flags();
        assert!(second.is_empty());
    }

    #[test]
    fn monotonic_or_until_drained() {
        let reg = RtEventRegister::new();
        reg.set_state_flag(StateFlag::FeedHold);
        reg.set_state_flag(StateFlag::StatusReport);
        let drained = reg.clear_state_flags();
        assert!(drained.test(StateFlag::FeedHold));
        assert!(drained.test(StateFlag::StatusReport));
    }

    #[test]
    fn override_queue_fifo() {
        let reg = RtEventRegister::new();
        reg.enqueue_override(OverrideCommand::FeedCoarsePlus);
        reg.enqueue_override(OverrideCommand::FeedCoarseMinus);
        let drained: heapless::Vec<OverrideCommand, 8> = reg.drain_overrides();
        assert_eq!(
            drained.as_slice(),
            &[OverrideCommand::FeedCoarsePlus, OverrideCommand::FeedCoarseMinus]
        );
    }

    #[test]
    fn alarm_round_trip() {
        let reg = RtEventRegister::new();
        reg.set_alarm(AlarmCode::HardLimit);
        let bits = reg.clear_alarm();
        assert_ne!(bits & (1 << (AlarmCode::HardLimit as u8 as u32)), 0);
        assert_eq!(reg.clear_alarm(), 0);
    }
}
