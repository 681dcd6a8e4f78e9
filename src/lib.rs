#![cfg_attr(not(test), no_std)]
//! Motion-control and realtime-protocol core for a CNC firmware.
//!
//! This crate owns the realtime event register, the system state machine,
//! the override controller, the motion gateway and its geometric
//! decomposers (arcs, canned drilling/threading cycles, backlash), homing,
//! probing, and the main protocol loop that ties them together. The g-code
//! grammar, the trajectory planner's kinematic solve, step timing, and the
//! concrete hardware drivers are external collaborators, reached only
//! through the traits in [`hal`].

pub mod consts;
pub mod hal;
pub mod homing;
pub mod ingest;
pub mod motion;
pub mod overrides;
pub mod plan_request;
pub mod probing;
pub mod protocol;
pub mod rt_event;
pub mod settings;
pub mod state;
pub mod status;

pub use plan_request::{AxisValues, MotionClass, PlanLineRequest, SpindleSetpoint, SpindleState};
pub use rt_event::{OverrideCommand, RtEventRegister, StateFlag};
pub use settings::Settings;
pub use state::machine::{Mode, SystemState};
pub use status::{AlarmCode, RtResult, StatusCode};
