//! # BootGuard: Startup and Power/Fault Supervision for RTOS Firmware
//!
//! Brings up the subsystems of a preemptive-RTOS device in a fixed order,
//! hands control to the scheduler permanently, gates deep tickless idle on
//! every subsystem's readiness, and contains scheduler-detected faults with
//! a fail-fast halt.
//!
//! ## Idle Readiness Gate
//!
//! Each independent task (BLE stack, debug UART, factory test, ...) exposes
//! a non-blocking readiness predicate. The gate ANDs them; one "not ready"
//! keeps the device out of tickless idle.
//!
//! ```ignore
//! static BLE_READY: ReadinessFlag = ReadinessFlag::new();
//! static DEBUG_READY: ReadinessFlag = ReadinessFlag::new();
//!
//! let gate = IdleGate::new([
//!     Provider::Flag(Subsystem::Ble, &BLE_READY),
//!     Provider::Flag(Subsystem::Debug, &DEBUG_READY),
//!     Provider::Predicate(Subsystem::FactoryTest, factory_test_tickless_idle_readiness),
//! ])?;
//! ```
//!
//! ## Fault Containment
//!
//! Stack overflow, allocation failure and a returning scheduler are reported
//! over a best-effort sink, then the processor halts. Nothing resumes.
//!
//! ## Quick Start
//!
//! ```ignore
//! use bootguard::prelude::*;
//!
//! let config = SystemConfig::new(gate, &Subsystem::REQUIRED)?;
//! let orchestrator = Orchestrator::new(&config, &hal, &sink, None);
//! orchestrator.run(&mut board, &tickless_idle, &mut scheduler)
//! ```
//!
//! ## License
//!
//! MIT License - Copyright (c) 2026 Elektrokombinacija

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]

// Core modules
pub mod types;
pub mod diag;
pub mod hal;
pub mod readiness;
pub mod gate;
pub mod state;
pub mod fault;
pub mod power;
pub mod startup;

// Re-exports for convenience
pub use types::*;
pub use diag::{DiagnosticSink, HalSink, Level, NullSink};
pub use hal::{Hal, HaltMode};
pub use readiness::{Busy, IdleReadiness, Provider, Readiness, ReadinessFlag};
pub use gate::IdleGate;
pub use state::RunStateCell;
pub use fault::{Containment, ContainmentConfig, FaultHooks};
pub use power::{IdleDecision, IdleStats, LowPower, TicklessConfig, TicklessIdle};
pub use startup::{BootStep, Bringup, Orchestrator, Scheduler, SystemConfig};

/// Prelude - commonly used items
pub mod prelude {
    pub use crate::types::*;
    pub use crate::diag::{DiagnosticSink, Level};
    pub use crate::hal::Hal;
    pub use crate::readiness::{IdleReadiness, Provider, ReadinessFlag};
    pub use crate::gate::IdleGate;
    pub use crate::fault::{Containment, FaultHooks};
    pub use crate::power::{LowPower, TicklessIdle};
    pub use crate::startup::{BootStep, Bringup, Orchestrator, Scheduler, SystemConfig};
}

// ============================================================================
// Version
// ============================================================================

/// Major version
pub const VERSION_MAJOR: u32 = 1;
/// Minor version
pub const VERSION_MINOR: u32 = 0;
/// Patch version
pub const VERSION_PATCH: u32 = 0;
/// Version string
pub const VERSION_STRING: &str = "1.0.0";

/// Get version as packed integer (major << 16 | minor << 8 | patch)
pub const fn version() -> u32 {
    (VERSION_MAJOR << 16) | (VERSION_MINOR << 8) | VERSION_PATCH
}
