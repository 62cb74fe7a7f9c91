//! BootGuard - Base types and configuration
//!
//! Identifiers, run states and fault events shared by the gate, the
//! orchestrator and the containment hooks.

use core::ffi::c_void;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Maximum readiness providers a gate is expected to carry
pub const MAX_PROVIDERS: usize = 8;

/// Capacity of one formatted diagnostic line (bytes, truncated beyond)
pub const DIAG_MESSAGE_CAPACITY: usize = 128;

/// Longest task name the scheduler hands to the overflow hook
pub const TASK_NAME_CAPACITY: usize = 16;

/// Task name reported when the scheduler passes a null name pointer
pub const UNKNOWN_TASK_NAME: &str = "<unknown>";

/// Task name reported when the scheduler passes a name that is not UTF-8
pub const INVALID_TASK_NAME: &str = "<invalid>";

// ============================================================================
// Error Types
// ============================================================================

/// Result type for BootGuard operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum Error {
    /// Gate configured without any readiness provider
    NoProviders,
    /// More providers than the configuration allows
    TooManyProviders,
    /// Readiness predicate already registered with the low-power subsystem
    AlreadyRegistered,
    /// No readiness predicate registered
    NotRegistered,
    /// Forbidden run-state transition
    InvalidTransition,
    /// A boot step reported failure
    BootStepFailed,
    /// HAL failure
    HalFailure,
}

// ============================================================================
// Subsystems
// ============================================================================

/// Independent subsystem owning a readiness predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum Subsystem {
    /// BLE protocol stack task
    Ble,
    /// Debug / UART logging task
    Debug,
    /// Factory-test task
    FactoryTest,
    /// Application task
    Application,
    /// Board-specific extra subsystem
    Custom(u8),
}

impl Subsystem {
    /// Subsystems every board must gate tickless idle on
    pub const REQUIRED: [Subsystem; 3] = [Subsystem::Ble, Subsystem::Debug, Subsystem::FactoryTest];

    /// Stable name for diagnostics
    pub const fn name(&self) -> &'static str {
        match self {
            Subsystem::Ble => "ble",
            Subsystem::Debug => "debug",
            Subsystem::FactoryTest => "factory-test",
            Subsystem::Application => "application",
            Subsystem::Custom(_) => "custom",
        }
    }
}

// ============================================================================
// Run State
// ============================================================================

/// Process-wide run state, forward-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[repr(u8)]
pub enum RunState {
    /// Initializing subsystems
    #[default]
    Booting = 0,
    /// Scheduler owns the processor
    Scheduling = 1,
    /// Terminal: processor halted after a fault
    Halted = 2,
}

impl RunState {
    /// Decode from the atomic representation
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => RunState::Booting,
            1 => RunState::Scheduling,
            _ => RunState::Halted,
        }
    }
}

// ============================================================================
// Faults
// ============================================================================

/// Opaque scheduler task handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct TaskHandle(usize);

impl TaskHandle {
    /// Null handle
    pub const NULL: TaskHandle = TaskHandle(0);

    /// Wrap a raw scheduler handle
    pub fn from_raw(raw: *mut c_void) -> Self {
        TaskHandle(raw as usize)
    }

    /// Raw handle value
    pub const fn as_usize(&self) -> usize {
        self.0
    }
}

/// Fault severity class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum FaultClass {
    /// Runtime state corrupted (stack overflow)
    Corruption,
    /// Dynamic memory exhausted
    ResourceExhaustion,
    /// Contract only the runtime can violate (scheduler returned, boot failed)
    InvariantViolation,
}

/// Fault detected by the scheduler runtime or the orchestrator
///
/// Consumed synchronously by the containment handler, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultEvent<'a> {
    /// Stack overflow detected in a task
    StackOverflow {
        /// Offending task
        task: TaskHandle,
        /// Offending task's name
        name: &'a str,
    },
    /// Heap allocation failed
    AllocationFailure,
    /// Scheduler returned control
    SchedulerExited,
    /// A boot step failed before the scheduler started
    BootFailure(&'static str),
}

impl<'a> FaultEvent<'a> {
    /// Severity class of this fault
    pub const fn class(&self) -> FaultClass {
        match self {
            FaultEvent::StackOverflow { .. } => FaultClass::Corruption,
            FaultEvent::AllocationFailure => FaultClass::ResourceExhaustion,
            FaultEvent::SchedulerExited | FaultEvent::BootFailure(_) => {
                FaultClass::InvariantViolation
            }
        }
    }
}
