//! BootGuard - Fault Containment Hooks
//!
//! Fail-fast boundaries for the faults the scheduler runtime detects.
//! Stack overflow, allocation failure and an unexpected scheduler exit all
//! mean the runtime state can no longer be trusted, so each one is reported
//! and the processor stops. There is no retry and no in-place recovery.
//!
//! Containment order on every fatal path:
//! 1. Mark the run state [`Halted`](crate::types::RunState::Halted)
//! 2. Emit a best-effort diagnostic (never waited on)
//! 3. [`Hal::halt`]
//!
//! The idle hook is the exception: it is an opportunity to sleep, not a
//! fault, and it returns so the scheduler can pick the next runnable task.
//!
//! Nothing here allocates, so the hooks stay usable after the heap is gone.

use crate::diag::DiagnosticSink;
use crate::hal::Hal;
use crate::state::RunStateCell;
use crate::types::*;
use crate::{diag_debug, diag_error, diag_warn};
use core::ffi::c_char;

// ============================================================================
// Configuration
// ============================================================================

/// Containment configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainmentConfig {
    /// Emit diagnostics before halting
    pub report: bool,
    /// Enter wait-for-interrupt from the idle hook
    ///
    /// Disable while a debug probe needs the core awake.
    pub idle_sleep: bool,
}

impl ContainmentConfig {
    /// Report and sleep
    pub const DEFAULT: ContainmentConfig = ContainmentConfig {
        report: true,
        idle_sleep: true,
    };
}

impl Default for ContainmentConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ============================================================================
// Fault-Handler Capability
// ============================================================================

/// Entry points the scheduler runtime calls into
pub trait FaultHooks {
    /// Nothing runnable: sleep until the next interrupt, then return
    fn idle_hook(&self);

    /// Stack overflow detected in `task`
    fn stack_overflow_hook(&self, task: TaskHandle, name: &str) -> !;

    /// Heap allocation failed
    fn malloc_failed_hook(&self) -> !;
}

impl<T: FaultHooks + ?Sized> FaultHooks for &T {
    fn idle_hook(&self) {
        (**self).idle_hook()
    }

    fn stack_overflow_hook(&self, task: TaskHandle, name: &str) -> ! {
        (**self).stack_overflow_hook(task, name)
    }

    fn malloc_failed_hook(&self) -> ! {
        (**self).malloc_failed_hook()
    }
}

// ============================================================================
// Containment
// ============================================================================

/// Containment handler bound to a HAL, a diagnostic sink and the run state
pub struct Containment<'a, H: Hal, S: DiagnosticSink> {
    hal: &'a H,
    sink: &'a S,
    state: &'a RunStateCell,
    config: ContainmentConfig,
}

impl<'a, H: Hal, S: DiagnosticSink> Containment<'a, H, S> {
    /// Create a containment handler
    ///
    /// `const` so it can back the statics the C-ABI hooks dispatch to.
    pub const fn new(
        hal: &'a H,
        sink: &'a S,
        state: &'a RunStateCell,
        config: ContainmentConfig,
    ) -> Self {
        Self {
            hal,
            sink,
            state,
            config,
        }
    }

    /// Run state this handler halts
    pub fn run_state(&self) -> &'a RunStateCell {
        self.state
    }

    /// Opportunistic idle entry
    pub fn on_idle(&self) {
        if self.config.idle_sleep {
            self.hal.wait_for_interrupt();
        }
    }

    /// Stack overflow in `task`
    pub fn on_stack_overflow(&self, task: TaskHandle, name: &str) -> ! {
        self.contain(FaultEvent::StackOverflow { task, name })
    }

    /// Heap allocation failure
    pub fn on_alloc_failed(&self) -> ! {
        self.contain(FaultEvent::AllocationFailure)
    }

    /// Scheduler returned control
    pub fn on_scheduler_exit(&self) -> ! {
        self.contain(FaultEvent::SchedulerExited)
    }

    /// Report `event`, then halt
    pub fn contain(&self, event: FaultEvent<'_>) -> ! {
        let previous = self.state.halt();
        if self.config.report {
            self.report(&event, previous);
        }
        self.hal.memory_barrier();
        self.hal.halt()
    }

    fn report(&self, event: &FaultEvent<'_>, previous: RunState) {
        match event {
            FaultEvent::StackOverflow { task, name } => {
                diag_error!(self.sink, "Error!   : RTOS - stack overflow in {} ", name);
                diag_debug!(self.sink, "overflow task handle {:#x}", task.as_usize());
            }
            FaultEvent::AllocationFailure => {
                diag_error!(self.sink, "Error!   : RTOS - Memory allocation failed ");
            }
            FaultEvent::SchedulerExited => {
                diag_error!(self.sink, "Error!   : RTOS - scheduler crashed ");
            }
            FaultEvent::BootFailure(step) => {
                diag_error!(self.sink, "Error!   : boot - {} init failed ", step);
            }
        }
        if previous == RunState::Halted {
            diag_warn!(self.sink, "fault raised after halt ({:?})", event.class());
        }
    }
}

impl<'a, H: Hal, S: DiagnosticSink> FaultHooks for Containment<'a, H, S> {
    fn idle_hook(&self) {
        self.on_idle()
    }

    fn stack_overflow_hook(&self, task: TaskHandle, name: &str) -> ! {
        self.on_stack_overflow(task, name)
    }

    fn malloc_failed_hook(&self) -> ! {
        self.on_alloc_failed()
    }
}

// ============================================================================
// C-ABI Boundary
// ============================================================================

/// Decode the task name the scheduler passes to the overflow hook
///
/// Reads at most [`TASK_NAME_CAPACITY`] bytes, since a corrupted stack may
/// have clobbered the terminator. Null maps to [`UNKNOWN_TASK_NAME`],
/// bytes that are not UTF-8 to [`INVALID_TASK_NAME`].
///
/// # Safety
/// `name` must be null or point to at least `TASK_NAME_CAPACITY` readable
/// bytes, or to a NUL-terminated string, valid for `'a`.
pub unsafe fn task_name_from_raw<'a>(name: *const c_char) -> &'a str {
    if name.is_null() {
        return UNKNOWN_TASK_NAME;
    }

    let bytes = name as *const u8;
    let mut len = 0;
    while len < TASK_NAME_CAPACITY && *bytes.add(len) != 0 {
        len += 1;
    }

    let slice = core::slice::from_raw_parts(bytes, len);
    core::str::from_utf8(slice).unwrap_or(INVALID_TASK_NAME)
}

/// Export the well-known scheduler hook symbols
///
/// Generates `vApplicationIdleHook`, `vApplicationStackOverflowHook` and
/// `vApplicationMallocFailedHook`, each dispatching to `$hooks`, which must
/// name a `static` (or a `&'static`) implementing [`FaultHooks`].
///
/// ```ignore
/// static HAL: CortexMHal = CortexMHal::new(HaltMode::Spin);
/// static SINK: DefmtSink = DefmtSink;
/// static RUN_STATE: RunStateCell = RunStateCell::new();
/// static HOOKS: Containment<'static, CortexMHal, DefmtSink> =
///     Containment::new(&HAL, &SINK, &RUN_STATE, ContainmentConfig::DEFAULT);
///
/// bootguard::rtos_hooks!(HOOKS);
/// ```
#[macro_export]
macro_rules! rtos_hooks {
    ($hooks:expr) => {
        #[allow(non_snake_case)]
        #[no_mangle]
        pub extern "C" fn vApplicationIdleHook() {
            $crate::fault::FaultHooks::idle_hook(&$hooks)
        }

        #[allow(non_snake_case)]
        #[no_mangle]
        pub unsafe extern "C" fn vApplicationStackOverflowHook(
            task: *mut ::core::ffi::c_void,
            name: *const ::core::ffi::c_char,
        ) -> ! {
            let name = $crate::fault::task_name_from_raw(name);
            $crate::fault::FaultHooks::stack_overflow_hook(
                &$hooks,
                $crate::types::TaskHandle::from_raw(task),
                name,
            )
        }

        #[allow(non_snake_case)]
        #[no_mangle]
        pub extern "C" fn vApplicationMallocFailedHook() -> ! {
            $crate::fault::FaultHooks::malloc_failed_hook(&$hooks)
        }
    };
}
