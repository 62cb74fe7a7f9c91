//! BootGuard - Hardware Abstraction Layer
//!
//! HAL provides platform-independent interface for:
//! - Low-power wait-for-interrupt
//! - Deterministic processor halt
//! - Best-effort debug output
//!
//! # Implementing a HAL
//!
//! ```ignore
//! struct MyHal;
//!
//! impl Hal for MyHal {
//!     fn wait_for_interrupt(&self) {
//!         // Cy_SysPm_Sleep(CY_SYSPM_WAIT_FOR_INTERRUPT) or WFI
//!     }
//!
//!     fn halt(&self) -> ! {
//!         // Mask interrupts, trap into the debugger, spin
//!     }
//!
//!     // ... implement other methods
//! }
//! ```

// ============================================================================
// Halt Mode
// ============================================================================

/// How a HAL stops the processor
///
/// Both modes are terminal. Reset policy belongs to an external watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum HaltMode {
    /// Mask interrupts and spin forever
    #[default]
    Spin,
    /// Trap into an attached debugger first, then spin
    BreakpointThenSpin,
}

// ============================================================================
// HAL Trait
// ============================================================================

/// Hardware Abstraction Layer trait
///
/// Implement this for your target platform (PSoC 6, STM32, etc.)
pub trait Hal {
    /// Sleep until the next interrupt, then return
    fn wait_for_interrupt(&self);

    /// Stop the processor; never returns
    fn halt(&self) -> !;

    /// Memory barrier
    fn memory_barrier(&self);

    /// Get platform name
    fn platform_name(&self) -> &'static str;

    /// Debug print (optional, best-effort)
    fn debug_print(&self, _msg: &str) {}
}

// ============================================================================
// No-op HAL (for testing)
// ============================================================================

/// Unwind payload raised by [`NoopHal::halt`]
///
/// Lets tests observe that the halt path was reached.
#[cfg(any(test, feature = "std"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halted;

/// No-op HAL for testing and simulation
#[cfg(any(test, feature = "std"))]
pub struct NoopHal {
    wfi_count: core::sync::atomic::AtomicU32,
    halt_count: core::sync::atomic::AtomicU32,
}

#[cfg(any(test, feature = "std"))]
impl NoopHal {
    /// Create new no-op HAL
    pub const fn new() -> Self {
        Self {
            wfi_count: core::sync::atomic::AtomicU32::new(0),
            halt_count: core::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Times `wait_for_interrupt` was called
    pub fn wfi_count(&self) -> u32 {
        self.wfi_count.load(core::sync::atomic::Ordering::SeqCst)
    }

    /// Times `halt` was reached
    pub fn halt_count(&self) -> u32 {
        self.halt_count.load(core::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "std"))]
impl Default for NoopHal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "std"))]
impl Hal for NoopHal {
    fn wait_for_interrupt(&self) {
        self.wfi_count.fetch_add(1, core::sync::atomic::Ordering::SeqCst);
    }

    fn halt(&self) -> ! {
        self.halt_count.fetch_add(1, core::sync::atomic::Ordering::SeqCst);
        std::panic::panic_any(Halted)
    }

    fn memory_barrier(&self) {}

    fn platform_name(&self) -> &'static str {
        "noop"
    }

    fn debug_print(&self, msg: &str) {
        #[cfg(feature = "std")]
        println!("{}", msg);
        #[cfg(not(feature = "std"))]
        let _ = msg;
    }
}

// ============================================================================
// POSIX HAL (for std environments)
// ============================================================================

/// Desktop simulation HAL
#[cfg(feature = "std")]
pub mod posix {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    /// POSIX-based HAL for desktop simulation
    pub struct PosixHal {
        idle_sleep: Duration,
        mode: HaltMode,
    }

    impl PosixHal {
        /// Create new POSIX HAL
        pub fn new(mode: HaltMode) -> Self {
            Self {
                idle_sleep: Duration::from_millis(1),
                mode,
            }
        }
    }

    impl Hal for PosixHal {
        fn wait_for_interrupt(&self) {
            // Stand-in for the next tick interrupt
            std::thread::sleep(self.idle_sleep);
        }

        fn halt(&self) -> ! {
            if self.mode == HaltMode::BreakpointThenSpin {
                eprintln!("[HAL] halted on {}", self.platform_name());
            }
            loop {
                std::thread::park();
            }
        }

        fn memory_barrier(&self) {
            std::sync::atomic::fence(Ordering::SeqCst);
        }

        fn platform_name(&self) -> &'static str {
            "posix"
        }

        fn debug_print(&self, msg: &str) {
            println!("{}", msg);
        }
    }
}

// ============================================================================
// Cortex-M HAL
// ============================================================================

/// Cortex-M HAL (PSoC 6 CM4 core, STM32, ...)
#[cfg(feature = "embedded")]
pub mod cortex {
    use super::*;

    /// Cortex-M HAL implementation
    pub struct CortexMHal {
        mode: HaltMode,
    }

    impl CortexMHal {
        /// Create new Cortex-M HAL
        pub const fn new(mode: HaltMode) -> Self {
            Self { mode }
        }
    }

    impl Hal for CortexMHal {
        fn wait_for_interrupt(&self) {
            cortex_m::asm::wfi();
        }

        fn halt(&self) -> ! {
            cortex_m::interrupt::disable();
            if self.mode == HaltMode::BreakpointThenSpin {
                cortex_m::asm::bkpt();
            }
            loop {
                core::hint::spin_loop();
            }
        }

        fn memory_barrier(&self) {
            cortex_m::asm::dmb();
        }

        fn platform_name(&self) -> &'static str {
            "cortex-m"
        }

        fn debug_print(&self, _msg: &str) {
            #[cfg(feature = "defmt-log")]
            defmt::println!("{=str}", _msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn test_noop_counts_wfi() {
        let hal = NoopHal::new();
        hal.wait_for_interrupt();
        hal.wait_for_interrupt();
        assert_eq!(hal.wfi_count(), 2);
        assert_eq!(hal.halt_count(), 0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_posix_wfi_returns() {
        let hal = posix::PosixHal::new(HaltMode::Spin);
        hal.wait_for_interrupt();
        hal.memory_barrier();
        assert_eq!(hal.platform_name(), "posix");
    }

    #[test]
    fn test_noop_halt_sentinel() {
        let hal = NoopHal::new();
        let result = catch_unwind(AssertUnwindSafe(|| hal.halt()));
        let payload = result.unwrap_err();
        assert!(payload.downcast_ref::<Halted>().is_some());
        assert_eq!(hal.halt_count(), 1);
    }
}
