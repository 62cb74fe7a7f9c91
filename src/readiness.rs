//! BootGuard - Subsystem Readiness Providers
//!
//! Every independent task that may have time-sensitive work in flight owns
//! a readiness predicate. The gate polls these from the scheduler's idle
//! path, so each predicate must be a single non-blocking read.
//!
//! # Owning a flag from a task
//!
//! ```ignore
//! static BLE_READY: ReadinessFlag = ReadinessFlag::new();
//!
//! fn ble_transaction() {
//!     let _busy = BLE_READY.busy();
//!     // radio exchange; tickless idle is vetoed until `_busy` drops
//! }
//! ```

use crate::types::*;
use core::sync::atomic::{AtomicU32, Ordering};

// ============================================================================
// Capability
// ============================================================================

/// Outcome of one readiness evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum Readiness {
    /// Safe to suspend scheduling
    Ready,
    /// Not safe; names the vetoing subsystem when known
    Vetoed(Option<Subsystem>),
}

impl Readiness {
    /// True for [`Readiness::Ready`]
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// "Readiness-queryable" capability
///
/// Implementations must not block, allocate or take locks.
pub trait IdleReadiness {
    /// May the system suspend scheduling right now?
    fn is_ready_for_idle(&self) -> bool;

    /// Evaluate once, naming the veto when possible
    fn poll_readiness(&self) -> Readiness {
        if self.is_ready_for_idle() {
            Readiness::Ready
        } else {
            Readiness::Vetoed(None)
        }
    }
}

// ============================================================================
// Readiness Flag
// ============================================================================

/// Lock-free in-flight counter owned by a subsystem task
///
/// Ready iff no operation is in flight.
#[derive(Debug, Default)]
pub struct ReadinessFlag {
    in_flight: AtomicU32,
}

impl ReadinessFlag {
    /// Create a flag that reports ready
    pub const fn new() -> Self {
        Self {
            in_flight: AtomicU32::new(0),
        }
    }

    /// Mark the start of an operation that must not be suspended
    ///
    /// Saturates at `u32::MAX`, which stays not-ready.
    pub fn begin(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_add(1));
    }

    /// Mark the end of an operation started with [`begin`](Self::begin)
    ///
    /// Saturates at zero.
    pub fn end(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Begin an operation, ending it when the guard drops
    pub fn busy(&self) -> Busy<'_> {
        self.begin();
        Busy { flag: self }
    }

    /// Operations currently in flight
    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Current readiness
    pub fn is_ready(&self) -> bool {
        self.in_flight() == 0
    }
}

impl IdleReadiness for ReadinessFlag {
    fn is_ready_for_idle(&self) -> bool {
        self.is_ready()
    }
}

/// RAII guard for an in-flight operation
pub struct Busy<'a> {
    flag: &'a ReadinessFlag,
}

impl<'a> Drop for Busy<'a> {
    fn drop(&mut self) {
        self.flag.end();
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Readiness provider, one per independent subsystem
///
/// The set is fixed at boot, so dispatch is over a closed set of variants.
#[derive(Clone, Copy)]
pub enum Provider<'a> {
    /// Task-owned flag
    Flag(Subsystem, &'a ReadinessFlag),
    /// External `<subsystem>_tickless_idle_readiness()` predicate
    Predicate(Subsystem, fn() -> bool),
}

impl<'a> Provider<'a> {
    /// Subsystem this provider speaks for
    pub fn subsystem(&self) -> Subsystem {
        match self {
            Provider::Flag(subsystem, _) | Provider::Predicate(subsystem, _) => *subsystem,
        }
    }

    /// Poll the provider
    #[inline]
    pub fn is_ready(&self) -> bool {
        match self {
            Provider::Flag(_, flag) => flag.is_ready(),
            Provider::Predicate(_, predicate) => predicate(),
        }
    }
}

impl<'a> IdleReadiness for Provider<'a> {
    fn is_ready_for_idle(&self) -> bool {
        self.is_ready()
    }

    fn poll_readiness(&self) -> Readiness {
        if self.is_ready() {
            Readiness::Ready
        } else {
            Readiness::Vetoed(Some(self.subsystem()))
        }
    }
}

impl<'a> core::fmt::Debug for Provider<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Provider::Flag(subsystem, flag) => f
                .debug_struct("Flag")
                .field("subsystem", subsystem)
                .field("in_flight", &flag.in_flight())
                .finish(),
            Provider::Predicate(subsystem, _) => {
                f.debug_struct("Predicate").field("subsystem", subsystem).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_ready() -> bool {
        true
    }

    fn never_ready() -> bool {
        false
    }

    #[test]
    fn test_flag_starts_ready() {
        let flag = ReadinessFlag::new();
        assert!(flag.is_ready());
        assert_eq!(flag.in_flight(), 0);
    }

    #[test]
    fn test_flag_nested_operations() {
        let flag = ReadinessFlag::new();
        flag.begin();
        flag.begin();
        flag.end();
        assert!(!flag.is_ready());
        flag.end();
        assert!(flag.is_ready());
    }

    #[test]
    fn test_flag_end_saturates() {
        let flag = ReadinessFlag::new();
        flag.end();
        assert_eq!(flag.in_flight(), 0);
        flag.begin();
        assert!(!flag.is_ready());
    }

    #[test]
    fn test_flag_begin_saturates() {
        let flag = ReadinessFlag {
            in_flight: AtomicU32::new(u32::MAX - 1),
        };
        flag.begin();
        flag.begin();
        assert_eq!(flag.in_flight(), u32::MAX);
        assert!(!flag.is_ready());
    }

    #[test]
    fn test_busy_guard() {
        let flag = ReadinessFlag::new();
        {
            let _busy = flag.busy();
            assert!(!flag.is_ready());
        }
        assert!(flag.is_ready());
    }

    #[test]
    fn test_provider_variants() {
        let flag = ReadinessFlag::new();
        let ble = Provider::Flag(Subsystem::Ble, &flag);
        let debug = Provider::Predicate(Subsystem::Debug, always_ready);
        let factory = Provider::Predicate(Subsystem::FactoryTest, never_ready);

        assert!(ble.is_ready());
        assert!(debug.is_ready());
        assert!(!factory.is_ready());
        assert_eq!(factory.subsystem(), Subsystem::FactoryTest);

        flag.begin();
        assert!(!ble.is_ready_for_idle());
        assert_eq!(ble.poll_readiness(), Readiness::Vetoed(Some(Subsystem::Ble)));
        assert_eq!(flag.poll_readiness(), Readiness::Vetoed(None));
    }
}
