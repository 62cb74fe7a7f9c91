//! BootGuard - Low-Power Subsystem Interface
//!
//! The low-power subsystem accepts exactly one readiness predicate and
//! consults it once per candidate idle transition. Timer reprogramming and
//! the sleep-state mechanics live behind the platform; this module owns the
//! admission decision and its counters.
//!
//! Registration takes `&self`: the orchestrator registers the gate and then
//! lends the same subsystem to the scheduler, whose idle path calls
//! [`TicklessIdle::decide`].

use crate::diag::DiagnosticSink;
use crate::diag_trace;
use crate::readiness::{IdleReadiness, Readiness};
use crate::types::*;
use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

// ============================================================================
// Registration Trait
// ============================================================================

/// Registration entry point of the low-power subsystem
pub trait LowPower<'a> {
    /// Install the single predicate consulted before each idle decision
    fn register_readiness(&self, gate: &'a dyn IdleReadiness) -> Result<()>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Tickless idle configuration
#[derive(Debug, Clone, Copy)]
pub struct TicklessConfig {
    /// Shortest expected idle (ticks) worth stopping the tick for
    pub min_idle_ticks: u32,
    /// Longest single tickless sleep (ticks)
    pub max_sleep_ticks: u32,
}

impl Default for TicklessConfig {
    fn default() -> Self {
        Self {
            min_idle_ticks: 2,
            max_sleep_ticks: 2_000,
        }
    }
}

// ============================================================================
// Decision
// ============================================================================

/// What the idle path should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum IdleDecision {
    /// Suspend the tick for up to `ticks`
    Tickless {
        /// Sleep length in ticks
        ticks: u32,
    },
    /// Ordinary wait-for-interrupt with the tick running
    Sleep {
        /// Subsystem that vetoed tickless idle, if one did
        blocked_by: Option<Subsystem>,
    },
}

/// Idle decision counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdleStats {
    /// Decisions taken
    pub decisions: u32,
    /// Tickless entries
    pub tickless: u32,
    /// Gate vetoes
    pub vetoes: u32,
    /// Idle periods too short for tickless
    pub short_idles: u32,
}

// ============================================================================
// Tickless Idle
// ============================================================================

/// Reference low-power subsystem
///
/// Single-core: registration and decisions both run on the scheduler's
/// core, so the gate slot is a plain write-once `Cell`.
pub struct TicklessIdle<'a> {
    gate: Cell<Option<&'a dyn IdleReadiness>>,
    config: TicklessConfig,
    decisions: AtomicU32,
    tickless: AtomicU32,
    vetoes: AtomicU32,
    short_idles: AtomicU32,
}

impl<'a> TicklessIdle<'a> {
    /// Create with no predicate registered
    pub fn new(config: Option<TicklessConfig>) -> Self {
        Self {
            gate: Cell::new(None),
            config: config.unwrap_or_default(),
            decisions: AtomicU32::new(0),
            tickless: AtomicU32::new(0),
            vetoes: AtomicU32::new(0),
            short_idles: AtomicU32::new(0),
        }
    }

    /// True once a predicate is installed
    pub fn is_registered(&self) -> bool {
        self.gate.get().is_some()
    }

    /// Configuration in use
    pub fn config(&self) -> &TicklessConfig {
        &self.config
    }

    /// Decide the next idle action
    ///
    /// The gate is polled at most once. Without a registered gate the
    /// decision is always an ordinary sleep.
    pub fn decide(&self, expected_idle_ticks: u32) -> IdleDecision {
        self.decisions.fetch_add(1, Ordering::Relaxed);

        let Some(gate) = self.gate.get() else {
            return IdleDecision::Sleep { blocked_by: None };
        };

        if expected_idle_ticks < self.config.min_idle_ticks {
            self.short_idles.fetch_add(1, Ordering::Relaxed);
            return IdleDecision::Sleep { blocked_by: None };
        }

        match gate.poll_readiness() {
            Readiness::Ready => {
                self.tickless.fetch_add(1, Ordering::Relaxed);
                IdleDecision::Tickless {
                    ticks: expected_idle_ticks.min(self.config.max_sleep_ticks),
                }
            }
            Readiness::Vetoed(blocked_by) => {
                self.vetoes.fetch_add(1, Ordering::Relaxed);
                IdleDecision::Sleep { blocked_by }
            }
        }
    }

    /// [`decide`](Self::decide), tracing vetoes to `sink`
    pub fn decide_traced<S: DiagnosticSink>(&self, expected_idle_ticks: u32, sink: &S) -> IdleDecision {
        let decision = self.decide(expected_idle_ticks);
        if let IdleDecision::Sleep {
            blocked_by: Some(subsystem),
        } = decision
        {
            diag_trace!(sink, "tickless idle vetoed by {}", subsystem.name());
        }
        decision
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> IdleStats {
        IdleStats {
            decisions: self.decisions.load(Ordering::Relaxed),
            tickless: self.tickless.load(Ordering::Relaxed),
            vetoes: self.vetoes.load(Ordering::Relaxed),
            short_idles: self.short_idles.load(Ordering::Relaxed),
        }
    }
}

impl<'a> LowPower<'a> for TicklessIdle<'a> {
    fn register_readiness(&self, gate: &'a dyn IdleReadiness) -> Result<()> {
        if self.gate.get().is_some() {
            return Err(Error::AlreadyRegistered);
        }
        self.gate.set(Some(gate));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::{Level, RecordingSink};
    use crate::gate::IdleGate;
    use crate::readiness::{Provider, ReadinessFlag};

    fn yes() -> bool {
        true
    }

    #[test]
    fn test_unregistered_never_tickless() {
        let idle = TicklessIdle::new(None);
        assert_eq!(idle.decide(100), IdleDecision::Sleep { blocked_by: None });
        assert!(!idle.is_registered());
    }

    #[test]
    fn test_single_registration() {
        let flag = ReadinessFlag::new();
        let gate = IdleGate::new([Provider::Flag(Subsystem::Ble, &flag)]).unwrap();
        let idle = TicklessIdle::new(None);

        idle.register_readiness(&gate).unwrap();
        assert_eq!(idle.register_readiness(&gate), Err(Error::AlreadyRegistered));
    }

    #[test]
    fn test_register_then_decide_through_shared_ref() {
        let flag = ReadinessFlag::new();
        let gate = IdleGate::new([Provider::Flag(Subsystem::Ble, &flag)]).unwrap();
        let idle = TicklessIdle::new(None);
        let shared = &idle;

        shared.register_readiness(&gate).unwrap();
        assert_eq!(shared.decide(10), IdleDecision::Tickless { ticks: 10 });
        assert_eq!(idle.register_readiness(&gate), Err(Error::AlreadyRegistered));
    }

    #[test]
    fn test_decisions() {
        let ble = ReadinessFlag::new();
        let gate = IdleGate::new([
            Provider::Flag(Subsystem::Ble, &ble),
            Provider::Predicate(Subsystem::Debug, yes),
        ])
        .unwrap();
        let idle = TicklessIdle::new(Some(TicklessConfig {
            min_idle_ticks: 2,
            max_sleep_ticks: 50,
        }));
        idle.register_readiness(&gate).unwrap();

        assert_eq!(idle.decide(10), IdleDecision::Tickless { ticks: 10 });
        assert_eq!(idle.decide(500), IdleDecision::Tickless { ticks: 50 });
        assert_eq!(idle.decide(1), IdleDecision::Sleep { blocked_by: None });

        let _busy = ble.busy();
        assert_eq!(
            idle.decide(10),
            IdleDecision::Sleep {
                blocked_by: Some(Subsystem::Ble)
            }
        );

        assert_eq!(
            idle.stats(),
            IdleStats {
                decisions: 4,
                tickless: 2,
                vetoes: 1,
                short_idles: 1,
            }
        );
    }

    #[test]
    fn test_veto_traced() {
        let debug = ReadinessFlag::new();
        let gate = IdleGate::new([Provider::Flag(Subsystem::Debug, &debug)]).unwrap();
        let idle = TicklessIdle::new(None);
        idle.register_readiness(&gate).unwrap();
        let sink = RecordingSink::new();

        debug.begin();
        idle.decide_traced(10, &sink);
        assert_eq!(sink.count(Level::Trace), 1);
        assert!(sink.contains("vetoed by debug"));
    }
}
