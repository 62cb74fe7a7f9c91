//! BootGuard - Idle Readiness Gate
//!
//! Aggregates every subsystem's readiness predicate into the single admission
//! decision the low-power subsystem consults before tickless idle.
//!
//! The gate is a pure function of the providers' current answers: a
//! short-circuit AND in registration order. Order only decides which
//! provider is reported as the blocker, never the boolean result.
//!
//! A provider that is stuck reporting not-ready keeps the device out of
//! tickless idle indefinitely. Finishing in-flight work wins over power.

use crate::readiness::{IdleReadiness, Provider, Readiness};
use crate::types::*;

// ============================================================================
// Gate
// ============================================================================

/// Idle Readiness Gate over a fixed set of `N` providers
#[derive(Debug, Clone, Copy)]
pub struct IdleGate<'a, const N: usize> {
    providers: [Provider<'a>; N],
}

impl<'a, const N: usize> IdleGate<'a, N> {
    /// Build a gate from providers in registration order
    ///
    /// An empty gate would be vacuously ready, so it is rejected.
    pub fn new(providers: [Provider<'a>; N]) -> Result<Self> {
        if N == 0 {
            return Err(Error::NoProviders);
        }
        if N > MAX_PROVIDERS {
            return Err(Error::TooManyProviders);
        }
        Ok(Self { providers })
    }

    /// Registered providers in evaluation order
    pub fn providers(&self) -> &[Provider<'a>] {
        &self.providers
    }

    /// Number of providers
    pub fn len(&self) -> usize {
        N
    }

    /// Always false for a constructed gate
    pub fn is_empty(&self) -> bool {
        N == 0
    }

    /// Check that every subsystem in `required` has a provider
    pub fn require(&self, required: &[Subsystem]) -> Result<()> {
        for subsystem in required {
            if !self.providers.iter().any(|p| p.subsystem() == *subsystem) {
                return Err(Error::NotRegistered);
            }
        }
        Ok(())
    }

    /// True iff every provider currently reports ready
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.providers.iter().all(Provider::is_ready)
    }

    /// First provider in registration order that vetoes idle
    pub fn first_blocker(&self) -> Option<Subsystem> {
        self.providers
            .iter()
            .find(|p| !p.is_ready())
            .map(Provider::subsystem)
    }

    /// Evaluate once, keeping the blocker for diagnostics
    pub fn evaluate(&self) -> Readiness {
        match self.first_blocker() {
            None => Readiness::Ready,
            Some(subsystem) => Readiness::Vetoed(Some(subsystem)),
        }
    }
}

impl<'a, const N: usize> IdleReadiness for IdleGate<'a, N> {
    fn is_ready_for_idle(&self) -> bool {
        self.is_ready()
    }

    fn poll_readiness(&self) -> Readiness {
        self.evaluate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::ReadinessFlag;
    use core::sync::atomic::{AtomicU32, Ordering};

    fn yes() -> bool {
        true
    }

    fn no() -> bool {
        false
    }

    static POLLS: AtomicU32 = AtomicU32::new(0);

    fn counted_yes() -> bool {
        POLLS.fetch_add(1, Ordering::SeqCst);
        true
    }

    #[test]
    fn test_all_ready() {
        let gate = IdleGate::new([
            Provider::Predicate(Subsystem::Ble, yes),
            Provider::Predicate(Subsystem::Debug, yes),
            Provider::Predicate(Subsystem::FactoryTest, yes),
        ])
        .unwrap();
        assert!(gate.is_ready());
        assert_eq!(gate.evaluate(), Readiness::Ready);
    }

    #[test]
    fn test_one_blocker() {
        let gate = IdleGate::new([
            Provider::Predicate(Subsystem::Ble, yes),
            Provider::Predicate(Subsystem::Debug, no),
            Provider::Predicate(Subsystem::FactoryTest, yes),
        ])
        .unwrap();
        assert!(!gate.is_ready());
        assert_eq!(gate.first_blocker(), Some(Subsystem::Debug));
    }

    #[test]
    fn test_blocker_reported_in_registration_order() {
        let gate = IdleGate::new([
            Provider::Predicate(Subsystem::Ble, yes),
            Provider::Predicate(Subsystem::FactoryTest, no),
            Provider::Predicate(Subsystem::Debug, no),
        ])
        .unwrap();
        assert_eq!(gate.evaluate(), Readiness::Vetoed(Some(Subsystem::FactoryTest)));
    }

    #[test]
    fn test_empty_gate_rejected() {
        let providers: [Provider<'_>; 0] = [];
        assert_eq!(IdleGate::new(providers).unwrap_err(), Error::NoProviders);
    }

    #[test]
    fn test_too_many_providers() {
        let providers = [Provider::Predicate(Subsystem::Custom(0), yes); MAX_PROVIDERS + 1];
        assert_eq!(IdleGate::new(providers).unwrap_err(), Error::TooManyProviders);
    }

    #[test]
    fn test_short_circuit() {
        POLLS.store(0, Ordering::SeqCst);
        let gate = IdleGate::new([
            Provider::Predicate(Subsystem::Ble, no),
            Provider::Predicate(Subsystem::Debug, counted_yes),
        ])
        .unwrap();
        assert!(!gate.is_ready());
        assert_eq!(POLLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tracks_flag_changes() {
        let ble = ReadinessFlag::new();
        let debug = ReadinessFlag::new();
        let gate = IdleGate::new([
            Provider::Flag(Subsystem::Ble, &ble),
            Provider::Flag(Subsystem::Debug, &debug),
        ])
        .unwrap();

        assert!(gate.is_ready());
        let busy = debug.busy();
        assert_eq!(gate.first_blocker(), Some(Subsystem::Debug));
        drop(busy);
        assert!(gate.is_ready());
    }

    #[test]
    fn test_require() {
        let gate = IdleGate::new([
            Provider::Predicate(Subsystem::Ble, yes),
            Provider::Predicate(Subsystem::Debug, yes),
        ])
        .unwrap();
        assert!(gate.require(&[Subsystem::Ble]).is_ok());
        assert_eq!(gate.require(&Subsystem::REQUIRED), Err(Error::NotRegistered));
    }
}
