//! BootGuard - System Run State
//!
//! Booting -> Scheduling happens exactly once. Any state may move to Halted,
//! and nothing leaves Halted.

use crate::types::*;
use core::sync::atomic::{AtomicU8, Ordering};

/// Atomic forward-only run state machine
#[derive(Debug)]
pub struct RunStateCell {
    state: AtomicU8,
}

impl RunStateCell {
    /// Create in [`RunState::Booting`]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(RunState::Booting as u8),
        }
    }

    /// Current state
    pub fn get(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Booting -> Scheduling
    pub fn enter_scheduling(&self) -> Result<()> {
        self.state
            .compare_exchange(
                RunState::Booting as u8,
                RunState::Scheduling as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| Error::InvalidTransition)
    }

    /// Any -> Halted; returns the state that was left
    pub fn halt(&self) -> RunState {
        RunState::from_u8(self.state.swap(RunState::Halted as u8, Ordering::AcqRel))
    }

    /// True once halted
    pub fn is_halted(&self) -> bool {
        self.get() == RunState::Halted
    }
}

impl Default for RunStateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only() {
        let cell = RunStateCell::new();
        assert_eq!(cell.get(), RunState::Booting);

        cell.enter_scheduling().unwrap();
        assert_eq!(cell.get(), RunState::Scheduling);
        assert_eq!(cell.enter_scheduling(), Err(Error::InvalidTransition));

        assert_eq!(cell.halt(), RunState::Scheduling);
        assert!(cell.is_halted());
    }

    #[test]
    fn test_halt_is_terminal() {
        let cell = RunStateCell::new();
        cell.halt();
        assert_eq!(cell.halt(), RunState::Halted);
        assert_eq!(cell.enter_scheduling(), Err(Error::InvalidTransition));
        assert_eq!(cell.get(), RunState::Halted);
    }
}
