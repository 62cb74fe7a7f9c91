//! BootGuard - Startup Orchestrator
//!
//! Brings subsystems up in a fixed order, hands the Idle Readiness Gate to
//! the low-power subsystem and gives the processor to the scheduler for
//! good.
//!
//! ## Sequence
//!
//! 1. Board and peripherals
//! 2. BLE protocol task
//! 3. Application task
//! 4. Debug / logging facility
//! 5. Gate registration with the low-power subsystem
//! 6. Scheduler start
//!
//! A failing step aborts the boot through the containment path; there is no
//! partial-success recovery here. The scheduler never returns by contract,
//! so a return is contained as a fault.

use crate::diag::DiagnosticSink;
use crate::fault::{Containment, ContainmentConfig};
use crate::gate::IdleGate;
use crate::hal::Hal;
use crate::power::LowPower;
use crate::state::RunStateCell;
use crate::types::*;
use crate::{diag_debug, diag_error, diag_info};

// ============================================================================
// Boot Steps
// ============================================================================

/// Initialization step run before the scheduler starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum BootStep {
    /// Board and peripheral bring-up
    Board,
    /// BLE protocol task creation
    BleTask,
    /// Application task creation
    AppTask,
    /// Thread-safe debug printing
    Debug,
}

impl BootStep {
    /// Steps in the order they run
    pub const SEQUENCE: [BootStep; 4] = [
        BootStep::Board,
        BootStep::BleTask,
        BootStep::AppTask,
        BootStep::Debug,
    ];

    /// Stable name for diagnostics
    pub const fn name(&self) -> &'static str {
        match self {
            BootStep::Board => "board",
            BootStep::BleTask => "ble-task",
            BootStep::AppTask => "app-task",
            BootStep::Debug => "debug",
        }
    }
}

/// Name reported when gate registration fails
pub const IDLE_GATE_STEP: &str = "idle-gate";

/// Name reported when the system is not booting at scheduler start
pub const RUN_STATE_STEP: &str = "run-state";

// ============================================================================
// Collaborators
// ============================================================================

/// Board, task and debug initialization entry points
pub trait Bringup {
    /// Run one boot step
    fn init(&mut self, step: BootStep) -> Result<()>;
}

/// Scheduler runtime
pub trait Scheduler {
    /// Start scheduling; returning at all is a fault
    fn start(&mut self);
}

// ============================================================================
// System Configuration
// ============================================================================

/// Startup-time configuration object
///
/// Built once before boot and lent to the low-power subsystem and the
/// containment path for the rest of the program.
#[derive(Debug)]
pub struct SystemConfig<'a, const N: usize> {
    gate: IdleGate<'a, N>,
    run_state: RunStateCell,
}

impl<'a, const N: usize> SystemConfig<'a, N> {
    /// Create, checking that every `required` subsystem gates idle
    pub fn new(gate: IdleGate<'a, N>, required: &[Subsystem]) -> Result<Self> {
        gate.require(required)?;
        Ok(Self {
            gate,
            run_state: RunStateCell::new(),
        })
    }

    /// The Idle Readiness Gate
    pub fn gate(&self) -> &IdleGate<'a, N> {
        &self.gate
    }

    /// Process-wide run state
    pub fn run_state(&self) -> &RunStateCell {
        &self.run_state
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Startup Orchestrator
pub struct Orchestrator<'a, H: Hal, S: DiagnosticSink, const N: usize> {
    config: &'a SystemConfig<'a, N>,
    sink: &'a S,
    containment: Containment<'a, H, S>,
}

impl<'a, H: Hal, S: DiagnosticSink, const N: usize> Orchestrator<'a, H, S, N> {
    /// Create an orchestrator over `config`
    pub fn new(
        config: &'a SystemConfig<'a, N>,
        hal: &'a H,
        sink: &'a S,
        containment: Option<ContainmentConfig>,
    ) -> Self {
        Self {
            config,
            sink,
            containment: Containment::new(
                hal,
                sink,
                config.run_state(),
                containment.unwrap_or_default(),
            ),
        }
    }

    /// Containment handler sharing this orchestrator's run state
    pub fn containment(&self) -> &Containment<'a, H, S> {
        &self.containment
    }

    /// Boot and hand control to the scheduler; never returns
    ///
    /// `low_power` stays shared so the scheduler's idle path can consult it.
    pub fn run<B, L, R>(&self, bringup: &mut B, low_power: &'a L, scheduler: &mut R) -> !
    where
        B: Bringup,
        L: LowPower<'a>,
        R: Scheduler,
    {
        let config: &'a SystemConfig<'a, N> = self.config;

        for step in BootStep::SEQUENCE {
            diag_debug!(self.sink, "boot: {}", step.name());
            if let Err(err) = bringup.init(step) {
                diag_error!(self.sink, "boot step {} returned {:?}", step.name(), err);
                self.containment.contain(FaultEvent::BootFailure(step.name()));
            }
        }

        if let Err(err) = low_power.register_readiness(config.gate()) {
            diag_error!(self.sink, "idle gate registration returned {:?}", err);
            self.containment.contain(FaultEvent::BootFailure(IDLE_GATE_STEP));
        }
        diag_debug!(self.sink, "idle gate registered ({} providers)", config.gate().len());

        if let Err(err) = config.run_state().enter_scheduling() {
            diag_error!(self.sink, "run state {:?}: {:?}", config.run_state().get(), err);
            self.containment.contain(FaultEvent::BootFailure(RUN_STATE_STEP));
        }

        diag_info!(self.sink, "RTOS - scheduler");
        scheduler.start();

        self.containment.on_scheduler_exit()
    }
}
