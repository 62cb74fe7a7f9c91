//! Exported scheduler hook symbols
//!
//! The fatal hooks never return, so they run in a child copy of this test
//! binary whose HAL halts by exiting with [`HALT_EXIT_CODE`]; the parent
//! checks the exit status and the diagnostics the child wrote.

use bootguard::diag::StdoutSink;
use bootguard::fault::task_name_from_raw;
use bootguard::state::RunStateCell;
use bootguard::{Containment, ContainmentConfig, Hal, RunState, UNKNOWN_TASK_NAME};
use core::ffi::{c_char, c_void};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU32, Ordering};

/// Exit status of a child that reached `Hal::halt`
const HALT_EXIT_CODE: i32 = 42;

/// Selects the hook a child process fires
const CHILD_ENV: &str = "BOOTGUARD_HOOK_CHILD";

/// HAL that halts by ending the process
struct ExitHal {
    wfi_count: AtomicU32,
}

impl Hal for ExitHal {
    fn wait_for_interrupt(&self) {
        self.wfi_count.fetch_add(1, Ordering::SeqCst);
    }

    fn halt(&self) -> ! {
        std::process::exit(HALT_EXIT_CODE)
    }

    fn memory_barrier(&self) {}

    fn platform_name(&self) -> &'static str {
        "exit"
    }
}

static HAL: ExitHal = ExitHal {
    wfi_count: AtomicU32::new(0),
};
static SINK: StdoutSink = StdoutSink;
static RUN_STATE: RunStateCell = RunStateCell::new();
static HOOKS: Containment<'static, ExitHal, StdoutSink> =
    Containment::new(&HAL, &SINK, &RUN_STATE, ContainmentConfig::DEFAULT);

bootguard::rtos_hooks!(HOOKS);

/// Fires the hook named by [`CHILD_ENV`]; does nothing in a normal run
#[test]
fn hook_child() {
    match std::env::var(CHILD_ENV).as_deref() {
        Ok("overflow") => unsafe {
            vApplicationStackOverflowHook(
                0x2000_1000 as *mut c_void,
                b"BLE_Task\0".as_ptr() as *const c_char,
            )
        },
        Ok("overflow-null-name") => unsafe {
            vApplicationStackOverflowHook(core::ptr::null_mut(), core::ptr::null())
        },
        Ok("malloc") => vApplicationMallocFailedHook(),
        _ => {}
    }
}

fn run_child(hook: &str) -> Output {
    let exe = std::env::current_exe().unwrap();
    Command::new(exe)
        .args(["hook_child", "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, hook)
        .output()
        .unwrap()
}

#[test]
fn idle_hook_symbol_dispatches() {
    vApplicationIdleHook();
    vApplicationIdleHook();

    assert_eq!(HAL.wfi_count.load(Ordering::SeqCst), 2);
    assert_eq!(RUN_STATE.get(), RunState::Booting);
}

#[test]
fn stack_overflow_hook_reports_task_then_halts() {
    let out = run_child("overflow");
    let stdout = String::from_utf8_lossy(&out.stdout);
    let stderr = String::from_utf8_lossy(&out.stderr);

    assert_eq!(out.status.code(), Some(HALT_EXIT_CODE), "stderr: {}", stderr);
    assert!(stderr.contains("Error!   : RTOS - stack overflow in BLE_Task"));
    assert!(stdout.contains("overflow task handle 0x20001000"));
}

#[test]
fn stack_overflow_hook_null_name() {
    let out = run_child("overflow-null-name");
    let stderr = String::from_utf8_lossy(&out.stderr);

    assert_eq!(out.status.code(), Some(HALT_EXIT_CODE), "stderr: {}", stderr);
    assert!(stderr.contains(&format!("stack overflow in {}", UNKNOWN_TASK_NAME)));
}

#[test]
fn malloc_failed_hook_reports_then_halts() {
    let out = run_child("malloc");
    let stderr = String::from_utf8_lossy(&out.stderr);

    assert_eq!(out.status.code(), Some(HALT_EXIT_CODE), "stderr: {}", stderr);
    assert!(stderr.contains("Error!   : RTOS - Memory allocation failed"));
    assert!(!stderr.contains("stack overflow"));
}

#[test]
fn task_names_from_the_scheduler() {
    let name = b"App_Task\0";
    assert_eq!(unsafe { task_name_from_raw(name.as_ptr() as *const c_char) }, "App_Task");
    assert_eq!(unsafe { task_name_from_raw(core::ptr::null()) }, UNKNOWN_TASK_NAME);
}
