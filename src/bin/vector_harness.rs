//! BootGuard - JSON Scenario Vector Harness
//!
//! Runs scenario vectors from the `vectors/` directory against the gate,
//! the low-power decision, the containment hooks and the orchestrator, and
//! prints JSON results for cross-validation with the board firmware.

use bootguard::{
    diag::RecordingSink,
    fault::{Containment, ContainmentConfig},
    gate::IdleGate,
    hal::{Halted, NoopHal},
    power::{IdleDecision, LowPower, TicklessConfig, TicklessIdle},
    readiness::{Provider, ReadinessFlag},
    startup::{BootStep, Bringup, Orchestrator, Scheduler, SystemConfig},
    state::RunStateCell,
    types::{Error, RunState, Subsystem, TaskHandle, MAX_PROVIDERS},
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::{env, fs, path::Path};

// Use std Result to avoid conflict with bootguard::Result
type Result<T> = std::result::Result<T, String>;

// ============================================================================
// Test Vector Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct TestVector {
    id: String,
    #[serde(default)]
    name: String,
    module: String,
    function: String,
    #[serde(default)]
    description: String,
    input: Value,
    expected: Value,
}

#[derive(Debug, Serialize)]
struct TestResult {
    id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
    module: String,
    function: String,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual: Option<Value>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: vector_harness <vectors.json> [vectors2.json ...]");
        std::process::exit(1);
    }

    // Halts are expected outcomes here, keep them off stderr
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if info.payload().downcast_ref::<Halted>().is_none() {
            default_hook(info);
        }
    }));

    let mut all_results: Vec<TestResult> = Vec::new();

    for path in &args[1..] {
        match run_test_file(path) {
            Ok(results) => all_results.extend(results),
            Err(e) => {
                all_results.push(TestResult {
                    id: Path::new(path)
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("unknown")
                        .to_string(),
                    name: String::new(),
                    module: "harness".to_string(),
                    function: "load".to_string(),
                    passed: false,
                    error: Some(format!("Failed to load vector file: {}", e)),
                    actual: None,
                });
            }
        }
    }

    // Output JSON results
    match serde_json::to_string_pretty(&all_results) {
        Ok(out) => println!("{}", out),
        Err(e) => eprintln!("Failed to serialize results: {}", e),
    }

    // Summary to stderr
    let passed = all_results.iter().filter(|r| r.passed).count();
    let total = all_results.len();
    eprintln!("\n=== Vector Summary ===");
    eprintln!(
        "Passed: {}/{} ({:.1}%)",
        passed,
        total,
        100.0 * passed as f64 / total.max(1) as f64
    );

    if passed != total {
        std::process::exit(2);
    }
}

fn run_test_file(path: &str) -> Result<Vec<TestResult>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path, e))?;

    let raw: Value = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {}", path, e))?;

    // A file holds one vector or an array of them
    let items = match raw {
        Value::Array(items) => items,
        single => vec![single],
    };

    let mut results = Vec::with_capacity(items.len());
    for item in items {
        let vector: TestVector = serde_json::from_value(item)
            .map_err(|e| format!("Bad vector in {}: {}", path, e))?;
        results.push(dispatch_test(&vector));
    }
    Ok(results)
}

// ============================================================================
// Test Dispatch
// ============================================================================

/// Mismatch message, carrying the vector's description when it has one
fn mismatch(vector: &TestVector) -> String {
    if vector.description.is_empty() {
        "Result mismatch".to_string()
    } else {
        format!("Result mismatch: {}", vector.description)
    }
}

fn dispatch_test(vector: &TestVector) -> TestResult {
    let result = match (vector.module.as_str(), vector.function.as_str()) {
        ("gate", "gate_is_ready") => test_gate_is_ready(vector),
        ("power", "tickless_decide") => test_tickless_decide(vector),
        ("fault", "stack_overflow") => test_fault(vector),
        ("fault", "alloc_failed") => test_fault(vector),
        ("fault", "scheduler_exit") => test_fault(vector),
        ("startup", "run") => test_startup_run(vector),
        _ => Err(format!("No handler for {}.{}", vector.module, vector.function)),
    };

    match result {
        Ok(actual) => {
            let passed = compare_values(&vector.expected, &actual);
            TestResult {
                id: vector.id.clone(),
                name: vector.name.clone(),
                module: vector.module.clone(),
                function: vector.function.clone(),
                passed,
                error: if passed { None } else { Some(mismatch(vector)) },
                actual: if passed { None } else { Some(actual) },
            }
        }
        Err(e) => TestResult {
            id: vector.id.clone(),
            name: vector.name.clone(),
            module: vector.module.clone(),
            function: vector.function.clone(),
            passed: false,
            error: Some(e),
            actual: None,
        },
    }
}

// ============================================================================
// Input Helpers
// ============================================================================

fn parse_subsystem(name: &str) -> Result<Subsystem> {
    match name {
        "Ble" | "ble" => Ok(Subsystem::Ble),
        "Debug" | "debug" => Ok(Subsystem::Debug),
        "FactoryTest" | "factory-test" => Ok(Subsystem::FactoryTest),
        "Application" | "application" => Ok(Subsystem::Application),
        other => other
            .strip_prefix("custom-")
            .and_then(|n| n.parse::<u8>().ok())
            .map(Subsystem::Custom)
            .ok_or_else(|| format!("Unknown subsystem {}", other)),
    }
}

fn subsystem_json(subsystem: Option<Subsystem>) -> Value {
    match subsystem {
        Some(s) => json!(s.name()),
        None => Value::Null,
    }
}

/// Provider list as (subsystem, ready) pairs
fn parse_providers(input: &Value) -> Result<Vec<(Subsystem, bool)>> {
    let providers = input
        .get("providers")
        .and_then(|v| v.as_array())
        .ok_or("Missing providers")?;

    providers
        .iter()
        .map(|p| {
            let subsystem = p
                .get("subsystem")
                .and_then(|v| v.as_str())
                .ok_or("Missing subsystem")?;
            let ready = p.get("ready").and_then(|v| v.as_bool()).unwrap_or(true);
            Ok((parse_subsystem(subsystem)?, ready))
        })
        .collect()
}

/// Flags mirroring the requested provider states
fn make_flags(states: &[(Subsystem, bool)]) -> Vec<ReadinessFlag> {
    states
        .iter()
        .map(|(_, ready)| {
            let flag = ReadinessFlag::new();
            if !ready {
                flag.begin();
            }
            flag
        })
        .collect()
}

fn pad_ready() -> bool {
    true
}

/// Fixed-size gate; unused slots are always-ready padding after the real
/// providers, so neither the result nor the reported blocker changes.
fn make_gate<'a>(
    states: &[(Subsystem, bool)],
    flags: &'a [ReadinessFlag],
) -> std::result::Result<IdleGate<'a, MAX_PROVIDERS>, Error> {
    if states.is_empty() {
        let none: [Provider<'a>; 0] = [];
        IdleGate::new(none)?;
    }
    if states.len() > MAX_PROVIDERS {
        return Err(Error::TooManyProviders);
    }

    let mut providers = [Provider::Predicate(Subsystem::Custom(u8::MAX), pad_ready); MAX_PROVIDERS];
    for (slot, ((subsystem, _), flag)) in providers.iter_mut().zip(states.iter().zip(flags)) {
        *slot = Provider::Flag(*subsystem, flag);
    }
    IdleGate::new(providers)
}

fn halted_by<F: FnOnce()>(f: F) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => false,
        Err(payload) => payload.downcast_ref::<Halted>().is_some(),
    }
}

fn messages(sink: &RecordingSink) -> Vec<String> {
    sink.lines().into_iter().map(|(_, msg)| msg).collect()
}

fn state_json(state: RunState) -> Value {
    json!(format!("{:?}", state))
}

// ============================================================================
// Gate Tests
// ============================================================================

fn test_gate_is_ready(vector: &TestVector) -> Result<Value> {
    let states = parse_providers(&vector.input)?;
    let flags = make_flags(&states);

    let gate = match make_gate(&states, &flags) {
        Ok(gate) => gate,
        Err(e) => return Ok(json!({ "return": format!("{:?}", e) })),
    };

    Ok(json!({
        "return": "OK",
        "ready": gate.is_ready(),
        "blocker": subsystem_json(gate.first_blocker()),
    }))
}

// ============================================================================
// Power Tests
// ============================================================================

fn test_tickless_decide(vector: &TestVector) -> Result<Value> {
    let input = &vector.input;
    let states = parse_providers(input)?;
    let flags = make_flags(&states);
    let gate = make_gate(&states, &flags).map_err(|e| format!("{:?}", e))?;

    let mut config = TicklessConfig::default();
    if let Some(min) = input.get("min_idle_ticks").and_then(|v| v.as_u64()) {
        config.min_idle_ticks = min as u32;
    }
    if let Some(max) = input.get("max_sleep_ticks").and_then(|v| v.as_u64()) {
        config.max_sleep_ticks = max as u32;
    }

    let expected_idle = input
        .get("expected_idle_ticks")
        .and_then(|v| v.as_u64())
        .ok_or("Missing expected_idle_ticks")? as u32;

    let idle = TicklessIdle::new(Some(config));
    if input.get("registered").and_then(|v| v.as_bool()).unwrap_or(true) {
        idle.register_readiness(&gate).map_err(|e| format!("{:?}", e))?;
    }

    Ok(match idle.decide(expected_idle) {
        IdleDecision::Tickless { ticks } => json!({
            "decision": "Tickless",
            "ticks": ticks,
        }),
        IdleDecision::Sleep { blocked_by } => json!({
            "decision": "Sleep",
            "blocked_by": subsystem_json(blocked_by),
        }),
    })
}

// ============================================================================
// Fault Tests
// ============================================================================

fn test_fault(vector: &TestVector) -> Result<Value> {
    let input = &vector.input;
    let hal = NoopHal::new();
    let sink = RecordingSink::new();
    let state = RunStateCell::new();
    let config = ContainmentConfig {
        report: input.get("report").and_then(|v| v.as_bool()).unwrap_or(true),
        ..Default::default()
    };
    let containment = Containment::new(&hal, &sink, &state, config);

    let invocations = input.get("invocations").and_then(|v| v.as_u64()).unwrap_or(1);
    let mut halted = true;

    for _ in 0..invocations {
        halted &= match vector.function.as_str() {
            "stack_overflow" => {
                let name = input
                    .get("task_name")
                    .and_then(|v| v.as_str())
                    .ok_or("Missing task_name")?;
                halted_by(|| containment.on_stack_overflow(TaskHandle::NULL, name))
            }
            "alloc_failed" => halted_by(|| containment.on_alloc_failed()),
            _ => halted_by(|| containment.on_scheduler_exit()),
        };
    }

    Ok(json!({
        "halted": halted,
        "halt_count": hal.halt_count(),
        "state": state_json(state.get()),
        "messages": messages(&sink),
    }))
}

// ============================================================================
// Startup Tests
// ============================================================================

struct VectorBringup {
    ran: Vec<&'static str>,
    fail_at: Option<String>,
}

impl Bringup for VectorBringup {
    fn init(&mut self, step: BootStep) -> bootguard::Result<()> {
        self.ran.push(step.name());
        if self.fail_at.as_deref() == Some(step.name()) {
            return Err(Error::BootStepFailed);
        }
        Ok(())
    }
}

struct VectorScheduler {
    starts: u32,
}

impl Scheduler for VectorScheduler {
    fn start(&mut self) {
        self.starts += 1;
    }
}

fn test_startup_run(vector: &TestVector) -> Result<Value> {
    let input = &vector.input;
    let states = parse_providers(input)?;
    let flags = make_flags(&states);
    let gate = make_gate(&states, &flags).map_err(|e| format!("{:?}", e))?;
    let config = SystemConfig::new(gate, &Subsystem::REQUIRED).map_err(|e| format!("{:?}", e))?;

    let hal = NoopHal::new();
    let sink = RecordingSink::new();
    let orchestrator = Orchestrator::new(&config, &hal, &sink, None);
    let mut bringup = VectorBringup {
        ran: Vec::new(),
        fail_at: input.get("fail_at").and_then(|v| v.as_str()).map(String::from),
    };
    let idle = TicklessIdle::new(None);
    let mut scheduler = VectorScheduler { starts: 0 };

    let halted = halted_by(|| orchestrator.run(&mut bringup, &idle, &mut scheduler));

    Ok(json!({
        "halted": halted,
        "steps": bringup.ran,
        "registered": idle.is_registered(),
        "scheduler_starts": scheduler.starts,
        "state": state_json(config.run_state().get()),
        "messages": messages(&sink),
    }))
}

// ============================================================================
// Comparison
// ============================================================================

/// Every key in `expected` must match `actual`
///
/// `messages_contain` is checked as substrings against `actual.messages`.
fn compare_values(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => exp.iter().all(|(key, exp_val)| {
            if key == "messages_contain" {
                return messages_contain(exp_val, act.get("messages"));
            }
            match act.get(key) {
                Some(act_val) => compare_values(exp_val, act_val),
                None => false,
            }
        }),
        (Value::Array(exp), Value::Array(act)) => {
            exp.len() == act.len() && exp.iter().zip(act).all(|(e, a)| compare_values(e, a))
        }
        _ => expected == actual,
    }
}

fn messages_contain(needles: &Value, messages: Option<&Value>) -> bool {
    let Some(lines) = messages.and_then(|v| v.as_array()) else {
        return false;
    };
    let Some(needles) = needles.as_array() else {
        return false;
    };
    needles.iter().filter_map(|n| n.as_str()).all(|needle| {
        lines
            .iter()
            .filter_map(|l| l.as_str())
            .any(|line| line.contains(needle))
    })
}
