//! The fetch-decode-dispatch loop and the burst status machine.
//!
//! A burst runs instructions until one of three terminal conditions: the
//! instruction stream is exhausted (`complete`), a cognitive call is
//! reached (`waiting`, counter left pointing *at* the call), or a handler
//! reports an error (`error` — unless the very next instruction is a
//! cognitive call, in which case the error converts to a synthesized prompt
//! and the execution suspends instead of dying).

use crate::capability::FileCapability;
use crate::config::VmConfig;
use crate::error::VmError;
use crate::ops;
use crate::state::{Status, VmState};
use crate::trace::{RunTrace, TraceEvent};
use reverie_bytecode::{Instruction, OpCode};

/// How a handler left the program counter.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Ordinary instruction: the engine advances the counter.
    Advance,
    /// The handler set the counter itself.
    Jumped,
    /// HALT: finish the execution early.
    Halt,
    /// COGNITIVE_CALL: suspend with the given prompt.
    Suspend(String),
}

/// Per-run environment: limits plus the file capability handle.  Built
/// fresh for each run invocation; nothing here outlives the burst.
pub struct RunEnv<'a> {
    pub config: VmConfig,
    pub files: Option<&'a dyn FileCapability>,
}

impl Default for RunEnv<'_> {
    fn default() -> Self {
        RunEnv {
            config: VmConfig::default(),
            files: None,
        }
    }
}

/// The result of one burst.
#[derive(Debug, Clone, PartialEq)]
pub enum BurstOutcome {
    Waiting { prompt: String },
    Complete,
    Error { message: String },
}

/// Operand count the instruction will pop, including the count-dependent
/// constructor arities.
fn effective_arity(instr: &Instruction) -> usize {
    match instr.op {
        OpCode::NewArray => instr.count().unwrap_or(0),
        OpCode::NewObject => instr.count().unwrap_or(0) * 2,
        op => op.stack_in(),
    }
}

fn check_arity(state: &VmState, instr: &Instruction) -> Result<(), VmError> {
    let needed = effective_arity(instr);
    let available = state.stack.len();
    if available < needed {
        return Err(VmError::StackUnderflow {
            op: instr.op,
            needed,
            available,
        });
    }
    Ok(())
}

/// Report the outcome implied by the state's current status.
fn outcome(state: &VmState) -> BurstOutcome {
    match state.status {
        Status::Waiting => BurstOutcome::Waiting {
            prompt: state.cc_prompt.clone().unwrap_or_default(),
        },
        Status::Error => BurstOutcome::Error {
            message: state
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        },
        // Running only appears here if a caller inspects a state that was
        // never driven; report it as complete-so-far is wrong, so surface
        // the invariant breach as an error message instead of panicking.
        Status::Running => BurstOutcome::Error {
            message: "burst ended while still running".to_string(),
        },
        Status::Complete => BurstOutcome::Complete,
    }
}

/// Drive one burst.  Terminal states are sticky: re-running a complete or
/// errored execution reports the prior outcome without executing anything.
pub fn run_burst(
    state: &mut VmState,
    program: &[Instruction],
    env: &RunEnv<'_>,
    trace: &mut RunTrace,
) -> BurstOutcome {
    if state.status != Status::Running {
        return outcome(state);
    }
    trace.record(TraceEvent::BurstStart { pc: state.pc });
    let mut steps: u64 = 0;
    loop {
        if state.pc >= program.len() {
            state.status = Status::Complete;
            break;
        }
        let instr = &program[state.pc];
        let result = if steps >= env.config.max_burst_steps {
            Err(VmError::Runtime(format!(
                "burst exceeded {} steps",
                env.config.max_burst_steps
            )))
        } else {
            steps += 1;
            check_arity(state, instr)
                .and_then(|_| ops::dispatch(state, instr, program.len(), env))
        };
        match result {
            Ok(Flow::Advance) => state.pc += 1,
            Ok(Flow::Jumped) => {}
            Ok(Flow::Halt) => {
                state.status = Status::Complete;
                break;
            }
            Ok(Flow::Suspend(prompt)) => {
                // Counter stays at the call; resume re-enters exactly here.
                state.cc_prompt = Some(prompt.clone());
                state.status = Status::Waiting;
                trace.record(TraceEvent::CognitiveCall {
                    pc: state.pc,
                    prompt,
                });
                break;
            }
            Err(err) => {
                let message = err.to_string();
                let next_is_cc = program
                    .get(state.pc + 1)
                    .map(|next| next.op == OpCode::CognitiveCall)
                    .unwrap_or(false);
                if next_is_cc {
                    // Recovery path: hand the failure to the agent instead
                    // of aborting the execution.
                    state.pc += 1;
                    state.cc_prompt =
                        Some(format!("ERROR: {message}. How should I proceed?"));
                    state.status = Status::Waiting;
                    trace.record(TraceEvent::ErrorRecovered {
                        pc: state.pc,
                        message,
                    });
                } else {
                    state.status = Status::Error;
                    state.error = Some(message);
                }
                break;
            }
        }
    }
    trace.record(TraceEvent::BurstEnd {
        status: state.status,
        steps,
    });
    outcome(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::Value;
    use reverie_bytecode::Arg;

    fn push_num(n: f64) -> Instruction {
        Instruction::with_arg(OpCode::Push, Arg::Number(n))
    }

    fn run(program: Vec<Instruction>) -> (VmState, BurstOutcome) {
        let mut state = VmState::new();
        let env = RunEnv::default();
        let mut trace = RunTrace::new();
        let out = run_burst(&mut state, &program, &env, &mut trace);
        (state, out)
    }

    #[test]
    fn exhausted_stream_completes() {
        let (state, out) = run(vec![push_num(1.0), push_num(2.0)]);
        assert_eq!(out, BurstOutcome::Complete);
        assert_eq!(state.status, Status::Complete);
        assert_eq!(state.stack.len(), 2);
    }

    #[test]
    fn underflow_is_caught_before_dispatch() {
        let (state, out) = run(vec![Instruction::new(OpCode::Add)]);
        match out {
            BurstOutcome::Error { message } => {
                assert!(message.contains("stack underflow"), "got: {message}")
            }
            other => panic!("unexpected: {other:?}"),
        }
        // Nothing was half-executed.
        assert!(state.stack.is_empty());
    }

    #[test]
    fn cognitive_call_pauses_at_the_call() {
        let program = vec![
            Instruction::with_arg(OpCode::Push, Arg::Str("what now?".into())),
            Instruction::new(OpCode::CognitiveCall),
            Instruction::new(OpCode::Print),
        ];
        let (state, out) = run(program);
        assert_eq!(
            out,
            BurstOutcome::Waiting {
                prompt: "what now?".into()
            }
        );
        assert_eq!(state.pc, 1);
        assert_eq!(state.cc_prompt.as_deref(), Some("what now?"));
    }

    #[test]
    fn error_followed_by_cc_becomes_prompt() {
        let program = vec![
            push_num(1.0),
            push_num(0.0),
            Instruction::new(OpCode::GetIndex), // indexing a number: type error
            Instruction::new(OpCode::CognitiveCall),
        ];
        let (state, out) = run(program);
        match out {
            BurstOutcome::Waiting { prompt } => {
                assert!(prompt.starts_with("ERROR: "), "got: {prompt}");
                assert!(prompt.ends_with("How should I proceed?"), "got: {prompt}");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(state.status, Status::Waiting);
        assert_eq!(state.pc, 3);
    }

    #[test]
    fn error_without_following_cc_is_fatal() {
        let program = vec![
            push_num(1.0),
            push_num(0.0),
            Instruction::new(OpCode::GetIndex),
            Instruction::new(OpCode::Halt),
        ];
        let (state, out) = run(program);
        assert!(matches!(out, BurstOutcome::Error { .. }));
        assert_eq!(state.status, Status::Error);
    }

    #[test]
    fn invalid_jump_target_is_fatal_and_counter_stays() {
        let program = vec![
            Instruction::with_arg(OpCode::Jump, Arg::Target(-1)),
            Instruction::new(OpCode::Halt),
        ];
        let (state, out) = run(program);
        match out {
            BurstOutcome::Error { message } => {
                assert!(message.contains("invalid jump target"), "got: {message}")
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(state.pc, 0);
    }

    #[test]
    fn halt_completes_early() {
        let program = vec![
            Instruction::new(OpCode::Halt),
            push_num(1.0),
        ];
        let (state, out) = run(program);
        assert_eq!(out, BurstOutcome::Complete);
        assert!(state.stack.is_empty());
    }

    #[test]
    fn step_budget_turns_infinite_loop_into_error() {
        let program = vec![Instruction::with_arg(OpCode::Jump, Arg::Target(0))];
        let mut state = VmState::new();
        let env = RunEnv {
            config: VmConfig {
                max_burst_steps: 100,
                ..VmConfig::default()
            },
            files: None,
        };
        let mut trace = RunTrace::new();
        let out = run_burst(&mut state, &program, &env, &mut trace);
        match out {
            BurstOutcome::Error { message } => {
                assert!(message.contains("exceeded 100 steps"), "got: {message}")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn terminal_states_are_sticky() {
        let (mut state, _) = run(vec![Instruction::new(OpCode::Halt)]);
        let env = RunEnv::default();
        let mut trace = RunTrace::new();
        let out = run_burst(&mut state, &[push_num(1.0)], &env, &mut trace);
        assert_eq!(out, BurstOutcome::Complete);
        // Nothing executed, nothing traced.
        assert!(state.stack.is_empty());
        assert!(trace.is_empty());
    }

    #[test]
    fn trace_records_burst_and_suspension() {
        let program = vec![
            Instruction::with_arg(OpCode::Push, Arg::Str("p".into())),
            Instruction::new(OpCode::CognitiveCall),
        ];
        let mut state = VmState::new();
        let env = RunEnv::default();
        let mut trace = RunTrace::new();
        run_burst(&mut state, &program, &env, &mut trace);
        let events = trace.entries();
        assert!(matches!(events[0], TraceEvent::BurstStart { pc: 0 }));
        assert!(matches!(events[1], TraceEvent::CognitiveCall { pc: 1, .. }));
        assert!(matches!(
            events[2],
            TraceEvent::BurstEnd {
                status: Status::Waiting,
                ..
            }
        ));
    }

    #[test]
    fn variables_and_arith_work_end_to_end() {
        let program = vec![
            push_num(2.0),
            Instruction::with_arg(OpCode::Store, Arg::Name("x".into())),
            Instruction::with_arg(OpCode::Load, Arg::Name("x".into())),
            push_num(3.0),
            Instruction::new(OpCode::Mul),
            Instruction::new(OpCode::Print),
        ];
        let (state, out) = run(program);
        assert_eq!(out, BurstOutcome::Complete);
        assert_eq!(state.output, "6\n");
        assert_eq!(state.variables["x"], Value::Number(2.0));
    }
}
