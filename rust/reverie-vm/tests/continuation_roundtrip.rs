//! Continuation protocol integration tests: suspend, serialize, restore in
//! a "fresh process" (a brand-new state built only from the snapshot JSON),
//! and resume bit-for-bit.

use reverie_bytecode::{Arg, Instruction, OpCode};
use reverie_vm::{
    resume, run_burst, BurstOutcome, ContinuationError, RunEnv, RunTrace, Snapshot, Status,
    Value, VmState,
};

fn push_num(n: f64) -> Instruction {
    Instruction::with_arg(OpCode::Push, Arg::Number(n))
}

fn push_str(s: &str) -> Instruction {
    Instruction::with_arg(OpCode::Push, Arg::Str(s.into()))
}

fn load(name: &str) -> Instruction {
    Instruction::with_arg(OpCode::Load, Arg::Name(name.into()))
}

fn store(name: &str) -> Instruction {
    Instruction::with_arg(OpCode::Store, Arg::Name(name.into()))
}

/// The signature scenario: pause with the exact prompt, resume with "X",
/// observe "X" downstream, end complete.
#[test]
fn cognitive_call_pause_resume_round_trip() {
    let program = vec![
        push_str("Summarize the report"), // 0
        Instruction::new(OpCode::CognitiveCall), // 1
        store("summary"),                // 2
        load("summary"),                 // 3
        Instruction::new(OpCode::Print), // 4
    ];

    let mut state = VmState::new();
    let env = RunEnv::default();
    let mut trace = RunTrace::new();
    let out = run_burst(&mut state, &program, &env, &mut trace);
    assert_eq!(
        out,
        BurstOutcome::Waiting {
            prompt: "Summarize the report".into()
        }
    );
    assert_eq!(state.pc, 1, "counter must point at the call");

    // Simulate a process restart: only the JSON survives.
    let json = Snapshot::take(&state).to_json().unwrap();
    drop(state);
    let mut revived = Snapshot::from_json(&json).unwrap().restore().unwrap();
    assert_eq!(revived.status, Status::Waiting);

    let mut trace = RunTrace::new();
    let out = resume(
        &mut revived,
        Value::String("X".into()),
        &program,
        &env,
        &mut trace,
    )
    .unwrap();
    assert_eq!(out, BurstOutcome::Complete);
    assert_eq!(revived.output, "X\n");
    assert_eq!(revived.variables["summary"], Value::String("X".into()));
}

/// Heap ids and aliasing survive the round trip; allocation after resume
/// continues from the preserved next id.
#[test]
fn heap_id_stability_across_restore() {
    let program = vec![
        push_num(1.0),                   // 0
        Instruction::with_arg(OpCode::NewArray, Arg::Count(1)), // 1
        store("a"),                      // 2
        load("a"),                       // 3
        store("alias"),                  // 4
        push_str("which element?"),      // 5
        Instruction::new(OpCode::CognitiveCall), // 6
        store("idx"),                    // 7
        load("alias"),                   // 8
        push_num(2.0),                   // 9
        Instruction::new(OpCode::ArrayPush), // 10
        Instruction::new(OpCode::Pop),   // 11
        load("a"),                       // 12
        Instruction::new(OpCode::Length), // 13
        Instruction::new(OpCode::Print), // 14
    ];

    let mut state = VmState::new();
    let env = RunEnv::default();
    let mut trace = RunTrace::new();
    run_burst(&mut state, &program, &env, &mut trace);

    let before_next = state.heap.next_id();
    let a_before = state.variables["a"].clone();

    let json = Snapshot::take(&state).to_json().unwrap();
    let mut revived = Snapshot::from_json(&json).unwrap().restore().unwrap();

    assert_eq!(revived.variables["a"], a_before);
    assert_eq!(revived.variables["alias"], a_before);
    assert_eq!(revived.heap.next_id(), before_next);

    let mut trace = RunTrace::new();
    let out = resume(&mut revived, Value::Number(0.0), &program, &env, &mut trace).unwrap();
    assert_eq!(out, BurstOutcome::Complete);
    // Pushing through the alias was visible through `a`.
    assert_eq!(revived.output, "2\n");
}

/// A suspension in the middle of an iterator loop restores with the same
/// cursor and bound.
#[test]
fn mid_loop_suspension_preserves_iterator_state() {
    // Each element becomes a cognitive-call prompt; the agent's reply is
    // printed before the loop advances.
    let program = vec![
        push_num(10.0),                 // 0
        push_num(20.0),                 // 1
        push_num(30.0),                 // 2
        Instruction::with_arg(OpCode::NewArray, Arg::Count(3)), // 3
        Instruction::new(OpCode::IterStart), // 4
        Instruction::new(OpCode::IterNext),  // 5: loop head
        Instruction::with_arg(OpCode::JumpIfFalse, Arg::Target(10)), // 6
        Instruction::new(OpCode::CognitiveCall), // 7: element is the prompt
        Instruction::new(OpCode::Print), // 8: print the agent's answer
        Instruction::with_arg(OpCode::Jump, Arg::Target(5)), // 9
        Instruction::new(OpCode::Pop),  // 10: drop the exhausted null
        Instruction::new(OpCode::IterEnd), // 11
    ];

    let env = RunEnv::default();
    let mut state = VmState::new();
    let mut trace = RunTrace::new();

    // First burst: suspends at the CC with the first element as prompt.
    let out = run_burst(&mut state, &program, &env, &mut trace);
    assert_eq!(out, BurstOutcome::Waiting { prompt: "10".into() });
    assert_eq!(state.iterators.len(), 1);

    // Drive the remaining iterations through snapshot round trips.
    let mut answers = Vec::new();
    let mut current = state;
    for reply in ["a", "b", "c"] {
        let json = Snapshot::take(&current).to_json().unwrap();
        let mut revived = Snapshot::from_json(&json).unwrap().restore().unwrap();
        let mut trace = RunTrace::new();
        let out = resume(
            &mut revived,
            Value::String(reply.into()),
            &program,
            &env,
            &mut trace,
        )
        .unwrap();
        answers.push(out);
        current = revived;
    }
    assert_eq!(
        answers[0],
        BurstOutcome::Waiting { prompt: "20".into() }
    );
    assert_eq!(
        answers[1],
        BurstOutcome::Waiting { prompt: "30".into() }
    );
    assert_eq!(answers[2], BurstOutcome::Complete);
    assert_eq!(current.output, "a\nb\nc\n");
    assert!(current.iterators.is_empty());
}

#[test]
fn resume_terminal_execution_is_reported() {
    let program = vec![Instruction::new(OpCode::Halt)];
    let mut state = VmState::new();
    let env = RunEnv::default();
    let mut trace = RunTrace::new();
    run_burst(&mut state, &program, &env, &mut trace);
    assert_eq!(state.status, Status::Complete);

    match resume(&mut state, Value::Null, &program, &env, &mut trace) {
        Err(ContinuationError::NotWaiting { status }) => {
            assert_eq!(status, Status::Complete)
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn output_accumulates_across_bursts() {
    let program = vec![
        push_str("before"),              // 0
        Instruction::new(OpCode::Print), // 1
        push_str("?"),                   // 2
        Instruction::new(OpCode::CognitiveCall), // 3
        Instruction::new(OpCode::Print), // 4
        push_str("after"),               // 5
        Instruction::new(OpCode::Print), // 6
    ];
    let mut state = VmState::new();
    let env = RunEnv::default();
    let mut trace = RunTrace::new();
    run_burst(&mut state, &program, &env, &mut trace);
    assert_eq!(state.output, "before\n");

    let out = resume(
        &mut state,
        Value::String("answer".into()),
        &program,
        &env,
        &mut trace,
    )
    .unwrap();
    assert_eq!(out, BurstOutcome::Complete);
    assert_eq!(state.output, "before\nanswer\nafter\n");
}
