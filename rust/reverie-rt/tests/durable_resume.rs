//! End-to-end durability: an execution suspends at a cognitive call, the
//! process "dies" (every handle is dropped), and a fresh host built over
//! the same store directory resumes it exactly where it paused.

use reverie_bytecode::{Arg, Instruction, OpCode};
use reverie_provider_fs::AllowlistFs;
use reverie_rt::{FileStore, Host};
use reverie_vm::{BurstOutcome, Status, Value};
use std::path::PathBuf;
use std::sync::Arc;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "reverie-durable-{name}-{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn push_str(s: &str) -> Instruction {
    Instruction::with_arg(OpCode::Push, Arg::Str(s.into()))
}

#[test]
fn suspend_restart_resume() {
    let dir = temp_dir("basic");
    let program = vec![
        push_str("collecting context"),          // 0
        Instruction::new(OpCode::Print),         // 1
        push_str("Which file should I read?"),   // 2
        Instruction::new(OpCode::CognitiveCall), // 3
        Instruction::new(OpCode::ReadFile),      // 4: path from the agent
        Instruction::new(OpCode::Print),         // 5
    ];

    let data_dir = temp_dir("basic-data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("notes.txt"), "resume works").unwrap();

    let (program_id, execution_id);
    {
        let host = Host::new(Arc::new(FileStore::new(&dir).unwrap()));
        program_id = host.load_program("read a file", program).unwrap();
        execution_id = host.start(&program_id).unwrap();
        let out = host.fetch_next(&execution_id, None).unwrap();
        assert_eq!(
            out,
            BurstOutcome::Waiting {
                prompt: "Which file should I read?".into()
            }
        );
        // Host dropped here: simulated process death.
    }

    // A brand-new host over the same directory picks the execution up.
    let host = Host::new(Arc::new(FileStore::new(&dir).unwrap()));
    let record = host.inspect(&execution_id).unwrap();
    assert_eq!(record.status(), Status::Waiting);
    assert_eq!(record.program_id, program_id);

    let files = AllowlistFs::new(&[&data_dir]).unwrap();
    let answer = data_dir.join("notes.txt");
    let out = host
        .report_result(
            &execution_id,
            Value::String(answer.to_string_lossy().into_owned()),
            Some(&files),
        )
        .unwrap();
    assert_eq!(out, BurstOutcome::Complete);
    assert_eq!(
        host.store().get_output(&execution_id).unwrap(),
        "collecting context\nresume works\n"
    );

    let _ = std::fs::remove_dir_all(&dir);
    let _ = std::fs::remove_dir_all(&data_dir);
}

#[test]
fn allowlist_violation_becomes_agent_prompt() {
    // The agent answers with a path outside the allowlist; the READ_FILE
    // error is followed by a recovery cognitive call.
    let dir = temp_dir("denied");
    let program = vec![
        push_str("path?"),                       // 0
        Instruction::new(OpCode::CognitiveCall), // 1
        Instruction::new(OpCode::ReadFile),      // 2
        Instruction::new(OpCode::CognitiveCall), // 3: recovery
        Instruction::new(OpCode::Print),         // 4
    ];

    let allowed = temp_dir("denied-allowed");
    let forbidden = temp_dir("denied-forbidden");
    std::fs::create_dir_all(&allowed).unwrap();
    std::fs::create_dir_all(&forbidden).unwrap();
    std::fs::write(forbidden.join("secret.txt"), "no").unwrap();

    let host = Host::new(Arc::new(FileStore::new(&dir).unwrap()));
    let program_id = host.load_program("guarded read", program).unwrap();
    let execution_id = host.start(&program_id).unwrap();
    host.fetch_next(&execution_id, None).unwrap();

    let files = AllowlistFs::new(&[&allowed]).unwrap();
    let sneaky = forbidden.join("secret.txt");
    let out = host
        .report_result(
            &execution_id,
            Value::String(sneaky.to_string_lossy().into_owned()),
            Some(&files),
        )
        .unwrap();
    match out {
        BurstOutcome::Waiting { prompt } => {
            assert!(prompt.starts_with("ERROR: "), "got: {prompt}");
            assert!(prompt.contains("outside the allowed roots"), "got: {prompt}");
        }
        other => panic!("unexpected: {other:?}"),
    }

    // The agent recovers with a plain answer.
    let out = host
        .report_result(&execution_id, Value::String("skipped".into()), Some(&files))
        .unwrap();
    assert_eq!(out, BurstOutcome::Complete);
    assert_eq!(host.store().get_output(&execution_id).unwrap(), "skipped\n");

    let _ = std::fs::remove_dir_all(&dir);
    let _ = std::fs::remove_dir_all(&allowed);
    let _ = std::fs::remove_dir_all(&forbidden);
}

#[test]
fn output_log_is_append_only_across_bursts() {
    let dir = temp_dir("output");
    let program = vec![
        push_str("first"),                       // 0
        Instruction::new(OpCode::Print),         // 1
        push_str("?"),                           // 2
        Instruction::new(OpCode::CognitiveCall), // 3
        Instruction::new(OpCode::Print),         // 4
        push_str("last"),                        // 5
        Instruction::new(OpCode::Print),         // 6
    ];
    let host = Host::new(Arc::new(FileStore::new(&dir).unwrap()));
    let program_id = host.load_program("logger", program).unwrap();
    let execution_id = host.start(&program_id).unwrap();

    host.fetch_next(&execution_id, None).unwrap();
    assert_eq!(host.store().get_output(&execution_id).unwrap(), "first\n");

    host.report_result(&execution_id, Value::String("mid".into()), None)
        .unwrap();
    assert_eq!(
        host.store().get_output(&execution_id).unwrap(),
        "first\nmid\nlast\n"
    );

    let _ = std::fs::remove_dir_all(&dir);
}
