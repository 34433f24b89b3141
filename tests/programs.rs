//! End-to-end programs: assemble, load, run, inspect.

use mano::asm::{ErrorKind, SemanticError};
use mano::{assemble, assemble_with, AssemblerError, EventLog, LogContext, LogLevel, LogSink, Simulator};
use std::cell::RefCell;
use std::rc::Rc;

fn run(source: &str, input: &[u8]) -> Simulator {
    let program = assemble(source).unwrap();
    let mut sim = Simulator::new();
    sim.load(&program).unwrap();
    sim.set_input_stream(input.iter().copied());
    sim.run_limited(100_000).unwrap();
    assert!(sim.is_halted(), "program did not halt");
    sim
}

#[test]
fn multiply_by_repeated_addition() {
    let source = "
            ORG 100
    LOOP,   LDA SUM
            ADD X
            STA SUM
            ISZ CNT
            BUN LOOP
            HLT
    X,      DEC 7
    CNT,    DEC -5
    SUM,    DEC 0
            END
    ";
    let sim = run(source, b"");
    let snap = sim.snapshot();
    assert_eq!(snap.memory[0x108], 35);
    assert_eq!(snap.memory[0x107], 0);
    assert_eq!(snap.ac, 35);
}

#[test]
fn subroutine_call_and_return() {
    let source = "
            ORG 0
            LDA V
            BSA DBL
            STA R
            HLT
    DBL,    HEX 0       // return address
            CLE
            CIL
            BUN DBL I
    V,      DEC 21
    R,      DEC 0
            END
    ";
    let sim = run(source, b"");
    assert_eq!(sim.memory().read(9), 42);
    assert_eq!(sim.memory().read(4), 2);
}

#[test]
fn absolute_value_branches_on_sign() {
    for (value, expected) in [(-9, 9), (9, 9), (0, 0), (-32768, 0x8000)] {
        let source = format!(
            "
            LDA N
            SPA
            BUN NEG
            BUN DONE
    NEG,    CMA
            INC
    DONE,   STA R
            HLT
    N,      DEC {}
    R,      HEX 0
            END
    ",
            value
        );
        let sim = run(&source, b"");
        assert_eq!(sim.memory().read(9), expected, "abs({})", value);
    }
}

#[test]
fn echo_loop_copies_input_to_output() {
    let source = "
    LOOP,   INP
            OUT
            ISZ CNT
            BUN LOOP
            HLT
    CNT,    DEC -3
            END
    ";
    let sim = run(source, b"ABC");
    assert_eq!(sim.output_stream(), b"ABC");
    assert_eq!(sim.snapshot().output_text(), "ABC");
    assert!(sim.input_stream().is_empty());
}

#[test]
fn later_org_overwrites_earlier_word() {
    let source = "
            ORG 10
    X,      DEC 1
            ORG 10
    Y,      DEC 2
            ORG 20
            LDA 16
            HLT
            END
    ";
    let sim = run(source, b"");
    assert_eq!(sim.registers().ac(), 2);
}

#[test]
fn multiple_undefined_labels_are_rejected() {
    let source = "
        ORG 200
    MAIN,  LDA A
           ADD B
           STA C
           BUN LOOP
    LOOP,  ISZ COUNT
           BUN MAIN
           HLT
    COUNT, DEC 10
    END
    ";
    let err = assemble(source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);
    assert!(matches!(
        err,
        AssemblerError::Semantic(SemanticError::UndefinedLabel { ref label, .. }) if label == "A"
    ));
}

#[test]
fn trace_is_broadcast_to_subscribers() {
    let mut log = EventLog::new();
    let program = assemble_with("CLA\nHLT\nEND", &mut log).unwrap();

    let fetches = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&fetches);

    let mut sim = Simulator::with_sink(log);
    sim.sink_mut().subscribe(move |entry| {
        if entry.context == LogContext::Fetch {
            seen.borrow_mut().push(entry.message.clone());
        }
    });
    sim.load(&program).unwrap();
    sim.run().unwrap();

    assert_eq!(
        *fetches.borrow(),
        [
            "AR <- PC = 000",
            "IR <- M[AR] = 7800",
            "PC <- PC + 1 = 001",
            "AR <- PC = 001",
            "IR <- M[AR] = 7001",
            "PC <- PC + 1 = 002",
        ]
    );
    assert_eq!(sim.sink().by_context(LogContext::Assembler).last().map(|e| e.level), Some(LogLevel::Success));
    assert_eq!(sim.sink().by_context(LogContext::ExecuteNmri).len(), 2);
}

#[test]
fn runs_are_deterministic() {
    let source = "LDA A\nADD A\nCIR\nOUT\nHLT\nA, HEX 8123\nEND";
    let first = run(source, b"").snapshot();
    let second = run(source, b"").snapshot();
    assert_eq!(first, second);
    assert_eq!(first.output_stream.len(), 1);
}

#[test]
fn snapshot_round_trips_through_json() {
    let sim = run("LDA A\nOUT\nHLT\nA, HEX 21\nEND", b"");
    let snap = sim.snapshot();
    let text = serde_json::to_string(&snap).unwrap();
    let back: mano::SnapShot = serde_json::from_str(&text).unwrap();
    assert_eq!(back, snap);
    assert_eq!(back.output_text(), "!");
}

#[test]
fn long_run_without_trace_history() {
    let source = "
    LOOP,   ISZ CNT
            BUN LOOP
            HLT
    CNT,    DEC -20000
            END
    ";
    let program = assemble(source).unwrap();
    let mut sim = Simulator::with_sink(LogSink);
    sim.load(&program).unwrap();
    let steps = sim.run_limited(1_000_000).unwrap();

    assert!(sim.is_halted());
    assert_eq!(sim.instructions(), 40_000);
    assert!(steps > 200_000);
    assert_eq!(sim.memory().read(3), 0);
}
