use pmachine::interpreter::builtins::csp;
use pmachine::interpreter::engine::{Interpreter, MachineConfig};
use pmachine::interpreter::errors::{ExecutionError, RuntimeError};
use pmachine::interpreter::opcodes::op;
use pmachine::memory::value::words_to_real;
use pmachine::segments::builder::{
    volume_image, Assembler, CodeFileBuilder, ProcedureSpec, SegmentBuilder,
};
use pmachine::snapshot::MockTerminal;
use pmachine::storage::{DiskUnit, StorageManager};

/// Boot a system whose only procedure is `asm` and run it
fn run(asm: Assembler) -> (Interpreter, Result<(), RuntimeError>) {
    let code = asm.finish().expect("assemble");
    let file = CodeFileBuilder::new()
        .segment(SegmentBuilder::new(0, "PASCALSY").procedure(ProcedureSpec::new(1, 0, 0, code)))
        .build();
    let mut storage = StorageManager::new();
    storage
        .attach(4, DiskUnit::from_bytes(volume_image("BOOT", &[("SYSTEM.PASCAL", &file)]), true))
        .expect("attach");
    let mut interp =
        Interpreter::new(storage, Box::new(MockTerminal::new()), MachineConfig::default());
    interp.boot(4, "SYSTEM.PASCAL").expect("boot");
    let result = interp.run();
    (interp, result)
}

fn top_int(interp: &Interpreter) -> i16 {
    interp.eval_stack()[0] as i16
}

fn top_real(interp: &Interpreter) -> f32 {
    let stack = interp.eval_stack();
    words_to_real(stack[0], stack[1])
}

#[test]
fn test_integer_arithmetic() {
    let cases: [(i16, i16, u8, i16); 8] = [
        (5, 3, op::SBI, 2),
        (3, 5, op::SBI, -2),
        (6, 7, op::MPI, 42),
        (-7, 2, op::DVI, -3),
        (-7, 2, op::MODI, -1),
        (i16::MAX, 1, op::ADI, i16::MIN),
        (0x0F0F, 0x00FF, op::LAND, 0x000F),
        (-4, 3, op::LESI, 1),
    ];
    for (a, b, opcode, expected) in cases {
        let mut asm = Assembler::new();
        asm.constant(a).constant(b).op(opcode).op(op::XIT);
        let (interp, result) = run(asm);
        result.unwrap();
        assert_eq!(top_int(&interp), expected, "{} op {} {}", a, opcode, b);
    }
}

#[test]
fn test_unary_integer_ops() {
    let mut asm = Assembler::new();
    asm.constant(-9).op(op::ABI);
    asm.constant(12).op(op::NGI);
    asm.constant(-5).op(op::SQI);
    asm.op(op::XIT);
    let (interp, result) = run(asm);
    result.unwrap();
    let stack: Vec<i16> = interp.eval_stack().iter().map(|&w| w as i16).collect();
    assert_eq!(stack, vec![25, -12, 9]);
}

#[test]
fn test_divide_by_zero_traps() {
    let mut asm = Assembler::new();
    asm.constant(1).constant(0).op(op::DVI);
    let (_, result) = run(asm);
    assert!(matches!(
        result,
        Err(RuntimeError::Trap(ExecutionError::DivideByZero))
    ));
}

#[test]
fn test_range_check_keeps_value() {
    let mut asm = Assembler::new();
    asm.constant(7).constant(1).constant(10).op(op::CHK).op(op::XIT);
    let (interp, result) = run(asm);
    result.unwrap();
    assert_eq!(interp.eval_stack(), vec![7]);

    let mut asm = Assembler::new();
    asm.constant(15).constant(1).constant(10).op(op::CHK);
    let (interp, result) = run(asm);
    assert!(matches!(
        result,
        Err(RuntimeError::Trap(ExecutionError::InvalidIndex { value: 15 }))
    ));
    assert_eq!(interp.eval_stack(), vec![15]);
}

#[test]
fn test_real_arithmetic_and_rounding() {
    let mut asm = Assembler::new();
    asm.constant(7).op(op::FLT).constant(2).op(op::FLT).op(op::DVR).op(op::XIT);
    let (interp, result) = run(asm);
    result.unwrap();
    assert_eq!(top_real(&interp), 3.5);

    let mut asm = Assembler::new();
    asm.constant(7).op(op::FLT).constant(2).op(op::FLT).op(op::DVR);
    asm.op_ub(op::CSP, csp::ROUND).op(op::XIT);
    let (interp, result) = run(asm);
    result.unwrap();
    assert_eq!(interp.eval_stack(), vec![4]);

    let mut asm = Assembler::new();
    asm.constant(7).op(op::FLT).constant(2).op(op::FLT).op(op::DVR);
    asm.op_ub(op::CSP, csp::TRUNC).op(op::XIT);
    let (interp, result) = run(asm);
    result.unwrap();
    assert_eq!(interp.eval_stack(), vec![3]);
}

#[test]
fn test_integer_under_real_is_floated() {
    // 3 + 0.5 with the integer pushed first
    let mut asm = Assembler::new();
    asm.constant(3).constant(1).op(op::FLT).constant(2).op(op::FLT).op(op::DVR);
    asm.op(op::FLO).op(op::ADR).op(op::XIT);
    let (interp, result) = run(asm);
    result.unwrap();
    assert_eq!(top_real(&interp), 3.5);
}

#[test]
fn test_real_domain_errors() {
    let mut asm = Assembler::new();
    asm.constant(1).op(op::FLT).constant(0).op(op::FLT).op(op::DVR);
    let (_, result) = run(asm);
    assert!(matches!(
        result,
        Err(RuntimeError::Trap(ExecutionError::DivideByZero))
    ));

    let mut asm = Assembler::new();
    asm.constant(0).op(op::FLT).op_ub(op::CSP, csp::LN);
    let (_, result) = run(asm);
    assert!(matches!(
        result,
        Err(RuntimeError::Trap(ExecutionError::FloatingPointError))
    ));
}

#[test]
fn test_decimal_standard_procedure() {
    // -250 * 4 through CSP DECOPS
    let mut asm = Assembler::new();
    asm.constant(-250).constant(16).op_ub(op::CSP, csp::DECOPS);
    asm.constant(4).constant(16).op_ub(op::CSP, csp::DECOPS);
    asm.constant(8).op_ub(op::CSP, csp::DECOPS);
    asm.constant(18).op_ub(op::CSP, csp::DECOPS);
    asm.op(op::XIT);
    let (interp, result) = run(asm);
    result.unwrap();
    assert_eq!(top_int(&interp), -1000);
}

#[test]
fn test_packed_field_round_trip_through_memory() {
    // STP then LDP on a word of the heap
    let mut asm = Assembler::new();
    asm.constant(0x200).constant(4).constant(4).constant(9).op(op::STP);
    asm.constant(0x200).constant(4).constant(4).op(op::LDP);
    asm.op(op::XIT);
    let (interp, result) = run(asm);
    result.unwrap();
    assert_eq!(interp.eval_stack(), vec![9]);
    assert_eq!(interp.memory().read_word(0x200).unwrap(), 0x0090);
}
