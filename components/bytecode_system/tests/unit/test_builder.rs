//! Tests for ProgramBuilder emission

use bytecode_system::{Opcode, OperandValue, ProgramBuilder};

#[test]
fn test_builder_emits_operands_in_order() {
    let mut b = ProgramBuilder::new("emit.js");
    b.push_number(3.0);
    b.def("x");
    b.op(Opcode::Pop);
    b.call(Opcode::Call, 4, 9);
    let program = b.build().unwrap();

    let insts = program.instructions().unwrap();
    assert_eq!(insts.len(), 4);
    assert_eq!(insts[0].opcode, Opcode::PushNumber);
    assert_eq!(insts[0].operands, vec![OperandValue::Number(3.0)]);
    assert_eq!(insts[1].operands, vec![OperandValue::String("x".to_string())]);
    assert!(insts[2].operands.is_empty());
    assert_eq!(
        insts[3].operands,
        vec![OperandValue::Integer(4), OperandValue::Integer(9)]
    );
}

#[test]
fn test_builder_label_frames() {
    let mut b = ProgramBuilder::new("loop.js");
    let exit = b.new_label();
    b.label_frame(Opcode::PushBreakLabel, "outer", exit);
    b.op_str(Opcode::Break, "outer");
    b.op(Opcode::PopLabel);
    b.bind(exit);
    let program = b.build().unwrap();

    let first = program.decode_at(0).unwrap();
    assert_eq!(first.opcode, Opcode::PushBreakLabel);
    assert_eq!(
        first.operands,
        vec![
            OperandValue::String("outer".to_string()),
            OperandValue::Address(program.len())
        ]
    );
}

#[test]
fn test_builder_shares_constants() {
    let mut b = ProgramBuilder::new("consts.js");
    b.load("value");
    b.store("value");
    b.get_named("value");
    let program = b.build().unwrap();
    assert_eq!(program.constants, vec!["value".to_string()]);
}
