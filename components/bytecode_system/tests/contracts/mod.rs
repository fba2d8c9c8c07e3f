//! Contract tests for the bytecode format consumed by the interpreter
//!
//! The interpreter reads programs field by field, so the operand layout of
//! every opcode is part of the public contract.

use bytecode_system::{Opcode, Operand, Program};

/// Contract: opcodes are two bytes, little-endian
#[test]
fn contract_opcode_width() {
    let program = Program {
        filename: String::new(),
        code: vec![0x17, 0x00],
        constants: vec![],
    };
    let mut offset = 0;
    assert_eq!(program.read_code(&mut offset).unwrap(), Opcode::PushNumber);
    assert_eq!(offset, 2);
}

/// Contract: operand widths are fixed
#[test]
fn contract_operand_widths() {
    assert_eq!(Operand::Address.width(), 8);
    assert_eq!(Operand::Number.width(), 8);
    assert_eq!(Operand::String.width(), 8);
    assert_eq!(Operand::Integer.width(), 4);
    assert_eq!(Operand::Boolean.width(), 1);
}

/// Contract: control-flow operand shapes
#[test]
fn contract_control_operands() {
    assert_eq!(Opcode::TryBegin.operands(), &[Operand::Address, Operand::Address]);
    assert_eq!(
        Opcode::PushContinueLabel.operands(),
        &[Operand::String, Operand::Address]
    );
    assert_eq!(Opcode::Break.operands(), &[Operand::String]);
    assert_eq!(Opcode::PushValue.operands(), &[Operand::Integer]);
    assert_eq!(Opcode::MemberCall.operands(), &[Operand::Integer, Operand::Integer]);
    for op in [Opcode::JNull, Opcode::JNotNull, Opcode::JFalse, Opcode::JTrue, Opcode::Jmp] {
        assert_eq!(op.operands(), &[Operand::Address]);
    }
}

/// Contract: codes are unique
#[test]
fn contract_codes_unique() {
    let mut codes: Vec<u16> = Opcode::all().iter().map(|op| op.to_u16()).collect();
    let total = codes.len();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), total);
}
