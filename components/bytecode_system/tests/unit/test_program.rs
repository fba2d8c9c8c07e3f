//! Tests for Program decoding, serialization and disassembly

use bytecode_system::{DecodeError, Opcode, Program, ProgramBuilder};

fn sample() -> Program {
    let mut b = ProgramBuilder::new("sample.js");
    let end = b.new_label();
    b.push_string("hello");
    b.jump(Opcode::JFalse, end);
    b.op(Opcode::Pop);
    b.push_number(1.5);
    b.bind(end);
    b.op(Opcode::Ret);
    b.build().unwrap()
}

#[test]
fn test_serialization_roundtrip() {
    let program = sample();
    let bytes = program.to_bytes().unwrap();
    assert_eq!(&bytes[0..4], b"NJBC");
    let restored = Program::from_bytes(&bytes).unwrap();
    assert_eq!(restored, program);
}

#[test]
fn test_truncated_file() {
    let bytes = sample().to_bytes().unwrap();
    let cut = &bytes[..bytes.len() - 3];
    assert!(matches!(
        Program::from_bytes(cut),
        Err(DecodeError::UnexpectedEnd(_))
    ));
}

#[test]
fn test_trailing_bytes_are_rejected() {
    let mut bytes = sample().to_bytes().unwrap();
    let end = bytes.len();
    bytes.extend_from_slice(b"junk");
    assert_eq!(
        Program::from_bytes(&bytes),
        Err(DecodeError::TrailingData(end))
    );
}

#[test]
fn test_disassemble_lists_every_instruction() {
    let text = sample().disassemble().unwrap();
    assert!(text.starts_with("; sample.js\n"));
    assert!(text.contains("; const 0 = \"hello\""));
    assert!(text.contains("PUSH_STRING \"hello\""));
    assert!(text.contains("JFALSE @"));
    assert!(text.trim_end().ends_with("RET"));
}

#[test]
fn test_disassemble_reports_bad_opcode() {
    let mut program = sample();
    program.code.extend_from_slice(&[0xEE, 0xEE]);
    assert!(matches!(
        program.disassemble(),
        Err(DecodeError::UnknownOpcode { code: 0xEEEE, .. })
    ));
}

#[test]
fn test_walk_matches_encoded_len() {
    let program = sample();
    let mut offset = 0;
    for inst in program.instructions().unwrap() {
        assert_eq!(inst.offset, offset);
        offset += inst.opcode.encoded_len();
    }
    assert_eq!(offset, program.len());
}
