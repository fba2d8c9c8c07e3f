//! Decoded instruction representation
//!
//! The VM reads operands straight from the code buffer; this form is used
//! by the disassembler and by tools that need to walk a program.

use crate::opcode::Opcode;

/// A decoded operand value
#[derive(Debug, Clone, PartialEq)]
pub enum OperandValue {
    /// Code offset
    Address(usize),
    /// Number immediate
    Number(f64),
    /// Constant pool string
    String(String),
    /// Integer immediate
    Integer(i32),
    /// Boolean immediate
    Boolean(bool),
}

impl std::fmt::Display for OperandValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperandValue::Address(addr) => write!(f, "@{:04}", addr),
            OperandValue::Number(n) => write!(f, "{}", n),
            OperandValue::String(s) => write!(f, "{:?}", s),
            OperandValue::Integer(i) => write!(f, "{}", i),
            OperandValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// A single decoded instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Offset of the opcode in the code buffer
    pub offset: usize,
    /// The opcode
    pub opcode: Opcode,
    /// Operands in encoding order
    pub operands: Vec<OperandValue>,
}

impl Instruction {
    /// Offset of the instruction that follows this one
    pub fn next_offset(&self) -> usize {
        self.offset + self.opcode.encoded_len()
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04} {}", self.offset, self.opcode)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", operand)?;
            } else {
                write!(f, ", {}", operand)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_display() {
        let inst = Instruction {
            offset: 12,
            opcode: Opcode::PushBreakLabel,
            operands: vec![
                OperandValue::String("outer".to_string()),
                OperandValue::Address(40),
            ],
        };
        assert_eq!(inst.to_string(), "0012 PUSH_BREAK_LABEL \"outer\", @0040");
        assert_eq!(inst.next_offset(), 12 + 18);
    }
}
