//! Compiled program: code buffer plus constant pool
//!
//! A [`Program`] is the only thing the VM receives from the compiler. All
//! scoping and closure information is already encoded in the instructions.

use crate::error::{BuildError, DecodeError};
use crate::instruction::{Instruction, OperandValue};
use crate::opcode::{Opcode, Operand};

/// Magic number for serialized programs
pub const MAGIC: [u8; 4] = *b"NJBC";

/// Current serialization version
pub const VERSION: u8 = 1;

/// Bytecode plus the string constants it refers to
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// File the program was compiled from, used in stack traces
    pub filename: String,
    /// Encoded instructions
    pub code: Vec<u8>,
    /// String constant pool
    pub constants: Vec<String>,
}

impl Program {
    /// Create an empty program
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            code: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Size of the code buffer in bytes
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Whether the code buffer is empty
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    fn read_bytes<const N: usize>(&self, offset: &mut usize) -> Result<[u8; N], DecodeError> {
        let start = *offset;
        let bytes = self
            .code
            .get(start..start + N)
            .ok_or(DecodeError::UnexpectedEnd(start))?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        *offset = start + N;
        Ok(out)
    }

    /// Read an opcode and advance the offset
    pub fn read_code(&self, offset: &mut usize) -> Result<Opcode, DecodeError> {
        let at = *offset;
        let code = u16::from_le_bytes(self.read_bytes::<2>(offset)?);
        Opcode::from_u16(code).ok_or(DecodeError::UnknownOpcode { code, offset: at })
    }

    /// Read an address operand
    pub fn read_address(&self, offset: &mut usize) -> Result<usize, DecodeError> {
        let at = *offset;
        let raw = u64::from_le_bytes(self.read_bytes::<8>(offset)?);
        usize::try_from(raw).map_err(|_| DecodeError::UnexpectedEnd(at))
    }

    /// Read a number operand
    pub fn read_number(&self, offset: &mut usize) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.read_bytes::<8>(offset)?))
    }

    /// Read a string operand, resolving it through the constant pool
    pub fn read_string(&self, offset: &mut usize) -> Result<&str, DecodeError> {
        let at = *offset;
        let index = u64::from_le_bytes(self.read_bytes::<8>(offset)?);
        usize::try_from(index)
            .ok()
            .and_then(|i| self.constants.get(i))
            .map(String::as_str)
            .ok_or(DecodeError::BadConstant { index, offset: at })
    }

    /// Read an integer operand
    pub fn read_integer(&self, offset: &mut usize) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.read_bytes::<4>(offset)?))
    }

    /// Read a boolean operand
    pub fn read_boolean(&self, offset: &mut usize) -> Result<bool, DecodeError> {
        Ok(self.read_bytes::<1>(offset)?[0] != 0)
    }

    /// Decode the instruction at `offset`
    pub fn decode_at(&self, offset: usize) -> Result<Instruction, DecodeError> {
        let mut cursor = offset;
        let opcode = self.read_code(&mut cursor)?;
        let mut operands = Vec::with_capacity(opcode.operands().len());
        for operand in opcode.operands() {
            let value = match operand {
                Operand::Address => OperandValue::Address(self.read_address(&mut cursor)?),
                Operand::Number => OperandValue::Number(self.read_number(&mut cursor)?),
                Operand::String => {
                    OperandValue::String(self.read_string(&mut cursor)?.to_string())
                }
                Operand::Integer => OperandValue::Integer(self.read_integer(&mut cursor)?),
                Operand::Boolean => OperandValue::Boolean(self.read_boolean(&mut cursor)?),
            };
            operands.push(value);
        }
        Ok(Instruction {
            offset,
            opcode,
            operands,
        })
    }

    /// Decode every instruction in order
    pub fn instructions(&self) -> Result<Vec<Instruction>, DecodeError> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < self.code.len() {
            let inst = self.decode_at(offset)?;
            offset = inst.next_offset();
            out.push(inst);
        }
        Ok(out)
    }

    /// Render a human-readable listing, one instruction per line
    pub fn disassemble(&self) -> Result<String, DecodeError> {
        let mut out = format!("; {}\n", self.filename);
        for (i, constant) in self.constants.iter().enumerate() {
            out.push_str(&format!("; const {} = {:?}\n", i, constant));
        }
        for inst in self.instructions()? {
            out.push_str(&inst.to_string());
            out.push('\n');
        }
        Ok(out)
    }

    /// Serialize the program to its binary file format
    pub fn to_bytes(&self) -> Result<Vec<u8>, BuildError> {
        let mut bytes = Vec::with_capacity(self.code.len() + 64);

        bytes.extend_from_slice(&MAGIC);
        bytes.push(VERSION);

        write_str(&mut bytes, &self.filename, "filename")?;

        write_len(&mut bytes, self.constants.len(), "constant pool")?;
        for constant in &self.constants {
            write_str(&mut bytes, constant, "constant")?;
        }

        write_len(&mut bytes, self.code.len(), "code")?;
        bytes.extend_from_slice(&self.code);

        Ok(bytes)
    }

    /// Deserialize a program from its binary file format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < 5 || bytes[0..4] != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        if bytes[4] != VERSION {
            return Err(DecodeError::UnsupportedVersion(bytes[4]));
        }

        let mut offset = 5;
        let filename = read_str(bytes, &mut offset)?;

        let const_count = read_u32(bytes, &mut offset)? as usize;
        let mut constants = Vec::with_capacity(const_count.min(4096));
        for _ in 0..const_count {
            constants.push(read_str(bytes, &mut offset)?);
        }

        let code_len = read_u32(bytes, &mut offset)? as usize;
        let code = bytes
            .get(offset..offset + code_len)
            .ok_or(DecodeError::UnexpectedEnd(offset))?
            .to_vec();
        offset += code_len;
        if offset != bytes.len() {
            return Err(DecodeError::TrailingData(offset));
        }

        Ok(Self {
            filename,
            code,
            constants,
        })
    }
}

fn write_len(bytes: &mut Vec<u8>, len: usize, section: &'static str) -> Result<(), BuildError> {
    let len = u32::try_from(len).map_err(|_| BuildError::TooLarge { section, len })?;
    bytes.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn write_str(bytes: &mut Vec<u8>, s: &str, section: &'static str) -> Result<(), BuildError> {
    write_len(bytes, s.len(), section)?;
    bytes.extend_from_slice(s.as_bytes());
    Ok(())
}

fn read_u32(bytes: &[u8], offset: &mut usize) -> Result<u32, DecodeError> {
    let raw = bytes
        .get(*offset..*offset + 4)
        .ok_or(DecodeError::UnexpectedEnd(*offset))?;
    *offset += 4;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn read_str(bytes: &[u8], offset: &mut usize) -> Result<String, DecodeError> {
    let len = read_u32(bytes, offset)? as usize;
    let start = *offset;
    let raw = bytes
        .get(start..start + len)
        .ok_or(DecodeError::UnexpectedEnd(start))?;
    *offset += len;
    String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8(start))
}
