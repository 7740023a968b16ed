//! The instruction set, and a reader for the images the serializer writes.
use core::fmt;

use super::{CompileError, Operand};

/// Every image starts with these bytes, followed by `NOP`.
pub const MAGIC: [u8; 3] = *b"ark";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Instruction {
    // Table markers and delimiters
    Nop = 0x00,
    SymTableStart = 0x01,
    ValTableStart = 0x02,
    NumberType = 0x03,
    StringType = 0x04,
    FuncType = 0x05,
    CodeSegmentStart = 0x06,

    // Executable
    LoadSymbol = 0x20,
    LoadConst = 0x21,
    PopJumpIfTrue = 0x22,
    Store = 0x23,
    Let = 0x24,
    PopJumpIfFalse = 0x25,
    Jump = 0x26,
    Ret = 0x27,
    Halt = 0x28,
    Call = 0x29,
    NewEnv = 0x2A,
}

impl Instruction {
    pub fn from_u8(value: u8) -> Option<Self> {
        use Instruction::*;
        Some(match value {
            0x00 => Nop,
            0x01 => SymTableStart,
            0x02 => ValTableStart,
            0x03 => NumberType,
            0x04 => StringType,
            0x05 => FuncType,
            0x06 => CodeSegmentStart,
            0x20 => LoadSymbol,
            0x21 => LoadConst,
            0x22 => PopJumpIfTrue,
            0x23 => Store,
            0x24 => Let,
            0x25 => PopJumpIfFalse,
            0x26 => Jump,
            0x27 => Ret,
            0x28 => Halt,
            0x29 => Call,
            0x2A => NewEnv,
            _ => return None,
        })
    }

    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Bytes of operand following the opcode inside a code segment.
    pub fn operand_size(self) -> usize {
        use Instruction::*;
        match self {
            LoadSymbol | LoadConst | PopJumpIfTrue | Store | Let | PopJumpIfFalse | Jump
            | Call => 2,
            _ => 0,
        }
    }

    /// Jumps whose operand is a target offset in the same page, not a distance.
    pub fn is_absolute_jump(self) -> bool {
        self == Instruction::Jump
    }

    pub fn name(self) -> &'static str {
        use Instruction::*;
        match self {
            Nop => "NOP",
            SymTableStart => "SYM_TABLE_START",
            ValTableStart => "VAL_TABLE_START",
            NumberType => "NUMBER_TYPE",
            StringType => "STRING_TYPE",
            FuncType => "FUNC_TYPE",
            CodeSegmentStart => "CODE_SEGMENT_START",
            LoadSymbol => "LOAD_SYMBOL",
            LoadConst => "LOAD_CONST",
            PopJumpIfTrue => "POP_JUMP_IF_TRUE",
            Store => "STORE",
            Let => "LET",
            PopJumpIfFalse => "POP_JUMP_IF_FALSE",
            Jump => "JUMP",
            Ret => "RET",
            Halt => "HALT",
            Call => "CALL",
            NewEnv => "NEW_ENV",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The one way a 16-bit value is written: big-endian, and never truncated.
pub fn encode_u16(value: usize, what: Operand) -> Result<[u8; 2], CompileError> {
    u16::try_from(value)
        .map(u16::to_be_bytes)
        .map_err(|_| CompileError::Overflow { what, value })
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("missing `ark` header")]
    BadHeader,
    #[error("image ends early at byte {at}")]
    UnexpectedEnd { at: usize },
    #[error("expected {expected} at byte {at}")]
    ExpectedMarker { expected: Instruction, at: usize },
    #[error("unknown constant type {byte:#04x} at byte {at}")]
    UnknownConstantType { byte: u8, at: usize },
    #[error("text at byte {at} is not UTF-8")]
    InvalidUtf8 { at: usize },
    #[error("bad page index {text:?} at byte {at}")]
    BadPageIndex { text: Box<str>, at: usize },
    #[error("unknown opcode {byte:#04x} at offset {at}")]
    UnknownOpcode { byte: u8, at: usize },
    #[error("operand of {instruction} at offset {at} is cut off")]
    TruncatedOperand { instruction: Instruction, at: usize },
}

/// A constant as it appears in an image. Numbers stay in their base-16 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Number(Box<str>),
    String(Box<str>),
    Page(u16),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(text) => write!(f, "number {text}"),
            Constant::String(text) => write!(f, "string {text:?}"),
            Constant::Page(page) => write!(f, "page {page}"),
        }
    }
}

/// One code segment, without its trailing `HALT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub code: Vec<u8>,
}

/// A decoded instruction and where it starts in its segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Op {
    pub offset: usize,
    pub instruction: Instruction,
    pub operand: Option<u16>,
}

impl Segment {
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            code: &self.code,
            offset: 0,
        }
    }
}

pub struct Instructions<'a> {
    code: &'a [u8],
    offset: usize,
}

impl Iterator for Instructions<'_> {
    type Item = Result<Op, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.offset;
        let byte = *self.code.get(at)?;
        let Some(instruction) = Instruction::from_u8(byte) else {
            // don't keep going through garbage
            self.offset = self.code.len();
            return Some(Err(DecodeError::UnknownOpcode { byte, at }));
        };

        let operand = match instruction.operand_size() {
            0 => None,
            _ => match self.code.get(at + 1..at + 3) {
                Some(&[hi, lo]) => Some(u16::from_be_bytes([hi, lo])),
                _ => {
                    self.offset = self.code.len();
                    return Some(Err(DecodeError::TruncatedOperand { instruction, at }));
                }
            },
        };

        self.offset = at + 1 + instruction.operand_size();
        Some(Ok(Op {
            offset: at,
            instruction,
            operand,
        }))
    }
}

/// A whole image, split back into its tables and segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bytecode {
    pub symbols: Vec<Box<str>>,
    pub constants: Vec<Constant>,
    pub segments: Vec<Segment>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(DecodeError::UnexpectedEnd { at: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes([self.byte()?, self.byte()?]))
    }

    fn expect(&mut self, expected: Instruction) -> Result<(), DecodeError> {
        let at = self.pos;
        match self.byte()? {
            byte if byte == expected.byte() => Ok(()),
            _ => Err(DecodeError::ExpectedMarker { expected, at }),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos + len;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(DecodeError::UnexpectedEnd {
                at: self.bytes.len(),
            })?;
        self.pos = end;
        Ok(slice)
    }

    /// Text up to (and consuming) the next `NOP`
    fn text(&mut self) -> Result<Box<str>, DecodeError> {
        let at = self.pos;
        let rest = &self.bytes[at.min(self.bytes.len())..];
        let len = rest
            .iter()
            .position(|&b| b == Instruction::Nop.byte())
            .ok_or(DecodeError::UnexpectedEnd {
                at: self.bytes.len(),
            })?;
        let text = core::str::from_utf8(&rest[..len]).map_err(|_| DecodeError::InvalidUtf8 { at })?;
        self.pos += len + 1;
        Ok(Box::from(text))
    }
}

impl Bytecode {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if !bytes.starts_with(&MAGIC) || bytes.get(MAGIC.len()) != Some(&Instruction::Nop.byte()) {
            return Err(DecodeError::BadHeader);
        }
        let mut cursor = Cursor {
            bytes,
            pos: MAGIC.len() + 1,
        };

        cursor.expect(Instruction::SymTableStart)?;
        let count = cursor.u16()?;
        let symbols = (0..count)
            .map(|_| cursor.text())
            .collect::<Result<Vec<_>, _>>()?;

        cursor.expect(Instruction::ValTableStart)?;
        let count = cursor.u16()?;
        let mut constants = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let at = cursor.pos;
            let constant = match Instruction::from_u8(cursor.byte()?) {
                Some(Instruction::NumberType) => Constant::Number(cursor.text()?),
                Some(Instruction::StringType) => Constant::String(cursor.text()?),
                Some(Instruction::FuncType) => {
                    let text = cursor.text()?;
                    let page = u16::from_str_radix(&text, 16)
                        .map_err(|_| DecodeError::BadPageIndex { text: text.clone(), at })?;
                    Constant::Page(page)
                }
                _ => {
                    return Err(DecodeError::UnknownConstantType {
                        byte: bytes[at],
                        at,
                    })
                }
            };
            constants.push(constant);
        }

        let mut segments = vec![];
        loop {
            cursor.expect(Instruction::CodeSegmentStart)?;
            let len = cursor.u16()? as usize;
            let code = cursor.take(len)?.to_vec();
            cursor.expect(Instruction::Halt)?;
            segments.push(Segment { code });
            if cursor.at_end() {
                break;
            }
        }

        Ok(Self {
            symbols,
            constants,
            segments,
        })
    }
}

/// A listing of the whole image, one instruction per line.
impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "symbols:")?;
        for (i, symbol) in self.symbols.iter().enumerate() {
            writeln!(f, "  {i} {symbol}")?;
        }
        writeln!(f, "constants:")?;
        for (i, constant) in self.constants.iter().enumerate() {
            writeln!(f, "  {i} {constant}")?;
        }
        for (i, segment) in self.segments.iter().enumerate() {
            writeln!(f, "page {i}:")?;
            for op in segment.instructions() {
                match op {
                    Ok(Op {
                        offset,
                        instruction,
                        operand: Some(operand),
                    }) => writeln!(f, "  {offset:04} {instruction} {operand}")?,
                    Ok(Op {
                        offset,
                        instruction,
                        operand: None,
                    }) => writeln!(f, "  {offset:04} {instruction}")?,
                    Err(err) => writeln!(f, "  !! {err}")?,
                }
            }
        }
        Ok(())
    }
}
