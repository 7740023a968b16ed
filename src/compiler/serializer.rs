//! Lays the tables and pages out as one image:
//!
//! ```text
//! 'a' 'r' 'k' NOP
//! SYM_TABLE_START  u16 count  (name NOP)*
//! VAL_TABLE_START  u16 count  (type text NOP)*
//! (CODE_SEGMENT_START  u16 length  code  HALT)+
//! ```
//!
//! `NOP` ends every name and constant, so none of them may contain a zero byte.
use super::{
    bytecode::{encode_u16, Instruction, MAGIC},
    constants::{ConstantPool, Value},
    page::CodePage,
    symbols::SymbolInterner,
    CompileError, Operand,
};

pub fn serialize(
    symbols: &SymbolInterner,
    constants: &ConstantPool,
    pages: &[CodePage],
) -> Result<Vec<u8>, CompileError> {
    let mut out = Vec::new();
    out.extend(MAGIC);
    out.push(Instruction::Nop.byte());

    write_symbols(symbols, &mut out)?;
    write_constants(constants, &mut out)?;

    if pages.is_empty() {
        write_segment(&CodePage::new(), &mut out)?;
    }
    for page in pages {
        write_segment(page, &mut out)?;
    }

    Ok(out)
}

fn write_text(kind: &'static str, text: &str, out: &mut Vec<u8>) -> Result<(), CompileError> {
    if text.bytes().any(|b| b == Instruction::Nop.byte()) {
        return Err(CompileError::EmbeddedNul {
            kind,
            text: Box::from(text),
        });
    }
    out.extend(text.as_bytes());
    out.push(Instruction::Nop.byte());
    Ok(())
}

fn write_symbols(symbols: &SymbolInterner, out: &mut Vec<u8>) -> Result<(), CompileError> {
    out.push(Instruction::SymTableStart.byte());
    out.extend(encode_u16(symbols.len(), Operand::SymbolCount)?);
    for name in symbols.iter() {
        write_text("symbol", name, out)?;
    }
    Ok(())
}

fn write_constants(constants: &ConstantPool, out: &mut Vec<u8>) -> Result<(), CompileError> {
    out.push(Instruction::ValTableStart.byte());
    out.extend(encode_u16(constants.len(), Operand::ConstantCount)?);
    for value in constants.values() {
        match value {
            Value::Number(number) => {
                out.push(Instruction::NumberType.byte());
                write_text("number", &number.display_hex(), out)?;
            }
            Value::String(text) => {
                out.push(Instruction::StringType.byte());
                write_text("string", text, out)?;
            }
            Value::PageAddress(page) => {
                // pages are addressed with 16 bits in code, hold the table to the same
                encode_u16(page.index(), Operand::PageIndex)?;
                out.push(Instruction::FuncType.byte());
                write_text("page", &format!("{:x}", page.index()), out)?;
            }
        }
    }
    Ok(())
}

fn write_segment(page: &CodePage, out: &mut Vec<u8>) -> Result<(), CompileError> {
    out.push(Instruction::CodeSegmentStart.byte());
    out.extend(encode_u16(page.len(), Operand::SegmentLength)?);
    page.write_bytes(out)?;
    out.push(Instruction::Halt.byte());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::serialize;
    use crate::{
        compiler::{
            bytecode::Instruction,
            constants::{ConstantPool, Value},
            page::{CodePage, CodePageSet, PageId, Slot},
            symbols::SymbolInterner,
            CompileError,
        },
        ArkNumber,
    };
    use assert2::{check, let_assert};

    #[test]
    fn empty_tables_and_pages() {
        let bytes = serialize(&SymbolInterner::new(), &ConstantPool::new(), &[]).unwrap();
        check!(bytes == b"ark\0\x01\0\0\x02\0\0\x06\0\0\x28".to_vec());

        // an empty page 0 comes out the same
        let pages = CodePageSet::new();
        let again =
            serialize(&SymbolInterner::new(), &ConstantPool::new(), pages.pages()).unwrap();
        check!(again == bytes);
    }

    #[test]
    fn tables() {
        let mut symbols = SymbolInterner::new();
        symbols.intern("print");
        symbols.intern("x");
        let mut constants = ConstantPool::new();
        constants.intern(Value::Number(ArkNumber::integer(255)));
        constants.intern(Value::String(Box::from("hi")));
        constants.intern(Value::PageAddress(PageId(26)));
        constants.intern(Value::Number(ArkNumber::parse("-2.5").unwrap()));

        let bytes = serialize(&symbols, &constants, &[]).unwrap();
        let mut expected = b"ark\0".to_vec();
        expected.extend(b"\x01\x00\x02print\0x\0");
        expected.extend(b"\x02\x00\x04");
        expected.extend(b"\x03ff\0");
        expected.extend(b"\x04hi\0");
        expected.extend(b"\x051a\0");
        expected.extend(b"\x03-2.8\0");
        expected.extend(b"\x06\x00\x00\x28");
        check!(bytes == expected);
    }

    #[test]
    fn every_page_ends_in_halt() {
        let mut first = CodePage::new();
        first.push_instruction(Instruction::LoadConst);
        first.push(Slot::PageRef(PageId(1)));
        let mut second = CodePage::new();
        second.push_instruction(Instruction::NewEnv);
        second.push_instruction(Instruction::Ret);

        let bytes = serialize(&SymbolInterner::new(), &ConstantPool::new(), &[first, second])
            .unwrap();
        check!(
            bytes[10..]
                == [0x06, 0x00, 0x03, 0x21, 0x00, 0x01, 0x28, 0x06, 0x00, 0x02, 0x2A, 0x27, 0x28]
        );
    }

    #[test]
    fn nul_bytes_are_rejected() {
        let mut symbols = SymbolInterner::new();
        symbols.intern("a\0b");
        let_assert!(
            Err(CompileError::EmbeddedNul { kind: "symbol", .. }) =
                serialize(&symbols, &ConstantPool::new(), &[])
        );

        let mut constants = ConstantPool::new();
        constants.intern(Value::String(Box::from("\0")));
        let_assert!(
            Err(CompileError::EmbeddedNul { kind: "string", .. }) =
                serialize(&SymbolInterner::new(), &constants, &[])
        );
    }
}
