//! Code pages hold instructions before they are laid out as bytes.
use core::fmt;

use super::{
    bytecode::{encode_u16, Instruction},
    CompileError, Operand,
};

/// Index of a page in its [`CodePageSet`]. Only the set hands these out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(pub(crate) usize);

impl PageId {
    /// The program's top level
    pub const MAIN: PageId = PageId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// An opcode, or one half of a 16-bit operand
    Byte(u8),
    /// A page index, written as two bytes once the layout is final.
    ///
    /// The compiler itself never emits one, since `fun` loads its page through
    /// the constant pool. It is here for callers appending a raw page operand.
    PageRef(PageId),
}

impl Slot {
    /// Bytes taken up in the output
    pub fn width(self) -> usize {
        match self {
            Slot::Byte(_) => 1,
            Slot::PageRef(_) => 2,
        }
    }
}

/// An ordered run of slots, plus where its absolute jump operands sit so that
/// they can follow the code when it is spliced somewhere else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodePage {
    slots: Vec<Slot>,
    // slot index of the high byte of each absolute jump target
    absolute_jumps: Vec<usize>,
    width: usize,
}

impl CodePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Width in bytes once serialized, which is also the offset the next
    /// instruction will start at.
    pub fn len(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn push(&mut self, slot: Slot) {
        self.width += slot.width();
        self.slots.push(slot);
    }

    pub fn push_instruction(&mut self, instruction: Instruction) {
        self.push(Slot::Byte(instruction.byte()));
    }

    /// Pushes an instruction and its 16-bit operand.
    pub fn push_with_operand(
        &mut self,
        instruction: Instruction,
        value: usize,
        what: Operand,
    ) -> Result<(), CompileError> {
        let [hi, lo] = encode_u16(value, what)?;
        self.push_instruction(instruction);
        self.push(Slot::Byte(hi));
        self.push(Slot::Byte(lo));
        Ok(())
    }

    /// Pushes a jump to `target`, an offset in this page. The target is
    /// rebased if the page is later spliced after other code.
    pub fn push_jump_target(
        &mut self,
        instruction: Instruction,
        target: usize,
    ) -> Result<(), CompileError> {
        self.push_with_operand(instruction, target, Operand::JumpOffset)?;
        self.absolute_jumps.push(self.slots.len() - 2);
        Ok(())
    }

    /// Writes the page out, page refs expanded big-endian.
    pub fn write_bytes(&self, out: &mut Vec<u8>) -> Result<(), CompileError> {
        out.reserve(self.width);
        for slot in &self.slots {
            match *slot {
                Slot::Byte(byte) => out.push(byte),
                Slot::PageRef(page) => out.extend(encode_u16(page.0, Operand::PageIndex)?),
            }
        }
        Ok(())
    }

    /// Appends `other` after this page's code.
    pub fn splice(&mut self, other: CodePage) -> Result<(), CompileError> {
        let base_offset = self.width;
        let base_slot = self.slots.len();

        let CodePage {
            mut slots,
            absolute_jumps,
            width,
        } = other;
        for &at in &absolute_jumps {
            if let [Slot::Byte(hi), Slot::Byte(lo)] = &mut slots[at..at + 2] {
                let target = u16::from_be_bytes([*hi, *lo]) as usize + base_offset;
                [*hi, *lo] = encode_u16(target, Operand::JumpOffset)?;
            }
        }

        self.slots.extend(slots);
        self.absolute_jumps
            .extend(absolute_jumps.into_iter().map(|at| at + base_slot));
        self.width += width;
        Ok(())
    }
}

/// Every page of a program. Page 0 always exists; new pages go at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodePageSet {
    pages: Vec<CodePage>,
}

impl Default for CodePageSet {
    fn default() -> Self {
        Self::new()
    }
}

impl CodePageSet {
    pub fn new() -> Self {
        Self {
            pages: vec![CodePage::new()],
        }
    }

    pub fn allocate_page(&mut self) -> PageId {
        self.pages.push(CodePage::new());
        let id = PageId(self.pages.len() - 1);
        tracing::debug!(page = id.0, "allocated page");
        id
    }

    /// The most recently allocated page
    pub fn current(&self) -> PageId {
        PageId(self.pages.len() - 1)
    }

    pub fn append(&mut self, page: PageId, slot: Slot) {
        self.pages[page.0].push(slot);
    }

    pub fn append_current(&mut self, slot: Slot) {
        let current = self.current();
        self.append(current, slot);
    }

    /// Splices finished code onto the end of `page`.
    pub fn install(&mut self, page: PageId, code: CodePage) -> Result<(), CompileError> {
        self.pages[page.0].splice(code)
    }

    pub fn get(&self, page: PageId) -> Option<&CodePage> {
        self.pages.get(page.0)
    }

    pub fn pages(&self) -> &[CodePage] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Never true, page 0 is always there.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PageId, &CodePage)> + '_ {
        self.pages.iter().enumerate().map(|(i, page)| (PageId(i), page))
    }
}
