//! Core data model for an analyzed address space.
//!
//! These types describe what the analysis database already knows about an
//! image: addresses and their classification flags, decoded instructions,
//! functions, segments, and rendered listing lines. They are plain values;
//! the database adapter owns the authoritative state.

use std::fmt;
use std::ops::{Add, Sub};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// One byte location in the analyzed image.
///
/// Failure or absence is expressed as `Option<Address>` rather than a magic
/// sentinel value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Address(pub u64);

impl Address {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Address `n` bytes further on (saturating at the top of the space).
    pub fn offset(self, n: u64) -> Self {
        Self(self.0.saturating_add(n))
    }

    /// Round up to the next multiple of `alignment` (a power of two).
    pub fn align_up(self, alignment: u64) -> Self {
        let mask = alignment - 1;
        Self(self.0.saturating_add(mask) & !mask)
    }

    pub fn is_aligned(self, alignment: u64) -> bool {
        self.0 % alignment == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<u32> for Address {
    fn from(value: u32) -> Self {
        Self(u64::from(value))
    }
}

impl Add<u64> for Address {
    type Output = Address;

    fn add(self, rhs: u64) -> Address {
        self.offset(rhs)
    }
}

impl Sub for Address {
    type Output = u64;

    fn sub(self, rhs: Address) -> u64 {
        self.0.saturating_sub(rhs.0)
    }
}

bitflags! {
    /// Per-address classification bits, as reported by the analysis database.
    ///
    /// The predicates overlap: an alignment item is also data, a function
    /// entry is also code, and so on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Flags: u32 {
        const CODE    = 1 << 0;
        const DATA    = 1 << 1;
        const UNKNOWN = 1 << 2;
        /// Inside an item, but not at its head.
        const TAIL    = 1 << 3;
        const ALIGN   = 1 << 4;
        /// Location typed as a structure member.
        const STRUCT  = 1 << 5;
        /// Has at least one incoming cross-reference.
        const XREF    = 1 << 6;
        const COMMENT = 1 << 7;
        const STRLIT  = 1 << 8;
        /// Operand 0 is typed as an offset.
        const OFF0    = 1 << 9;
        /// Operand 1 is typed as an offset.
        const OFF1    = 1 << 10;
        /// Start of a function.
        const FUNC    = 1 << 11;
    }
}

impl Flags {
    pub fn is_code(self) -> bool {
        self.contains(Flags::CODE)
    }

    pub fn is_data(self) -> bool {
        self.contains(Flags::DATA)
    }

    pub fn is_unknown(self) -> bool {
        self.contains(Flags::UNKNOWN)
    }

    pub fn is_align(self) -> bool {
        self.contains(Flags::ALIGN)
    }

    pub fn is_struct(self) -> bool {
        self.contains(Flags::STRUCT)
    }

    pub fn has_xref(self) -> bool {
        self.contains(Flags::XREF)
    }

    pub fn has_comment(self) -> bool {
        self.contains(Flags::COMMENT)
    }

    pub fn is_strlit(self) -> bool {
        self.contains(Flags::STRLIT)
    }

    pub fn is_func(self) -> bool {
        self.contains(Flags::FUNC)
    }

    /// Whether operand `n` is typed as an offset. Only operands 0 and 1 are tracked.
    pub fn is_offset(self, n: usize) -> bool {
        match n {
            0 => self.contains(Flags::OFF0),
            1 => self.contains(Flags::OFF1),
            _ => false,
        }
    }

    /// Collapse the bitset into a single classification.
    pub fn kind(self) -> ItemKind {
        if self.contains(Flags::TAIL) {
            ItemKind::Tail
        } else if self.is_code() {
            ItemKind::Code
        } else if self.is_align() {
            ItemKind::Align
        } else if self.is_data() {
            ItemKind::Data
        } else {
            ItemKind::Unknown
        }
    }
}

/// Explicit classification of a location, derived from [`Flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Code,
    Data,
    Align,
    Unknown,
    Tail,
}

/// Addressing mode of a decoded operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandKind {
    #[default]
    Void,
    Reg,
    Imm,
    Mem,
    Near,
}

/// One operand of a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Operand {
    #[serde(default)]
    pub kind: OperandKind,
    /// Raw immediate value.
    #[serde(default)]
    pub value: u64,
    /// Address derived from the addressing mode (displacement, branch target).
    #[serde(default)]
    pub addr: u64,
}

impl Operand {
    pub const fn void() -> Self {
        Self { kind: OperandKind::Void, value: 0, addr: 0 }
    }

    pub const fn imm(value: u64) -> Self {
        Self { kind: OperandKind::Imm, value, addr: value }
    }

    pub const fn mem(addr: u64) -> Self {
        Self { kind: OperandKind::Mem, value: 0, addr }
    }

    pub const fn near(target: u64) -> Self {
        Self { kind: OperandKind::Near, value: target, addr: target }
    }

    pub const fn reg() -> Self {
        Self { kind: OperandKind::Reg, value: 0, addr: 0 }
    }

    /// Whether this operand encodes a reference to `target`.
    pub fn references(&self, target: Address) -> bool {
        !matches!(self.kind, OperandKind::Void | OperandKind::Reg)
            && (self.addr == target.0 || self.value == target.0)
    }
}

/// A decoded instruction. Decoded fresh for each query and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub address: Address,
    /// Canonical lowercase mnemonic.
    pub mnemonic: String,
    #[serde(default)]
    pub operands: Vec<Operand>,
    /// Encoded length in bytes.
    pub len: u64,
    /// Rendered operand text, used only for listings.
    #[serde(default)]
    pub text: String,
}

impl Instruction {
    pub fn new(address: Address, mnemonic: impl Into<String>, len: u64) -> Self {
        Self { address, mnemonic: mnemonic.into(), operands: Vec::new(), len, text: String::new() }
    }

    pub fn with_operands(mut self, operands: Vec<Operand>) -> Self {
        self.operands = operands;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Operand `n`, or a void operand when the instruction has fewer.
    pub fn operand(&self, n: usize) -> Operand {
        self.operands.get(n).copied().unwrap_or_else(Operand::void)
    }

    /// Address of the instruction that follows this one.
    pub fn next(&self) -> Address {
        self.address.offset(self.len)
    }
}

/// A function: a contiguous range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub start: Address,
    pub end: Address,
}

impl Function {
    pub fn new(start: impl Into<Address>, end: impl Into<Address>) -> Self {
        Self { start: start.into(), end: end.into() }
    }

    pub fn contains(&self, ea: Address) -> bool {
        ea >= self.start && ea < self.end
    }
}

/// Declared segment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Code,
    Data,
    #[default]
    Other,
}

/// A named, typed, contiguous address range `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    #[serde(default)]
    pub kind: SegmentKind,
    pub start: Address,
    pub end: Address,
}

impl Segment {
    pub fn new(
        name: impl Into<String>,
        kind: SegmentKind,
        start: impl Into<Address>,
        end: impl Into<Address>,
    ) -> Self {
        Self { name: name.into(), kind, start: start.into(), end: end.into() }
    }

    pub fn contains(&self, ea: Address) -> bool {
        ea >= self.start && ea < self.end
    }
}

/// Display type requested for an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandRepr {
    #[default]
    Default,
    Number,
    Char,
    Offset,
}

/// One line of rendered disassembly text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingLine {
    pub address: Address,
    pub text: String,
    /// `true` for the item's own line; `false` for headers, separators and
    /// other decoration.
    pub primary: bool,
}
