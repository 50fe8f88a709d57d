use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use capstone::{arch, prelude::*, Capstone};

use crate::backends::InstructionDecoder;
use crate::model::{Address, Instruction, Operand};

/// Longest x86 instruction encoding.
const MAX_INSN_LEN: usize = 15;

/// Processor mode used when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecoderMode {
    #[default]
    X86,
    X86_64,
}

impl DecoderMode {
    /// Parse an architecture hint (`x86`, `i386`, `x86_64`, `amd64`).
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.to_lowercase().as_str() {
            "x86" | "i386" | "x86_32" => Some(DecoderMode::X86),
            "x86_64" | "amd64" | "x64" => Some(DecoderMode::X86_64),
            _ => None,
        }
    }
}

thread_local! {
    // Capstone handles are not `Send`; each thread keeps one per mode.
    static HANDLES: RefCell<HashMap<DecoderMode, Capstone>> = RefCell::new(HashMap::new());
}

/// Capstone-backed x86 decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapstoneDecoder {
    mode: DecoderMode,
}

impl CapstoneDecoder {
    pub fn new(mode: DecoderMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DecoderMode {
        self.mode
    }

    /// Run `f` with this thread's capstone handle for the decoder's mode,
    /// building the handle on first use.
    fn with_handle<R>(&self, f: impl FnOnce(&Capstone) -> Option<R>) -> Option<R> {
        HANDLES.with(|handles| {
            let mut handles = handles.borrow_mut();
            let cs = match handles.entry(self.mode) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(self.make_cs()?),
            };
            f(cs)
        })
    }

    fn make_cs(&self) -> Option<Capstone> {
        let mode = match self.mode {
            DecoderMode::X86 => arch::x86::ArchMode::Mode32,
            DecoderMode::X86_64 => arch::x86::ArchMode::Mode64,
        };
        match Capstone::new().x86().mode(mode).detail(true).build() {
            Ok(cs) => Some(cs),
            Err(e) => {
                tracing::warn!("capstone init failed: {e}");
                None
            }
        }
    }
}

/// Library version, reported in logs and the CLI.
pub fn capstone_version() -> String {
    let (major, minor) = Capstone::lib_version();
    format!("{major}.{minor}")
}

fn convert_operands(detail: &capstone::InsnDetail, is_branch: bool) -> Vec<Operand> {
    detail
        .arch_detail()
        .operands()
        .iter()
        .filter_map(|op| match op {
            capstone::arch::ArchOperand::X86Operand(op) => Some(match &op.op_type {
                capstone::arch::x86::X86OperandType::Imm(imm) => {
                    // 32-bit immediates are kept as their unsigned bit pattern.
                    let value = *imm as u64;
                    if is_branch {
                        Operand::near(value)
                    } else {
                        Operand::imm(value)
                    }
                }
                capstone::arch::x86::X86OperandType::Mem(mem) => Operand::mem(mem.disp() as u64),
                capstone::arch::x86::X86OperandType::Reg(_) => Operand::reg(),
                _ => Operand::void(),
            }),
            _ => None,
        })
        .collect()
}

impl InstructionDecoder for CapstoneDecoder {
    fn name(&self) -> &str {
        "capstone"
    }

    fn decode(&self, address: Address, bytes: &[u8]) -> Option<Instruction> {
        if bytes.is_empty() {
            return None;
        }
        let window = &bytes[..bytes.len().min(MAX_INSN_LEN)];
        let (mnemonic, len, text, operands) = self.with_handle(|cs| {
            let insns = cs.disasm_count(window, address.value(), 1).ok()?;
            let insn = insns.iter().next()?;

            let mnemonic = insn.mnemonic().unwrap_or("").to_lowercase();
            if mnemonic.is_empty() {
                return None;
            }
            let is_branch = mnemonic.starts_with('j') || mnemonic == "call";
            let operands = match cs.insn_detail(insn) {
                Ok(detail) => convert_operands(&detail, is_branch),
                Err(_) => Vec::new(),
            };
            let text = insn.op_str().unwrap_or("").to_string();
            Some((mnemonic, insn.bytes().len() as u64, text, operands))
        })?;

        let mut decoded =
            Instruction::new(address, mnemonic, len).with_operands(operands).with_text(text);
        // 32-bit mode reports sign-extended immediates; keep the 32-bit pattern.
        if self.mode == DecoderMode::X86 {
            for op in &mut decoded.operands {
                op.value &= 0xFFFF_FFFF;
                op.addr &= 0xFFFF_FFFF;
            }
        }
        Some(decoded)
    }
}
