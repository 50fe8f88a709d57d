//! Instruction classification predicates.
//!
//! The instruction forms are pure and total over a decoded instruction. The
//! `*_at` forms decode first and fail closed: an address that does not decode
//! is never classified as anything.

use crate::db::AnalysisDb;
use crate::model::{Address, Function, Instruction};

/// First letter of every branch mnemonic.
pub const BRANCH_PREFIX: char = 'j';

/// Second letter that marks `jmp` rather than a conditional branch.
pub const UNCONDITIONAL_MARKER: char = 'm';

pub const UNCONDITIONAL_JUMP: &str = "jmp";

/// Prefixes covering near, far and interrupt returns (`ret`, `retn`, `retf`, `iret`, `iretd`).
pub const RETURN_PREFIXES: &[&str] = &["ret", "iret"];

/// Instructions after which execution never falls through.
pub const TRAP_MNEMONICS: &[&str] = &["hlt", "ud2"];

pub fn is_branch(ins: &Instruction) -> bool {
    ins.mnemonic.starts_with(BRANCH_PREFIX)
}

pub fn is_conditional_branch(ins: &Instruction) -> bool {
    is_branch(ins) && ins.mnemonic.chars().nth(1) != Some(UNCONDITIONAL_MARKER)
}

pub fn is_unconditional_jump(ins: &Instruction) -> bool {
    ins.mnemonic == UNCONDITIONAL_JUMP
}

pub fn is_return(ins: &Instruction) -> bool {
    RETURN_PREFIXES.iter().any(|prefix| ins.mnemonic.starts_with(prefix))
}

/// Stopping condition for forward scans: returns, jumps and traps.
pub fn is_function_terminator(ins: &Instruction) -> bool {
    is_return(ins) || is_unconditional_jump(ins) || TRAP_MNEMONICS.contains(&ins.mnemonic.as_str())
}

pub fn is_branch_at<D: AnalysisDb + ?Sized>(db: &D, ea: Address) -> bool {
    db.decode(ea).is_some_and(|ins| is_branch(&ins))
}

pub fn is_conditional_branch_at<D: AnalysisDb + ?Sized>(db: &D, ea: Address) -> bool {
    db.decode(ea).is_some_and(|ins| is_conditional_branch(&ins))
}

pub fn is_unconditional_jump_at<D: AnalysisDb + ?Sized>(db: &D, ea: Address) -> bool {
    db.decode(ea).is_some_and(|ins| is_unconditional_jump(&ins))
}

pub fn is_return_at<D: AnalysisDb + ?Sized>(db: &D, ea: Address) -> bool {
    db.decode(ea).is_some_and(|ins| is_return(&ins))
}

pub fn is_function_terminator_at<D: AnalysisDb + ?Sized>(db: &D, ea: Address) -> bool {
    db.decode(ea).is_some_and(|ins| is_function_terminator(&ins))
}

/// Whether `ea` holds a padding instruction. Undecodable addresses are not padding.
pub fn is_alignment_padding<D: AnalysisDb + ?Sized>(db: &D, ea: Address) -> bool {
    db.decode(ea).is_some() && db.is_padding_insn(ea)
}

/// Last instruction of `func`, found by stepping back from its end.
pub fn last_instruction<D: AnalysisDb + ?Sized>(db: &D, func: &Function) -> Option<Instruction> {
    let last = db.prev_head(func.end)?;
    if last < func.start {
        return None;
    }
    db.decode(last)
}

/// A function is truncated when its last instruction is neither a return nor
/// an unconditional jump. A function whose tail cannot be decoded counts as
/// truncated.
pub fn is_truncated<D: AnalysisDb + ?Sized>(db: &D, func: &Function) -> bool {
    match last_instruction(db, func) {
        Some(ins) => !is_return(&ins) && !is_unconditional_jump(&ins),
        None => true,
    }
}

pub fn ends_validly<D: AnalysisDb + ?Sized>(db: &D, func: &Function) -> bool {
    !is_truncated(db, func)
}
