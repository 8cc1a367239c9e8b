//! Gadgets and the backward chain walk that builds them.

use std::fmt;

use crate::classify::canonical_mnemonic;
use crate::history::InstructionHistory;
use crate::instruction::{Instruction, Operation};
use crate::Address;

/// Longest chain kept behind a `ret`
pub const MAX_RET_LENGTH: usize = 30;

/// Longest chain kept behind an indirect jump or a system call
pub const MAX_NO_RET_LENGTH: usize = 6;

/// What ends a gadget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GadgetKind {
    /// Ends in a return
    Ret,
    /// Ends in an indirect register jump
    Jop,
    /// Ends in `ecall`
    Syscall,
}

impl GadgetKind {
    /// Terminator kind of an instruction, if it ends gadgets at all.
    ///
    /// Only register jumps (`jr`) end JOP gadgets; linking jumps classify as
    /// calls and never do.
    pub fn of(instruction: &Instruction) -> Option<GadgetKind> {
        match instruction.operation {
            Operation::Return => Some(GadgetKind::Ret),
            Operation::Syscall => Some(GadgetKind::Syscall),
            Operation::Jump if canonical_mnemonic(instruction.mnemonic(), "") == "jr" => {
                Some(GadgetKind::Jop)
            }
            _ => None,
        }
    }

    /// Maximum number of instructions in a gadget of this kind
    pub fn max_len(&self) -> usize {
        match self {
            GadgetKind::Ret => MAX_RET_LENGTH,
            GadgetKind::Jop | GadgetKind::Syscall => MAX_NO_RET_LENGTH,
        }
    }
}

impl fmt::Display for GadgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GadgetKind::Ret => write!(f, "ret"),
            GadgetKind::Jop => write!(f, "jop"),
            GadgetKind::Syscall => write!(f, "syscall"),
        }
    }
}

/// A bounded chain of instructions ending in a terminator.
///
/// Instructions are stored terminator first, i.e. in reverse program order.
/// The gadget owns copies of its instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gadget {
    kind: GadgetKind,
    instructions: Vec<Instruction>,
    max_len: usize,
}

impl Gadget {
    /// Start a gadget from its terminator, bounded by the kind's maximum length.
    pub fn new(kind: GadgetKind, terminator: Instruction) -> Self {
        Self::with_max_len(kind, terminator, kind.max_len())
    }

    /// Start a gadget with an explicit length bound (at least 1).
    pub fn with_max_len(kind: GadgetKind, terminator: Instruction, max_len: usize) -> Self {
        let max_len = max_len.max(1);
        let mut instructions = Vec::with_capacity(max_len);
        instructions.push(terminator);
        Self {
            kind,
            instructions,
            max_len,
        }
    }

    /// Append the next earlier instruction. Returns false when the gadget is full.
    pub fn push(&mut self, instruction: Instruction) -> bool {
        if self.is_full() {
            return false;
        }
        self.instructions.push(instruction);
        true
    }

    pub fn kind(&self) -> GadgetKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Never true; a gadget always holds its terminator
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn is_full(&self) -> bool {
        self.instructions.len() >= self.max_len
    }

    /// Instructions, terminator first
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The terminating instruction
    pub fn terminator(&self) -> &Instruction {
        &self.instructions[0]
    }

    /// Instructions in program order, terminator last
    pub fn program_order(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().rev()
    }

    /// Address the gadget starts at: that of its earliest instruction
    pub fn address(&self) -> Address {
        self.instructions[self.instructions.len() - 1].address
    }

    /// Keep only the terminator and the `len - 1` instructions before it.
    pub fn truncate(&mut self, len: usize) {
        self.instructions.truncate(len.max(1));
    }

    /// Position and value of the first `addi sp, sp, N` in the chain
    pub fn stack_adjustment(&self) -> Option<(usize, i16)> {
        self.instructions
            .iter()
            .enumerate()
            .find(|(_, insn)| insn.adjusts_sp())
            .and_then(|(index, insn)| insn.immediate.map(|imm| (index, imm)))
    }
}

impl fmt::Display for Gadget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}:", self.address())?;
        for insn in self.program_order() {
            write!(f, " {};", insn.text)?;
        }
        Ok(())
    }
}

/// Whether an instruction may sit inside a gadget.
pub fn is_valid(instruction: &Instruction) -> bool {
    !matches!(
        instruction.operation,
        Operation::Compare
            | Operation::Jump
            | Operation::Break
            | Operation::Return
            | Operation::Call
            | Operation::Syscall
            | Operation::Unsupported
            | Operation::Atomic
            | Operation::Io
    ) && !instruction.text.contains("auipc")
        && !messes_with_sp(instruction)
}

/// Stack pointer decrements: `addi sp, sp, -N` or `sub sp, ...`.
pub fn messes_with_sp(instruction: &Instruction) -> bool {
    let negative_addi = instruction.operation == Operation::Add
        && instruction.immediate.is_some_and(|imm| imm < 0)
        && instruction.dest == "sp";
    let sub = instruction.operation == Operation::Sub && instruction.dest == "sp";

    negative_addi || sub
}

/// The return address reload that bounds a RET gadget.
pub fn is_last_instruction(instruction: &Instruction) -> bool {
    instruction.operation == Operation::Load && instruction.dest == "ra"
}

/// Build the gadget ending at history slot `index`.
pub fn build_gadget(history: &InstructionHistory, index: usize, kind: GadgetKind) -> Option<Gadget> {
    match kind {
        GadgetKind::Ret => build_ret_gadget(history, index),
        GadgetKind::Jop | GadgetKind::Syscall => build_chain(history, index, kind),
    }
}

/// Walk back from a `ret` until the `ra` reload.
///
/// The chain is rejected when the walk hits an invalid instruction, the
/// length cap, or the start of the history before finding the reload.
pub fn build_ret_gadget(history: &InstructionHistory, index: usize) -> Option<Gadget> {
    let terminator = history.at(index)?;
    let mut gadget = Gadget::new(GadgetKind::Ret, terminator.clone());
    let mut current = history.prev(index);

    while !gadget.is_full() {
        let insn = history.at(current)?;

        if is_last_instruction(insn) {
            gadget.push(insn.clone());
            return Some(gadget);
        }
        if !is_valid(insn) {
            log::trace!("ret chain at {:#x} broken by '{}'", terminator.address, insn.text);
            return None;
        }

        gadget.push(insn.clone());
        current = history.prev(current);
    }

    log::trace!("ret chain at {:#x} exceeds {} instructions", terminator.address, gadget.max_len());
    None
}

/// Walk back from a jump or system call while instructions stay valid.
///
/// Always yields a gadget when the terminator slot is filled, possibly just
/// the terminator.
pub fn build_chain(history: &InstructionHistory, index: usize, kind: GadgetKind) -> Option<Gadget> {
    let mut gadget = Gadget::new(kind, history.at(index)?.clone());
    let mut current = history.prev(index);

    while !gadget.is_full() {
        match history.at(current) {
            Some(insn) if is_valid(insn) => {
                gadget.push(insn.clone());
                current = history.prev(current);
            }
            _ => break,
        }
    }

    Some(gadget)
}
