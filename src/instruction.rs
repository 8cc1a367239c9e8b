//! Classified instructions.
//!
//! An [`Instruction`] is what the rest of the pipeline works with: the
//! semantic [`Operation`] chosen by a classifier plus the handful of operand
//! facts the gadget rules look at (destination register, immediate, shift
//! source), and the normalised disassembly text used for keys and output.

use std::fmt;

use crate::{Address, Operand, RawInstruction};

/// Semantic operation tag of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Load,
    Store,
    Compare,
    Jump,
    Add,
    Or,
    And,
    Shift,
    Sub,
    Set,
    Nop,
    Move,
    Call,
    Break,
    Not,
    Negate,
    Return,
    Atomic,
    Io,
    Multiply,
    Divide,
    Syscall,
    Unsupported,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Load => "load",
            Operation::Store => "store",
            Operation::Compare => "compare",
            Operation::Jump => "jump",
            Operation::Add => "add",
            Operation::Or => "or",
            Operation::And => "and",
            Operation::Shift => "shift",
            Operation::Sub => "sub",
            Operation::Set => "set",
            Operation::Nop => "nop",
            Operation::Move => "move",
            Operation::Call => "call",
            Operation::Break => "break",
            Operation::Not => "not",
            Operation::Negate => "negate",
            Operation::Return => "return",
            Operation::Atomic => "atomic",
            Operation::Io => "io",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
            Operation::Syscall => "syscall",
            Operation::Unsupported => "unsupported",
        };
        write!(f, "{}", name)
    }
}

/// A decoded and classified instruction.
///
/// Instances are immutable once built; gadgets hold their own copies, so an
/// instruction stays valid after its history slot has been overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Address of the instruction
    pub address: Address,
    /// Semantic operation
    pub operation: Operation,
    /// Immediate operand, when the operand list carries one that fits in 16 bits
    pub immediate: Option<i16>,
    /// Source register of a shift
    pub shift_register: Option<String>,
    /// Destination register name, empty when the instruction has none
    pub dest: String,
    /// Normalised disassembly text (mnemonic and operands)
    pub text: String,
    /// Whether the instruction uses a 2-byte encoding
    pub compressed: bool,
}

impl Instruction {
    /// Build an instruction from decoder output and an already chosen operation.
    ///
    /// Operand positions follow the RISC-V assembly order: with one operand
    /// it is either the immediate or the destination; with two, the first is
    /// the destination and the second may be an immediate; with three, the
    /// first is the destination, the second the shifted register (shifts
    /// only), and the third may be an immediate.
    pub fn from_raw(raw: &RawInstruction, operation: Operation) -> Self {
        let mut immediate = None;
        let mut shift_register = None;
        let mut dest = String::new();

        match raw.operand_list.as_slice() {
            [only] => match only {
                Operand::Imm(imm) => immediate = narrow_immediate(*imm),
                Operand::Reg(reg) => dest = reg.clone(),
                // `jr 8(a5)` jumps through its base register
                Operand::Mem { base, .. } if matches!(operation, Operation::Jump | Operation::Return) => {
                    dest = base.clone()
                }
                Operand::Mem { .. } => {}
            },
            [first, second] => {
                dest = register_name(first);
                if let Operand::Imm(imm) = second {
                    immediate = narrow_immediate(*imm);
                }
            }
            [first, second, third] => {
                dest = register_name(first);
                if operation == Operation::Shift {
                    if let Operand::Reg(reg) = second {
                        shift_register = Some(reg.clone());
                    }
                }
                if let Operand::Imm(imm) = third {
                    immediate = narrow_immediate(*imm);
                }
            }
            _ => {}
        }

        // `jalr zero, 0(a5)` style jumps go through the register after zero
        if dest == "zero" && matches!(operation, Operation::Jump | Operation::Return) {
            dest = raw
                .operand_list
                .iter()
                .skip(1)
                .find_map(|op| match op {
                    Operand::Reg(reg) => Some(reg.clone()),
                    Operand::Mem { base, .. } => Some(base.clone()),
                    Operand::Imm(_) => None,
                })
                .unwrap_or_default();
        }

        Self {
            address: raw.address,
            operation,
            immediate,
            shift_register,
            dest,
            text: normalize_text(&raw.to_string()),
            compressed: raw.is_compressed(),
        }
    }

    /// Whether an immediate operand was captured
    pub fn uses_immediate(&self) -> bool {
        self.immediate.is_some()
    }

    /// Whether this is a shift with a register source
    pub fn uses_shift(&self) -> bool {
        self.shift_register.is_some()
    }

    /// The mnemonic part of the text
    pub fn mnemonic(&self) -> &str {
        self.text.split(' ').next().unwrap_or("")
    }

    /// `addi sp, sp, N` style stack adjustment by a constant
    pub fn adjusts_sp(&self) -> bool {
        self.operation == Operation::Add && self.uses_immediate() && self.dest == "sp"
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

fn register_name(operand: &Operand) -> String {
    match operand {
        Operand::Reg(reg) => reg.clone(),
        _ => String::new(),
    }
}

fn narrow_immediate(imm: i64) -> Option<i16> {
    i16::try_from(imm).ok()
}

/// Normalise disassembly text: tabs and runs of whitespace become a single
/// space and every comma is followed by exactly one space.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut pending_space = false;

    for c in text.trim().chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
        if c == ',' {
            pending_space = true;
        }
    }

    out
}
