//! Capstone-based RISC-V instruction decoder.

use std::fmt;

use capstone::arch::riscv::{ArchExtraMode, ArchMode as RiscVMode, RiscVOperand};
use capstone::arch::ArchOperand;
use capstone::prelude::*;

use crate::{listing, Address, Architecture, Decoder, GadgetError, Operand, RawInstruction};

/// Longest RISC-V encoding the decoder looks at
pub const MAX_INSTRUCTION_SIZE: usize = 4;

/// Errors that can occur during decoding
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    /// Capstone error
    #[error("Capstone error: {0}")]
    CapstoneError(#[from] capstone::Error),

    /// Unsupported architecture
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(Architecture),
}

impl From<DecoderError> for GadgetError {
    fn from(err: DecoderError) -> Self {
        match err {
            DecoderError::UnsupportedArchitecture(arch) => GadgetError::UnsupportedArchitecture(arch),
            other => GadgetError::DecoderError(other.to_string()),
        }
    }
}

/// A Capstone-based decoder for RV32/RV64 with the compressed extension.
#[derive(Debug)]
pub struct CapstoneDecoder {
    architecture: Architecture,
    cs: Capstone,
}

impl CapstoneDecoder {
    /// Create a decoder for a specific architecture
    pub fn for_architecture(arch: Architecture) -> Result<Self, DecoderError> {
        let mode = match arch {
            Architecture::RiscV32 => RiscVMode::RiscV32,
            Architecture::RiscV64 => RiscVMode::RiscV64,
            _ => return Err(DecoderError::UnsupportedArchitecture(arch)),
        };

        let cs = Capstone::new()
            .riscv()
            .mode(mode)
            .extra_mode([ArchExtraMode::RiscVC].iter().copied())
            .detail(true)
            .build()?;

        Ok(Self {
            architecture: arch,
            cs,
        })
    }

    /// Get the architecture of this decoder
    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Typed operands of a decoded instruction.
    ///
    /// Alias forms (`ret`, `li`, `mv`, ...) may report the operands of the
    /// underlying instruction; when the detail does not line up with the
    /// printed operands, the printed text wins.
    fn operands(&self, insn: &capstone::Insn<'_>, op_str: &str) -> Vec<Operand> {
        let printed = listing::parse_operands(op_str);

        let Ok(detail) = self.cs.insn_detail(insn) else {
            return printed;
        };
        let typed: Vec<Operand> = detail
            .arch_detail()
            .operands()
            .into_iter()
            .filter_map(|op| match op {
                ArchOperand::RiscVOperand(RiscVOperand::Reg(reg)) => Some(Operand::Reg(self.reg_name(reg))),
                ArchOperand::RiscVOperand(RiscVOperand::Imm(imm)) => Some(Operand::Imm(imm)),
                ArchOperand::RiscVOperand(RiscVOperand::Mem(mem)) => Some(Operand::Mem {
                    base: self.reg_name(mem.base()),
                    disp: mem.disp(),
                }),
                _ => None,
            })
            .collect();

        if typed.len() == printed.len() {
            typed
        } else {
            printed
        }
    }

    fn reg_name(&self, reg: RegId) -> String {
        self.cs.reg_name(reg).unwrap_or_default()
    }
}

impl fmt::Display for CapstoneDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapstoneDecoder::{}", self.architecture)
    }
}

impl Decoder for CapstoneDecoder {
    fn decode(&self, code: &[u8], address: Address) -> Option<RawInstruction> {
        let window = &code[..code.len().min(MAX_INSTRUCTION_SIZE)];
        let insns = self.cs.disasm_count(window, address, 1).ok()?;
        let insn = insns.iter().next()?;

        if insn.address() != address {
            return None;
        }

        let op_str = insn.op_str().unwrap_or("").to_string();
        let operand_list = self.operands(&insn, &op_str);

        Some(RawInstruction {
            address,
            size: insn.bytes().len() as u8,
            mnemonic: insn.mnemonic().unwrap_or("").to_string(),
            operands: op_str,
            operand_list,
            id: Some(insn.id().0),
        })
    }
}
