//! Instruction classification strategies

use std::fmt;
use std::str::FromStr;
use clap::ValueEnum;

use crate::instruction::{Instruction, Operation};
use crate::RawInstruction;

/// Available classification strategies.
///
/// Both map a mnemonic onto the same [`Operation`] taxonomy; they differ in
/// how they get there.
#[derive(Copy, Clone, ValueEnum, Debug, PartialEq, Eq, Default)]
pub enum ClassifyStrategy {
    /// Exact lookup table keyed by the canonical mnemonic
    #[default]
    Table,
    /// First-character and substring sniffing, for text-only listings
    Heuristic,
}

impl fmt::Display for ClassifyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifyStrategy::Table => write!(f, "table"),
            ClassifyStrategy::Heuristic => write!(f, "heuristic"),
        }
    }
}

impl FromStr for ClassifyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(ClassifyStrategy::Table),
            "heuristic" | "text" => Ok(ClassifyStrategy::Heuristic),
            _ => Err(format!("Unknown classifier: {}", s)),
        }
    }
}

impl ClassifyStrategy {
    /// Determine the operation of a mnemonic with the selected strategy.
    pub fn operation(&self, mnemonic: &str, operands: &str) -> Operation {
        let canonical = canonical_mnemonic(mnemonic, operands);
        match self {
            ClassifyStrategy::Table => table::operation(&canonical),
            ClassifyStrategy::Heuristic => heuristic::operation(&canonical),
        }
    }

    /// Classify a decoded instruction.
    ///
    /// The table strategy consults the decoder's instruction id first. Every
    /// return is rendered as plain `ret`, whatever form the input used.
    pub fn classify(&self, raw: &RawInstruction) -> Instruction {
        let by_id = match self {
            ClassifyStrategy::Table => raw.id.and_then(table::operation_by_id),
            ClassifyStrategy::Heuristic => None,
        };
        let operation = by_id.unwrap_or_else(|| self.operation(&raw.mnemonic, &raw.operands));

        let mut instruction = Instruction::from_raw(raw, operation);
        if operation == Operation::Return {
            instruction.text = "ret".to_string();
        }
        instruction
    }

    /// Return all available strategies
    pub fn all() -> &'static [ClassifyStrategy] {
        &[ClassifyStrategy::Table, ClassifyStrategy::Heuristic]
    }
}

/// Lower-case the mnemonic, drop the RVC `c.` prefix and fold `jr ra` into
/// `ret`.
pub fn canonical_mnemonic(mnemonic: &str, operands: &str) -> String {
    let lowered = mnemonic.trim().to_ascii_lowercase();
    let base = lowered.strip_prefix("c.").unwrap_or(&lowered);

    if base == "jr" && operands.trim() == "ra" {
        return "ret".to_string();
    }
    base.to_string()
}

pub mod heuristic;
pub mod table;
