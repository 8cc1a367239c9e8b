//! Core types, traits, and the gadget pipeline of the `ropv` gadget finder.
//!
//! `ropv` locates return- and jump-oriented programming gadgets inside RISC-V
//! ELF binaries. Every decoded instruction is classified, recorded in a short
//! instruction history, and whenever a gadget terminator (`ret`, `jr`, `ecall`)
//! shows up the history is walked backwards to build a gadget. Accepted
//! gadgets are deduplicated into a catalogue keyed by their textual form.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use std::fs;
//! use ropv::{
//!     finder::{scan_elf, FinderConfig, ScanMode},
//!     format::OutputFormat,
//! };
//!
//! let binary_data = fs::read("path/to/riscv/binary").unwrap();
//!
//! let config = FinderConfig::default().with_mode(ScanMode::Ret);
//! let finder = scan_elf(&binary_data, config).unwrap();
//!
//! let output = OutputFormat::Text
//!     .get_formatter()
//!     .format(&finder.gadgets())
//!     .unwrap();
//! print!("{}", output);
//! ```
//!
//! The pipeline can also be driven one instruction at a time through
//! [`finder::GadgetFinder::on_instruction`], which is how the ELF and listing
//! drivers feed it.

pub mod catalogue;
pub mod classify;
pub mod decoder;
pub mod filter;
pub mod finder;
pub mod format;
pub mod gadget;
pub mod history;
pub mod instruction;
pub mod listing;
pub mod parser;

/// Represents an address in memory
pub type Address = u64;

use std::fmt;

/// A typed operand as reported by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Register operand, by ABI name (e.g. "sp", "a0")
    Reg(String),
    /// Immediate operand
    Imm(i64),
    /// Memory operand `disp(base)`
    Mem {
        /// Base register name
        base: String,
        /// Displacement added to the base register
        disp: i64,
    },
}

/// One instruction as handed over by a decoder, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInstruction {
    /// Address of the instruction
    pub address: Address,
    /// Size of the instruction in bytes (2 for compressed encodings, 4 otherwise)
    pub size: u8,
    /// Instruction mnemonic (e.g., "addi", "c.jr")
    pub mnemonic: String,
    /// Operands as string representation
    pub operands: String,
    /// Typed operand list, empty when the decoder only provides text
    pub operand_list: Vec<Operand>,
    /// Decoder instruction id, when the input came from a decoder
    pub id: Option<u32>,
}

impl RawInstruction {
    /// Build an instruction from text only; the operand list is derived from
    /// the operand string.
    pub fn from_text(address: Address, size: u8, mnemonic: &str, operands: &str) -> Self {
        Self {
            address,
            size,
            mnemonic: mnemonic.to_string(),
            operands: operands.to_string(),
            operand_list: listing::parse_operands(operands),
            id: None,
        }
    }

    /// Returns true for 2-byte (RVC) encodings.
    pub fn is_compressed(&self) -> bool {
        self.size == 2
    }
}

impl fmt::Display for RawInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operands.is_empty() {
            write!(f, "{}", self.mnemonic)
        } else {
            write!(f, "{}\t{}", self.mnemonic, self.operands)
        }
    }
}

/// Decoder trait: architecture-specific disassembler.
pub trait Decoder {
    /// Decode the single instruction at the start of `code`, which is mapped
    /// at `address`.
    ///
    /// # Returns
    /// Some(RawInstruction) if an instruction was successfully decoded, None otherwise
    fn decode(&self, code: &[u8], address: Address) -> Option<RawInstruction>;
}

/// Supported architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Architecture {
    /// RISC-V 32-bit
    RiscV32,
    /// RISC-V 64-bit
    RiscV64,
    /// Unknown architecture
    Unknown,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::RiscV32 => write!(f, "RISC-V 32"),
            Architecture::RiscV64 => write!(f, "RISC-V 64"),
            Architecture::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A section in the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name
    pub name: String,
    /// Virtual address of the section
    pub address: Address,
    /// File offset of the section contents
    pub offset: usize,
    /// Size of the section in bytes
    pub size: usize,
    /// Whether this section holds allocated, executable program bits
    pub executable: bool,
}

impl Section {
    /// Create a new section
    pub fn new(name: String, address: Address, offset: usize, size: usize, executable: bool) -> Self {
        Self {
            name,
            address,
            offset,
            size,
            executable,
        }
    }

    /// Get the end address of this section
    pub fn end_address(&self) -> Address {
        self.address + self.size as Address
    }

    /// Slice this section's contents out of the file image.
    pub fn data<'a>(&self, img: &'a [u8]) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(self.size)?;
        img.get(self.offset..end)
    }
}

/// Metadata describing a parsed binary.
#[derive(Debug, Clone)]
pub struct BinaryMetadata {
    /// Detected architecture
    pub architecture: Architecture,
    /// Entry point address, if available
    pub entry_point: Option<Address>,
    /// List of sections found in the binary
    pub sections: Vec<Section>,
}

impl BinaryMetadata {
    /// Find a section by name
    pub fn find_section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Get all executable sections, in section header order
    pub fn executable_sections(&self) -> Vec<&Section> {
        self.sections.iter().filter(|s| s.executable).collect()
    }

    /// Return the contents and load address of every executable section.
    ///
    /// Sections whose file range lies outside `img` are skipped.
    pub fn get_executable_data<'a>(&'a self, img: &'a [u8]) -> Vec<(&'a [u8], Address)> {
        self.executable_sections()
            .into_iter()
            .filter_map(|section| {
                let data = section.data(img);
                if data.is_none() {
                    log::warn!(
                        "Section '{}' (offset 0x{:x}, {} bytes) lies outside the file",
                        section.name, section.offset, section.size
                    );
                }
                data.map(|d| (d, section.address))
            })
            .collect()
    }
}

/// Parser trait: turn raw bytes into `BinaryMetadata`.
pub trait BinaryParser {
    /// Parse binary data into metadata
    ///
    /// # Arguments
    /// * `data` - The binary data to parse
    ///
    /// # Returns
    /// Result containing BinaryMetadata if parsing was successful
    fn parse(&self, data: &[u8]) -> Result<BinaryMetadata, GadgetError>;
}

/// Error type for gadget search operations
#[derive(Debug, thiserror::Error)]
pub enum GadgetError {
    /// Failed to parse binary format
    #[error("Failed to parse binary format: {0}")]
    ParsingError(String),

    /// Decoder error
    #[error("Decoder error: {0}")]
    DecoderError(String),

    /// The decoder could not make sense of the bytes at an address
    #[error("Failed to disassemble instruction at 0x{0:x}")]
    InvalidInstruction(Address),

    /// Unsupported architecture
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(Architecture),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Generic(String),
}
