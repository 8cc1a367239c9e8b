//! The gadget finder: pipeline state fed one decoded instruction at a time,
//! plus the drivers that feed it from ELF sections or text listings.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use clap::ValueEnum;

use crate::catalogue::{Catalogue, GadgetCatalogue, HashCatalogue, Insertion};
use crate::classify::ClassifyStrategy;
use crate::decoder::CapstoneDecoder;
use crate::filter::{self, DEFAULT_KEEP_REGISTER};
use crate::gadget::{build_gadget, Gadget, GadgetKind};
use crate::history::InstructionHistory;
use crate::parser::GoblinParser;
use crate::{listing, Address, BinaryParser, Decoder, GadgetError, RawInstruction};

/// Which terminators trigger gadget extraction.
#[derive(Copy, Clone, ValueEnum, Debug, PartialEq, Eq, Hash, Default)]
pub enum ScanMode {
    /// Every terminator: returns, register jumps and system calls
    #[default]
    Generic,
    /// Returns only
    Ret,
    /// Register jumps only
    Jop,
    /// System calls only
    Syscall,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Generic => write!(f, "generic"),
            ScanMode::Ret => write!(f, "ret"),
            ScanMode::Jop => write!(f, "jop"),
            ScanMode::Syscall => write!(f, "syscall"),
        }
    }
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generic" | "all" => Ok(ScanMode::Generic),
            "ret" | "rop" => Ok(ScanMode::Ret),
            "jop" => Ok(ScanMode::Jop),
            "syscall" | "sys" => Ok(ScanMode::Syscall),
            _ => Err(format!("Unknown scan mode: {}", s)),
        }
    }
}

impl ScanMode {
    /// Whether a terminator of `kind` starts a gadget in this mode
    pub fn triggers(&self, kind: GadgetKind) -> bool {
        match self {
            ScanMode::Generic => true,
            ScanMode::Ret => kind == GadgetKind::Ret,
            ScanMode::Jop => kind == GadgetKind::Jop,
            ScanMode::Syscall => kind == GadgetKind::Syscall,
        }
    }

    /// Return all scan modes
    pub fn all() -> &'static [ScanMode] {
        &[ScanMode::Generic, ScanMode::Ret, ScanMode::Jop, ScanMode::Syscall]
    }
}

/// Finder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderConfig {
    /// Terminators that trigger extraction
    pub mode: ScanMode,
    /// Narrow RET gadgets down to the write of `keep_register`
    pub interesting: bool,
    /// Register whose write the narrowing filter keeps
    pub keep_register: String,
    /// How mnemonics are mapped to operations
    pub classifier: ClassifyStrategy,
    /// Step over undecodable bytes instead of failing the section
    pub skip_invalid: bool,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::default(),
            interesting: false,
            keep_register: DEFAULT_KEEP_REGISTER.to_string(),
            classifier: ClassifyStrategy::default(),
            skip_invalid: false,
        }
    }
}

impl FinderConfig {
    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_interesting(mut self, interesting: bool) -> Self {
        self.interesting = interesting;
        self
    }

    pub fn with_keep_register(mut self, register: impl Into<String>) -> Self {
        self.keep_register = register.into();
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifyStrategy) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_skip_invalid(mut self, skip_invalid: bool) -> Self {
        self.skip_invalid = skip_invalid;
        self
    }
}

/// Counters collected while scanning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Instructions classified
    pub instructions: usize,
    /// Terminators that triggered a chain build
    pub terminators: usize,
    /// Chains the builder rejected
    pub rejected: usize,
    /// Gadgets dropped by a filter
    pub filtered: usize,
    /// Gadgets stored as new entries
    pub added: usize,
    /// Gadgets that superseded a stored one
    pub replaced: usize,
    /// Gadgets dropped as duplicates
    pub duplicates: usize,
}

impl fmt::Display for ScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} instructions, {} terminators, {} rejected, {} filtered, {} added, {} replaced, {} duplicates",
            self.instructions,
            self.terminators,
            self.rejected,
            self.filtered,
            self.added,
            self.replaced,
            self.duplicates
        )
    }
}

/// Pipeline state: instruction history, catalogue and settings.
#[derive(Debug)]
pub struct GadgetFinder<C = HashCatalogue<Rc<Gadget>>> {
    config: FinderConfig,
    history: InstructionHistory,
    catalogue: GadgetCatalogue<C>,
    stats: ScanStats,
}

impl<C: Catalogue<Rc<Gadget>> + Default> GadgetFinder<C> {
    pub fn new(config: FinderConfig) -> Self {
        Self {
            config,
            history: InstructionHistory::new(),
            catalogue: GadgetCatalogue::new(),
            stats: ScanStats::default(),
        }
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    pub fn history(&self) -> &InstructionHistory {
        &self.history
    }

    pub fn catalogue(&self) -> &GadgetCatalogue<C> {
        &self.catalogue
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Classify an instruction and record it in the history.
    ///
    /// Returns the history index and, for terminators, the gadget kind they end.
    pub fn push(&mut self, raw: &RawInstruction) -> (usize, Option<GadgetKind>) {
        let instruction = self.config.classifier.classify(raw);
        let kind = GadgetKind::of(&instruction);
        self.stats.instructions += 1;
        (self.history.push(instruction), kind)
    }

    /// Feed one decoded instruction through the pipeline.
    ///
    /// A terminator selected by the scan mode builds, filters and stores a
    /// gadget before this returns.
    pub fn on_instruction(&mut self, raw: &RawInstruction) -> Option<Insertion> {
        let (index, kind) = self.push(raw);
        let kind = kind.filter(|kind| self.config.mode.triggers(*kind))?;

        log::trace!("{} terminator at {:#x}: {}", kind, raw.address, raw);
        self.process_gadget(index, kind)
    }

    /// Build the gadget ending at history slot `index`, filter it and offer it
    /// to the catalogue.
    pub fn process_gadget(&mut self, index: usize, kind: GadgetKind) -> Option<Insertion> {
        self.stats.terminators += 1;

        let Some(gadget) = build_gadget(&self.history, index, kind) else {
            self.stats.rejected += 1;
            return None;
        };

        let gadget = match kind {
            GadgetKind::Jop => match filter::jop_filter(gadget) {
                Some(gadget) => gadget,
                None => {
                    self.stats.filtered += 1;
                    return None;
                }
            },
            GadgetKind::Ret if self.config.interesting => filter::narrow(gadget, &self.config.keep_register),
            _ => gadget,
        };

        let outcome = self.catalogue.insert_gadget(gadget);
        match outcome {
            Insertion::Added => self.stats.added += 1,
            Insertion::Replaced => self.stats.replaced += 1,
            Insertion::Duplicate => self.stats.duplicates += 1,
        }
        Some(outcome)
    }

    /// Decode `code`, mapped at `base`, and feed every instruction through the
    /// pipeline. Returns the number of instructions decoded.
    pub fn scan_section<D: Decoder + ?Sized>(
        &mut self,
        decoder: &D,
        code: &[u8],
        base: Address,
    ) -> Result<usize, GadgetError> {
        let mut offset = 0;
        let mut decoded = 0;

        while offset < code.len() {
            let address = base + offset as Address;
            match decoder.decode(&code[offset..], address) {
                Some(raw) => {
                    self.on_instruction(&raw);
                    offset += usize::from(raw.size.max(2));
                    decoded += 1;
                }
                None if self.config.skip_invalid => {
                    log::warn!("Skipping undecodable bytes at 0x{:x}", address);
                    offset += 2;
                }
                None => return Err(GadgetError::InvalidInstruction(address)),
            }
        }

        Ok(decoded)
    }

    /// Accepted gadgets, in catalogue order
    pub fn gadgets(&self) -> Vec<Rc<Gadget>> {
        self.catalogue.gadgets()
    }

    pub fn len(&self) -> usize {
        self.catalogue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogue.is_empty()
    }
}

/// Find the gadgets of every executable section of a RISC-V ELF image.
///
/// Sections are scanned in header order through one finder, so the
/// instruction history carries over from one section to the next.
pub fn scan_elf(data: &[u8], config: FinderConfig) -> Result<GadgetFinder, GadgetError> {
    let metadata = GoblinParser::new().parse(data)?;
    let decoder = CapstoneDecoder::for_architecture(metadata.architecture)?;
    let mut finder = GadgetFinder::new(config);

    for (code, address) in metadata.get_executable_data(data) {
        let before = finder.stats();
        let decoded = finder.scan_section(&decoder, code, address)?;
        log::info!(
            "Section at 0x{:x}: {} instructions, {} gadgets added",
            address,
            decoded,
            finder.stats().added - before.added
        );
    }

    log::debug!("{}", finder.stats());
    Ok(finder)
}

/// Find the gadgets of a textual disassembly listing.
pub fn scan_listing(text: &str, config: FinderConfig) -> GadgetFinder {
    let mut finder = GadgetFinder::new(config);

    for raw in listing::parse_listing(text) {
        finder.on_instruction(&raw);
    }

    log::debug!("{}", finder.stats());
    finder
}
