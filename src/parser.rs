//! Goblin-based ELF parser for RISC-V executables.

use std::fmt;
use goblin::elf::{self, header, section_header};
use goblin::Object;

use crate::{Architecture, BinaryMetadata, BinaryParser, GadgetError, Section};

/// Flags every code section carries
const CODE_FLAGS: u64 = (section_header::SHF_ALLOC | section_header::SHF_EXECINSTR) as u64;

/// A parser for RISC-V ELF images via Goblin.
#[derive(Debug, Default)]
pub struct GoblinParser;

impl GoblinParser {
    /// Construct a new GoblinParser.
    pub fn new() -> Self {
        GoblinParser
    }

    /// Parse an ELF image.
    fn parse_elf(&self, elf: elf::Elf) -> Result<BinaryMetadata, GadgetError> {
        let architecture = match elf.header.e_machine {
            header::EM_RISCV => match elf.header.e_ident[header::EI_CLASS] {
                header::ELFCLASS32 => Architecture::RiscV32,
                header::ELFCLASS64 => Architecture::RiscV64,
                _ => Architecture::Unknown,
            },
            other => {
                log::warn!("ELF machine {} is not RISC-V", header::machine_to_str(other));
                Architecture::Unknown
            }
        };
        if architecture == Architecture::Unknown {
            return Err(GadgetError::UnsupportedArchitecture(architecture));
        }

        let sections: Vec<Section> = elf
            .section_headers
            .iter()
            .filter_map(|sh| {
                let name = elf.shdr_strtab.get_at(sh.sh_name)?;
                Some(Section::new(
                    name.to_string(),
                    sh.sh_addr,
                    sh.sh_offset as usize,
                    sh.sh_size as usize,
                    is_code(sh),
                ))
            })
            .collect();

        log::info!(
            "{} ELF, entry 0x{:x}, {} sections ({} executable)",
            architecture,
            elf.entry,
            sections.len(),
            sections.iter().filter(|s| s.executable).count()
        );

        Ok(BinaryMetadata {
            architecture,
            entry_point: Some(elf.entry),
            sections,
        })
    }
}

/// Allocated program bits with execute permission.
pub fn is_code(sh: &section_header::SectionHeader) -> bool {
    sh.sh_type == section_header::SHT_PROGBITS && sh.sh_flags & CODE_FLAGS == CODE_FLAGS
}

impl fmt::Display for GoblinParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GoblinParser")
    }
}

impl BinaryParser for GoblinParser {
    fn parse(&self, data: &[u8]) -> Result<BinaryMetadata, GadgetError> {
        match Object::parse(data) {
            Ok(Object::Elf(elf)) => self.parse_elf(elf),
            Ok(_) => Err(GadgetError::ParsingError("Not an ELF image".into())),
            Err(e) => Err(GadgetError::ParsingError(e.to_string())),
        }
    }
}
