use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use ropv::classify::ClassifyStrategy;
use ropv::filter::DEFAULT_KEEP_REGISTER;
use ropv::finder::{scan_elf, scan_listing, FinderConfig, ScanMode};
use ropv::format::OutputFormat;

/// Finds and deduplicates ROP/JOP gadgets in RISC-V ELF binaries.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").args(["all", "ret", "jop", "sys"])))]
struct Args {
    /// RISC-V ELF binary, or a disassembly listing with --listing.
    file: PathBuf,

    /// Extract gadgets behind every terminator (default).
    #[arg(short, long)]
    all: bool,

    /// Only gadgets ending in a return.
    #[arg(short, long)]
    ret: bool,

    /// Only gadgets ending in a register jump.
    #[arg(short, long)]
    jop: bool,

    /// Only gadgets ending in a system call.
    #[arg(short, long)]
    sys: bool,

    /// Narrow return gadgets down to the write of the keep register.
    #[arg(short, long)]
    interesting: bool,

    /// Register whose write --interesting keeps.
    #[arg(long, default_value = DEFAULT_KEEP_REGISTER)]
    keep_register: String,

    /// How mnemonics are classified.
    #[arg(long, value_enum, default_value_t = ClassifyStrategy::Table)]
    classifier: ClassifyStrategy,

    /// Read FILE as an objdump-style text listing instead of an ELF image.
    #[arg(long)]
    listing: bool,

    /// Step over undecodable bytes instead of failing.
    #[arg(long)]
    skip_invalid: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Verbosity level for stderr logging.
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all logging.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn mode(&self) -> ScanMode {
        if self.ret {
            ScanMode::Ret
        } else if self.jop {
            ScanMode::Jop
        } else if self.sys {
            ScanMode::Syscall
        } else {
            ScanMode::Generic
        }
    }

    fn config(&self) -> FinderConfig {
        FinderConfig::default()
            .with_mode(self.mode())
            .with_interesting(self.interesting)
            .with_keep_register(self.keep_register.as_str())
            .with_classifier(self.classifier)
            .with_skip_invalid(self.skip_invalid)
    }
}

/// Scan the input and render the catalogue in the selected format.
fn run(args: &Args) -> Result<String> {
    let config = args.config();
    log::debug!("{:?}", config);

    let finder = if args.listing {
        let text = fs::read_to_string(&args.file)
            .with_context(|| format!("Failed to read {}", args.file.display()))?;
        scan_listing(&text, config)
    } else {
        let data = fs::read(&args.file)
            .with_context(|| format!("Failed to read {}", args.file.display()))?;
        scan_elf(&data, config).with_context(|| format!("Failed to scan {}", args.file.display()))?
    };

    let gadgets = finder.gadgets();
    log::info!("{} unique gadgets ({})", gadgets.len(), finder.stats());

    Ok(args.format.get_formatter().format(&gadgets)?)
}

fn main() -> Result<()> {
    let args = Args::parse();
    stderrlog::new()
        .quiet(args.quiet)
        .verbosity(args.verbose as usize)
        .init()?;

    let output = run(&args)?;
    io::stdout().write_all(output.as_bytes())?;
    Ok(())
}
